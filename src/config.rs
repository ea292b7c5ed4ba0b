//! Configuration for food-photo analysis.
//!
//! All behaviour is controlled through [`AnalyzerConfig`], built once at
//! process start (via [`AnalyzerConfigBuilder`] or [`AnalyzerConfig::from_env`])
//! and passed by reference into every submission. Nothing below the
//! configuration layer reads the environment.

use crate::error::NutritionError;
use crate::prompts::NUTRITION_PROMPT;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::sync::Arc;

/// Model used by the built-in Gemini client when none is configured.
///
/// Google retires Gemini model IDs on a schedule; override with
/// `NUTRIMETER_MODEL` or [`AnalyzerConfigBuilder::model`] when this one is
/// withdrawn.
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";

/// Public endpoint of the Google Generative Language API.
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Environment variables searched, in order, for the Gemini API key.
pub const API_KEY_ENV_VARS: [&str; 2] = ["GOOGLE_API_KEY", "GEMINI_API_KEY"];

/// Configuration for analysing food photos.
///
/// # Example
/// ```rust
/// use nutrition_meter::AnalyzerConfig;
///
/// let config = AnalyzerConfig::builder()
///     .api_key("test-key")
///     .model("gemini-2.5-flash-lite")
///     .jpeg_quality(85)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct AnalyzerConfig {
    /// Credential for the built-in Gemini client. Never logged.
    pub api_key: Option<String>,

    /// Model identifier. If None, uses [`DEFAULT_GEMINI_MODEL`].
    pub model: Option<String>,

    /// edgequake-llm provider name (e.g. "openai", "anthropic", "ollama").
    /// If None along with `provider`, the built-in Gemini REST client is used.
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Instruction template prefixed to every request. Default: [`NUTRITION_PROMPT`].
    pub template: String,

    /// Sampling temperature. Range: 0.0–2.0. Default: 0.4.
    pub temperature: f32,

    /// Maximum tokens the model may generate. Default: 2048.
    ///
    /// A plate with many items produces a long itemised list plus the
    /// macronutrient summary; 2048 leaves headroom without inviting rambling.
    pub max_tokens: usize,

    /// Quality used when re-encoding uploads as JPEG. Range: 1–100. Default: 75.
    pub jpeg_quality: u8,

    /// Timeout for the single inference call in seconds. Default: 60.
    pub api_timeout_secs: u64,

    /// Base URL of the Gemini REST API. Default: [`DEFAULT_GEMINI_BASE_URL`].
    pub base_url: String,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: None,
            provider_name: None,
            provider: None,
            template: NUTRITION_PROMPT.to_string(),
            temperature: 0.4,
            max_tokens: 2048,
            jpeg_quality: 75,
            api_timeout_secs: 60,
            base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
        }
    }
}

impl fmt::Debug for AnalyzerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalyzerConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("template_len", &self.template.len())
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("jpeg_quality", &self.jpeg_quality)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl AnalyzerConfig {
    /// Create a new builder for `AnalyzerConfig`.
    pub fn builder() -> AnalyzerConfigBuilder {
        AnalyzerConfigBuilder {
            config: Self::default(),
        }
    }

    /// Build a configuration from the process environment.
    ///
    /// Reads the API key from `GOOGLE_API_KEY` (falling back to
    /// `GEMINI_API_KEY`), plus the optional `NUTRIMETER_MODEL` and
    /// `NUTRIMETER_PROVIDER` overrides. Call once at startup.
    pub fn from_env() -> Result<Self, NutritionError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) but with an injectable lookup,
    /// so callers and tests can supply variables without touching the
    /// process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, NutritionError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let mut builder = Self::builder();
        if let Some(key) = api_key_from_lookup(&lookup) {
            builder = builder.api_key(key);
        }
        if let Some(model) = non_empty("NUTRIMETER_MODEL") {
            builder = builder.model(model);
        }
        if let Some(provider) = non_empty("NUTRIMETER_PROVIDER") {
            builder = builder.provider_name(provider);
        }
        builder.build()
    }

    /// The model that will actually be requested.
    pub fn effective_model(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_GEMINI_MODEL)
    }
}

/// First non-blank value among [`API_KEY_ENV_VARS`].
pub fn api_key_from_lookup<F>(lookup: F) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    API_KEY_ENV_VARS
        .iter()
        .find_map(|k| lookup(*k).filter(|v| !v.trim().is_empty()))
}

/// Builder for [`AnalyzerConfig`].
#[derive(Debug)]
pub struct AnalyzerConfigBuilder {
    config: AnalyzerConfig,
}

impl AnalyzerConfigBuilder {
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn template(mut self, template: impl Into<String>) -> Self {
        self.config.template = template.into();
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n.max(1);
        self
    }

    pub fn jpeg_quality(mut self, q: u8) -> Self {
        self.config.jpeg_quality = q.clamp(1, 100);
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into();
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<AnalyzerConfig, NutritionError> {
        let c = &self.config;
        if c.template.trim().is_empty() {
            return Err(NutritionError::InvalidConfig(
                "Instruction template must not be empty".into(),
            ));
        }
        if c.api_timeout_secs == 0 {
            return Err(NutritionError::InvalidConfig(
                "API timeout must be ≥ 1 second".into(),
            ));
        }
        if c.base_url.trim().is_empty() {
            return Err(NutritionError::InvalidConfig(
                "Base URL must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}
