//! Inference clients: send one [`InferenceRequest`], get one text back.
//!
//! The hosted model is an external collaborator, so it sits behind the
//! [`InferenceClient`] trait. Two implementations ship with the crate:
//!
//! * [`GeminiClient`](crate::pipeline::gemini::GeminiClient) — direct REST
//!   call to Google's Generative Language API, the default backend.
//! * [`ProviderClient`] — any vision-capable `edgequake_llm` provider
//!   (OpenAI, Anthropic, Ollama, …) selected by name.
//!
//! Exactly one call is made per submission. There is no retry layer: a
//! failure is reported to the user as-is.

use crate::config::{AnalyzerConfig, DEFAULT_GEMINI_MODEL};
use crate::error::{InferenceError, NutritionError};
use crate::pipeline::compose::InferenceRequest;
use crate::pipeline::gemini::GeminiClient;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider, ProviderFactory};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Text returned by the model, plus whatever usage data the provider reported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceResult {
    pub text: String,
    pub model: String,
    pub input_tokens: Option<u64>,
    pub output_tokens: Option<u64>,
}

impl InferenceResult {
    pub fn text_only(text: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            model: model.into(),
            input_tokens: None,
            output_tokens: None,
        }
    }
}

/// A hosted vision-language model.
///
/// Implementations must be `Send + Sync`; one client is built at startup and
/// shared by reference across submissions.
#[async_trait]
pub trait InferenceClient: Send + Sync {
    /// Short provider label used in logs and error messages.
    fn name(&self) -> &str;

    /// Send one prompt + image and return the model's text.
    async fn generate(&self, request: &InferenceRequest) -> Result<InferenceResult, InferenceError>;
}

/// [`InferenceClient`] backed by an `edgequake_llm` provider.
pub struct ProviderClient {
    provider: Arc<dyn LLMProvider>,
    label: String,
    model: String,
    options: CompletionOptions,
    timeout_secs: u64,
}

impl ProviderClient {
    pub fn new(
        provider: Arc<dyn LLMProvider>,
        label: impl Into<String>,
        model: impl Into<String>,
        config: &AnalyzerConfig,
    ) -> Self {
        Self {
            provider,
            label: label.into(),
            model: model.into(),
            options: build_options(config),
            timeout_secs: config.api_timeout_secs,
        }
    }
}

#[async_trait]
impl InferenceClient for ProviderClient {
    fn name(&self) -> &str {
        &self.label
    }

    async fn generate(&self, request: &InferenceRequest) -> Result<InferenceResult, InferenceError> {
        let image = ImageData::new(request.image_base64(), request.image.mime_type.clone());
        let messages = vec![ChatMessage::user_with_images(
            request.prompt.as_str(),
            vec![image],
        )];

        let call = self.provider.chat(&messages, Some(&self.options));
        let response = tokio::time::timeout(Duration::from_secs(self.timeout_secs), call)
            .await
            .map_err(|_| InferenceError::Timeout {
                provider: self.label.clone(),
                secs: self.timeout_secs,
            })?
            .map_err(|e| InferenceError::Provider {
                provider: self.label.clone(),
                detail: format!("{}", e),
            })?;

        if response.content.trim().is_empty() {
            return Err(InferenceError::EmptyResponse {
                provider: self.label.clone(),
                reason: None,
            });
        }

        debug!(
            "{}: {} input tokens, {} output tokens",
            self.label, response.prompt_tokens, response.completion_tokens
        );

        Ok(InferenceResult {
            text: response.content,
            model: self.model.clone(),
            input_tokens: Some(response.prompt_tokens as u64),
            output_tokens: Some(response.completion_tokens as u64),
        })
    }
}

/// Build `CompletionOptions` from the analyzer config.
fn build_options(config: &AnalyzerConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}

/// Default vision model for a named provider, if the crate knows one.
fn default_model_for(provider_name: &str) -> Option<&'static str> {
    match provider_name {
        "gemini" | "google" => Some(DEFAULT_GEMINI_MODEL),
        "openai" => Some("gpt-4.1-nano"),
        "anthropic" => Some("claude-sonnet-4-20250514"),
        "ollama" => Some("llama3.2-vision"),
        _ => None,
    }
}

/// Resolve the inference client, from most-specific to least-specific.
///
/// 1. **Pre-built provider** (`config.provider`) — used as-is.
/// 2. **Named provider** (`config.provider_name`) — constructed through
///    [`ProviderFactory::create_llm_provider`], which reads that provider's
///    own API key variable.
/// 3. **Built-in Gemini REST client** — requires `config.api_key`.
pub fn resolve_client(config: &AnalyzerConfig) -> Result<Arc<dyn InferenceClient>, NutritionError> {
    if let Some(ref provider) = config.provider {
        let model = config.effective_model().to_string();
        info!("Using pre-built LLM provider");
        return Ok(Arc::new(ProviderClient::new(
            Arc::clone(provider),
            "custom",
            model,
            config,
        )));
    }

    if let Some(ref name) = config.provider_name {
        let name = name.trim().to_lowercase();
        let model = match config.model.as_deref().or_else(|| default_model_for(&name)) {
            Some(m) => m.to_string(),
            None => {
                return Err(NutritionError::ProviderNotConfigured {
                    provider: name,
                    hint: "No default vision model is known for this provider; pass --model."
                        .into(),
                })
            }
        };
        let provider = ProviderFactory::create_llm_provider(&name, &model).map_err(|e| {
            NutritionError::ProviderNotConfigured {
                provider: name.clone(),
                hint: format!("{e}"),
            }
        })?;
        info!("Using provider '{}' with model '{}'", name, model);
        return Ok(Arc::new(ProviderClient::new(provider, name, model, config)));
    }

    let api_key = config
        .api_key
        .as_deref()
        .filter(|k| !k.trim().is_empty())
        .ok_or(NutritionError::MissingApiKey)?;
    let client = GeminiClient::new(
        api_key,
        config.effective_model(),
        &config.base_url,
        config,
    )?;
    info!("Using Gemini model '{}'", config.effective_model());
    Ok(Arc::new(client))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_options_defaults() {
        let opts = build_options(&AnalyzerConfig::default());
        assert_eq!(opts.temperature, Some(0.4));
        assert_eq!(opts.max_tokens, Some(2048));
    }

    #[test]
    fn known_providers_have_default_models() {
        assert_eq!(default_model_for("gemini"), Some(DEFAULT_GEMINI_MODEL));
        assert!(default_model_for("openai").is_some());
        assert!(default_model_for("my-proxy").is_none());
    }

    #[test]
    fn gemini_without_key_is_missing_api_key() {
        let config = AnalyzerConfig::default();
        let err = resolve_client(&config).err().expect("should fail");
        assert!(matches!(err, NutritionError::MissingApiKey));
    }

    #[test]
    fn blank_key_counts_as_missing() {
        let config = AnalyzerConfig::builder().api_key("   ").build().unwrap();
        assert!(matches!(
            resolve_client(&config).err(),
            Some(NutritionError::MissingApiKey)
        ));
    }

    #[test]
    fn unknown_provider_without_model_needs_model() {
        let config = AnalyzerConfig::builder()
            .provider_name("my-proxy")
            .build()
            .unwrap();
        match resolve_client(&config).err() {
            Some(NutritionError::ProviderNotConfigured { provider, hint }) => {
                assert_eq!(provider, "my-proxy");
                assert!(hint.contains("--model"));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn gemini_with_key_resolves() {
        let config = AnalyzerConfig::builder().api_key("k").build().unwrap();
        let client = resolve_client(&config).expect("client");
        assert_eq!(client.name(), "gemini");
    }
}
