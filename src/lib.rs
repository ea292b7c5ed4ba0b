//! # nutrition-meter
//!
//! Estimate calories and macronutrients from a food photo using a hosted
//! Vision Language Model.
//!
//! ## Pipeline Overview
//!
//! ```text
//! photo + "additional information"
//!  │
//!  ├─ 1. Normalize  decode any JPEG/PNG, force RGB, re-encode as JPEG
//!  ├─ 2. Compose    instruction template + " " + user text
//!  ├─ 3. Infer      one call to Gemini (or any edgequake-llm provider)
//!  └─ 4. Render     result text or an error message, never both
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use nutrition_meter::{analyze_file, AnalyzerConfig, Outcome};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // API key from GOOGLE_API_KEY / GEMINI_API_KEY
//!     let config = AnalyzerConfig::from_env()?;
//!     match analyze_file("lunch.jpg", "make it vegan-only", &config).await? {
//!         Outcome::Analysis(a) => println!("{}", a.text),
//!         Outcome::Failed { message, .. } => eprintln!("{message}"),
//!         Outcome::Skipped => {}
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `nutrimeter` binary (clap + anyhow + tracing-subscriber + dotenvy) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod analyze;
pub mod assets;
pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod prompts;
pub mod render;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use analyze::{analyze, analyze_file, analyze_sync, load_upload, prepare_request, Submission};
pub use assets::{AssetSource, EmbeddedAsset};
pub use config::{AnalyzerConfig, AnalyzerConfigBuilder};
pub use error::{ImageDecodeError, InferenceError, NutritionError};
pub use output::{AnalysisOutput, FailureStage, Outcome};
pub use pipeline::compose::{compose_request, InferenceRequest};
pub use pipeline::gemini::GeminiClient;
pub use pipeline::inference::{resolve_client, InferenceClient, InferenceResult, ProviderClient};
pub use pipeline::normalize::{normalize_image, NormalizedImagePayload, UploadedImage};
pub use prompts::{compose_prompt, NUTRITION_PROMPT};
pub use render::{render_html, render_text, PageAssets};
