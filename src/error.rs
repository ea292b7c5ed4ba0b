//! Error types for the nutrition-meter library.
//!
//! Three error types reflect three distinct failure modes:
//!
//! * [`NutritionError`] — **Fatal**: the process cannot serve submissions at
//!   all (missing API key, invalid configuration, unreadable asset). Returned
//!   as `Err(NutritionError)` from setup functions.
//!
//! * [`ImageDecodeError`] — **Per-submission**: the uploaded bytes are not a
//!   usable image. The submission is halted before any model call is made.
//!
//! * [`InferenceError`] — **Per-submission**: the single call to the hosted
//!   model failed. It is never retried.
//!
//! Per-submission errors never escape [`crate::analyze::analyze`]; they are
//! converted into [`crate::output::Outcome::Failed`] carrying a user-facing
//! message.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the nutrition-meter library.
#[derive(Debug, Error)]
pub enum NutritionError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Image file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file extension is not one of the accepted upload types.
    #[error("Unsupported file type '{extension}' for '{path}'\nAccepted types: jpg, jpeg, png.")]
    UnsupportedFileType { path: PathBuf, extension: String },

    /// A decorative asset (background, logo) could not be loaded.
    #[error("Failed to load asset '{path}': {source}")]
    AssetUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A decorative asset was read but is not a decodable image.
    #[error("Asset '{path}' is not a usable image: {source}")]
    AssetUndecodable {
        path: PathBuf,
        #[source]
        source: ImageDecodeError,
    },

    // ── Provider errors ───────────────────────────────────────────────────
    /// No credential was configured for the built-in Gemini client.
    #[error(
        "No API key configured.\n\
Set GOOGLE_API_KEY (or GEMINI_API_KEY) in the environment or a .env file,\n\
or pass --api-key <KEY>."
    )]
    MissingApiKey,

    /// The named provider could not be constructed.
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the rendered output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// The uploaded bytes could not be turned into a normalized payload.
#[derive(Debug, Error)]
pub enum ImageDecodeError {
    /// Zero bytes were uploaded.
    #[error("Failed to process the image file: the upload is empty")]
    Empty,

    /// The bytes are corrupt or not a supported raster format.
    #[error("Failed to process the image file: {0}")]
    Decode(#[source] image::ImageError),

    /// The decoded bitmap could not be re-encoded.
    #[error("Failed to re-encode the image file: {0}")]
    Encode(#[source] image::ImageError),
}

/// The call to the hosted model failed.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum InferenceError {
    /// Connection could not be established or was dropped.
    #[error("Network error contacting '{provider}': {detail}")]
    Network { provider: String, detail: String },

    /// The call exceeded the configured timeout.
    #[error("Request to '{provider}' timed out after {secs}s")]
    Timeout { provider: String, secs: u64 },

    /// HTTP 401/403 from the model API — check the API key.
    #[error("Authentication error from '{provider}': {detail}")]
    Auth { provider: String, detail: String },

    /// HTTP 429 from the model API.
    #[error("Rate limit or quota exceeded for '{provider}'{}", retry_hint(.retry_after_secs))]
    RateLimited {
        provider: String,
        retry_after_secs: Option<u64>,
    },

    /// Any other non-success HTTP status.
    #[error("'{provider}' returned HTTP {status}: {detail}")]
    Api {
        provider: String,
        status: u16,
        detail: String,
    },

    /// The response body could not be parsed.
    #[error("Malformed response from '{provider}': {detail}")]
    MalformedResponse { provider: String, detail: String },

    /// The response parsed but contained no text.
    #[error("'{provider}' returned no text{}", reason_hint(.reason))]
    EmptyResponse {
        provider: String,
        reason: Option<String>,
    },

    /// Error reported by an edgequake-llm provider.
    #[error("LLM provider '{provider}' failed: {detail}")]
    Provider { provider: String, detail: String },
}

fn retry_hint(secs: &Option<u64>) -> String {
    match secs {
        Some(s) => format!(" (retry after {s}s)"),
        None => String::new(),
    }
}

fn reason_hint(reason: &Option<String>) -> String {
    match reason {
        Some(r) => format!(" (finish reason: {r})"),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_display_with_retry() {
        let e = InferenceError::RateLimited {
            provider: "gemini".into(),
            retry_after_secs: Some(30),
        };
        let msg = e.to_string();
        assert!(msg.contains("gemini"), "got: {msg}");
        assert!(msg.contains("30s"), "got: {msg}");
    }

    #[test]
    fn rate_limit_display_without_retry() {
        let e = InferenceError::RateLimited {
            provider: "gemini".into(),
            retry_after_secs: None,
        };
        assert!(!e.to_string().contains("retry after"));
    }

    #[test]
    fn empty_response_mentions_reason() {
        let e = InferenceError::EmptyResponse {
            provider: "gemini".into(),
            reason: Some("SAFETY".into()),
        };
        assert!(e.to_string().contains("SAFETY"));
    }

    #[test]
    fn decode_error_matches_user_facing_wording() {
        assert!(ImageDecodeError::Empty
            .to_string()
            .starts_with("Failed to process the image file"));
    }

    #[test]
    fn missing_api_key_names_variable() {
        assert!(NutritionError::MissingApiKey
            .to_string()
            .contains("GOOGLE_API_KEY"));
    }
}
