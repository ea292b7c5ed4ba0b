//! Result types handed to the presentation layer.

use crate::pipeline::inference::InferenceResult;
use serde::{Deserialize, Serialize};

/// A successful analysis of one submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisOutput {
    /// Model text, verbatim.
    pub text: String,
    /// Model that produced the text.
    pub model: String,
    /// MIME type declared for the upload.
    pub mime_type: String,
    /// Size of the re-encoded JPEG sent to the model.
    pub encoded_bytes: usize,
    pub width: u32,
    pub height: u32,
    pub input_tokens: Option<u64>,
    pub output_tokens: Option<u64>,
    /// Wall-clock time for normalize + compose + inference.
    pub duration_ms: u64,
}

impl AnalysisOutput {
    pub(crate) fn from_result(
        result: InferenceResult,
        mime_type: String,
        encoded_bytes: usize,
        (width, height): (u32, u32),
        duration_ms: u64,
    ) -> Self {
        Self {
            text: result.text,
            model: result.model,
            mime_type,
            encoded_bytes,
            width,
            height,
            input_tokens: result.input_tokens,
            output_tokens: result.output_tokens,
            duration_ms,
        }
    }
}

/// Which stage of the pipeline failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    /// The upload could not be decoded or re-encoded; no model call was made.
    Image,
    /// The single model call failed.
    Inference,
}

/// What one submission produced: a result, an error message, or nothing.
///
/// Never both a result and an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    /// No image was supplied; the submission was not processed.
    Skipped,
    /// The model answered.
    Analysis(AnalysisOutput),
    /// A stage failed; `message` is suitable for showing to the user.
    Failed { stage: FailureStage, message: String },
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Analysis(_))
    }

    /// The analysis text, if the submission succeeded.
    pub fn text(&self) -> Option<&str> {
        match self {
            Outcome::Analysis(a) => Some(&a.text),
            _ => None,
        }
    }

    /// The user-facing error message, if the submission failed.
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Outcome::Failed { message, .. } => Some(message),
            _ => None,
        }
    }
}
