//! Submission handling: one upload + one text → one [`Outcome`].
//!
//! [`analyze`] is the boundary of a single request-handling unit. Every
//! per-submission failure is caught here and turned into
//! [`Outcome::Failed`]; nothing propagates as `Err` or a panic. Setup
//! problems (missing key, unreadable file) are different: they are
//! [`NutritionError`]s returned by the helpers that run before a submission
//! exists.

use crate::config::AnalyzerConfig;
use crate::error::{ImageDecodeError, NutritionError};
use crate::output::{AnalysisOutput, FailureStage, Outcome};
use crate::pipeline::compose::{compose_request, InferenceRequest};
use crate::pipeline::inference::{resolve_client, InferenceClient};
use crate::pipeline::normalize::{normalize_image, UploadedImage};
use image::ImageFormat;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};

/// One user action: an optional image and the "additional information" text.
#[derive(Debug, Clone, Default)]
pub struct Submission {
    pub image: Option<UploadedImage>,
    pub additional_info: String,
}

impl Submission {
    pub fn new(image: UploadedImage, additional_info: impl Into<String>) -> Self {
        Self {
            image: Some(image),
            additional_info: additional_info.into(),
        }
    }

    /// A submission with no file attached.
    pub fn without_image(additional_info: impl Into<String>) -> Self {
        Self {
            image: None,
            additional_info: additional_info.into(),
        }
    }
}

/// Normalize and compose without calling the model.
///
/// Returns `Ok(None)` when no image was supplied and `Err` when the image
/// cannot be decoded; in both cases no [`InferenceRequest`] exists.
pub fn prepare_request(
    submission: Submission,
    config: &AnalyzerConfig,
) -> Result<Option<InferenceRequest>, ImageDecodeError> {
    let Some(upload) = submission.image else {
        return Ok(None);
    };
    let payload = normalize_image(upload, config.jpeg_quality)?;
    let request = compose_request(&config.template, &submission.additional_info, payload);
    debug!(
        "Composed request: {} prompt chars, {} image bytes",
        request.prompt.len(),
        request.image.data.len()
    );
    Ok(Some(request))
}

/// Run one submission end to end: normalize → compose → one model call.
///
/// # Returns
/// - [`Outcome::Skipped`] when no image was attached
/// - [`Outcome::Failed`] with [`FailureStage::Image`] when the upload is not
///   a usable image (the client is never called)
/// - [`Outcome::Failed`] with [`FailureStage::Inference`] when the call fails
/// - [`Outcome::Analysis`] otherwise
pub async fn analyze(
    submission: Submission,
    client: &dyn InferenceClient,
    config: &AnalyzerConfig,
) -> Outcome {
    let start = Instant::now();

    let request = match prepare_request(submission, config) {
        Ok(Some(request)) => request,
        Ok(None) => {
            debug!("Submission has no image; nothing to analyze");
            return Outcome::Skipped;
        }
        Err(e) => {
            warn!("Image normalization failed: {}", e);
            return Outcome::Failed {
                stage: FailureStage::Image,
                message: e.to_string(),
            };
        }
    };

    info!("Sending food photo to '{}'", client.name());
    match client.generate(&request).await {
        Ok(result) => {
            let duration_ms = start.elapsed().as_millis() as u64;
            info!("Analysis complete in {}ms", duration_ms);
            let InferenceRequest { image, .. } = request;
            Outcome::Analysis(AnalysisOutput::from_result(
                result,
                image.mime_type,
                image.data.len(),
                (image.width, image.height),
                duration_ms,
            ))
        }
        Err(e) => {
            warn!("Inference failed: {}", e);
            Outcome::Failed {
                stage: FailureStage::Inference,
                message: e.to_string(),
            }
        }
    }
}

/// Synchronous wrapper around [`analyze`].
///
/// Creates a temporary tokio runtime internally.
pub fn analyze_sync(
    submission: Submission,
    client: &dyn InferenceClient,
    config: &AnalyzerConfig,
) -> Result<Outcome, NutritionError> {
    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| NutritionError::Internal(format!("Failed to create tokio runtime: {}", e)))?;
    Ok(runtime.block_on(analyze(submission, client, config)))
}

/// Read an image from disk, resolve a client from `config`, and analyze it.
///
/// The declared MIME type comes from the file extension, which must be
/// jpg, jpeg or png.
pub async fn analyze_file(
    path: impl AsRef<Path>,
    additional_info: &str,
    config: &AnalyzerConfig,
) -> Result<Outcome, NutritionError> {
    let client = resolve_client(config)?;
    let upload = load_upload(path.as_ref()).await?;
    Ok(analyze(Submission::new(upload, additional_info), client.as_ref(), config).await)
}

/// Read an upload from disk, deriving its declared MIME type from the extension.
pub async fn load_upload(path: &Path) -> Result<UploadedImage, NutritionError> {
    let mime_type = declared_mime_type(path)?;
    let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => NutritionError::FileNotFound {
            path: path.to_path_buf(),
        },
        std::io::ErrorKind::PermissionDenied => NutritionError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => NutritionError::Internal(format!("Failed to read '{}': {}", path.display(), e)),
    })?;
    debug!("Read {} bytes from {}", bytes.len(), path.display());
    Ok(UploadedImage::new(bytes, mime_type))
}

/// MIME type for an accepted upload extension (jpg, jpeg, png).
pub fn declared_mime_type(path: &Path) -> Result<&'static str, NutritionError> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    match ImageFormat::from_extension(&extension) {
        Some(format @ (ImageFormat::Jpeg | ImageFormat::Png)) => Ok(format.to_mime_type()),
        _ => Err(NutritionError::UnsupportedFileType {
            path: path.to_path_buf(),
            extension,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn mime_from_extension() {
        assert_eq!(declared_mime_type(Path::new("a.jpg")).unwrap(), "image/jpeg");
        assert_eq!(declared_mime_type(Path::new("a.JPEG")).unwrap(), "image/jpeg");
        assert_eq!(declared_mime_type(Path::new("a.png")).unwrap(), "image/png");
    }

    #[test]
    fn other_extensions_rejected() {
        for name in ["a.gif", "a.webp", "a.txt", "noext"] {
            assert!(
                matches!(
                    declared_mime_type(Path::new(name)),
                    Err(NutritionError::UnsupportedFileType { .. })
                ),
                "{name} should be rejected"
            );
        }
    }

    #[test]
    fn no_image_prepares_nothing() {
        let r = prepare_request(Submission::without_image("x"), &AnalyzerConfig::default());
        assert!(matches!(r, Ok(None)));
    }

    #[test]
    fn missing_file_is_file_not_found() {
        let path = PathBuf::from("/definitely/not/here/lunch.jpg");
        let err = tokio_test::block_on(load_upload(&path)).unwrap_err();
        assert!(matches!(err, NutritionError::FileNotFound { .. }));
    }
}
