//! Image normalization: arbitrary upload → RGB JPEG payload.
//!
//! Uploads arrive as PNG (possibly with alpha or a palette), grayscale or
//! colour JPEG. The model is always sent the same thing: a 3-channel RGB
//! bitmap re-encoded as JPEG. Decoding sniffs the real format from the bytes,
//! so a mislabelled upload still works and a text file renamed to `.png`
//! fails cleanly with [`ImageDecodeError`].

use crate::error::ImageDecodeError;
use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;
use std::fmt;
use tracing::debug;

/// MIME type of the bytes produced by [`normalize_image`].
pub const ENCODED_MIME_TYPE: &str = "image/jpeg";

/// Raw bytes of one upload plus the MIME type the uploader declared.
#[derive(Clone, PartialEq, Eq)]
pub struct UploadedImage {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl UploadedImage {
    pub fn new(bytes: impl Into<Vec<u8>>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            mime_type: mime_type.into(),
        }
    }
}

impl fmt::Debug for UploadedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadedImage")
            .field("bytes", &format_args!("{} bytes", self.bytes.len()))
            .field("mime_type", &self.mime_type)
            .finish()
    }
}

/// Re-encoded image ready to embed in an inference request.
///
/// `data` is always a JPEG of an RGB bitmap. `mime_type` is the MIME type
/// declared for the original upload.
#[derive(Clone, PartialEq, Eq)]
pub struct NormalizedImagePayload {
    pub mime_type: String,
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl fmt::Debug for NormalizedImagePayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NormalizedImagePayload")
            .field("mime_type", &self.mime_type)
            .field("data", &format_args!("{} bytes", self.data.len()))
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}

/// Decode `upload`, force RGB, and re-encode as JPEG at `quality` (1–100).
///
/// No size or dimension limits are applied. Never panics on bad input.
pub fn normalize_image(
    upload: UploadedImage,
    quality: u8,
) -> Result<NormalizedImagePayload, ImageDecodeError> {
    if upload.bytes.is_empty() {
        return Err(ImageDecodeError::Empty);
    }

    let decoded = image::load_from_memory(&upload.bytes).map_err(ImageDecodeError::Decode)?;
    let (width, height) = (decoded.width(), decoded.height());
    debug!(
        "Decoded {} upload: {}x{} {:?}",
        upload.mime_type,
        width,
        height,
        decoded.color()
    );

    let rgb = DynamicImage::ImageRgb8(decoded.into_rgb8());

    let mut buf = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100));
    rgb.write_with_encoder(encoder)
        .map_err(ImageDecodeError::Encode)?;

    debug!(
        "Re-encoded {} → {} bytes JPEG",
        upload.bytes.len(),
        buf.len()
    );

    Ok(NormalizedImagePayload {
        mime_type: upload.mime_type,
        data: buf,
        width,
        height,
    })
}
