//! Decorative page assets (background, logo) supplied by the caller.
//!
//! Assets are injected as an [`AssetSource`], either a path or bytes already
//! in memory. The library never reaches for a fixed location on disk.

use crate::error::{ImageDecodeError, NutritionError};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::ImageFormat;
use std::io::Cursor;
use std::path::PathBuf;

/// Where an asset's bytes come from.
#[derive(Debug, Clone)]
pub enum AssetSource {
    /// Read from this path when loaded. The MIME type is inferred from the
    /// file's contents, falling back to its extension.
    Path(PathBuf),
    /// Bytes supplied directly by the caller.
    Bytes { bytes: Vec<u8>, mime_type: String },
}

/// An asset loaded into memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddedAsset {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl EmbeddedAsset {
    /// `data:` URI embedding the asset as base64.
    pub fn data_uri(&self) -> String {
        data_uri(&self.mime_type, &self.bytes)
    }
}

impl AssetSource {
    pub async fn load(&self) -> Result<EmbeddedAsset, NutritionError> {
        match self {
            AssetSource::Bytes { bytes, mime_type } => Ok(EmbeddedAsset {
                bytes: bytes.clone(),
                mime_type: mime_type.clone(),
            }),
            AssetSource::Path(path) => {
                let bytes =
                    tokio::fs::read(path)
                        .await
                        .map_err(|source| NutritionError::AssetUnreadable {
                            path: path.clone(),
                            source,
                        })?;
                let format = image::guess_format(&bytes)
                    .ok()
                    .or_else(|| ImageFormat::from_path(path).ok());
                let mime_type = format
                    .map(|f| f.to_mime_type())
                    .unwrap_or("application/octet-stream")
                    .to_string();
                Ok(EmbeddedAsset { bytes, mime_type })
            }
        }
    }
}

/// Base64 `data:` URI for `bytes` of type `mime_type`.
pub fn data_uri(mime_type: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime_type, STANDARD.encode(bytes))
}

/// CSS rule painting `uri` as a full-page cover background.
pub fn background_css(uri: &str) -> String {
    format!(
        ".app {{\n    background-image: url(\"{uri}\");\n    background-size: cover;\n    \
         background-position: center;\n    background-repeat: no-repeat;\n}}\n"
    )
}

/// Re-encode a logo image as PNG so any decodable input renders the same way.
pub fn logo_png(bytes: &[u8]) -> Result<EmbeddedAsset, ImageDecodeError> {
    if bytes.is_empty() {
        return Err(ImageDecodeError::Empty);
    }
    let img = image::load_from_memory(bytes).map_err(ImageDecodeError::Decode)?;
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .map_err(ImageDecodeError::Encode)?;
    Ok(EmbeddedAsset {
        bytes: buf,
        mime_type: "image/png".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, Rgb, RgbImage};

    fn jpeg_bytes() -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 4, Rgb([10, 200, 10])));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Jpeg)
            .unwrap();
        buf
    }

    #[test]
    fn data_uri_format() {
        assert_eq!(data_uri("image/jpeg", b"abc"), "data:image/jpeg;base64,YWJj");
    }

    #[test]
    fn background_css_embeds_uri() {
        let css = background_css("data:image/jpeg;base64,YWJj");
        assert!(css.contains("url(\"data:image/jpeg;base64,YWJj\")"));
        assert!(css.contains("background-size: cover"));
    }

    #[test]
    fn logo_reencoded_as_png() {
        let logo = logo_png(&jpeg_bytes()).unwrap();
        assert_eq!(logo.mime_type, "image/png");
        assert_eq!(image::guess_format(&logo.bytes).unwrap(), ImageFormat::Png);
    }

    #[test]
    fn logo_rejects_garbage() {
        assert!(logo_png(b"not a logo").is_err());
    }

    #[tokio::test]
    async fn path_asset_sniffs_mime_type() {
        let dir = tempfile::tempdir().unwrap();
        // Wrong extension on purpose: the content decides.
        let path = dir.path().join("background.png");
        std::fs::write(&path, jpeg_bytes()).unwrap();

        let asset = AssetSource::Path(path).load().await.unwrap();
        assert_eq!(asset.mime_type, "image/jpeg");
        assert!(asset.data_uri().starts_with("data:image/jpeg;base64,"));
    }

    #[tokio::test]
    async fn missing_path_asset_is_unreadable() {
        let err = AssetSource::Path(PathBuf::from("/no/such/logo.jpg"))
            .load()
            .await
            .unwrap_err();
        assert!(matches!(err, NutritionError::AssetUnreadable { .. }));
    }
}
