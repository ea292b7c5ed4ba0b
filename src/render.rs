//! Rendering an [`Outcome`] for display.
//!
//! Two forms: plain text for terminals and a standalone HTML page with the
//! caller's background and logo embedded as data URIs. A result and an
//! error are never rendered together because an [`Outcome`] never holds both.

use crate::assets::{background_css, logo_png, AssetSource, EmbeddedAsset};
use crate::error::NutritionError;
use crate::output::Outcome;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

/// Heading shown above a successful analysis.
pub const RESULT_HEADING: &str = "Your Food Analysis";

/// Page title of the HTML report.
pub const PAGE_TITLE: &str = "Nutrition Meter";

/// Decorative assets for the HTML page. Both optional.
#[derive(Debug, Clone, Default)]
pub struct PageAssets {
    pub background: Option<EmbeddedAsset>,
    pub logo: Option<EmbeddedAsset>,
}

impl PageAssets {
    /// Load the background and logo from disk.
    ///
    /// Call before any inference so a bad path fails without spending an
    /// API request. The logo is re-encoded as PNG.
    pub async fn load(
        background: Option<&Path>,
        logo: Option<&Path>,
    ) -> Result<Self, NutritionError> {
        let background = match background {
            Some(path) => Some(AssetSource::Path(path.to_path_buf()).load().await?),
            None => None,
        };
        let logo = match logo {
            Some(path) => {
                let raw = AssetSource::Path(path.to_path_buf()).load().await?;
                Some(
                    logo_png(&raw.bytes).map_err(|source| NutritionError::AssetUndecodable {
                        path: path.to_path_buf(),
                        source,
                    })?,
                )
            }
            None => None,
        };
        Ok(Self { background, logo })
    }
}

/// Plain-text rendering. Empty for [`Outcome::Skipped`].
pub fn render_text(outcome: &Outcome) -> String {
    match outcome {
        Outcome::Skipped => String::new(),
        Outcome::Analysis(a) => {
            let mut out = format!("{RESULT_HEADING}\n{}\n\n", "=".repeat(RESULT_HEADING.len()));
            out.push_str(&a.text);
            if !out.ends_with('\n') {
                out.push('\n');
            }
            out
        }
        Outcome::Failed { message, .. } => format!("Error: {message}\n"),
    }
}

/// Standalone HTML page.
pub fn render_html(outcome: &Outcome, assets: &PageAssets) -> String {
    let mut html = String::with_capacity(4096);
    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n");
    let _ = writeln!(html, "<title>{PAGE_TITLE}</title>");
    html.push_str("<style>\n");
    html.push_str(BASE_CSS);
    if let Some(ref bg) = assets.background {
        html.push_str(&background_css(&bg.data_uri()));
    }
    html.push_str("</style>\n</head>\n<body class=\"app\">\n");

    if let Some(ref logo) = assets.logo {
        let _ = writeln!(
            html,
            "<img class=\"logo\" alt=\"logo\" src=\"{}\">",
            logo.data_uri()
        );
    }
    let _ = writeln!(html, "<h1>{PAGE_TITLE}</h1>");

    match outcome {
        Outcome::Skipped => {
            html.push_str("<p class=\"hint\">Upload a food photo to analyze it.</p>\n");
        }
        Outcome::Analysis(a) => {
            let _ = writeln!(html, "<h2>{RESULT_HEADING}</h2>");
            let _ = writeln!(html, "<div class=\"analysis\">{}</div>", escape_html(&a.text));
            let _ = writeln!(html, "<p class=\"meta\">Model: {}</p>", escape_html(&a.model));
        }
        Outcome::Failed { message, .. } => {
            let _ = writeln!(html, "<div class=\"error\">{}</div>", escape_html(message));
        }
    }

    html.push_str("</body>\n</html>\n");
    html
}

/// Write rendered output to `path`.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn write_output(path: impl AsRef<Path>, contents: &str) -> Result<(), NutritionError> {
    let path = path.as_ref();
    let write_failed = |source| NutritionError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_failed)?;
    }
    let tmp_path = temp_path_for(path);
    tokio::fs::write(&tmp_path, contents)
        .await
        .map_err(write_failed)?;
    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(write_failed)?;
    Ok(())
}

/// Sibling temp path: `report.html` → `report.html.tmp`.
fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

const BASE_CSS: &str = "body { font-family: sans-serif; margin: 2rem; }\n\
.analysis { white-space: pre-wrap; background: rgba(255,255,255,0.85); padding: 1rem; }\n\
.error { color: #b00020; background: rgba(255,255,255,0.85); padding: 1rem; }\n\
.logo { max-width: 12rem; display: block; }\n\
.meta, .hint { color: #555; }\n";

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
