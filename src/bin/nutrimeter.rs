//! CLI binary for nutrition-meter.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `AnalyzerConfig`, runs one submission and prints the outcome.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use nutrition_meter::config::api_key_from_lookup;
use nutrition_meter::pipeline::normalize::ENCODED_MIME_TYPE;
use nutrition_meter::render::write_output;
use nutrition_meter::{
    analyze, load_upload, prepare_request, render_html, render_text, resolve_client,
    AnalyzerConfig, Outcome, PageAssets, Submission,
};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Analyze a photo (stdout)
  nutrimeter lunch.jpg

  # Pass extra requirements to the model
  nutrimeter lunch.jpg --info "make it vegan-only"

  # HTML report with a background and logo
  nutrimeter dinner.png --format html --background bg.jpg --logo logo.jpg -o report.html

  # Check the image decodes and see the prompt size, without calling the API
  nutrimeter lunch.jpg --dry-run

  # Use another vision provider through edgequake-llm
  nutrimeter lunch.jpg --provider openai --model gpt-4.1-mini

ENVIRONMENT VARIABLES:
  GOOGLE_API_KEY        Google Gemini API key (GEMINI_API_KEY also accepted)
  NUTRIMETER_MODEL      Override model ID (default: gemini-2.5-flash)
  NUTRIMETER_PROVIDER   Use an edgequake-llm provider instead of Gemini REST
  OPENAI_API_KEY        Read by --provider openai
  ANTHROPIC_API_KEY     Read by --provider anthropic

  A .env file in the working directory is loaded before arguments are parsed.
"#;

/// Estimate calories and macronutrients from a food photo.
#[derive(Parser, Debug)]
#[command(
    name = "nutrimeter",
    version,
    about = "Estimate calories and macronutrients from a food photo using a Vision LLM",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Food photo (jpg, jpeg or png). Without it nothing is analyzed.
    image: Option<PathBuf>,

    /// Additional information appended to the instruction prompt.
    #[arg(short, long, env = "NUTRIMETER_INFO", default_value = "")]
    info: String,

    /// Google Gemini API key.
    #[arg(long, env = "GOOGLE_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Vision model ID (default: gemini-2.5-flash).
    #[arg(long, env = "NUTRIMETER_MODEL")]
    model: Option<String>,

    /// edgequake-llm provider: openai, anthropic, gemini, ollama, …
    #[arg(long, env = "NUTRIMETER_PROVIDER")]
    provider: Option<String>,

    /// Path to a text file replacing the built-in instruction template.
    #[arg(long, env = "NUTRIMETER_TEMPLATE")]
    template: Option<PathBuf>,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "NUTRIMETER_TEMPERATURE", default_value_t = 0.4)]
    temperature: f32,

    /// Max LLM output tokens.
    #[arg(long, env = "NUTRIMETER_MAX_TOKENS", default_value_t = 2048)]
    max_tokens: usize,

    /// JPEG quality for the re-encoded upload (1–100).
    #[arg(long, env = "NUTRIMETER_JPEG_QUALITY", default_value_t = 75,
          value_parser = clap::value_parser!(u8).range(1..=100))]
    jpeg_quality: u8,

    /// LLM call timeout in seconds.
    #[arg(long, env = "NUTRIMETER_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,

    /// Gemini API base URL (for proxies).
    #[arg(long, env = "NUTRIMETER_BASE_URL")]
    base_url: Option<String>,

    /// Output format.
    #[arg(long, value_enum, default_value = "text")]
    format: FormatArg,

    /// Write the rendered output to this file instead of stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Background image embedded in HTML output.
    #[arg(long)]
    background: Option<PathBuf>,

    /// Logo image embedded in HTML output.
    #[arg(long)]
    logo: Option<PathBuf>,

    /// Normalize and compose only; do not call the model.
    #[arg(long)]
    dry_run: bool,

    /// Disable the spinner.
    #[arg(long, env = "NUTRIMETER_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "NUTRIMETER_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "NUTRIMETER_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum FormatArg {
    Text,
    Json,
    Html,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Load .env before clap reads `env = ...` defaults.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let config = build_config(&cli).await?;

    // ── No image: nothing to do ──────────────────────────────────────────
    let Some(ref image_path) = cli.image else {
        if !cli.quiet {
            eprintln!("{}", dim("No image supplied; nothing to analyze."));
        }
        return Ok(ExitCode::SUCCESS);
    };

    if cli.dry_run {
        return dry_run(&cli, image_path, &config).await;
    }

    // Everything that can fail locally is checked before the one model call.
    let page_assets = load_page_assets(&cli).await?;
    let client = resolve_client(&config).context("Failed to set up the inference client")?;
    let upload = load_upload(image_path)
        .await
        .context("Failed to read the image")?;

    let progress = (!cli.quiet && !cli.no_progress).then(|| spinner(client.name()));
    let outcome = analyze(Submission::new(upload, cli.info.clone()), client.as_ref(), &config).await;
    if let Some(bar) = progress {
        bar.finish_and_clear();
    }

    let rendered = match cli.format {
        FormatArg::Text => render_text(&outcome),
        FormatArg::Json => {
            serde_json::to_string_pretty(&outcome).context("Failed to serialise outcome")? + "\n"
        }
        FormatArg::Html => render_html(&outcome, &page_assets),
    };
    emit(&cli, &rendered).await?;

    if !cli.quiet {
        match &outcome {
            Outcome::Analysis(a) => {
                let tokens = match (a.input_tokens, a.output_tokens) {
                    (Some(i), Some(o)) => format!("  {i} tokens in / {o} tokens out"),
                    _ => String::new(),
                };
                eprintln!(
                    "{} {}  {}ms{}",
                    green("✔"),
                    bold(&a.model),
                    a.duration_ms,
                    dim(&tokens)
                );
            }
            Outcome::Failed { message, .. } if cli.format != FormatArg::Text => {
                eprintln!("{} {}", red("✘"), message);
            }
            _ => {}
        }
    }

    Ok(if outcome.error_message().is_some() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

/// Map CLI args to `AnalyzerConfig`.
async fn build_config(cli: &Cli) -> Result<AnalyzerConfig> {
    let mut builder = AnalyzerConfig::builder()
        .temperature(cli.temperature)
        .max_tokens(cli.max_tokens)
        .jpeg_quality(cli.jpeg_quality)
        .api_timeout_secs(cli.api_timeout);

    if let Some(ref path) = cli.template {
        let template = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read template from {:?}", path))?;
        builder = builder.template(template);
    }
    // clap only sees GOOGLE_API_KEY; the full fallback list lives in the library.
    if let Some(key) = cli
        .api_key
        .clone()
        .filter(|k| !k.trim().is_empty())
        .or_else(|| api_key_from_lookup(|k| std::env::var(k).ok()))
    {
        builder = builder.api_key(key);
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider.clone());
    }
    if let Some(ref url) = cli.base_url {
        builder = builder.base_url(url.clone());
    }

    builder.build().context("Invalid configuration")
}

/// Normalize and compose, print what would be sent, and stop.
async fn dry_run(cli: &Cli, image_path: &Path, config: &AnalyzerConfig) -> Result<ExitCode> {
    let upload = load_upload(image_path)
        .await
        .context("Failed to read the image")?;
    let original_bytes = upload.bytes.len();

    match prepare_request(Submission::new(upload, cli.info.clone()), config) {
        Ok(Some(request)) => {
            println!("File:          {}", image_path.display());
            println!("Declared MIME: {}", request.image.mime_type);
            println!(
                "Dimensions:    {}x{}",
                request.image.width, request.image.height
            );
            println!(
                "Encoded:       {} → {} bytes {}",
                original_bytes,
                request.image.data.len(),
                ENCODED_MIME_TYPE
            );
            println!("Prompt:        {} chars", request.prompt.len());
            println!("Model:         {}", config.effective_model());
            Ok(ExitCode::SUCCESS)
        }
        Ok(None) => Ok(ExitCode::SUCCESS),
        Err(e) => {
            eprintln!("{} {}", red("✘"), e);
            Ok(ExitCode::FAILURE)
        }
    }
}

fn spinner(provider: &str) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  ⏱ {elapsed}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]),
    );
    bar.set_prefix("Analyzing");
    bar.set_message(format!("waiting for {provider}…"));
    bar.enable_steady_tick(Duration::from_millis(80));
    bar
}

/// Page assets for HTML output; nothing is read for other formats.
async fn load_page_assets(cli: &Cli) -> Result<PageAssets> {
    if cli.format != FormatArg::Html {
        return Ok(PageAssets::default());
    }
    PageAssets::load(cli.background.as_deref(), cli.logo.as_deref())
        .await
        .context("Failed to load page assets")
}

/// Write to `--output`, else to stdout.
async fn emit(cli: &Cli, rendered: &str) -> Result<()> {
    match cli.output {
        Some(ref path) => {
            write_output(path, rendered).await?;
            if !cli.quiet {
                eprintln!("{} {}", dim("→"), bold(&path.display().to_string()));
            }
        }
        None => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            handle
                .write_all(rendered.as_bytes())
                .context("Failed to write to stdout")?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("nutrimeter").chain(args.iter().copied()))
            .expect("valid args")
    }

    #[tokio::test]
    async fn html_assets_fail_before_analysis() {
        let cli = parse(&["lunch.jpg", "--format", "html", "--logo", "/no/such/logo.png"]);
        let err = load_page_assets(&cli).await.unwrap_err();
        assert!(format!("{err:#}").contains("/no/such/logo.png"));
    }

    #[tokio::test]
    async fn assets_ignored_for_text_output() {
        let cli = parse(&["lunch.jpg", "--background", "/no/such/bg.jpg"]);
        let assets = load_page_assets(&cli).await.unwrap();
        assert!(assets.background.is_none());
    }

    #[tokio::test]
    async fn blank_api_key_flag_is_ignored() {
        let cli = parse(&["lunch.jpg", "--api-key", "   "]);
        let config = build_config(&cli).await.unwrap();
        assert_ne!(config.api_key.as_deref(), Some("   "));
    }
}
