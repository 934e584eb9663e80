//! CLI binary for cf2lc.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ConversionConfig` and prints the record.

use anyhow::{Context, Result};
use clap::Parser;
use cf2lc::config::{DEFAULT_ENDPOINT, DEFAULT_MODEL};
use cf2lc::{
    build_prompt, convert, convert_text, extract_text, page_for_input, write_record,
    ConversionConfig, ConversionProgressCallback, ExportFormat, PipelineStage, ProgressCallback,
    RawProblemText,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
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
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Spinner naming the running stage, with one log line per finished stage.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(style);
        bar.set_prefix("Converting");
        bar.set_message("starting…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self { bar })
    }
}

fn stage_message(stage: PipelineStage) -> &'static str {
    match stage {
        PipelineStage::Extract => "reading problem page…",
        PipelineStage::Prompt => "building prompt…",
        PipelineStage::Generate => "waiting for the model…",
        PipelineStage::Parse => "validating response…",
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_stage_start(&self, stage: PipelineStage) {
        self.bar.set_message(stage_message(stage));
    }

    fn on_stage_complete(&self, stage: PipelineStage, elapsed_ms: u64) {
        self.bar.println(format!(
            "  {} {:<9} {}",
            green("✓"),
            stage.label(),
            dim(&format!("{:.1}s", elapsed_ms as f64 / 1000.0)),
        ));
    }

    fn on_retry(&self, attempt: u32, max_retries: u32, error: &str) {
        // Truncate very long error messages to keep output tidy.
        let msg: String = if error.chars().count() > 80 {
            let mut s: String = error.chars().take(79).collect();
            s.push('\u{2026}');
            s
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} retry {}/{}  {}",
            yellow("↻"),
            attempt,
            max_retries,
            dim(&msg)
        ));
    }

    fn on_conversion_complete(&self, success: bool) {
        self.bar.finish_and_clear();
        if success {
            eprintln!("{} {}", green("✔"), bold("Problem converted"));
        } else {
            eprintln!("{} {}", red("✘"), bold("Conversion failed"));
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Convert a live problem page, JSON to stdout
  cf2lc https://codeforces.com/problemset/problem/4/A

  # Save as Markdown
  cf2lc https://codeforces.com/contest/1900/problem/B -o two_sum.md

  # Write into a directory using the export name ({title}_LC_Format.json)
  cf2lc saved_problem.html -o ./problems/

  # Show what would be sent to the model (no API key needed)
  cf2lc --extract-only saved_problem.html
  cf2lc --print-prompt saved_problem.html

  # Convert text that was extracted earlier
  cf2lc --text problem.txt --format markdown

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY   Google Gemini API key (required for conversion)
  CF2LC_MODEL      Override model ID
  CF2LC_ENDPOINT   Override the API base URL
  RUST_LOG         Log filter, e.g. cf2lc=debug

SETUP:
  1. Set API key:     export GEMINI_API_KEY=...
  2. Convert:         cf2lc https://codeforces.com/problemset/problem/4/A
"#;

/// Convert Codeforces problems into LeetCode-style records.
#[derive(Parser, Debug)]
#[command(
    name = "cf2lc",
    version,
    about = "Convert Codeforces problems into LeetCode-style records using Gemini",
    long_about = "Read a Codeforces problem statement (live URL or saved HTML page), ask a \
generative model to rewrite it in LeetCode style with a C++ class method signature, and \
print the validated record as JSON or Markdown.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Problem URL, saved HTML page, or (with --text) a text file.
    input: String,

    /// Treat INPUT as a file of already-extracted problem text.
    #[arg(long)]
    text: bool,

    /// Write the record to this file or directory instead of stdout.
    #[arg(short, long, env = "CF2LC_OUTPUT")]
    output: Option<PathBuf>,

    /// Output format. Default: from the output extension, else json.
    #[arg(long, env = "CF2LC_FORMAT", value_enum)]
    format: Option<FormatArg>,

    /// Gemini API key.
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Model ID.
    #[arg(long, env = "CF2LC_MODEL", default_value = DEFAULT_MODEL)]
    model: String,

    /// API base URL.
    #[arg(long, env = "CF2LC_ENDPOINT", default_value = DEFAULT_ENDPOINT)]
    endpoint: String,

    /// Sampling temperature (0.0–2.0).
    #[arg(long, env = "CF2LC_TEMPERATURE", default_value_t = 0.7)]
    temperature: f32,

    /// Maximum tokens the model may generate.
    #[arg(long, env = "CF2LC_MAX_OUTPUT_TOKENS", default_value_t = 2048)]
    max_output_tokens: u32,

    /// Retries after a transient model failure (timeout, 429, 5xx).
    #[arg(long, env = "CF2LC_MAX_RETRIES", default_value_t = 2)]
    max_retries: u32,

    /// Per-request model timeout in seconds.
    #[arg(long, env = "CF2LC_TIMEOUT", default_value_t = 60)]
    timeout: u64,

    /// Deadline for the whole conversion in seconds.
    #[arg(long, env = "CF2LC_DEADLINE")]
    deadline: Option<u64>,

    /// Timeout for fetching the problem page in seconds.
    #[arg(long, env = "CF2LC_PAGE_TIMEOUT", default_value_t = 30)]
    page_timeout: u64,

    /// Path to a prompt template file containing `{problem}`.
    #[arg(long, env = "CF2LC_PROMPT_TEMPLATE")]
    prompt_template: Option<PathBuf>,

    /// Print the extracted problem text and stop.
    #[arg(long, conflicts_with = "print_prompt")]
    extract_only: bool,

    /// Print the prompt that would be sent and stop.
    #[arg(long)]
    print_prompt: bool,

    /// Disable the progress spinner.
    #[arg(long, env = "CF2LC_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "CF2LC_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "CF2LC_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum FormatArg {
    Json,
    Markdown,
}

impl From<FormatArg> for ExportFormat {
    fn from(v: FormatArg) -> Self {
        match v {
            FormatArg::Json => ExportFormat::Json,
            FormatArg::Markdown => ExportFormat::Markdown,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the spinner is active.
    let dry_run = cli.extract_only || cli.print_prompt;
    let show_progress = !cli.quiet && !cli.no_progress && !dry_run;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn ConversionProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb).await?;

    // ── Extract-only / print-prompt ──────────────────────────────────────
    if dry_run {
        let text = load_text(&cli, &config).await?;
        if text.is_empty() {
            anyhow::bail!("No problem text provided");
        }
        let out = if cli.extract_only {
            text.into_inner()
        } else {
            build_prompt(&text, config.prompt_template.as_deref())
        };
        write_stdout(&out)?;
        return Ok(());
    }

    // ── Run conversion ───────────────────────────────────────────────────
    let result = if cli.text {
        let text = read_text_file(&cli.input).await?;
        convert_text(&text, &config).await
    } else {
        let page = page_for_input(&cli.input, &config);
        convert(page.as_ref(), &config).await
    };
    let record = result.context("Conversion failed")?;

    // ── Write output ─────────────────────────────────────────────────────
    let format = cli.format.map(ExportFormat::from);
    if let Some(ref output_path) = cli.output {
        let path = write_record(&record, output_path, format)
            .await
            .context("Failed to write output")?;
        if !cli.quiet {
            eprintln!(
                "{}  {}  →  {}",
                green("✔"),
                record.title,
                bold(&path.display().to_string())
            );
        }
    } else {
        let rendered = format
            .unwrap_or_default()
            .render(&record)
            .context("Failed to serialise record")?;
        write_stdout(&rendered)?;
    }

    Ok(())
}

/// Map CLI args to `ConversionConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ConversionConfig> {
    let mut builder = ConversionConfig::builder()
        .endpoint(cli.endpoint.clone())
        .model(cli.model.clone())
        .temperature(cli.temperature)
        .max_output_tokens(cli.max_output_tokens)
        .max_retries(cli.max_retries)
        .request_timeout_secs(cli.timeout)
        .page_timeout_secs(cli.page_timeout);

    if let Some(ref key) = cli.api_key {
        if !key.trim().is_empty() {
            builder = builder.api_key(key.trim());
        }
    }
    if let Some(secs) = cli.deadline {
        builder = builder.deadline_secs(secs);
    }
    if let Some(ref path) = cli.prompt_template {
        let template = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read prompt template from {:?}", path))?;
        builder = builder.prompt_template(template);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

async fn read_text_file(path: &str) -> Result<RawProblemText> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read problem text from {:?}", path))?;
    Ok(RawProblemText::new(text))
}

/// Problem text for the dry-run modes: the file itself with `--text`, else extracted.
async fn load_text(cli: &Cli, config: &ConversionConfig) -> Result<RawProblemText> {
    if cli.text {
        return read_text_file(&cli.input).await;
    }
    let page = page_for_input(&cli.input, config);
    extract_text(page.as_ref(), config)
        .await
        .context("Extraction failed")
}

fn write_stdout(s: &str) -> Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    handle
        .write_all(s.as_bytes())
        .context("Failed to write to stdout")?;
    // Ensure a trailing newline on stdout.
    if !s.ends_with('\n') {
        handle.write_all(b"\n").ok();
    }
    Ok(())
}
