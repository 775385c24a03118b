//! CLI binary for scanfile-rename.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ExtractionConfig`, then copies, moves or annotates the input PDF.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use scanfile_rename::{
    create_filename, extract, pretty_title_from_filename, unique_path, write_pdf_metadata,
    DocInfo, ExtractionConfig, ExtractionProgressCallback, Modality, ProgressCallback,
    ScanfileError,
};
use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::{Duration, Instant};
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
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress: a spinner on stderr plus one log line per step.
struct CliProgressCallback {
    bar: ProgressBar,
    step_started: std::sync::Mutex<Instant>,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Extracting");
        bar.set_message("reading text layer…");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self {
            bar,
            step_started: std::sync::Mutex::new(Instant::now()),
        })
    }

    /// Print a step line with the time spent since the previous step.
    fn step(&self, line: String) {
        let elapsed = match self.step_started.lock() {
            Ok(mut started) => std::mem::replace(&mut *started, Instant::now()).elapsed(),
            Err(_) => Duration::ZERO,
        };
        self.bar
            .println(format!("{line}  {}", dim(&fmt_secs(elapsed))));
    }

    fn note(&self, line: String) {
        self.bar.println(line);
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ExtractionProgressCallback for CliProgressCallback {
    fn on_text_extracted(&self, chars: usize, ok: bool) {
        if ok {
            self.step(format!("{} [1/4] Text layer: {chars} chars", green("✓")));
        } else {
            self.step(format!("{} [1/4] Text extraction failed", red("✗")));
        }
    }

    fn on_repair_start(&self) {
        self.bar.set_message("repairing PDF…");
        self.note(format!("  {} Attempting PDF repair (qpdf/gs)", cyan("◆")));
    }

    fn on_repair_complete(&self, success: bool) {
        if success {
            self.step(format!("  {} Repaired PDF", green("✓")));
        } else {
            self.step(format!("  {} Repair not available/failed", red("✗")));
        }
    }

    fn on_text_pass(&self, pass: usize, total: usize, budget: usize) {
        self.bar.set_message(format!("text model, budget {budget}"));
        self.note(format!("  [2/4] Text model pass {pass}/{total} (budget {budget} chars)"));
    }

    fn on_vision_pass(&self, pass: usize, total: usize, pages: u32) {
        self.bar.set_message(format!("vision model, {pages} page(s)"));
        self.note(format!("  [3/4] Vision pass {pass}/{total} ({pages} page(s))"));
    }

    fn on_cascade_stopped(&self, modality: Modality, reason: &str) {
        let reason: String = reason.chars().take(80).collect();
        self.step(format!("  {} {modality} model stopped: {}", red("✗"), red(&reason)));
    }

    fn on_heuristic_fallback(&self) {
        self.note(format!("{} [4/4] Falling back to heuristic extraction", cyan("⚠")));
    }
}

fn fmt_secs(d: Duration) -> String {
    let s = d.as_secs_f64();
    if s < 1.0 {
        return format!("{}ms", d.as_millis());
    }
    if s < 60.0 {
        return format!("{s:.1}s");
    }
    let m = d.as_secs() / 60;
    let r = d.as_secs() % 60;
    if m < 60 {
        return format!("{m}m{r:02}s");
    }
    format!("{}h{:02}m", m / 60, m % 60)
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Propose a name without touching anything
  scanfile-rename --dry-run scan_0042.pdf

  # Copy to ./processed/ under the new name, with metadata
  scanfile-rename scan_0042.pdf

  # Move into an archive folder
  scanfile-rename --move --outdir ~/Archive scan_0042.pdf

  # Only fill in the PDF's Title/Author/Subject/Keywords in place
  scanfile-rename --metadata-only scan_0042.pdf

  # Use a hosted provider instead of a local server
  scanfile-rename --provider openai --model gpt-4.1-mini scan_0042.pdf

ENVIRONMENT VARIABLES:
  LLM_ENDPOINT / LM_STUDIO_ENDPOINT      OpenAI-compatible chat/completions URL
  LLM_MODEL / LM_STUDIO_MODEL            Model ID
  LLM_TIMEOUT / LM_STUDIO_TIMEOUT        Request timeout in seconds
  LLM_MAX_RETRIES / LM_STUDIO_MAX_RETRIES  Retries on network/server errors
  LLM_PROVIDER                           Named provider (openai, anthropic, gemini, ollama, ...)
  LLM_API_KEY                            Bearer token for the endpoint
  VISION_MAX_PAGES, VISION_DPI, MIN_TEXT_CHARS
  PDFTOTEXT, PDFTOPPM, QPDF, GS          Tool paths (bare names are looked up on PATH)
  FORCE_PROGRESS=1                       Keep progress output when piping --print-json
"#;

/// Rename scanned PDFs from metadata extracted by a language model.
#[derive(Parser, Debug)]
#[command(
    name = "scanfile-rename",
    version,
    about = "Rename scanned PDFs from metadata extracted by text and vision LLMs",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Path to the input PDF.
    pdf: PathBuf,

    /// Destination directory (default: <input dir>/processed).
    #[arg(long)]
    outdir: Option<PathBuf>,

    /// Move instead of copy.
    #[arg(long = "move")]
    move_file: bool,

    /// Write PDF DocumentInfo metadata in place (no copy/move).
    #[arg(long)]
    metadata_only: bool,

    /// Print the result, do not write any file.
    #[arg(long)]
    dry_run: bool,

    /// Print the extracted JSON.
    #[arg(long)]
    print_json: bool,

    /// Disable progress output.
    #[arg(long)]
    no_progress: bool,

    /// Disable qpdf/ghostscript repair attempts.
    #[arg(long)]
    no_repair: bool,

    /// Number of keywords to include.
    #[arg(long, default_value_t = 5, value_parser = clap::value_parser!(u32).range(1..))]
    keywords_count: u32,

    /// LLM timeout in seconds.
    #[arg(long, env = "LLM_TIMEOUT")]
    lm_timeout: Option<u64>,

    /// LLM max retries on network/server errors.
    #[arg(long, env = "LLM_MAX_RETRIES")]
    lm_retries: Option<u32>,

    /// OpenAI-compatible chat/completions endpoint.
    #[arg(long, env = "LLM_ENDPOINT")]
    endpoint: Option<String>,

    /// Model ID.
    #[arg(long, env = "LLM_MODEL")]
    model: Option<String>,

    /// Named provider (openai, anthropic, gemini, ollama, ...) instead of the endpoint.
    #[arg(long, env = "LLM_PROVIDER")]
    provider: Option<String>,

    /// Bearer token for the endpoint.
    #[arg(long, env = "LLM_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Largest page count sent to the vision model.
    #[arg(long, env = "VISION_MAX_PAGES", default_value_t = 3,
          value_parser = clap::value_parser!(u32).range(1..))]
    vision_max_pages: u32,

    /// Rasterization DPI (72–400).
    #[arg(long, env = "VISION_DPI", default_value_t = 200,
          value_parser = clap::value_parser!(u32).range(72..=400))]
    vision_dpi: u32,

    /// Minimum text-layer length for the text path.
    #[arg(long, env = "MIN_TEXT_CHARS", default_value_t = 200)]
    min_text_chars: usize,

    /// pdftotext executable.
    #[arg(long, env = "PDFTOTEXT", default_value = "pdftotext")]
    pdftotext: PathBuf,

    /// pdftoppm executable.
    #[arg(long, env = "PDFTOPPM", default_value = "pdftoppm")]
    pdftoppm: PathBuf,

    /// qpdf executable (repair).
    #[arg(long, env = "QPDF", default_value = "qpdf")]
    qpdf: PathBuf,

    /// Ghostscript executable (repair).
    #[arg(long, env = "GS", default_value = "gs")]
    gs: PathBuf,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // ── Mode checks ──────────────────────────────────────────────────────
    if !cli.pdf.is_file() {
        println!("File not found: {}", cli.pdf.display());
        return Ok(ExitCode::from(2));
    }
    if cli.metadata_only {
        if cli.outdir.is_some() {
            println!("Error: --metadata-only is incompatible with --outdir");
            return Ok(ExitCode::from(2));
        }
        if cli.move_file {
            println!("Error: --metadata-only is incompatible with --move");
            return Ok(ExitCode::from(2));
        }
    }

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress display is active;
    // it reports every step already.
    let force = force_progress();
    let show_progress = !cli.no_progress
        && (force || !(cli.print_json && !io::stdout().is_terminal()))
        && (force || !(cli.metadata_only && cli.dry_run));
    let filter = if cli.verbose {
        "debug"
    } else if show_progress {
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

    let progress = show_progress.then(CliProgressCallback::new);
    let config = build_config(
        &cli,
        progress
            .clone()
            .map(|cb| cb as Arc<dyn ExtractionProgressCallback>),
    )?;

    // ── Extraction ───────────────────────────────────────────────────────
    if let Some(ref p) = progress {
        p.note(format!(
            "{} Processing: {}",
            cyan("◆"),
            cli.pdf.file_name().unwrap_or_default().to_string_lossy()
        ));
    }
    let outcome = extract(&cli.pdf, &config).await;
    if let Some(ref p) = progress {
        p.finish();
    }
    let info = match outcome {
        Ok(outcome) => match outcome.into_info() {
            Ok(info) => info,
            Err(_) => {
                println!("Failed to extract information.");
                return Ok(ExitCode::from(1));
            }
        },
        Err(e @ ScanfileError::NotAPdf { .. }) | Err(e @ ScanfileError::ProviderNotConfigured { .. }) => {
            println!("Failed to process PDF: {e}");
            return Ok(ExitCode::from(1));
        }
        Err(e) => {
            println!("Failed to process PDF: {e}");
            println!("Hint: the PDF may be corrupt; installing qpdf/ghostscript can sometimes repair it.");
            return Ok(ExitCode::from(1));
        }
    };
    let keywords_count = cli.keywords_count as usize;

    // ── Metadata-only mode ───────────────────────────────────────────────
    if cli.metadata_only {
        if cli.print_json && !cli.dry_run {
            println!("{}", to_json(&info)?);
        }
        let file_name = cli.pdf.file_name().unwrap_or_default().to_string_lossy();
        let doc_info = DocInfo::new(&info, pretty_title_from_filename(&file_name), keywords_count);
        if cli.dry_run {
            println!("{}", to_json(&doc_info)?);
            return Ok(ExitCode::SUCCESS);
        }
        return Ok(match write_pdf_metadata(cli.pdf.clone(), doc_info).await {
            Ok(()) => ExitCode::SUCCESS,
            Err(reason) => {
                println!("{reason}");
                ExitCode::from(1)
            }
        });
    }

    // ── Rename mode ──────────────────────────────────────────────────────
    if cli.print_json {
        println!("{}", to_json(&info)?);
    }

    let outdir = match cli.outdir {
        Some(ref d) => d.clone(),
        None => absolute_parent(&cli.pdf)?.join("processed"),
    };
    let dst = unique_path(&outdir.join(create_filename(&info)));
    println!(
        "Proposed: {}",
        dst.file_name().unwrap_or_default().to_string_lossy()
    );
    if cli.dry_run {
        return Ok(ExitCode::SUCCESS);
    }

    tokio::fs::create_dir_all(&outdir)
        .await
        .with_context(|| format!("Failed to create output dir {}", outdir.display()))?;

    let dst_name = dst.file_name().unwrap_or_default().to_string_lossy().into_owned();
    let doc_info = DocInfo::new(&info, pretty_title_from_filename(&dst_name), keywords_count);

    if cli.move_file {
        move_file(&cli.pdf, &dst).await?;
    } else {
        tokio::fs::copy(&cli.pdf, &dst)
            .await
            .with_context(|| format!("Failed to copy to {}", dst.display()))?;
    }

    if let Err(reason) = write_pdf_metadata(dst.clone(), doc_info).await {
        if show_progress {
            eprintln!("  {} metadata skipped: {reason}", dim("·"));
        }
    }

    if cli.move_file {
        println!("Moved to: {}", dst.display());
    } else {
        println!("Copied to: {}", dst.display());
    }
    Ok(ExitCode::SUCCESS)
}

/// Map CLI args (and their environment fallbacks) to `ExtractionConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ExtractionConfig> {
    let mut builder = ExtractionConfig::builder()
        .api_timeout_secs(
            cli.lm_timeout
                .or_else(|| env_parse("LM_STUDIO_TIMEOUT"))
                .unwrap_or(120),
        )
        .max_retries(
            cli.lm_retries
                .or_else(|| env_parse("LM_STUDIO_MAX_RETRIES"))
                .unwrap_or(0),
        )
        .vision_max_pages(cli.vision_max_pages)
        .dpi(cli.vision_dpi)
        .min_text_chars(cli.min_text_chars)
        .allow_repair(!cli.no_repair)
        .keywords_count(cli.keywords_count as usize)
        .pdftotext(&cli.pdftotext)
        .pdftoppm(&cli.pdftoppm)
        .qpdf(&cli.qpdf)
        .gs(&cli.gs);

    if let Some(endpoint) = cli.endpoint.clone().or_else(|| env_first("LM_STUDIO_ENDPOINT")) {
        builder = builder.endpoint(endpoint);
    }
    if let Some(model) = cli.model.clone().or_else(|| env_first("LM_STUDIO_MODEL")) {
        builder = builder.model(model);
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider);
    }
    if let Some(ref key) = cli.api_key {
        builder = builder.api_key(key);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Value of a secondary environment variable, ignoring blanks.
fn env_first(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    env_first(name)?.trim().parse().ok()
}

fn force_progress() -> bool {
    env_first("FORCE_PROGRESS").is_some_and(|v| {
        matches!(
            v.trim().to_lowercase().as_str(),
            "1" | "true" | "yes" | "y" | "on"
        )
    })
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).context("Failed to serialise JSON")
}

fn absolute_parent(path: &Path) -> Result<PathBuf> {
    let abs = std::path::absolute(path)
        .with_context(|| format!("Failed to resolve {}", path.display()))?;
    Ok(abs.parent().map(Path::to_path_buf).unwrap_or_default())
}

/// Rename, falling back to copy + remove across file systems.
async fn move_file(src: &Path, dst: &Path) -> Result<()> {
    if tokio::fs::rename(src, dst).await.is_ok() {
        return Ok(());
    }
    tokio::fs::copy(src, dst)
        .await
        .with_context(|| format!("Failed to copy to {}", dst.display()))?;
    tokio::fs::remove_file(src)
        .await
        .with_context(|| format!("Failed to remove {}", src.display()))?;
    Ok(())
}
