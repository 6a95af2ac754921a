//! CLI binary for lease-welcome-pack.
//!
//! A thin shim over the library crate: maps flags to `PipelineConfig`, wires
//! the provider-backed model, an in-memory record store and a local blob
//! directory into `LeaseService`, and prints the result.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use lease_welcome_pack::config::DEFAULT_TEMPLATE_PATH;
use lease_welcome_pack::pipeline::extraction::extract_fields;
use lease_welcome_pack::pipeline::text::extract_text_from;
use lease_welcome_pack::{
    compare_fields, ExtractedLeaseFields, FileKind, InMemoryRecordStore, LeaseService,
    LocalBlobStore, PipelineConfig, PipelineObserver, ProviderModel, ScoreReport, Stage,
};
use serde_json::json;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers ──────────────────────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── CLI observer using indicatif ─────────────────────────────────────────────

/// Renders the six processing stages as a progress bar with one log line
/// per finished stage.
struct CliObserver {
    bar: ProgressBar,
    failed: AtomicBool,
}

impl CliObserver {
    fn new() -> Arc<Self> {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  [{bar:30.green/238}] {pos}/{len}  {msg}  ⏱ {elapsed}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        let bar = ProgressBar::new(Stage::COUNT as u64);
        bar.set_style(style);
        bar.set_prefix("Processing");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            failed: AtomicBool::new(false),
        })
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
        if !self.failed.load(Ordering::SeqCst) {
            eprintln!("{} Welcome Pack ready", green("✔"));
        }
    }
}

impl PipelineObserver for CliObserver {
    fn on_stage_start(&self, stage: Stage) {
        self.bar.set_message(stage.description());
    }

    fn on_stage_complete(&self, stage: Stage, elapsed_secs: f64) {
        self.bar.println(format!(
            "  {} {}  {}",
            green("✓"),
            stage,
            dim(&format!("{elapsed_secs:.1}s"))
        ));
        self.bar.inc(1);
    }

    fn on_correction_round(&self, warnings: &[String]) {
        self.bar.println(format!(
            "  {} {} validation warning(s), asking the model to correct",
            yellow("⚠"),
            warnings.len()
        ));
        for warning in warnings {
            self.bar.println(format!("      {}", dim(warning)));
        }
    }

    fn on_pipeline_failed(&self, stage: Stage, error: &str) {
        self.failed.store(true, Ordering::SeqCst);
        self.bar.println(format!("  {} {}  {}", red("✗"), stage, red(error)));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Full run: store, extract, generate; Welcome Pack copied next to the lease
  welcome-pack lease.pdf -o Welcome_Pack.docx

  # Fields only, as JSON
  welcome-pack --extract-only lease.docx

  # Score an extraction against known-good values
  welcome-pack --extract-only --expected expected/lease_01.json lease_01.pdf

  # Use a specific provider and model
  welcome-pack --provider openai --model gpt-4.1-mini lease.pdf

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY / OPENAI_API_KEY / ANTHROPIC_API_KEY   provider credentials
  WELCOME_PACK_LLM_PROVIDER   Override provider (gemini, openai, anthropic, ollama)
  WELCOME_PACK_MODEL          Override model ID
  TEMPLATE_PATH               Welcome Pack template (.docx)
  PDFIUM_LIB_PATH             Path to libpdfium for PDF leases
"#;

/// Turn a lease into a tenant Welcome Pack.
#[derive(Parser, Debug)]
#[command(
    name = "welcome-pack",
    version,
    about = "Extract lease terms with a language model and fill a tenant Welcome Pack",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Lease file (.pdf or .docx).
    input: PathBuf,

    /// Copy the generated Welcome Pack to this path.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Owner of the upload in the record store.
    #[arg(long, env = "WELCOME_PACK_USER", default_value = "local")]
    user: String,

    /// Welcome Pack template (.docx).
    #[arg(long, env = "TEMPLATE_PATH", default_value = DEFAULT_TEMPLATE_PATH)]
    template: PathBuf,

    /// Directory backing the local blob store.
    #[arg(long, env = "WELCOME_PACK_STORAGE_DIR", default_value = "storage")]
    storage_dir: PathBuf,

    /// Explicit pdfium library file.
    #[arg(long, env = "PDFIUM_LIB_PATH")]
    pdfium_lib: Option<PathBuf>,

    /// LLM provider: gemini, openai, anthropic, ollama, azure.
    #[arg(long, env = "WELCOME_PACK_LLM_PROVIDER")]
    provider: Option<String>,

    /// LLM model ID (default: gemini-2.5-flash).
    #[arg(long, env = "WELCOME_PACK_MODEL")]
    model: Option<String>,

    /// LLM temperature (0.0–2.0).
    #[arg(long, default_value_t = 0.0)]
    temperature: f32,

    /// Max LLM output tokens per call.
    #[arg(long, default_value_t = 4096)]
    max_tokens: usize,

    /// Per-call LLM timeout in seconds.
    #[arg(long, default_value_t = 120)]
    api_timeout: u64,

    /// Stop after field extraction and print the record.
    #[arg(long)]
    extract_only: bool,

    /// JSON file with the expected record; prints a per-field score.
    #[arg(long)]
    expected: Option<PathBuf>,

    /// Output structured JSON instead of a summary.
    #[arg(long)]
    json: bool,

    /// Disable progress bar.
    #[arg(long)]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long)]
    verbose: bool,

    /// Suppress all output except warnings and errors.
    #[arg(short, long)]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.extract_only;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "warn"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Inputs ───────────────────────────────────────────────────────────
    let file_name = cli
        .input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .context("Input path has no file name")?;
    let file_type = FileKind::tag_from_file_name(&file_name);
    let bytes = tokio::fs::read(&cli.input)
        .await
        .with_context(|| format!("Failed to read {}", cli.input.display()))?;

    let expected = match cli.expected {
        Some(ref path) => Some(read_expected(path).await?),
        None => None,
    };

    let config = build_config(&cli)?;
    let model = Arc::new(ProviderModel::from_config(&config).context("Failed to set up model")?);

    // ── Extract-only mode ────────────────────────────────────────────────
    if cli.extract_only {
        let kind: FileKind = file_type.parse().context("Unsupported lease file")?;
        let text = extract_text_from(bytes, kind, config.pdfium_library_path.as_deref())
            .await
            .context("Text extraction failed")?;
        let observer = lease_welcome_pack::NoopObserver;
        let (fields, exchange) = extract_fields(model.as_ref(), &text, &observer)
            .await
            .context("Field extraction failed")?;
        let score = expected.as_ref().map(|e| compare_fields(e, &fields));

        if cli.json {
            let out = json!({
                "extracted_data": fields,
                "raw_model_exchange": exchange,
                "score": score,
            });
            println!("{}", serde_json::to_string_pretty(&out).context("Failed to serialise output")?);
        } else {
            println!(
                "{}",
                serde_json::to_string_pretty(&fields).context("Failed to serialise fields")?
            );
            if let Some(ref report) = score {
                eprintln!("{report}");
            }
        }
        return check_score(score.as_ref());
    }

    // ── Full run ─────────────────────────────────────────────────────────
    let observer = show_progress.then(CliObserver::new);
    let mut service = LeaseService::new(
        config,
        model,
        Arc::new(InMemoryRecordStore::new()),
        Arc::new(LocalBlobStore::new(&cli.storage_dir)),
    );
    if let Some(ref obs) = observer {
        service = service.with_observer(obs.clone());
    }

    let outcome = service
        .process_lease(&cli.user, &file_name, bytes, &file_type)
        .await;
    if let Some(ref obs) = observer {
        obs.finish();
    }
    let processed = outcome.context("Lease processing failed")?;

    if let Some(ref output_path) = cli.output {
        let download = service
            .download_welcome_pack(processed.upload_id, &cli.user)
            .await
            .context("Failed to fetch the generated Welcome Pack")?;
        tokio::fs::write(output_path, &download.bytes)
            .await
            .with_context(|| format!("Failed to write {}", output_path.display()))?;
        if !cli.quiet && !cli.json {
            eprintln!(
                "{}  {}  →  {}",
                green("✔"),
                download.file_name,
                bold(&output_path.display().to_string())
            );
        }
    }

    let score = expected
        .as_ref()
        .map(|e| compare_fields(e, &processed.extracted_data));

    if cli.json {
        let out = json!({ "result": processed, "score": score });
        println!("{}", serde_json::to_string_pretty(&out).context("Failed to serialise output")?);
    } else if !cli.quiet {
        println!("Upload:        {}", processed.upload_id);
        println!("Status:        {}", processed.status);
        println!("Tenant:        {}", processed.extracted_data.tenant_name);
        println!("Property:      {}", processed.extracted_data.property_address);
        println!("Rent:          {}", processed.extracted_data.rent_amount);
        println!(
            "Conditions:    {}",
            processed
                .extracted_data
                .special_conditions
                .as_deref()
                .unwrap_or("(none)")
        );
        println!("Welcome Pack:  {}", processed.welcome_pack_url);
        if let Some(ref report) = score {
            println!("\n{report}");
        }
    }

    check_score(score.as_ref())
}

/// Map CLI args to `PipelineConfig`.
fn build_config(cli: &Cli) -> Result<PipelineConfig> {
    let mut builder = PipelineConfig::builder()
        .template_path(&cli.template)
        .temperature(cli.temperature)
        .max_tokens(cli.max_tokens)
        .api_timeout_secs(cli.api_timeout);

    if let Some(ref model) = cli.model {
        builder = builder.model(model);
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider);
    }
    if let Some(ref lib) = cli.pdfium_lib {
        builder = builder.pdfium_library_path(lib);
    }

    builder.build().context("Invalid configuration")
}

async fn read_expected(path: &Path) -> Result<ExtractedLeaseFields> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read expected values from {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("{} is not a valid lease record", path.display()))
}

/// Non-zero exit when a scored extraction has mismatches.
fn check_score(score: Option<&ScoreReport>) -> Result<()> {
    match score {
        Some(report) if !report.all_passed() => anyhow::bail!(
            "{} of {} fields did not match the expected values",
            report.total() - report.passed(),
            report.total()
        ),
        _ => Ok(()),
    }
}
