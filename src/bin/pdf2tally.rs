//! CLI binary for pdf2tally.
//!
//! A thin shim over the library crate that maps CLI flags onto
//! `BridgeConfig`, runs one flow and prints its reply.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use pdf2tally::{
    convert_file, export, render_export, retrieve, ArtifactKey, BridgeConfig, ConvertResponse,
    ErrorKind, ExportResponse, Flow, Observer, PipelineObserver, Stage,
};
use serde::Serialize;
use std::io;
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

// ── CLI stage spinner using indicatif ────────────────────────────────────────

/// Terminal observer: one spinner whose message follows the flow's stages.
struct CliSpinner {
    bar: ProgressBar,
}

impl CliSpinner {
    fn new(flow: Flow) -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(style);
        bar.set_prefix(match flow {
            Flow::Convert => "Converting",
            Flow::Export => "Exporting",
        });
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self { bar })
    }
}

impl PipelineObserver for CliSpinner {
    fn on_stage(&self, flow: Flow, stage: Stage) {
        let msg = match (flow, stage) {
            (_, Stage::Done) => {
                self.bar.finish_and_clear();
                return;
            }
            (Flow::Convert, Stage::Start) => "Reading PDF…",
            (Flow::Convert, Stage::Extracted) => "Tables extracted",
            (Flow::Convert, Stage::Transformed) => "Writing spreadsheet…",
            (Flow::Convert, Stage::Persisted) => "Spreadsheet saved",
            (Flow::Export, Stage::Start) => "Opening spreadsheet…",
            (Flow::Export, Stage::Read) => "Building ledger XML…",
            (Flow::Export, Stage::Transformed) => "Sending to accounting server…",
            (Flow::Export, Stage::Sent) => "Accepted",
            _ => return,
        };
        self.bar.set_message(msg);
    }

    fn on_failed(&self, _flow: Flow, _kind: ErrorKind, _message: &str) {
        self.bar.finish_and_clear();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Convert a statement into uploads/output.xlsx
  pdf2tally convert statement.pdf

  # Keep several conversions apart
  pdf2tally convert march.pdf --key march

  # Copy the spreadsheet somewhere else
  pdf2tally fetch --key march -o ~/Downloads/march.xlsx

  # Preview the ledger XML without sending it
  pdf2tally export --key march --dry-run

  # Send to a remote Tally server, retrying twice on failure
  pdf2tally export --key march --endpoint http://tally.lan:9000 --max-retries 2

  # Machine-readable replies
  pdf2tally --json convert statement.pdf

CONFIG FILE (--config):
  {
    "artifact_dir": "uploads",
    "sheet_name": "PDF Data",
    "extract": { "row_tolerance": 3.0, "merge_gap": 1.0, "timeout_secs": 60 },
    "import": {
      "endpoint": "http://localhost:9000",
      "request_timeout_secs": 30,
      "retry": { "max_retries": 0, "backoff_ms": 500 }
    }
  }
  Flags and environment variables override values from the file.

ENVIRONMENT VARIABLES:
  PDFIUM_LIB_PATH         Directory (or file) of an existing libpdfium
  RUST_LOG                Override the log filter (e.g. pdf2tally=debug)
  PDF2TALLY_*             Every flag has a matching variable, e.g.
                          PDF2TALLY_ENDPOINT, PDF2TALLY_ARTIFACT_DIR

SETUP:
  Extraction needs the pdfium shared library. Download a build from
  bblanchon/pdfium-binaries and either place it in the working directory,
  install it system-wide, or point PDFIUM_LIB_PATH at it.
"#;

/// Convert tabular PDFs to spreadsheets and export them to Tally.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2tally",
    version,
    about = "Convert tabular PDFs to spreadsheets and export them to Tally as ledger XML",
    long_about = "Extract tables from a PDF into a single-sheet .xlsx artifact, then re-read \
that artifact and POST it to a Tally accounting server as an \"Import Data\" ledger envelope.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// JSON config file; flags and env vars override its values.
    #[arg(long, env = "PDF2TALLY_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Directory holding the spreadsheet artifacts.
    #[arg(long, env = "PDF2TALLY_ARTIFACT_DIR", global = true)]
    artifact_dir: Option<PathBuf>,

    /// Worksheet name written into artifacts.
    #[arg(long, env = "PDF2TALLY_SHEET_NAME", global = true)]
    sheet_name: Option<String>,

    /// Accounting server import URL.
    #[arg(long, env = "PDF2TALLY_ENDPOINT", global = true)]
    endpoint: Option<String>,

    /// Directory containing the pdfium shared library.
    #[arg(long, env = "PDFIUM_LIB_PATH", global = true)]
    pdfium_lib: Option<PathBuf>,

    /// Vertical tolerance (points) for grouping text into one row.
    #[arg(long, env = "PDF2TALLY_ROW_TOLERANCE", global = true)]
    row_tolerance: Option<f32>,

    /// Horizontal gap (points) below which fragments merge into one cell; 0 disables.
    #[arg(long, env = "PDF2TALLY_MERGE_GAP", global = true)]
    merge_gap: Option<f32>,

    /// Extraction timeout in seconds.
    #[arg(long, env = "PDF2TALLY_EXTRACT_TIMEOUT", global = true)]
    extract_timeout: Option<u64>,

    /// Import request timeout in seconds.
    #[arg(long, env = "PDF2TALLY_REQUEST_TIMEOUT", global = true)]
    request_timeout: Option<u64>,

    /// Extra import attempts after a failed one (default 0).
    #[arg(long, env = "PDF2TALLY_MAX_RETRIES", global = true)]
    max_retries: Option<u32>,

    /// Initial backoff between import attempts in milliseconds.
    #[arg(long, env = "PDF2TALLY_RETRY_BACKOFF_MS", global = true)]
    retry_backoff_ms: Option<u64>,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "PDF2TALLY_PASSWORD", global = true)]
    password: Option<String>,

    /// Print the reply as JSON.
    #[arg(long, env = "PDF2TALLY_JSON", global = true)]
    json: bool,

    /// Disable the progress spinner.
    #[arg(long, env = "PDF2TALLY_NO_PROGRESS", global = true)]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDF2TALLY_VERBOSE", global = true)]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PDF2TALLY_QUIET", global = true)]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract tables from a PDF into the spreadsheet artifact.
    Convert {
        /// PDF file to convert.
        input: PathBuf,

        /// Artifact slot to write.
        #[arg(short, long, env = "PDF2TALLY_KEY", default_value = "output")]
        key: ArtifactKey,
    },

    /// Print the artifact's path, or copy it to a destination.
    Fetch {
        /// Artifact slot to read.
        #[arg(short, long, env = "PDF2TALLY_KEY", default_value = "output")]
        key: ArtifactKey,

        /// Copy the artifact here instead of printing its path.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Send the artifact to the accounting server as ledger XML.
    Export {
        /// Artifact slot to read.
        #[arg(short, long, env = "PDF2TALLY_KEY", default_value = "output")]
        key: ArtifactKey,

        /// Print the XML instead of sending it.
        #[arg(long)]
        dry_run: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner already shows stage progress, so library INFO logs are
    // only shown when it is off.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
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

    match &cli.command {
        Command::Convert { input, key } => {
            let config = build_config(&cli, show_progress.then_some(Flow::Convert))?;
            let result = convert_file(input, key, &config).await;
            let reply = ConvertResponse::from_result(&result);

            if cli.json {
                return print_json(&reply, reply.success);
            }
            let out = result.context("Conversion failed")?;
            if !cli.quiet {
                eprintln!(
                    "{}  {}  {} rows × {} columns  {}ms  →  {}",
                    green("✔"),
                    reply.message,
                    out.rows,
                    out.columns,
                    out.stats.total_duration_ms,
                    bold(&out.artifact.path.display().to_string()),
                );
            }
        }

        Command::Fetch { key, output } => {
            let config = build_config(&cli, None)?;
            let info = retrieve(key, &config).context("Failed to locate artifact")?;

            if let Some(dest) = output {
                tokio::fs::copy(&info.path, dest)
                    .await
                    .with_context(|| format!("Failed to copy artifact to {:?}", dest))?;
                if !cli.quiet && !cli.json {
                    eprintln!(
                        "{}  {}  →  {}",
                        green("✔"),
                        info.file_name,
                        bold(&dest.display().to_string())
                    );
                }
            }

            if cli.json {
                return print_json(&info, true);
            }
            if output.is_none() {
                println!("{}", info.path.display());
            }
        }

        Command::Export { key, dry_run: true } => {
            let config = build_config(&cli, None)?;
            let xml = render_export(key, &config)
                .await
                .context("Failed to build ledger XML")?;
            print!("{xml}");
        }

        Command::Export { key, dry_run: false } => {
            let config = build_config(&cli, show_progress.then_some(Flow::Export))?;
            let result = export(key, &config).await;
            let reply = ExportResponse::from_result(&result);

            if cli.json {
                return print_json(&reply, reply.success);
            }
            match result {
                Ok(out) => {
                    if !cli.quiet {
                        eprintln!(
                            "{}  {} ledger entries → {}",
                            green("✔"),
                            out.records,
                            dim(&config.import.endpoint)
                        );
                    }
                    println!("{}", reply.message);
                }
                Err(e) => {
                    eprintln!("{}  {}", red("✘"), reply.message);
                    return Err(e).context("Export failed");
                }
            }
        }
    }

    Ok(())
}

/// Print `value` as pretty JSON and exit non-zero on failure replies.
fn print_json<T: Serialize>(value: &T, success: bool) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialise reply")?;
    println!("{json}");
    if !success {
        std::process::exit(1);
    }
    Ok(())
}

/// Load the config file (or defaults), apply flag overrides, validate.
fn build_config(cli: &Cli, spinner: Option<Flow>) -> Result<BridgeConfig> {
    let mut config = match &cli.config {
        Some(path) => BridgeConfig::from_json_file(path).context("Failed to load config file")?,
        None => BridgeConfig::default(),
    };

    if let Some(ref dir) = cli.artifact_dir {
        config.artifact_dir = dir.clone();
    }
    if let Some(ref name) = cli.sheet_name {
        config.sheet_name = name.clone();
    }
    if let Some(ref url) = cli.endpoint {
        config.import.endpoint = url.clone();
    }
    if let Some(ref dir) = cli.pdfium_lib {
        config.extract.pdfium_lib_path = Some(dir.clone());
    }
    if let Some(v) = cli.row_tolerance {
        config.extract.row_tolerance = v;
    }
    if let Some(v) = cli.merge_gap {
        config.extract.merge_gap = v;
    }
    if let Some(v) = cli.extract_timeout {
        config.extract.timeout_secs = v;
    }
    if let Some(v) = cli.request_timeout {
        config.import.request_timeout_secs = v;
    }
    if let Some(v) = cli.max_retries {
        config.import.retry.max_retries = v;
    }
    if let Some(v) = cli.retry_backoff_ms {
        config.import.retry.backoff_ms = v;
    }
    if cli.password.is_some() {
        config.extract.password = cli.password.clone();
    }
    if let Some(flow) = spinner {
        config.observer = Some(CliSpinner::new(flow) as Observer);
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}
