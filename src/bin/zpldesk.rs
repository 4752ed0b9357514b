//! CLI binary for zpl-desk.
//!
//! A thin shim over the library crate that maps CLI flags to `DeskConfig`,
//! drives a `LabelDesk`, and prints results.

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;
use zpl_desk::pipeline::ingest::read_markup;
use zpl_desk::{
    Capabilities, DeskConfig, IngestBatch, LabelDesk, LabelGeometry, LabelId, LabelItem,
    LabelProgressCallback, LabelStatus, ProgressCallback,
};

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

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
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: [&str; 11] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a live bar plus one log line per label.
/// Labels finish out of order, so start times are tracked per label id.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<LabelId, Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Reading label files…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
        })
    }

    fn elapsed_secs(&self, id: LabelId) -> f64 {
        self.start_times
            .lock()
            .ok()
            .and_then(|mut m| m.remove(&id))
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl LabelProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} labels  ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(style);
        self.bar.set_prefix("Rendering");
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Processing {total} label file(s)…"))
        ));
    }

    fn on_label_start(&self, id: LabelId, name: &str) {
        if let Ok(mut m) = self.start_times.lock() {
            m.insert(id, Instant::now());
        }
        self.bar.set_message(name.to_string());
    }

    fn on_label_ready(&self, id: LabelId, name: &str, has_metadata: bool) {
        let secs = self.elapsed_secs(id);
        let meta = if has_metadata { "with details" } else { "no details" };
        self.bar.println(format!(
            "  {} {:<32}  {:<12}  {}",
            green("✓"),
            name,
            dim(meta),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_label_error(&self, id: LabelId, name: &str) {
        let secs = self.elapsed_secs(id);
        self.errors.fetch_add(1, Ordering::SeqCst);
        self.bar.println(format!(
            "  {} {:<32}  {:<12}  {}",
            red("✗"),
            name,
            red("render failed"),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, total: usize, ready: usize) {
        self.bar.finish_and_clear();
        let failed = total.saturating_sub(ready);
        if failed == 0 {
            eprintln!("{} {} label(s) ready", green("✔"), bold(&ready.to_string()));
        } else {
            eprintln!(
                "{} {}/{} label(s) ready  ({} failed)",
                if ready == 0 { red("✘") } else { cyan("⚠") },
                bold(&ready.to_string()),
                total,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Preview a folder of labels
  zpldesk preview labels/

  # Same, as JSON with the PNG previews inlined
  zpldesk preview --json --embed-previews order-17.zpl

  # Bundle every label that renders into one 4x6 PDF
  zpldesk pdf labels/ -o today.pdf

  # Send one label straight to a USB thermal printer
  zpldesk print order-17.zpl --device /dev/ttyUSB0

  # Interactive queue (add, rm, clear, pdf, print …)
  zpldesk shell labels/

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY          Enables shipment extraction with Gemini (preferred)
  OPENAI_API_KEY          … or OpenAI
  ANTHROPIC_API_KEY       … or Anthropic
  MISTRAL_API_KEY         … or Mistral
  EDGEQUAKE_LLM_PROVIDER  Override provider (gemini, openai, anthropic, ollama …)
  EDGEQUAKE_MODEL         Override model ID
  ZPLDESK_RENDER_URL      Labelary-compatible renderer (default https://api.labelary.com)
  ZPLDESK_DEVICE          Serial device for direct printing

Without an API key the desk runs in offline mode: labels still render,
shipment details are simply not shown.
"#;

/// Preview, print and bundle ZPL shipping labels.
#[derive(Parser, Debug)]
#[command(
    name = "zpldesk",
    version,
    about = "Preview, print and bundle ZPL shipping labels",
    long_about = "Render ZPL label files through a Labelary-compatible service, extract \
recipient / tracking / carrier / destination with an LLM, print raw labels to a serial \
thermal printer, or bundle all rendered labels into a single 4x6 PDF.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Base URL of the label renderer.
    #[arg(long, global = true, env = "ZPLDESK_RENDER_URL",
          default_value = zpl_desk::config::DEFAULT_RENDER_URL)]
    render_url: String,

    /// Print density in dots per millimetre (6, 8, 12, 24).
    #[arg(long, global = true, env = "ZPLDESK_DPMM", default_value_t = 8)]
    dpmm: u8,

    /// Label size in inches, WIDTHxHEIGHT.
    #[arg(long, global = true, env = "ZPLDESK_LABEL_SIZE", default_value = "4x6")]
    label_size: String,

    /// Renderer request timeout in seconds (default: none).
    #[arg(long, global = true, env = "ZPLDESK_TIMEOUT")]
    timeout: Option<u64>,

    /// LLM provider for extraction: gemini, openai, anthropic, mistral, ollama.
    #[arg(long, global = true, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// LLM model ID for extraction.
    #[arg(long, global = true, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// Skip shipment extraction even if an API key is set.
    #[arg(long, global = true, env = "ZPLDESK_NO_EXTRACT")]
    no_extract: bool,

    /// Serial baud rate for direct printing.
    #[arg(long, global = true, env = "ZPLDESK_BAUD", default_value_t = 9600)]
    baud: u32,

    /// Serial device for direct printing (prompted if omitted).
    #[arg(long, global = true, env = "ZPLDESK_DEVICE")]
    device: Option<PathBuf>,

    /// Disable the progress bar.
    #[arg(long, global = true, env = "ZPLDESK_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "ZPLDESK_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "ZPLDESK_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render label files and show the extracted shipment details.
    Preview {
        /// Label files (.zpl, .txt) or directories.
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Output JSON instead of a table.
        #[arg(long)]
        json: bool,

        /// Inline each preview as a data URI in the JSON output.
        #[arg(long, requires = "json")]
        embed_previews: bool,

        /// Write each rendered preview as a PNG into this directory.
        #[arg(long)]
        save_previews: Option<PathBuf>,
    },

    /// Render label files and bundle the ready ones into one PDF.
    Pdf {
        /// Label files (.zpl, .txt) or directories.
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Output PDF path.
        #[arg(short, long, env = "ZPLDESK_OUTPUT",
              default_value = zpl_desk::config::DEFAULT_PDF_NAME)]
        output: PathBuf,
    },

    /// Send a label file's raw markup straight to a serial printer.
    Print {
        /// Label file to print.
        file: PathBuf,
    },

    /// Show which optional capabilities are available.
    Status {
        /// Output JSON.
        #[arg(long)]
        json: bool,
    },

    /// Interactive label queue.
    Shell {
        /// Label files or directories to queue at start.
        inputs: Vec<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar carries the per-label feedback; keep INFO logs out of
    // its way unless asked for.
    let machine_output = matches!(
        cli.command,
        Command::Preview { json: true, .. } | Command::Status { json: true }
    );
    let show_progress = !cli.quiet
        && !cli.no_progress
        && !machine_output
        && matches!(cli.command, Command::Preview { .. } | Command::Pdf { .. });
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

    let progress: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn LabelProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, progress)?;
    let desk = LabelDesk::from_config(config).context("Failed to set up the label desk")?;

    match cli.command {
        Command::Preview {
            ref inputs,
            json,
            embed_previews,
            ref save_previews,
        } => {
            desk.process_files(inputs).await;
            let items = desk.items();
            if items.is_empty() {
                bail!("No .zpl or .txt label files found in the given inputs");
            }
            if let Some(dir) = save_previews {
                save_preview_pngs(&items, dir)?;
            }
            if json {
                let summaries: Vec<_> = items.iter().map(|i| i.summary(embed_previews)).collect();
                println!(
                    "{}",
                    serde_json::to_string_pretty(&summaries).context("Failed to serialise output")?
                );
            } else {
                print_table(&items);
            }
        }

        Command::Pdf {
            ref inputs,
            ref output,
        } => {
            desk.process_files(inputs).await;
            if desk.items().is_empty() {
                bail!("No .zpl or .txt label files found in the given inputs");
            }
            match desk
                .export_pdf(Some(output.as_path()))
                .await
                .context("PDF export failed")?
            {
                Some(path) => {
                    if !cli.quiet {
                        eprintln!(
                            "{}  {} page(s)  →  {}",
                            green("✔"),
                            desk.ready_items().len(),
                            bold(&path.display().to_string())
                        );
                    }
                }
                None => {
                    eprintln!("{} No label rendered successfully; no PDF written", red("✘"));
                    std::process::exit(1);
                }
            }
        }

        Command::Print { ref file } => {
            let markup = read_markup(file)
                .await
                .with_context(|| format!("Failed to read {}", file.display()))?;
            if let Err(e) = desk.print_markup(&markup).await {
                eprintln!("{} {}", red("✘"), e);
                eprintln!(
                    "{}",
                    dim("Check that the thermal printer is connected over USB and that the right port was selected.")
                );
                std::process::exit(1);
            }
            if !cli.quiet {
                eprintln!("{} Sent {} to the printer", green("✔"), bold(&file.display().to_string()));
            }
        }

        Command::Status { json } => {
            let caps = desk.capabilities();
            if json {
                println!("{}", serde_json::to_string_pretty(&caps)?);
            } else {
                print_status(&desk, caps);
            }
        }

        Command::Shell { ref inputs } => {
            run_shell(&desk, inputs).await?;
        }
    }

    Ok(())
}

/// Map CLI args to `DeskConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<DeskConfig> {
    let (width_in, height_in) = LabelGeometry::parse_size(&cli.label_size)
        .ok_or_else(|| anyhow!("Invalid --label-size '{}', expected e.g. 4x6", cli.label_size))?;

    let mut builder = DeskConfig::builder()
        .render_url(cli.render_url.clone())
        .geometry(LabelGeometry {
            width_in,
            height_in,
            dpmm: cli.dpmm,
        })
        .extraction_enabled(!cli.no_extract)
        .baud_rate(cli.baud);

    if let Some(secs) = cli.timeout {
        builder = builder.request_timeout_secs(secs);
    }
    if let Some(ref p) = cli.provider {
        builder = builder.provider_name(p.clone());
    }
    if let Some(ref m) = cli.model {
        builder = builder.model(m.clone());
    }
    if let Some(ref d) = cli.device {
        builder = builder.device(d.display().to_string());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

fn status_icon(status: LabelStatus) -> String {
    match status {
        LabelStatus::Ready => green("✓"),
        LabelStatus::Error => red("✗"),
        LabelStatus::Processing => cyan("…"),
        LabelStatus::Pending => dim("·"),
    }
}

fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() > width {
        let cut: String = s.chars().take(width.saturating_sub(1)).collect();
        format!("{cut}…")
    } else {
        s.to_string()
    }
}

fn print_table(items: &[LabelItem]) {
    println!(
        "{}",
        bold(&format!(
            "  {:>3}  {:<28} {:<24} {:<20} {:<12} {}",
            "#", "FILE", "RECIPIENT", "TRACKING", "CARRIER", "DESTINATION"
        ))
    );
    for (i, item) in items.iter().enumerate() {
        let (recipient, tracking, carrier, destination) = match item.metadata {
            Some(ref m) => (
                m.recipient_name.as_str(),
                m.tracking_number.as_str(),
                m.carrier.as_str(),
                m.destination.as_str(),
            ),
            None => ("-", "-", "-", "-"),
        };
        println!(
            "{} {:>3}  {:<28} {:<24} {:<20} {:<12} {}",
            status_icon(item.status),
            i + 1,
            truncate(&item.name, 28),
            truncate(recipient, 24),
            truncate(tracking, 20),
            truncate(carrier, 12),
            destination,
        );
    }
    let ready = items.iter().filter(|i| i.is_ready()).count();
    println!("{}", dim(&format!("{ready}/{} ready", items.len())));
}

fn save_preview_pngs(items: &[LabelItem], dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;
    for item in items {
        if let Some(ref preview) = item.preview {
            let stem = item
                .source
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| item.id.to_string());
            let path = dir.join(format!("{stem}.png"));
            std::fs::write(&path, preview.bytes())
                .with_context(|| format!("Failed to write {}", path.display()))?;
        }
    }
    Ok(())
}

fn print_status(desk: &LabelDesk, caps: Capabilities) {
    let extraction = if caps.extraction {
        green("● shipment extraction enabled")
    } else {
        yellow("○ offline mode (no API key)")
    };
    let printing = if caps.direct_print {
        green("● USB serial printing available")
    } else {
        dim("○ USB serial printing unavailable")
    };
    println!("Extraction    {extraction}");
    println!("Direct print  {printing}");
    println!("Renderer      {}", dim(&desk.config().render_endpoint()));
}

// ── Interactive shell ────────────────────────────────────────────────────────

const SHELL_HELP: &str = "\
commands:
  add <path>…       queue label files or directories
  list              show the queue
  rm <n>            remove label n
  clear             remove every label
  wait              wait for in-flight labels
  pdf [file]        bundle ready labels into a PDF
  print <n>         send label n to the serial printer
  status            show capabilities
  help              this text
  quit              leave";

/// Read one line from stdin without holding the terminal between prompts,
/// so the device picker can read stdin during `print`.
async fn read_line() -> Result<Option<String>> {
    tokio::task::spawn_blocking(|| {
        let mut line = String::new();
        match io::stdin().read_line(&mut line) {
            Ok(0) => Ok(None),
            Ok(_) => Ok(Some(line)),
            Err(e) => Err(e),
        }
    })
    .await
    .context("stdin task failed")?
    .context("Failed to read stdin")
}

fn nth_label(desk: &LabelDesk, arg: Option<&str>) -> Option<LabelItem> {
    let n: usize = arg?.parse().ok()?;
    desk.items().into_iter().nth(n.checked_sub(1)?)
}

async fn run_shell(desk: &LabelDesk, inputs: &[PathBuf]) -> Result<()> {
    let mut batches: Vec<IngestBatch> = Vec::new();
    if !inputs.is_empty() {
        let batch = desk.add_files(inputs);
        eprintln!("{} queued {} label(s)", cyan("◆"), batch.len());
        batches.push(batch);
    }
    print_status(desk, desk.capabilities());
    eprintln!("{}", dim("type 'help' for commands"));

    loop {
        eprint!("{} ", bold("zpldesk>"));
        io::stderr().flush().ok();

        let Some(line) = read_line().await? else {
            break;
        };
        let mut words = line.split_whitespace();
        let Some(cmd) = words.next() else {
            continue;
        };
        let args: Vec<&str> = words.collect();

        match cmd {
            "add" => {
                let batch = desk.add_files(&args);
                if batch.is_empty() {
                    eprintln!("{}", dim("no .zpl or .txt files found"));
                } else {
                    eprintln!("{} queued {} label(s)", cyan("◆"), batch.len());
                    batches.push(batch);
                }
            }
            "list" | "ls" => {
                let items = desk.items();
                if items.is_empty() {
                    eprintln!("{}", dim("queue is empty"));
                } else {
                    print_table(&items);
                }
            }
            "rm" => match nth_label(desk, args.first().copied()) {
                Some(item) => {
                    desk.remove(item.id);
                    eprintln!("removed {}", item.name);
                }
                None => eprintln!("{}", red("no such label")),
            },
            "clear" => {
                let n = desk.clear();
                eprintln!("removed {n} label(s)");
            }
            "wait" => {
                for batch in batches.drain(..) {
                    batch.settle().await;
                }
                eprintln!("{} {} ready", green("✔"), desk.ready_items().len());
            }
            "pdf" => {
                let path = args.first().map(PathBuf::from);
                match desk.export_pdf(path.as_deref()).await {
                    Ok(Some(p)) => eprintln!("{} saved {}", green("✔"), bold(&p.display().to_string())),
                    Ok(None) => eprintln!("{}", dim("no ready labels")),
                    Err(e) => eprintln!("{} {}", red("✘"), e),
                }
            }
            "print" => match nth_label(desk, args.first().copied()) {
                Some(item) => match desk.print_label(item.id).await {
                    Ok(()) => eprintln!("{} sent {} to the printer", green("✔"), item.name),
                    Err(e) => eprintln!("{} {}", red("✘"), e),
                },
                None => eprintln!("{}", red("no such label")),
            },
            "status" => print_status(desk, desk.capabilities()),
            "help" | "?" => eprintln!("{SHELL_HELP}"),
            "quit" | "exit" | "q" => break,
            other => eprintln!("{} unknown command '{other}' (try 'help')", red("✘")),
        }
    }

    Ok(())
}
