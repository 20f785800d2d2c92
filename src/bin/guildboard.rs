//! CLI binary for guildboard.
//!
//! A thin shim over the library crate that maps CLI flags to `BoardConfig`,
//! runs one refresh (or one per `--watch` tick), and hands the artifact to
//! stdout or a file the way a chat sink would receive it.

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use guildboard::{
    error_notice, write_artifact, Artifact, ArtifactOutput, BoardConfig, Leaderboard,
    PipelineObserver, RenderMode, ReportKind, Stage, TextStyle,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers ──────────────────────────────────────────────────────

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

// ── Spinner observer ─────────────────────────────────────────────────────────

/// Terminal observer: a spinner naming the running stage plus one log line
/// per completed stage or failed fetch attempt.
struct SpinnerObserver {
    bar: ProgressBar,
}

impl SpinnerObserver {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Leaderboard");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl PipelineObserver for SpinnerObserver {
    fn on_cache_hit(&self, age: &str) {
        self.bar
            .println(format!("  {} served from cache {}", cyan("⚡"), dim(&format!("({age} old)"))));
    }

    fn on_stage_start(&self, stage: Stage) {
        self.bar.set_message(format!("{stage}…"));
    }

    fn on_stage_complete(&self, stage: Stage, elapsed_ms: u64) {
        self.bar.println(format!(
            "  {} {:<10} {}",
            green("✓"),
            stage.to_string(),
            dim(&format!("{:.1}s", elapsed_ms as f64 / 1000.0))
        ));
    }

    fn on_fetch_retry(&self, attempt: u32, max_attempts: u32, reason: &str) {
        let msg = if reason.chars().count() > 80 {
            format!("{}\u{2026}", reason.chars().take(79).collect::<String>())
        } else {
            reason.to_string()
        };
        self.bar.println(format!(
            "  {} fetch attempt {attempt}/{max_attempts}  {}",
            red("✗"),
            red(&msg)
        ));
    }

    fn on_artifact_ready(&self, _output: &ArtifactOutput) {
        self.bar.set_message("done");
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Daily leaderboard as PNG (guildstats.png in the current directory)
  guildboard

  # Text blocks on stdout, with ANSI colour hints
  guildboard --mode text --style ansi

  # Monthly summary to a specific file
  guildboard --report monthly -o monthly.png

  # Scheduler stand-in: forced refresh every 30 minutes
  guildboard --watch 1800 -o /srv/board/guildstats.png

  # Machine-readable summary
  guildboard --mode text --json

ENVIRONMENT VARIABLES:
  GUILDBOARD_URL          Source page URL
  GUILDBOARD_SELECTOR     CSS selector of the table (default #myTable2)
  GUILDBOARD_BROWSER      Chromium executable for image mode
  GUILDBOARD_MODE         image | text
  GUILDBOARD_CACHE_TTL    Cache lifetime in seconds
  RUST_LOG                Overrides -v / -q log filtering
"#;

/// Scrape, rank, and render a guild leaderboard.
#[derive(Parser, Debug)]
#[command(
    name = "guildboard",
    version,
    about = "Scrape, rank, and render a guild leaderboard as a PNG or text blocks",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Page that carries the leaderboard table.
    #[arg(long, env = "GUILDBOARD_URL")]
    url: Option<String>,

    /// CSS selector of the table element.
    #[arg(long, env = "GUILDBOARD_SELECTOR")]
    selector: Option<String>,

    /// Which ranking to produce.
    #[arg(long, env = "GUILDBOARD_REPORT", value_enum, default_value = "daily")]
    report: ReportArg,

    /// Artifact format.
    #[arg(long, env = "GUILDBOARD_MODE", value_enum, default_value = "image")]
    mode: ModeArg,

    /// Text-mode styling.
    #[arg(long, env = "GUILDBOARD_STYLE", value_enum, default_value = "plain")]
    style: StyleArg,

    /// Ignore a fresh cached artifact and fetch again.
    #[arg(long)]
    force: bool,

    /// Write the artifact here. Image mode defaults to the attachment name.
    #[arg(short, long, env = "GUILDBOARD_OUTPUT")]
    output: Option<PathBuf>,

    /// Print a JSON summary instead of the artifact.
    #[arg(long, env = "GUILDBOARD_JSON")]
    json: bool,

    /// Refresh every N seconds until interrupted.
    #[arg(long, env = "GUILDBOARD_WATCH", value_name = "SECS",
          value_parser = clap::value_parser!(u64).range(1..))]
    watch: Option<u64>,

    /// Chromium executable used in image mode.
    #[arg(long, env = "GUILDBOARD_BROWSER")]
    browser: Option<PathBuf>,

    /// Viewport width in CSS pixels (200–4000).
    #[arg(long, env = "GUILDBOARD_WIDTH", default_value_t = 980)]
    width: u32,

    /// Device-scale factor (0.5–4.0).
    #[arg(long, env = "GUILDBOARD_SCALE", default_value_t = 2.0)]
    scale: f64,

    /// Cache lifetime in seconds.
    #[arg(long, env = "GUILDBOARD_CACHE_TTL", default_value_t = 900)]
    cache_ttl: u64,

    /// Fetch attempts per refresh.
    #[arg(long, env = "GUILDBOARD_ATTEMPTS", default_value_t = 3)]
    attempts: u32,

    /// Per-attempt HTTP timeout in seconds.
    #[arg(long, env = "GUILDBOARD_TIMEOUT", default_value_t = 25)]
    timeout: u64,

    /// Maximum characters per text block.
    #[arg(long, env = "GUILDBOARD_MAX_BLOCK", default_value_t = 1900)]
    max_block: usize,

    /// IANA time zone timestamps are shown in (e.g. Europe/Warsaw).
    #[arg(long, env = "GUILDBOARD_TIMEZONE")]
    timezone: Option<String>,

    /// Text placed before the timestamp in the rendered header.
    #[arg(long, env = "GUILDBOARD_TIMESTAMP_PREFIX")]
    timestamp_prefix: Option<String>,

    /// Disable the spinner.
    #[arg(long, env = "GUILDBOARD_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "GUILDBOARD_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "GUILDBOARD_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum ReportArg {
    Daily,
    Monthly,
}

impl From<ReportArg> for ReportKind {
    fn from(v: ReportArg) -> Self {
        match v {
            ReportArg::Daily => ReportKind::Daily,
            ReportArg::Monthly => ReportKind::Monthly,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum ModeArg {
    Image,
    Text,
}

impl From<ModeArg> for RenderMode {
    fn from(v: ModeArg) -> Self {
        match v {
            ModeArg::Image => RenderMode::Image,
            ModeArg::Text => RenderMode::Text,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum StyleArg {
    Plain,
    Ansi,
}

impl From<StyleArg> for TextStyle {
    fn from(v: StyleArg) -> Self {
        match v {
            StyleArg::Plain => TextStyle::Plain,
            StyleArg::Ansi => TextStyle::Ansi,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
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

    // ── Build pipeline ───────────────────────────────────────────────────
    let spinner = show_progress.then(SpinnerObserver::new);
    let config = build_config(&cli, spinner.clone())?;
    let board = Leaderboard::new(config).context("Failed to set up the pipeline")?;

    // ── Run ──────────────────────────────────────────────────────────────
    let result = match cli.watch {
        Some(secs) => watch(&board, &cli, Duration::from_secs(secs)).await,
        None => run_once(&board, &cli, cli.force).await,
    };

    if let Some(s) = spinner {
        s.bar.finish_and_clear();
    }
    result
}

/// Map CLI args to `BoardConfig`.
fn build_config(cli: &Cli, observer: Option<Arc<SpinnerObserver>>) -> Result<BoardConfig> {
    let mut builder = BoardConfig::builder()
        .render_mode(cli.mode.into())
        .text_style(cli.style.into())
        .viewport_width(cli.width)
        .device_scale_factor(cli.scale)
        .cache_ttl(Duration::from_secs(cli.cache_ttl))
        .fetch_attempts(cli.attempts)
        .fetch_timeout(Duration::from_secs(cli.timeout))
        .max_block_len(cli.max_block);

    if let Some(ref url) = cli.url {
        builder = builder.source_url(url);
    }
    if let Some(ref selector) = cli.selector {
        builder = builder.table_selector(selector);
    }
    if let Some(ref browser) = cli.browser {
        builder = builder.browser_executable(browser);
    }
    if let Some(ref zone) = cli.timezone {
        builder = builder.timezone(zone);
    }
    if let Some(ref prefix) = cli.timestamp_prefix {
        builder = builder.timestamp_prefix(prefix);
    }
    if let Some(obs) = observer {
        builder = builder.observer(obs);
    }

    builder.build().context("Invalid configuration")
}

/// Scheduler stand-in: a forced refresh on every tick until Ctrl-C.
async fn watch(board: &Leaderboard, cli: &Cli, every: Duration) -> Result<()> {
    info!("Refreshing every {}s; Ctrl-C to stop", every.as_secs());
    let mut ticker = tokio::time::interval(every);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                // A failed tick is reported and the schedule continues.
                if let Err(e) = run_once(board, cli, true).await {
                    error!("Refresh failed: {e:#}");
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted; stopping");
                return Ok(());
            }
        }
    }
}

async fn run_once(board: &Leaderboard, cli: &Cli, force: bool) -> Result<()> {
    let kind: ReportKind = cli.report.into();
    let outcome = match kind {
        ReportKind::Daily if !force => board.get_artifact(false).await,
        _ => board.report(kind).await,
    };

    let output = match outcome {
        Ok(output) => output,
        Err(e) => {
            // What a chat sink would post.
            eprintln!("{}", error_notice(&e));
            return Err(e).context("Refresh failed");
        }
    };

    deliver(board, cli, &output).await
}

/// Print or write the artifact.
async fn deliver(board: &Leaderboard, cli: &Cli, output: &ArtifactOutput) -> Result<()> {
    let config = board.config();

    let target = match (output.artifact.as_ref(), &cli.output) {
        (_, Some(path)) => Some(path.clone()),
        (Artifact::Png(_), None) => Some(PathBuf::from(output.attachment_name())),
        (Artifact::Text(_), None) => None,
    };
    if let Some(ref path) = target {
        write_artifact(&output.artifact, path)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }

    if cli.json {
        let json = serde_json::to_string_pretty(&output.summary())
            .context("Failed to serialise summary")?;
        println!("{json}");
        return Ok(());
    }

    if target.is_none() {
        if let Some(blocks) = output.artifact.text_blocks() {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            for block in blocks {
                writeln!(handle, "{block}").context("Failed to write to stdout")?;
            }
        }
    }

    if !cli.quiet {
        let label = &config.profile(output.kind).title;
        eprintln!(
            "{}",
            output.caption(label, config.timezone, Utc::now())
        );
        if let Some(ref path) = target {
            eprintln!(
                "{}  {} bytes  →  {}",
                green("✔"),
                output.artifact.byte_len(),
                path.display()
            );
        }
    }
    Ok(())
}
