//! CLI command definitions, routing, and tracing setup.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::Result;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use newsreel_clients::{CdnStore, OpenAiClient, PerplexityClient};
use newsreel_core::{Capabilities, ProgressReporter, run_pipeline};
use newsreel_shared::{
    AppConfig, RunOutcome, RunReport, Stage, StageReport, db_path, init_config, load_config,
    validate, validate_api_key,
};
use newsreel_storage::{PersistentIndex, Storage, StoryPersister};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Newsreel — automated news-to-audio pipeline.
#[derive(Parser)]
#[command(
    name = "newsreel",
    version,
    about = "Discover news leads, deduplicate them, and produce voiced stories.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Run the full pipeline once.
    Run {
        /// Cap on leads discovered per category (overrides config).
        #[arg(short, long)]
        limit: Option<u32>,

        /// Database path (defaults to the configured location).
        #[arg(long)]
        db: Option<PathBuf>,
    },

    /// Show the most recent run report.
    Report {
        /// Database path (defaults to the configured location).
        #[arg(long)]
        db: Option<PathBuf>,
    },

    /// List recently produced stories.
    Stories {
        /// Look-back window in hours.
        #[arg(long, default_value = "24")]
        hours: i64,

        /// Database path (defaults to the configured location).
        #[arg(long)]
        db: Option<PathBuf>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "newsreel=info",
        1 => "newsreel=debug",
        _ => "newsreel=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt().with_env_filter(env_filter).with_target(false).init();
        }
        LogFormat::Json => {
            fmt().json().with_env_filter(env_filter).init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Run { limit, db } => cmd_run(limit, db.as_deref()).await,
        Command::Report { db } => cmd_report(db.as_deref()).await,
        Command::Stories { hours, db } => cmd_stories(hours, db.as_deref()).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_run(limit: Option<u32>, db: Option<&std::path::Path>) -> Result<()> {
    let mut config = load_config()?;
    validate(&config)?;

    // Validate credentials before doing anything
    validate_api_key("perplexity", &config.perplexity.api_key_env)?;
    validate_api_key("openai", &config.openai.api_key_env)?;
    validate_api_key("cdn", &config.cdn.token_env)?;

    if let Some(limit) = limit {
        config.discovery.max_leads_per_category = limit;
    }

    let database = resolve_db_path(&config, db)?;
    let storage = Arc::new(Storage::open(&database).await?);
    let index = PersistentIndex::load(storage.clone(), config.openai.embedding_dimensions).await?;

    let perplexity = Arc::new(PerplexityClient::new(&config.perplexity, &config.discovery)?);
    let openai = Arc::new(OpenAiClient::new(&config.openai)?);
    let cdn = Arc::new(CdnStore::new(&config.cdn)?);

    let caps = Capabilities {
        discoverer: perplexity.clone(),
        embedder: openai.clone(),
        index: Arc::new(index),
        researcher: perplexity,
        writer: openai.clone(),
        voicer: openai,
        object_store: cdn,
        persister: Arc::new(StoryPersister::new(storage.clone())),
    };

    info!(db = %database.display(), "starting pipeline run");

    let reporter = CliProgress::new();
    let report = run_pipeline(&config, &caps, &reporter).await;

    storage.insert_run_report(&report).await?;
    print_report(&report);

    Ok(())
}

async fn cmd_report(db: Option<&std::path::Path>) -> Result<()> {
    let config = load_config()?;
    let database = resolve_db_path(&config, db)?;
    let storage = Storage::open(&database).await?;

    match storage.latest_run_report().await? {
        Some(report) => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        None => {
            println!("No runs recorded yet.");
        }
    }
    Ok(())
}

async fn cmd_stories(hours: i64, db: Option<&std::path::Path>) -> Result<()> {
    let config = load_config()?;
    let database = resolve_db_path(&config, db)?;
    let storage = Storage::open(&database).await?;

    let stories = storage.recent_stories(hours).await?;
    if stories.is_empty() {
        println!("No stories in the last {hours}h.");
        return Ok(());
    }

    println!();
    for story in &stories {
        let headline = story.headline.as_deref().unwrap_or(&story.text);
        println!("  {} — {headline}", story.created_at.format("%Y-%m-%d %H:%M"));
        if let Some(anchor) = &story.anchor {
            println!("      read by {anchor}");
        }
        if let Some(url) = &story.audio_url {
            println!("      {url}");
        }
    }
    println!();
    println!("  {} story(ies) in the last {hours}h", stories.len());
    Ok(())
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn resolve_db_path(config: &AppConfig, flag: Option<&std::path::Path>) -> Result<PathBuf> {
    match flag {
        Some(path) => Ok(path.to_path_buf()),
        None => Ok(db_path(config)?),
    }
}

/// Print the per-stage summary of a finished run.
fn print_report(report: &RunReport) {
    println!();
    for stage in &report.stages {
        println!(
            "  {:<10} attempted {:>3}  succeeded {:>3}  failed {:>3}  ({:.1}s)",
            stage.stage,
            stage.attempted,
            stage.succeeded,
            stage.failed,
            stage.duration.as_secs_f64()
        );
    }
    println!();

    match &report.outcome {
        RunOutcome::Completed => {
            let stories = report
                .stage(Stage::Store)
                .map(|s| s.succeeded)
                .unwrap_or(0);
            println!("  Run {} completed: {stories} story(ies) produced.", report.run_id);
        }
        RunOutcome::Aborted { stage, reason } => {
            println!("  Run {} aborted at {stage}: {reason}", report.run_id);
        }
    }

    if !report.failures.is_empty() {
        println!("  {} failure(s); see `newsreel report` for details.", report.failures.len());
    }
    println!();
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap()
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, stage: Stage) {
        self.spinner.set_message(format!("{stage}…"));
    }

    fn stage_done(&self, report: &StageReport) {
        self.spinner.set_message(format!(
            "{}: {}/{} advanced",
            report.stage, report.succeeded, report.attempted
        ));
    }

    fn done(&self, _report: &RunReport) {
        self.spinner.finish_and_clear();
    }
}
