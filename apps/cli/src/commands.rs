//! CLI command definitions, routing, and tracing setup.

use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::Result;
use dialoguer::{Confirm, Input, Password};
use helpsync_core::{ImportConfig, ProgressReporter, run_import};
use helpsync_shared::{
    AppConfig, RunParams, RunReport, RunRequest, init_config, load_config,
};
use helpsync_upload::KbClient;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// helpsync — sync help-center articles into a knowledge base.
#[derive(Parser)]
#[command(
    name = "helpsync",
    version,
    about = "Sync recently updated help-center articles into a knowledge-base project.",
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
    /// Run one import with the given parameters.
    Run {
        /// Sitemap URL, or the literal "api" to list via the help-center API.
        #[arg(long)]
        url: Option<String>,

        /// Knowledge-base API key (falls back to the configured env var).
        #[arg(long)]
        api_key: Option<String>,

        /// Knowledge-base project id (falls back to the configured env var).
        #[arg(long)]
        project_id: Option<String>,

        /// Import every article regardless of last-modified date.
        #[arg(long)]
        force: bool,

        /// Only import articles updated within this many days.
        #[arg(long)]
        previous_days: Option<i64>,

        /// Keep staged files on disk after the run.
        #[arg(long)]
        retain: bool,

        /// Stage everything but skip the upload calls.
        #[arg(long)]
        dry_run: bool,
    },

    /// Answer a few questions, then run an import.
    Prompt,

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
        0 => "helpsync=info",
        1 => "helpsync=debug",
        _ => "helpsync=trace",
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
        Command::Run {
            url,
            api_key,
            project_id,
            force,
            previous_days,
            retain,
            dry_run,
        } => {
            let request = RunRequest {
                api_key,
                project_id,
                url,
                force: force.then_some(true),
                previous_days,
            };
            cmd_run(request, retain, dry_run).await
        }
        Command::Prompt => cmd_prompt().await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

// ---------------------------------------------------------------------------
// Import commands
// ---------------------------------------------------------------------------

async fn cmd_run(request: RunRequest, retain: bool, dry_run: bool) -> Result<()> {
    let config = load_config()?;
    let params = RunParams::resolve(&request, &config)?;

    let mut import = ImportConfig::from(&config);
    import.retain_docs = import.retain_docs || retain;
    let dry_run = dry_run || config.pipeline.dry_run;

    info!(
        mode = %params.mode,
        force = params.force,
        lookback_days = params.lookback_days,
        dry_run,
        "starting import"
    );

    let source = helpsync_source::build_source(&params, &config)?;
    let sink = Arc::new(KbClient::new(
        &config.upload.base_url,
        config.upload.max_chunk_size,
        config.upload.overwrite,
        dry_run,
    )?);

    let reporter = CliProgress::new();
    let report = run_import(&params, &import, source.as_ref(), sink, &reporter).await?;

    print_report(&report);
    Ok(())
}

/// Interactive variant: ask for the run parameters, then import.
async fn cmd_prompt() -> Result<()> {
    let config = load_config()?;

    let url: String = Input::new()
        .with_prompt("Sitemap URL (or \"api\" to list via the help-center API)")
        .default(config.default_sitemap_url().unwrap_or_default())
        .allow_empty(true)
        .interact_text()?;

    let api_key: String = Password::new()
        .with_prompt("KB API key (empty to use the environment)")
        .allow_empty_password(true)
        .interact()?;

    let project_id: String = Input::new()
        .with_prompt("KB project id (empty to use the environment)")
        .allow_empty(true)
        .interact_text()?;

    let force = Confirm::new()
        .with_prompt("Import all articles, regardless of update date?")
        .default(false)
        .interact()?;

    let previous_days: i64 = Input::new()
        .with_prompt("Only import articles updated within the last N days")
        .default(config.pipeline.lookback_days)
        .interact_text()?;

    let nonempty = |s: String| if s.trim().is_empty() { None } else { Some(s) };
    let request = RunRequest {
        api_key: nonempty(api_key),
        project_id: nonempty(project_id),
        url: nonempty(url),
        force: Some(force),
        previous_days: Some(previous_days),
    };

    cmd_run(request, false, false).await
}

fn print_report(report: &RunReport) {
    println!();
    println!("  Import {}", report.status);
    println!("  Run ID:     {}", report.run_id);
    println!("  Discovered: {}", report.discovered);
    println!("  Staged:     {}", report.staged);
    println!("  Uploaded:   {}", report.uploaded);
    println!("  Failed:     {}", report.failed);
    println!("  Skipped:    {}", report.skipped);
    println!("  Time:       {:.1}s", report.elapsed.as_secs_f64());
    println!();
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// Progress reporter using an indicatif spinner.
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
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn item(&self, current: usize, total: usize, url: &str) {
        self.spinner
            .set_message(format!("Processing [{current}/{total}] {url}"));
    }

    fn done(&self, _report: &RunReport) {
        self.spinner.finish_and_clear();
    }
}

// ---------------------------------------------------------------------------
// Config commands
// ---------------------------------------------------------------------------

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
