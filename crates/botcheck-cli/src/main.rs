//! # botcheck
//!
//! Replays tabular conversation scenarios against a Telegram bot.
//!
//! ## Usage
//!
//! ```bash
//! # One-time: sign the tester account in
//! botcheck login
//!
//! # Run every scenario in scenarios.csv
//! botcheck run
//!
//! # Run one scenario from another file
//! botcheck run --scenario "Registration" --file qa/scenarios.csv
//!
//! # List scenarios
//! botcheck list
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use botcheck_cli::{ReportWriter, RunReport, TerminalReporter, Verbosity};
use botcheck_core::{
    BotcheckConfig, EventSink, Interpreter, JsonlLog, ScenarioRunner, ScenarioSuite, Selection,
    TextLog, load_csv,
};
use botcheck_telegram::{LoginOutcome, StdinPrompt, TelegramConfig, TelegramTransport};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Scripted conversational tests for chat-bots.
#[derive(Parser, Debug)]
#[command(name = "botcheck")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to configuration file
    #[arg(short, long, default_value = "botcheck.yml", global = true)]
    config: PathBuf,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run scenarios against the bot
    Run(RunArgs),

    /// List scenarios in the scenario file
    List(ListArgs),

    /// Sign the tester account in and save the session file
    Login,
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Run only these scenarios (repeatable)
    #[arg(short, long = "scenario", value_name = "NAME")]
    scenarios: Vec<String>,

    /// Scenario CSV file (overrides config)
    #[arg(short, long, value_name = "CSV")]
    file: Option<PathBuf>,

    /// Only print the pass/fail summary
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Args, Debug)]
struct ListArgs {
    /// Scenario CSV file (overrides config)
    #[arg(short, long, value_name = "CSV")]
    file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Credentials usually live in .env next to the scenario file
    dotenvy::dotenv().ok();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run(args) => run_command(&cli.config, cli.verbose, args).await,
        Commands::List(args) => list_command(&cli.config, args),
        Commands::Login => login_command().await,
    }
}

async fn run_command(config_path: &Path, verbose: bool, args: RunArgs) -> Result<()> {
    let mut config = BotcheckConfig::load(config_path)
        .with_context(|| format!("Failed to load {}", config_path.display()))?;
    if let Some(file) = args.file {
        config.scenario_file = file;
    }
    config.validate().context("Invalid configuration")?;

    let suite = load_suite(&config)?;

    std::fs::create_dir_all(&config.log_dir)
        .with_context(|| format!("Failed to create {}", config.log_dir.display()))?;
    let mut sinks: Vec<Box<dyn EventSink>> = vec![
        Box::new(
            TextLog::create(&config.log_dir.join("test_run.log"))
                .context("Failed to open test_run.log")?,
        ),
        Box::new(
            JsonlLog::open(&config.log_dir.join("events.jsonl"))
                .context("Failed to open events.jsonl")?,
        ),
    ];

    let telegram = TelegramConfig::from_env().context("Telegram credentials are not configured")?;
    let mut transport = TelegramTransport::new(telegram);

    let verbosity = if args.quiet {
        Verbosity::Quiet
    } else if verbose {
        Verbosity::Verbose
    } else {
        Verbosity::Normal
    };
    let reporter = TerminalReporter::with_verbosity(verbosity);

    let selection = if args.scenarios.is_empty() {
        Selection::All
    } else {
        Selection::Named(args.scenarios)
    };

    info!(bot = %config.bot_username, file = %config.scenario_file.display(), "starting run");
    let mut runner = ScenarioRunner::new(Interpreter::new(config.interpreter_config()))
        .with_progress(Box::new(move |event| reporter.handle_progress(&event)));

    let results = runner
        .run(&mut transport, &suite, &selection, &mut sinks)
        .await
        .context("Run aborted")?;

    let writer = ReportWriter::new(config.log_dir.clone());
    match writer.write_json(&RunReport::new(config.bot_username.clone(), results.clone())) {
        Ok(path) => {
            if verbosity != Verbosity::Quiet {
                println!("{}", format!("Report written: {}", path.display()).dimmed());
            }
        }
        Err(e) => warn!(error = %e, "failed to write report"),
    }

    reporter.print_summary(&results);
    reporter.print_failures(&results);

    if !results.all_passed() {
        std::process::exit(1);
    }
    Ok(())
}

fn list_command(config_path: &Path, args: ListArgs) -> Result<()> {
    let mut config = BotcheckConfig::load(config_path)
        .with_context(|| format!("Failed to load {}", config_path.display()))?;
    if let Some(file) = args.file {
        config.scenario_file = file;
    }

    let suite = load_suite(&config)?;
    println!("{}\n", "Available scenarios:".bold());
    for scenario in suite.scenarios() {
        println!(
            "  {}  {}",
            scenario.name().cyan(),
            format!("{} steps", scenario.len()).dimmed()
        );
    }
    if suite.is_empty() {
        println!("  {}", "No scenarios found".yellow());
    }
    println!(
        "\n  {}",
        format!(
            "Total: {} scenario{}",
            suite.len(),
            if suite.len() == 1 { "" } else { "s" }
        )
        .dimmed()
    );
    Ok(())
}

async fn login_command() -> Result<()> {
    let telegram = TelegramConfig::from_env().context("Telegram credentials are not configured")?;
    let session = telegram.session_file.clone();
    match botcheck_telegram::login(&telegram, &mut StdinPrompt)
        .await
        .context("Login failed")?
    {
        LoginOutcome::AlreadyAuthorized => {
            println!("{} {}", "✓".green(), "Session is already authorized".bold());
        }
        LoginOutcome::SignedIn { user_id } => {
            println!(
                "{} {}",
                "✓".green(),
                format!("Signed in as user {user_id}").bold()
            );
        }
    }
    println!("{}", format!("Session file: {}", session.display()).dimmed());
    Ok(())
}

fn load_suite(config: &BotcheckConfig) -> Result<ScenarioSuite> {
    load_csv(&config.scenario_file, &config.columns, &config.markers)
        .with_context(|| format!("Failed to load scenarios from {}", config.scenario_file.display()))
}
