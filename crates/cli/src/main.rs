//! mailproof CLI - Main Entry Point
//!
//! Generates localized emails from a project bundle and verifies HTML
//! documents with scripted browser scenarios.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use mailproof_common::Config;

use mailproof_cli::commands::{self, check, generate, preview, scenario, Context};
use mailproof_cli::output::{self, OutputFormat};

/// mailproof - localized email generation and browser verification
#[derive(Parser)]
#[command(name = "mailproof")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, env = "MAILPROOF_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Store directory holding the database
    #[arg(long, env = "MAILPROOF_STORE", global = true)]
    store: Option<PathBuf>,

    /// Static-serving root for screenshots
    #[arg(long, global = true)]
    static_root: Option<PathBuf>,

    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: OutputFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render every resolvable (template, locale) pair and record it
    Generate(generate::GenerateArgs),

    /// Capture or delete a template preview
    Preview(preview::PreviewArgs),

    /// Run inline checks on generated emails
    Check(check::CheckArgs),

    /// Run and inspect verification scenarios
    #[command(subcommand)]
    Scenario(scenario::ScenarioCommands),

    /// Check that the browser driver can be started
    Doctor,

    /// Write the effective configuration to the config file
    InitConfig,

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| mailproof_common::default_store_path().join("config.toml"));
    let mut config = Config::load(&config_path)?;
    tracing::debug!("Using configuration {}", config_path.display());
    if let Some(store) = cli.store {
        config.store_path = store;
    }
    if let Some(root) = cli.static_root {
        config.static_root = root;
    }

    let ctx = Context::new(config, cli.format);

    match cli.command {
        Commands::Generate(args) => generate::execute(args, &ctx).await?,
        Commands::Preview(args) => preview::execute(args, &ctx).await?,
        Commands::Check(args) => check::execute(args, &ctx).await?,
        Commands::Scenario(cmd) => scenario::execute(cmd, &ctx).await?,
        Commands::Doctor => commands::doctor(&ctx)?,
        Commands::InitConfig => {
            ctx.config.save(&config_path)?;
            output::print_success(&format!("Configuration written to {}", config_path.display()));
        }
        Commands::Version => {
            println!("mailproof v{}", mailproof_common::VERSION);
            println!("Localized email generation and browser verification");
        }
    }

    Ok(())
}
