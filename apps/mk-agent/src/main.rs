mod config;
mod logging;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use config::{AppConfig, CliOverrides};
use mk_registration::{
    FileBaselineStore, HttpTransport, Registration, RegistrationError, RegistrationManager,
};
use std::path::PathBuf;
use std::sync::Arc;

/// Microkernel agent - registers this node with its provisioning server
#[derive(Parser)]
#[command(name = "mk-agent")]
#[command(about = "Microkernel agent - registers this node with its provisioning server")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Registration endpoint (overrides config)
    #[arg(long)]
    uri: Option<String>,

    /// Baseline facts file (overrides config)
    #[arg(long)]
    baseline: Option<PathBuf>,

    /// Print effective configuration (YAML) and exit
    #[arg(long)]
    print_config: bool,

    /// Log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Register unconditionally
    Register {
        /// State label reported to the server
        #[arg(long)]
        state: String,
    },
    /// Register only when facts changed since the last accepted registration
    RegisterIfChanged {
        /// State label reported to the server
        #[arg(long)]
        state: String,
    },
    /// Print the collected facts as JSON
    Facts,
    /// Validate configuration and exit
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(path) = &cli.config
        && !path.is_file()
    {
        anyhow::bail!("config file does not exist: {}", path.display());
    }

    // defaults -> YAML -> env (MK_AGENT__*) -> CLI
    let mut config = AppConfig::load(cli.config.as_deref())?;
    config.apply_cli_overrides(&CliOverrides {
        uri: cli.uri,
        baseline: cli.baseline,
    });
    config.validate()?;

    let _log_guard = logging::init(&config.logging, cli.verbose)?;

    if cli.print_config {
        print!("{}", config.to_yaml()?);
        return Ok(());
    }

    let Some(command) = cli.command else {
        anyhow::bail!("no command given; run with --help for usage");
    };

    match command {
        Commands::Check => {
            tracing::info!(uri = %config.registration.uri, "Configuration is valid");
            println!("Configuration is valid");
            Ok(())
        }
        Commands::Facts => {
            let manager = build_manager(&config)?;
            let facts = manager.collect_facts().await?;
            println!("{}", serde_json::to_string_pretty(&facts)?);
            Ok(())
        }
        Commands::Register { state } => {
            let manager = build_manager(&config)?;
            let registration = manager
                .register_unconditionally(&state)
                .await
                .map_err(report)?;
            print_registration(&registration);
            Ok(())
        }
        Commands::RegisterIfChanged { state } => {
            let manager = build_manager(&config)?;
            match manager.register_if_changed(&state).await.map_err(report)? {
                Some(registration) => print_registration(&registration),
                None => println!("Facts unchanged; registration skipped"),
            }
            Ok(())
        }
    }
}

fn build_manager(config: &AppConfig) -> Result<RegistrationManager> {
    let transport =
        HttpTransport::new(&config.registration).context("failed to build HTTP transport")?;

    let manager = RegistrationManager::new(
        config.registration.clone(),
        Arc::new(mk_facts::default_fact_source()),
        Arc::new(FileBaselineStore::new(&config.baseline.path)),
        Arc::new(transport),
    )?;
    Ok(manager)
}

fn report(err: RegistrationError) -> anyhow::Error {
    tracing::error!(
        error = %err,
        status = err.status(),
        retryable = err.is_retryable(),
        "Registration failed"
    );
    anyhow::Error::new(err).context("registration failed")
}

fn print_registration(registration: &Registration) {
    println!(
        "Registered {} (status {}, {} facts)",
        registration.identity, registration.status, registration.fact_count
    );
    if !registration.body.is_empty() {
        println!("{}", registration.body);
    }
}
