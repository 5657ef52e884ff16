//! Conveyor CLI - Main Entry Point

use clap::{Parser, Subcommand};
use conveyor_common::{ConveyorApi, HttpConveyorApi};
use conveyor_cli::commands::plan;
use conveyor_cli::output::{self, print_success};
use conveyor_cli::Overrides;
use std::path::PathBuf;

/// Conveyor CLI - clone and migrate plans
#[derive(Parser)]
#[command(name = "conveyor")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Backend API endpoint
    #[arg(long, env = "CONVEYOR_BACKEND_URL", global = true)]
    endpoint: Option<String>,

    /// Backend auth token
    #[arg(long, env = "CONVEYOR_BACKEND_TOKEN", global = true, hide_env_values = true)]
    token: Option<String>,

    /// Config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: output::OutputFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage plans
    #[command(subcommand)]
    Plan(plan::PlanCommands),

    /// Check that the backend answers
    Status,

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = conveyor_cli::load_config(&Overrides {
        config: cli.config.clone(),
        endpoint: cli.endpoint.clone(),
        token: cli.token.clone(),
    })?;

    match cli.command {
        Commands::Plan(cmd) => {
            let api = HttpConveyorApi::new(&config.backend)?;
            plan::execute(cmd, &api, &config, cli.format).await?;
        }
        Commands::Status => {
            let api = HttpConveyorApi::new(&config.backend)?;
            match api.availability_zone_list().await {
                Ok(zones) => print_success(&format!(
                    "Backend is reachable at {} ({} zones)",
                    api.endpoint(),
                    zones.len()
                )),
                Err(e) => {
                    output::print_warning(&format!(
                        "Backend is not responding at {}: {}",
                        api.endpoint(),
                        e
                    ));
                    std::process::exit(1);
                }
            }
        }
        Commands::Version => {
            println!("Conveyor CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("Backend: {}", config.backend.endpoint);
        }
    }

    Ok(())
}
