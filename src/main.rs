use std::path::PathBuf;

use clap::{Parser, Subcommand};

use lineage_hub::config::{load_config, validate_config, ConfigError, HubConfig};
use lineage_hub::lifecycle::{self, Role};
use lineage_hub::observability::logging::init_logging;

#[derive(Parser)]
#[command(name = "lineage-hub")]
#[command(about = "Multi-tenant lineage and telemetry ingestion hub", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file. Defaults apply when omitted.
    #[arg(short, long, env = "LINEAGE_HUB_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP ingestion gateway
    Gateway,
    /// Forward lineage events from the durable log to the lineage service
    LineageConsumer,
    /// Batch spans and metrics from the durable log into ClickHouse
    TelemetryConsumer,
    /// Run the gateway and both consumers in one process
    All,
}

impl From<Commands> for Role {
    fn from(command: Commands) -> Self {
        match command {
            Commands::Gateway => Role::Gateway,
            Commands::LineageConsumer => Role::LineageConsumer,
            Commands::TelemetryConsumer => Role::TelemetryConsumer,
            Commands::All => Role::All,
        }
    }
}

fn load(path: Option<&PathBuf>) -> Result<HubConfig, ConfigError> {
    match path {
        Some(path) => load_config(path),
        None => {
            let config = HubConfig::default();
            validate_config(&config).map_err(ConfigError::Validation)?;
            Ok(config)
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load(cli.config.as_ref())?;

    init_logging(&config.observability);

    tracing::info!(
        version = %config.service.version,
        config = ?cli.config,
        bind_address = %config.service.bind_address,
        log_backend = ?config.log.backend,
        "lineage-hub starting"
    );

    lifecycle::run(config, cli.command.into()).await?;
    Ok(())
}
