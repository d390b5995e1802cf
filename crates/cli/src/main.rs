//! Administrative CLI for the Tessera retention subsystem.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use std::path::PathBuf;
use tessera_cleanup::CleanupRunner;
use tessera_core::config::AppConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "tesseractl")]
#[command(about = "Administrative CLI for the Tessera retention subsystem")]
#[command(version)]
struct Cli {
    /// Config file path
    #[arg(long, env = "TESSERA_CONFIG", default_value = "tessera.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Cleanup commands
    Cleanup {
        #[command(subcommand)]
        command: CleanupCommands,
    },
}

#[derive(Subcommand)]
enum CleanupCommands {
    /// Execute one cleanup run and print its result as JSON
    Run {
        /// Lock holder identity to record (defaults to a generated one)
        #[arg(long)]
        holder: Option<String>,
    },
    /// Print recent cleanup audit records as JSON, newest first
    History {
        /// Maximum number of records
        #[arg(long, default_value_t = 10)]
        limit: u32,
    },
}

fn load_config(path: &PathBuf) -> Result<AppConfig> {
    let mut figment = Figment::new();
    if path.exists() {
        figment = figment.merge(Toml::file(path));
    } else {
        tracing::debug!(path = %path.display(), "no config file found, using environment only");
    }

    let config: AppConfig = figment
        .merge(Env::prefixed("TESSERA_").split("__"))
        .extract()
        .context("failed to load configuration")?;
    config.validate().map_err(anyhow::Error::msg)?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Cleanup { command } => match command {
            CleanupCommands::Run { holder } => {
                let metadata = tessera_metadata::from_config(&config.metadata)
                    .await
                    .context("failed to open metadata store")?;
                let storage = tessera_storage::from_config(&config.storage)
                    .await
                    .context("failed to initialize blob store")?;

                let mut runner = CleanupRunner::new(metadata, storage, config.cleanup);
                if let Some(holder) = holder {
                    runner = runner.with_holder(holder);
                }

                match runner.execute().await {
                    Ok(result) => {
                        println!("{}", serde_json::to_string_pretty(&result)?);
                        if !result.success {
                            tracing::warn!(
                                errors = result.errors.len(),
                                "cleanup run completed with errors"
                            );
                            std::process::exit(1);
                        }
                    }
                    Err(e) if e.is_lock_held() => {
                        // Expected when runs overlap; not a failure.
                        tracing::info!("{e}, skipping this run");
                    }
                    Err(e) => return Err(e).context("cleanup run aborted"),
                }
            }
            CleanupCommands::History { limit } => {
                let metadata = tessera_metadata::from_config(&config.metadata)
                    .await
                    .context("failed to open metadata store")?;
                let records = metadata.list_recent_audit_records(limit).await?;
                println!("{}", serde_json::to_string_pretty(&records)?);
            }
        },
    }

    Ok(())
}
