//! bucketwatchd — the bucketwatch daemon.
//!
//! Single binary that assembles all bucketwatch subsystems:
//! - State store (redb)
//! - Object lister (Cloud Storage JSON API or local directory)
//! - Pub/Sub publisher
//! - Periodic watch scheduler
//! - REST API + notification proxy
//!
//! # Usage
//!
//! ```text
//! bucketwatchd serve --config /etc/bucketwatch.toml --port 8080
//! bucketwatchd run --config /etc/bucketwatch.toml --watch watch-1
//! bucketwatchd validate-config --config /etc/bucketwatch.toml
//! ```

mod serve;
mod wiring;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use bucketwatch_core::DaemonConfig;

const DEFAULT_LOG_FILTER: &str = "info,bucketwatchd=debug,bucketwatch=debug";

#[derive(Parser)]
#[command(name = "bucketwatchd", about = "Bucket change watcher daemon")]
struct Cli {
    /// Path to the TOML configuration file. Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the API and run every watch on the configured schedule.
    Serve {
        /// Port to listen on (overrides `server.port`).
        #[arg(long)]
        port: Option<u16>,

        /// Data directory for persistent state (overrides `server.data_dir`).
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },

    /// Run change detection once for one watch and print the report.
    Run {
        /// Watch id.
        #[arg(long)]
        watch: String,

        /// Data directory for persistent state (overrides `server.data_dir`).
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },

    /// Parse and validate the configuration file.
    ValidateConfig,
}

fn init_tracing(json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<DaemonConfig> {
    match path {
        Some(path) => DaemonConfig::from_file(path),
        None => {
            let config = DaemonConfig::default();
            config.validate()?;
            Ok(config)
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let mut config = load_config(cli.config.as_ref())?;

    match cli.command {
        Command::Serve { port, data_dir } => {
            if let Some(port) = port {
                config.server.port = port;
            }
            if let Some(data_dir) = data_dir {
                config.server.data_dir = data_dir;
            }
            serve::run_server(config).await
        }
        Command::Run { watch, data_dir } => {
            if let Some(data_dir) = data_dir {
                config.server.data_dir = data_dir;
            }
            run_once(config, &watch).await
        }
        Command::ValidateConfig => {
            let rendered = config.to_toml_string()?;
            info!("configuration is valid");
            println!("{rendered}");
            Ok(())
        }
    }
}

async fn run_once(config: DaemonConfig, watch_id: &str) -> anyhow::Result<()> {
    let components = wiring::assemble(&config)?;
    let report = components
        .scheduler
        .run_watch(watch_id)
        .await
        .with_context(|| format!("running watch {watch_id}"))?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
