//! ClawTalk — conversation-gateway plugin
//!
//! CLI entry point: wires logging, loads `.env`, and dispatches to the
//! requested subcommand.

#![forbid(unsafe_code)]

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod cli;
mod server;

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    let data_dir = dirs::data_local_dir()
        .or_else(dirs::home_dir)
        .map(|p| p.join(".clawtalk"))
        .unwrap_or_else(|| std::path::PathBuf::from(".clawtalk"));
    let _ = std::fs::create_dir_all(&data_dir);

    let (non_blocking, _guard) = tracing_appender::non_blocking(std::io::stderr());

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "clawtalk=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(non_blocking))
        .init();

    let cli = cli::Cli::parse();

    let skip_startup_log = matches!(&cli.command, Some(cli::Commands::Init));
    if cli.command.is_some() && !skip_startup_log {
        info!("Starting ClawTalk v{}", env!("CARGO_PKG_VERSION"));
        if !std::path::Path::new(cli::ENV_FILE_PATH).exists() {
            warn!(".env file not found. Run 'clawtalk init' to create one.");
        }
    }

    cli::run(cli).await
}
