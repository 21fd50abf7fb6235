//! CLI module for ClawTalk
//!
//! Provides:
//! - `init`: writes a starter `.env` with the variables the gateway reads
//! - `doctor`: runs the ownership doctor against the current Talks/host config
//! - `serve`: starts the gateway (default when no subcommand is given)

use clap::{Parser, Subcommand};

pub mod doctor;
pub mod init;

pub const ENV_FILE_PATH: &str = ".env";

#[derive(Parser, Debug)]
#[command(name = "clawtalk")]
#[command(about = "Conversation-gateway plugin between Slack and a local LLM host")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write a starter .env file
    Init,
    /// Check for Slack channel ownership conflicts with the host config
    Doctor,
    /// Start the gateway (default)
    Serve,
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Some(Commands::Init) => init::run().await,
        Some(Commands::Doctor) => doctor::run().await,
        Some(Commands::Serve) | None => crate::server::run().await,
    }
}
