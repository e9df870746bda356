//! gds - Back up a local folder to Google Drive
//!
//! Provides commands for:
//! - Archiving the configured folder and uploading it to Drive
//! - Authorizing the tool against the user's Drive account

use anyhow::Result;
use clap::{Parser, Subcommand};
use gds_core::store::ConfigStore;
use tracing_subscriber::EnvFilter;

mod commands;
mod output;
mod progress;

use commands::{auth::AuthCommand, upload::UploadCommand};

#[derive(Debug, Parser)]
#[command(name = "gds", version, about = "Folder backup to Google Drive")]
pub struct Cli {
    /// Verbose output (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Archive the configured folder and upload it to Drive
    Upload(UploadCommand),
    /// Run the browser authorization flow
    Auth(AuthCommand),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Setup tracing
    let filter = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();

    let store = ConfigStore::default_location();
    let result: Result<()> = match cli.command {
        Commands::Upload(cmd) => cmd.execute(store).await,
        Commands::Auth(cmd) => cmd.execute(store).await,
    };

    if let Err(err) = result {
        output::error(&format!("{err:#}"));
        std::process::exit(1);
    }
}
