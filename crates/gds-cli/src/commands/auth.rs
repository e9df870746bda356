//! Auth command - browser authorization flow
//!
//! Provides the `gds auth` CLI command which:
//! 1. Builds the OAuth session from the config document
//! 2. Prints the authorization URL for the user to open manually
//! 3. Serves the single callback request and persists the tokens

use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use gds_core::store::ConfigStore;
use gds_drive::auth::{CallbackListener, DriveSession};

use crate::output;

#[derive(Debug, Args)]
pub struct AuthCommand {}

impl AuthCommand {
    pub async fn execute(&self, store: ConfigStore) -> Result<()> {
        run_authorization(store).await
    }
}

/// Runs the full authorization flow: one listener, one callback, tokens
/// persisted. Also the fallback for `gds upload` on a fresh setup.
pub async fn run_authorization(store: ConfigStore) -> Result<()> {
    let config = store.read().await?;
    let port = config.port()?;

    let session = Arc::new(DriveSession::connect(store).await?);
    let url = session.authorize_url();

    output::info(&format!(
        "Waiting for the callback on http://localhost:{port}"
    ));
    println!("Open this URL in your browser to authorize access:");
    println!("{}", url.blue().underline());

    CallbackListener::listen(port, session).await?;
    output::success("Authorization complete, tokens saved");
    Ok(())
}
