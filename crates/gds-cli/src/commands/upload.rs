//! Upload command - run the backup pipeline
//!
//! Provides the `gds upload` CLI command which:
//! 1. Optionally clears the remote file link (`--new`)
//! 2. Falls back to the authorization flow on a fresh setup
//! 3. Obtains a live access token and runs stage, prune, archive, upload
//! 4. Prints the Drive folder link on success

use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use gds_core::store::ConfigStore;
use gds_drive::auth::DriveSession;
use gds_drive::client::DriveClient;
use gds_sync::engine::{PipelineHooks, SyncOutcome, SyncPipeline};
use tracing::info;

use crate::commands::auth;
use crate::output;
use crate::progress::PhaseBar;

#[derive(Debug, Args)]
pub struct UploadCommand {
    /// Create a new Drive file instead of replacing the previous upload
    #[arg(short, long)]
    pub new: bool,
}

impl UploadCommand {
    pub async fn execute(&self, store: ConfigStore) -> Result<()> {
        // Step 1: Clear the link before anything else runs, so even an
        // unauthenticated invocation forgets it.
        if self.new {
            store
                .update(|mut config| {
                    config.sync_folder.drive_file_id = None;
                    config
                })
                .await?;
            info!("Drive file link cleared");
        }

        // Step 2: Fresh setups go through authorization instead of the pipeline.
        let config = store.read().await?;
        if !config.is_authenticated() {
            output::warn("Not authenticated yet; starting the authorization flow");
            return auth::run_authorization(store).await;
        }
        let folder_url = config.folder()?.drive_folder_url();

        // Step 3: Get a live access token and wire up the pipeline.
        let session = DriveSession::connect(store.clone()).await?;
        let access_token = session.access_token().await?;
        let client = DriveClient::new(access_token);
        let pipeline = SyncPipeline::new(store, client);

        let hooks = PipelineHooks {
            archive_progress: Arc::new(PhaseBar::new("Archiving")),
            upload_progress: Arc::new(PhaseBar::new("Uploading")),
        };

        // Step 4: Run and report.
        match pipeline.run(hooks).await? {
            SyncOutcome::Completed { file_id } => {
                info!(%file_id, "Backup finished");
                output::success("Backup uploaded to Drive");
                println!("{}", folder_url.blue().underline());
            }
            SyncOutcome::EmptySource => {
                output::warn("Source folder is empty; nothing was uploaded");
            }
        }
        Ok(())
    }
}
