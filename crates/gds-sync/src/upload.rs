//! Resumable upload of the archive to Drive.
//!
//! The engine decides between creating a new Drive file and replacing the
//! one recorded in the config, runs the chunked session upload with byte
//! progress, and records the resulting file id so the next run replaces the
//! remote file instead of adding a sibling.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use gds_core::progress::{percent, ProgressSink};
use gds_core::store::ConfigStore;
use gds_core::GdsError;
use gds_drive::client::DriveClient;
use gds_drive::upload::{create_session, replace_session, upload_file};
use tracing::{info, instrument};

/// Uploads archives through resumable Drive sessions and keeps the config
/// document's remote file link current.
pub struct UploadEngine {
    store: ConfigStore,
    client: DriveClient,
}

impl UploadEngine {
    pub fn new(store: ConfigStore, client: DriveClient) -> Self {
        Self { store, client }
    }

    /// Pushes the archive at `archive` into the configured Drive folder.
    ///
    /// Creates a new remote file when the config carries no file id and
    /// replaces the recorded file otherwise. On success the returned id has
    /// already been written back to the config document.
    #[instrument(skip_all, fields(archive = %archive.display()))]
    pub async fn upload_archive(
        &self,
        archive: &Path,
        sink: Arc<dyn ProgressSink>,
    ) -> Result<String> {
        let total = tokio::fs::metadata(archive)
            .await
            .with_context(|| format!("Archive file does not exist: {}", archive.display()))?
            .len();
        let config = self.store.read().await?;
        let folder = config.folder()?;
        let name = folder.archive_file_name();

        let session_url = match &folder.drive_file_id {
            Some(file_id) => {
                info!(%file_id, "Replacing existing Drive file");
                replace_session(&self.client, file_id, &name, total)
                    .await
                    .map_err(upload_failed)?
            }
            None => {
                info!(folder_id = %folder.drive_folder_id, "Creating new Drive file");
                create_session(&self.client, &name, &folder.drive_folder_id, total)
                    .await
                    .map_err(upload_failed)?
            }
        };

        sink.start();
        let progress_sink = Arc::clone(&sink);
        let progress: Box<dyn Fn(u64, u64) + Send> = Box::new(move |sent, expected| {
            progress_sink.progress(percent(sent, expected));
        });
        let uploaded = upload_file(&self.client, &session_url, archive, total, Some(progress))
            .await
            .map_err(upload_failed)?;
        if uploaded.id.is_empty() {
            return Err(GdsError::UploadFailed(
                "Drive response did not include a file id".into(),
            )
            .into());
        }

        // Record the link before reporting completion; the next run must
        // replace this file, not create a sibling.
        let file_id = uploaded.id.clone();
        self.store
            .update(move |mut config| {
                config.sync_folder.drive_file_id = Some(file_id);
                config
            })
            .await?;
        sink.done();

        info!(file_id = %uploaded.id, "Upload complete");
        Ok(uploaded.id)
    }
}

/// Wraps transport and protocol failures in the upload error category, with
/// the full cause chain flattened into the message.
fn upload_failed(err: anyhow::Error) -> GdsError {
    GdsError::UploadFailed(format!("{err:#}"))
}
