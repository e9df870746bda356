//! Pipeline orchestration.
//!
//! [`SyncPipeline`] runs the backup stages in order against the folder named
//! in the config document. All intermediate artifacts (the staged copy, the
//! tar file) live next to the config document and are left in place after a
//! run for inspection.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use gds_core::config::{DEFAULT_EXCLUDE_MARKER, STAGING_DIR_NAME};
use gds_core::progress::{NullProgress, ProgressSink};
use gds_core::store::ConfigStore;
use gds_drive::client::DriveClient;
use tracing::{info, instrument};

use crate::archive::build_archive;
use crate::stage::{prune_marker_dirs, stage_source};
use crate::upload::UploadEngine;

/// Progress receivers for the pipeline's long-running phases.
pub struct PipelineHooks {
    pub archive_progress: Arc<dyn ProgressSink>,
    pub upload_progress: Arc<dyn ProgressSink>,
}

impl Default for PipelineHooks {
    fn default() -> Self {
        Self {
            archive_progress: Arc::new(NullProgress),
            upload_progress: Arc::new(NullProgress),
        }
    }
}

/// How a pipeline run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The archive is on Drive under the given file id.
    Completed { file_id: String },
    /// The source folder held no files; nothing was archived or uploaded.
    EmptySource,
}

/// Runs the full backup pipeline: stage, prune, archive, upload.
pub struct SyncPipeline {
    store: ConfigStore,
    uploader: UploadEngine,
}

impl SyncPipeline {
    pub fn new(store: ConfigStore, client: DriveClient) -> Self {
        let uploader = UploadEngine::new(store.clone(), client);
        Self { store, uploader }
    }

    /// Executes one backup run end to end.
    #[instrument(skip_all)]
    pub async fn run(&self, hooks: PipelineHooks) -> Result<SyncOutcome> {
        let config = self.store.read().await?;
        let folder = config.folder()?;
        let work_dir = self
            .store
            .path()
            .parent()
            .context("Config document has no parent directory")?;
        let staging = work_dir.join(STAGING_DIR_NAME);
        let archive_path = work_dir.join(folder.archive_file_name());

        stage_source(Path::new(&folder.path), &staging).await?;
        prune_marker_dirs(&staging, DEFAULT_EXCLUDE_MARKER).await?;

        if build_archive(&staging, &archive_path, hooks.archive_progress)
            .await?
            .is_none()
        {
            info!("Source folder is empty, nothing to upload");
            return Ok(SyncOutcome::EmptySource);
        }

        let file_id = self
            .uploader
            .upload_archive(&archive_path, hooks.upload_progress)
            .await?;
        Ok(SyncOutcome::Completed { file_id })
    }

    /// Forgets the recorded Drive file id so the next run creates a fresh
    /// remote file instead of replacing the old one.
    pub async fn reset_link(&self) -> Result<()> {
        self.store
            .update(|mut config| {
                config.sync_folder.drive_file_id = None;
                config
            })
            .await?;
        info!("Drive file link reset, next upload creates a new file");
        Ok(())
    }
}
