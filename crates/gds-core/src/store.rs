//! JSON-file-backed config store.
//!
//! Every mutation goes through whole-document read-modify-write: the writer
//! reads the current document, applies a pure transform, and writes the full
//! document back. Writes go to a temporary file in the same directory and
//! are renamed into place, so a crash mid-write leaves the previous document
//! intact. There is no locking; the tool is single-user and invoked serially.

use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::{debug, instrument};

use crate::config::{self, AppConfig};
use crate::GdsError;

/// Access path for the configuration document.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    /// Store backed by the document at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store backed by the default document location,
    /// `<documents>/gds-app/app-config.json`.
    pub fn default_location() -> Self {
        Self::new(config::config_path())
    }

    /// Path of the backing document.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the current document.
    ///
    /// Materializes the file as an empty document (`{}`) if it does not
    /// exist yet; empty content is treated the same way.
    ///
    /// # Errors
    ///
    /// [`GdsError::ConfigInvalid`] when the document exists but cannot be
    /// parsed; I/O errors are propagated with context.
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub async fn read(&self) -> anyhow::Result<AppConfig> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!("config document missing, materializing empty document");
                self.write_document("{}").await?;
                String::new()
            }
            Err(err) => {
                return Err(err).with_context(|| {
                    format!("failed to read config document {}", self.path.display())
                })
            }
        };

        let content = if content.trim().is_empty() {
            "{}"
        } else {
            content.as_str()
        };

        let config: AppConfig = serde_json::from_str(content).map_err(|err| {
            GdsError::ConfigInvalid(format!(
                "config document {} is not valid JSON: {err}",
                self.path.display()
            ))
        })?;
        Ok(config)
    }

    /// Apply a pure transform to the document and persist the result.
    ///
    /// Returns the document as written.
    #[instrument(skip(self, transform), fields(path = %self.path.display()))]
    pub async fn update<F>(&self, transform: F) -> anyhow::Result<AppConfig>
    where
        F: FnOnce(AppConfig) -> AppConfig,
    {
        let current = self.read().await?;
        let next = transform(current);

        let serialized =
            serde_json::to_string_pretty(&next).context("failed to serialize config document")?;
        self.write_document(&serialized).await?;

        debug!("config document updated");
        Ok(next)
    }

    /// Write the full document, temp file + rename.
    async fn write_document(&self, content: &str) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await.with_context(|| {
                format!("failed to create config directory {}", parent.display())
            })?;
        }

        // Temp file in the same directory so the rename stays on one filesystem.
        let tmp_path = {
            let mut p = self.path.as_os_str().to_owned();
            p.push(".tmp");
            PathBuf::from(p)
        };

        tokio::fs::write(&tmp_path, content)
            .await
            .with_context(|| format!("failed to write {}", tmp_path.display()))?;
        tokio::fs::rename(&tmp_path, &self.path)
            .await
            .context("failed to move config document into place")?;
        Ok(())
    }
}
