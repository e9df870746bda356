//! Configuration document for gds.
//!
//! The whole of the tool's durable state lives in a single JSON document,
//! `app-config.json`, kept under the user's documents directory. The structs
//! here map that document one-to-one (camelCase on disk) and default every
//! field so that a freshly materialized empty document (`{}`) parses cleanly;
//! required-field validation happens in the accessors that need the fields.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::tokens::TokenSet;
use crate::GdsError;

/// Directory under the user's documents root holding all application state.
pub const APP_DIR_NAME: &str = "gds-app";

/// File name of the configuration document inside the application directory.
pub const CONFIG_FILE_NAME: &str = "app-config.json";

/// Scratch directory the sync source is copied into before archiving.
pub const STAGING_DIR_NAME: &str = "copied-data";

/// Directory name pruned from the staged copy before archiving.
pub const DEFAULT_EXCLUDE_MARKER: &str = "node_modules";

// ---------------------------------------------------------------------------
// Document model
// ---------------------------------------------------------------------------

/// Top-level configuration document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppConfig {
    pub general: GeneralConfig,
    pub sync_folder: SyncFolderConfig,
    pub google_auth: GoogleAuthConfig,
}

/// General settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GeneralConfig {
    /// TCP port for the local OAuth callback listener. Also substituted for
    /// the `$PORT` placeholder in the redirect URI template. 0 means unset.
    pub port: u16,
}

/// The folder being backed up and its remote linkage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SyncFolderConfig {
    /// Absolute path of the local source folder.
    pub path: String,
    /// Folder name; also names the produced archive (`<name>.tar`).
    pub name: String,
    /// Drive folder the archive is uploaded into.
    pub drive_folder_id: String,
    /// Drive file id of the last-uploaded archive. `None` until the first
    /// successful upload, or after an explicit link reset; `None` makes the
    /// next upload create a new remote file instead of replacing one.
    pub drive_file_id: Option<String>,
}

/// OAuth client registration and token state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GoogleAuthConfig {
    /// Permission scopes requested at authorization time, in order.
    pub scopes: Vec<String>,
    /// Static client registration, provided out-of-band.
    pub credentials: OAuthCredentials,
    /// Stored token record. Non-`None` is the authentication predicate.
    pub tokens: Option<TokenSet>,
}

/// Static OAuth client registration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OAuthCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub project_id: String,
    /// Redirect URI templates; the first entry is used, with the literal
    /// `$PORT` replaced by `general.port`.
    pub redirect_uris: Vec<String>,
}

// ---------------------------------------------------------------------------
// Derived paths
// ---------------------------------------------------------------------------

/// Application working directory: `<documents>/gds-app`.
///
/// Falls back to the current directory when the platform has no documents
/// directory (headless CI, unusual setups).
pub fn work_dir() -> PathBuf {
    dirs::document_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
}

/// Default location of the configuration document.
pub fn config_path() -> PathBuf {
    work_dir().join(CONFIG_FILE_NAME)
}

// ---------------------------------------------------------------------------
// Accessors with validation
// ---------------------------------------------------------------------------

impl AppConfig {
    /// Whether the user has completed authorization at least once.
    ///
    /// A stored token record may still be expired; refresh is handled
    /// transparently when the session is used.
    pub fn is_authenticated(&self) -> bool {
        self.google_auth.tokens.is_some()
    }

    /// The callback listener port, validated to be set.
    pub fn port(&self) -> Result<u16, GdsError> {
        if self.general.port == 0 {
            return Err(GdsError::ConfigInvalid("general.port is not set".into()));
        }
        Ok(self.general.port)
    }

    /// The OAuth client registration, validated for the fields the
    /// authorization flow needs.
    pub fn credentials(&self) -> Result<&OAuthCredentials, GdsError> {
        let creds = &self.google_auth.credentials;
        if creds.client_id.is_empty() {
            return Err(GdsError::ConfigInvalid(
                "googleAuth.credentials.clientId is empty".into(),
            ));
        }
        if creds.client_secret.is_empty() {
            return Err(GdsError::ConfigInvalid(
                "googleAuth.credentials.clientSecret is empty".into(),
            ));
        }
        if creds.redirect_uris.is_empty() {
            return Err(GdsError::ConfigInvalid(
                "googleAuth.credentials.redirectUris is empty".into(),
            ));
        }
        Ok(creds)
    }

    /// The sync folder mapping, validated for the fields the pipeline needs.
    pub fn folder(&self) -> Result<&SyncFolderConfig, GdsError> {
        let folder = &self.sync_folder;
        if folder.path.is_empty() {
            return Err(GdsError::ConfigInvalid("syncFolder.path is empty".into()));
        }
        if folder.name.is_empty() {
            return Err(GdsError::ConfigInvalid("syncFolder.name is empty".into()));
        }
        if folder.drive_folder_id.is_empty() {
            return Err(GdsError::ConfigInvalid(
                "syncFolder.driveFolderId is empty".into(),
            ));
        }
        Ok(folder)
    }
}

impl SyncFolderConfig {
    /// File name of the archive produced from this folder.
    pub fn archive_file_name(&self) -> String {
        format!("{}.tar", self.name)
    }

    /// Web link to the Drive folder the archive lands in.
    pub fn drive_folder_url(&self) -> String {
        format!(
            "https://drive.google.com/drive/folders/{}",
            self.drive_folder_id
        )
    }
}

impl OAuthCredentials {
    /// Concrete redirect URI: the first template with `$PORT` substituted.
    pub fn redirect_uri(&self, port: u16) -> Result<String, GdsError> {
        let template = self.redirect_uris.first().ok_or_else(|| {
            GdsError::ConfigInvalid("googleAuth.credentials.redirectUris is empty".into())
        })?;
        Ok(template.replace("$PORT", &port.to_string()))
    }
}
