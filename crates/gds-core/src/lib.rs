//! gds Core - Domain types and configuration store
//!
//! This crate contains the durable state model and the capabilities shared by
//! the adapter crates:
//! - **Config document** - `AppConfig`, the single JSON document holding the
//!   callback port, folder linkage, and OAuth credentials/tokens
//! - **Config store** - whole-document read-modify-write persistence
//! - **Token set** - stored OAuth tokens with the field-preserving merge rule
//! - **Progress sink** - start/progress/done capability the engines report
//!   through without depending on any presentation layer
//!
//! ## Modules
//!
//! - [`config`] - document model and derived filesystem paths
//! - [`store`] - JSON-file-backed config store
//! - [`tokens`] - token record, merge, expiry checks
//! - [`progress`] - progress sink trait and the shared percent formula

pub mod config;
pub mod progress;
pub mod store;
pub mod tokens;

use thiserror::Error;

/// Failures with a defined meaning across the whole application
#[derive(Debug, Error)]
pub enum GdsError {
    /// Required configuration fields are missing or malformed
    #[error("Invalid config: {0}")]
    ConfigInvalid(String),

    /// The authorization code exchange was rejected
    #[error("Authorization exchange failed: {0}")]
    AuthExchangeFailed(String),

    /// The upload response lacked a success status or a file identifier
    #[error("Upload failed: {0}")]
    UploadFailed(String),
}
