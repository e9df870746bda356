//! gds Drive - Google Drive API adapter
//!
//! Provides async access to everything gds needs from Google:
//! - OAuth2 authorization code flow against Google's endpoints, with token
//!   refresh persisted through the config store before use
//! - A single-shot local HTTP listener for the OAuth redirect
//! - Resumable (chunked) uploads to the Drive v3 API
//!
//! ## Modules
//!
//! - [`auth`] - OAuth session manager and single-shot callback listener
//! - [`client`] - Google Drive API HTTP client
//! - [`upload`] - Resumable upload session operations

pub mod auth;
pub mod client;
pub mod upload;
