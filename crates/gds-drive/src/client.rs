//! Google Drive API client
//!
//! Provides a typed HTTP client for the Drive v3 API. Handles bearer
//! authentication and endpoint construction for both API surfaces: the
//! metadata base URL and the separate upload base URL resumable sessions
//! are opened against.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use gds_drive::client::DriveClient;
//! use reqwest::Method;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let client = DriveClient::new("access-token-here");
//! let response = client.request(Method::GET, "/about?fields=user").send().await?;
//! # Ok(())
//! # }
//! ```

use reqwest::{Client, Method, RequestBuilder};
use serde::Deserialize;

/// Base URL for Drive v3 metadata operations
const DRIVE_BASE_URL: &str = "https://www.googleapis.com/drive/v3";

/// Base URL for Drive v3 upload operations (resumable sessions)
const DRIVE_UPLOAD_BASE_URL: &str = "https://www.googleapis.com/upload/drive/v3";

// ============================================================================
// Drive API response types
// ============================================================================

/// A Drive file resource as returned by upload and metadata calls
///
/// `id` defaults to empty when the response omits it, so callers can treat
/// "no identifier" as a failed upload rather than a parse error.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    /// Drive file id
    #[serde(default)]
    pub id: String,
    /// File name
    pub name: Option<String>,
    /// MIME type reported by Drive
    pub mime_type: Option<String>,
}

// ============================================================================
// DriveClient
// ============================================================================

/// HTTP client for Google Drive API calls
///
/// Wraps `reqwest::Client` with authentication headers and base URL
/// construction for the two Drive API surfaces (metadata and upload).
pub struct DriveClient {
    /// The underlying HTTP client
    client: Client,
    /// Base URL for metadata requests
    base_url: String,
    /// Base URL for upload requests
    upload_base_url: String,
    /// Current OAuth2 access token
    access_token: String,
}

impl DriveClient {
    /// Creates a new DriveClient with the given access token
    ///
    /// # Arguments
    /// * `access_token` - A valid OAuth2 access token for the Drive API
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: DRIVE_BASE_URL.to_string(),
            upload_base_url: DRIVE_UPLOAD_BASE_URL.to_string(),
            access_token: access_token.into(),
        }
    }

    /// Creates a new DriveClient with custom base URLs (useful for testing)
    ///
    /// # Arguments
    /// * `access_token` - A valid OAuth2 access token
    /// * `base_url` - Custom base URL for metadata requests
    /// * `upload_base_url` - Custom base URL for upload requests
    pub fn with_base_urls(
        access_token: impl Into<String>,
        base_url: impl Into<String>,
        upload_base_url: impl Into<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            upload_base_url: upload_base_url.into(),
            access_token: access_token.into(),
        }
    }

    /// Returns a reference to the current access token
    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    /// Creates an authenticated request builder against the metadata base URL
    ///
    /// Automatically prepends the base URL and adds the Authorization header.
    ///
    /// # Arguments
    /// * `method` - HTTP method (GET, POST, PATCH, etc.)
    /// * `path` - API path relative to the base URL (e.g., "/files/abc123")
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        self.client
            .request(method, &url)
            .bearer_auth(&self.access_token)
    }

    /// Creates an authenticated request builder against the upload base URL
    ///
    /// Resumable upload sessions are opened under `/upload/drive/v3`, a
    /// different URL prefix than metadata calls.
    ///
    /// # Arguments
    /// * `method` - HTTP method
    /// * `path` - API path relative to the upload base URL
    pub fn upload_request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.upload_base_url, path);
        self.client
            .request(method, &url)
            .bearer_auth(&self.access_token)
    }

    /// Returns a reference to the underlying HTTP client
    ///
    /// Useful for upload operations that target absolute session URLs
    /// rather than paths relative to a base URL.
    pub(crate) fn http_client(&self) -> &Client {
        &self.client
    }
}
