//! Upload operations for the Google Drive API
//!
//! Archives are pushed through Drive v3 resumable upload sessions:
//! - [`create_session`] - opens a session that creates a new file under a
//!   parent folder
//! - [`replace_session`] - opens a session that replaces the content (and
//!   name) of an existing file
//! - [`upload_chunk`] - uploads a single `Content-Range` chunk within a
//!   session
//! - [`upload_file`] - whole-archive chunk loop with byte progress
//!
//! ## Google Drive API references
//!
//! - [Resumable uploads](https://developers.google.com/drive/api/guides/manage-uploads#resumable)

use std::path::Path;

use anyhow::{Context, Result};
use reqwest::Method;
use tracing::{debug, info};

use crate::client::{DriveClient, DriveFile};

/// Chunk size for resumable uploads: 10 MiB (10,485,760 bytes)
///
/// Google requires chunk sizes that are multiples of 256 KiB.
/// 10 MiB = 10,485,760 = 256 KiB * 40, which satisfies this requirement.
const CHUNK_SIZE: usize = 10 * 1024 * 1024;

// ============================================================================
// Session creation
// ============================================================================

/// Opens a resumable upload session that creates a new file
///
/// Uses `POST /files?uploadType=resumable` against the upload base URL with
/// the file metadata (`name` and parent folder) as the JSON body. The session
/// URI arrives in the `Location` response header.
///
/// # Arguments
/// * `client` - The authenticated DriveClient
/// * `name` - File name to create
/// * `folder_id` - Drive folder the file is created under
/// * `total` - Total upload size in bytes
///
/// # Returns
/// The upload session URL as a `String`
///
/// # Errors
/// Returns an error if the session request fails or the response carries no
/// `Location` header
pub async fn create_session(
    client: &DriveClient,
    name: &str,
    folder_id: &str,
    total: u64,
) -> Result<String> {
    debug!("Creating upload session for new file: {}", name);

    let metadata = serde_json::json!({
        "name": name,
        "parents": [folder_id],
    });

    let response = client
        .upload_request(Method::POST, "/files?uploadType=resumable")
        .header("X-Upload-Content-Length", total.to_string())
        .json(&metadata)
        .send()
        .await
        .context("Failed to create upload session")?;

    session_url_from(response).await
}

/// Opens a resumable upload session that replaces an existing file
///
/// Uses `PATCH /files/{id}?uploadType=resumable` with the new `name` as
/// metadata; the uploaded bytes replace the file's content in place and the
/// file keeps its identifier.
///
/// # Arguments
/// * `client` - The authenticated DriveClient
/// * `file_id` - Identifier of the file being replaced
/// * `name` - File name to set
/// * `total` - Total upload size in bytes
///
/// # Returns
/// The upload session URL as a `String`
pub async fn replace_session(
    client: &DriveClient,
    file_id: &str,
    name: &str,
    total: u64,
) -> Result<String> {
    debug!("Creating upload session to replace file: {}", file_id);

    let metadata = serde_json::json!({ "name": name });
    let path = format!("/files/{file_id}?uploadType=resumable");

    let response = client
        .upload_request(Method::PATCH, &path)
        .header("X-Upload-Content-Length", total.to_string())
        .json(&metadata)
        .send()
        .await
        .context("Failed to create replace session")?;

    session_url_from(response).await
}

/// Extracts the session URI from a session-creation response
async fn session_url_from(response: reqwest::Response) -> Result<String> {
    let status = response.status();
    if !status.is_success() {
        let error_body = response
            .text()
            .await
            .unwrap_or_else(|_| "unable to read error body".to_string());
        anyhow::bail!(
            "Upload session request failed with status {}: {}",
            status,
            error_body
        );
    }

    let location = response
        .headers()
        .get("Location")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .context("Upload session response carried no Location header")?;

    debug!("Upload session ready: {}", location);
    Ok(location)
}

// ============================================================================
// Chunk upload
// ============================================================================

/// Formats the `Content-Range` header value for one chunk
fn content_range(offset: u64, chunk_len: u64, total: u64) -> String {
    format!("bytes {}-{}/{}", offset, offset + chunk_len - 1, total)
}

/// Uploads a single chunk of data to a resumable upload session
///
/// Sends a PUT request to the session URL with a `Content-Range` header
/// specifying the byte range being uploaded. Drive answers `308 Resume
/// Incomplete` for intermediate chunks and `200`/`201` with the final file
/// resource once the last byte lands.
///
/// # Arguments
/// * `client` - An HTTP client (the raw reqwest client, not the DriveClient,
///   because session URLs are absolute and don't need the base URL)
/// * `session_url` - The upload session URL from [`create_session`] or
///   [`replace_session`]
/// * `access_token` - Bearer token for authentication
/// * `data` - The chunk bytes to upload
/// * `offset` - Byte offset of this chunk within the total file
/// * `total` - Total file size in bytes
///
/// # Returns
/// - `Some(DriveFile)` with the completed file resource on the final chunk
/// - `None` for intermediate chunks (HTTP 308)
///
/// # Errors
/// Returns an error if the chunk upload fails
pub async fn upload_chunk(
    client: &reqwest::Client,
    session_url: &str,
    access_token: &str,
    data: &[u8],
    offset: u64,
    total: u64,
) -> Result<Option<DriveFile>> {
    let chunk_len = data.len() as u64;
    let range = content_range(offset, chunk_len, total);

    debug!("Uploading chunk: {} ({} bytes)", range, chunk_len);

    let response = client
        .put(session_url)
        .bearer_auth(access_token)
        .header("Content-Length", chunk_len.to_string())
        .header("Content-Range", &range)
        .body(data.to_vec())
        .send()
        .await
        .context("Failed to send chunk upload request")?;

    let status = response.status();

    if status.as_u16() == 308 {
        // Intermediate chunk accepted, session continues
        debug!("Chunk accepted (status {})", status);
        return Ok(None);
    }

    if status.is_success() {
        let file: DriveFile = response
            .json()
            .await
            .context("Failed to parse final upload response")?;
        debug!("Upload session completed (status {})", status);
        return Ok(Some(file));
    }

    let error_body = response
        .text()
        .await
        .unwrap_or_else(|_| "unable to read error body".to_string());
    anyhow::bail!("Chunk upload failed with status {}: {}", status, error_body);
}

// ============================================================================
// Whole-file upload
// ============================================================================

/// Uploads an archive file through an open session in 10 MiB chunks
///
/// Reads the archive sequentially from disk, uploads each chunk via
/// [`upload_chunk`], and reports progress after every chunk through the
/// optional callback.
///
/// # Arguments
/// * `client` - The authenticated DriveClient
/// * `session_url` - An open session URL
/// * `archive` - Path of the file to upload
/// * `total` - Total file size in bytes; must match the session's declared
///   length
/// * `progress` - Optional callback `(bytes_sent, total_bytes)` called after
///   each chunk
///
/// # Returns
/// The final file resource returned by Drive
///
/// # Errors
/// Returns an error if any chunk fails or the session ends without a final
/// file resource
pub async fn upload_file(
    client: &DriveClient,
    session_url: &str,
    archive: &Path,
    total: u64,
    progress: Option<Box<dyn Fn(u64, u64) + Send>>,
) -> Result<DriveFile> {
    use tokio::io::AsyncReadExt;

    info!(
        "Starting resumable upload: {} ({} bytes, {} chunks)",
        archive.display(),
        total,
        (total + CHUNK_SIZE as u64 - 1) / CHUNK_SIZE as u64
    );

    let mut file = tokio::fs::File::open(archive)
        .await
        .with_context(|| format!("Failed to open archive {}", archive.display()))?;

    let http_client = client.http_client();
    let access_token = client.access_token();
    let mut offset: u64 = 0;
    let mut final_resource: Option<DriveFile> = None;

    while offset < total {
        let chunk_len = std::cmp::min(CHUNK_SIZE as u64, total - offset) as usize;
        let mut chunk = vec![0u8; chunk_len];
        file.read_exact(&mut chunk)
            .await
            .with_context(|| format!("Failed to read archive at offset {}", offset))?;

        let result = upload_chunk(http_client, session_url, access_token, &chunk, offset, total)
            .await
            .with_context(|| format!("Failed to upload chunk at offset {}/{}", offset, total))?;

        offset += chunk_len as u64;

        if let Some(ref cb) = progress {
            cb(offset, total);
        }

        if let Some(resource) = result {
            final_resource = Some(resource);
        }
    }

    let resource = final_resource
        .context("Upload session completed without returning a file resource")?;

    info!(
        "Resumable upload completed: id={}, name={:?}",
        resource.id, resource.name
    );
    Ok(resource)
}

// ============================================================================
// Tests
// ============================================================================
