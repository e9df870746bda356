//! Integration tests for Drive resumable uploads
//!
//! Drives session creation and the chunk-upload loop against a wiremock
//! Drive API.

use std::sync::{Arc, Mutex};

use gds_drive::client::DriveClient;
use gds_drive::upload;
use tempfile::TempDir;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const CHUNK: u64 = 10 * 1024 * 1024;

fn upload_client(server: &MockServer) -> DriveClient {
    DriveClient::with_base_urls("test-access-token", server.uri(), server.uri())
}

/// Records `(bytes_sent, total)` progress reports from the upload loop.
fn recording_progress() -> (Arc<Mutex<Vec<(u64, u64)>>>, Box<dyn Fn(u64, u64) + Send>) {
    let reports: Arc<Mutex<Vec<(u64, u64)>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&reports);
    let callback = Box::new(move |sent: u64, total: u64| {
        sink.lock().unwrap().push((sent, total));
    });
    (reports, callback)
}

#[tokio::test]
async fn test_create_session_posts_metadata_and_returns_location() {
    let server = MockServer::start().await;
    let session_url = format!("{}/upload-session/abc", server.uri());

    Mock::given(method("POST"))
        .and(path("/files"))
        .and(query_param("uploadType", "resumable"))
        .and(header("Authorization", "Bearer test-access-token"))
        .and(header("X-Upload-Content-Length", "2048"))
        .and(body_json(serde_json::json!({
            "name": "site.tar",
            "parents": ["folder-test-001"]
        })))
        .respond_with(ResponseTemplate::new(200).append_header("Location", session_url.as_str()))
        .expect(1)
        .mount(&server)
        .await;

    let client = upload_client(&server);
    let url = upload::create_session(&client, "site.tar", "folder-test-001", 2048)
        .await
        .expect("create_session failed");

    assert_eq!(url, session_url);
}

#[tokio::test]
async fn test_replace_session_patches_existing_file() {
    let server = MockServer::start().await;
    let session_url = format!("{}/upload-session/replace-1", server.uri());

    Mock::given(method("PATCH"))
        .and(path("/files/file-9"))
        .and(query_param("uploadType", "resumable"))
        .and(header("X-Upload-Content-Length", "1024"))
        .and(body_json(serde_json::json!({ "name": "site.tar" })))
        .respond_with(ResponseTemplate::new(200).append_header("Location", session_url.as_str()))
        .expect(1)
        .mount(&server)
        .await;

    let client = upload_client(&server);
    let url = upload::replace_session(&client, "file-9", "site.tar", 1024)
        .await
        .expect("replace_session failed");

    assert_eq!(url, session_url);
}

#[tokio::test]
async fn test_session_without_location_header_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/files"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let client = upload_client(&server);
    let err = upload::create_session(&client, "site.tar", "folder-test-001", 64)
        .await
        .unwrap_err();

    assert!(err.to_string().contains("Location"));
}

#[tokio::test]
async fn test_session_error_status_includes_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/files"))
        .respond_with(ResponseTemplate::new(403).set_body_string("rate limited"))
        .mount(&server)
        .await;

    let client = upload_client(&server);
    let err = upload::create_session(&client, "site.tar", "folder-test-001", 64)
        .await
        .unwrap_err();

    let msg = err.to_string();
    assert!(msg.contains("403"));
    assert!(msg.contains("rate limited"));
}

#[tokio::test]
async fn test_upload_file_single_chunk() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let archive = dir.path().join("site.tar");
    std::fs::write(&archive, vec![7u8; 1024]).unwrap();

    Mock::given(method("PUT"))
        .and(path("/upload-session/abc"))
        .and(header("Content-Range", "bytes 0-1023/1024"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "file-new-1",
            "name": "site.tar",
            "mimeType": "application/x-tar"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = upload_client(&server);
    let session_url = format!("{}/upload-session/abc", server.uri());
    let (reports, progress) = recording_progress();

    let file = upload::upload_file(&client, &session_url, &archive, 1024, Some(progress))
        .await
        .expect("upload failed");

    assert_eq!(file.id, "file-new-1");
    assert_eq!(file.name.as_deref(), Some("site.tar"));
    assert_eq!(*reports.lock().unwrap(), vec![(1024, 1024)]);
}

#[tokio::test]
async fn test_upload_file_chunks_large_archives() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let total = CHUNK + 1024;
    let archive = dir.path().join("site.tar");
    std::fs::write(&archive, vec![0u8; total as usize]).unwrap();

    // First chunk is acknowledged with 308 Resume Incomplete
    Mock::given(method("PUT"))
        .and(path("/upload-session/big"))
        .and(header(
            "Content-Range",
            format!("bytes 0-{}/{}", CHUNK - 1, total),
        ))
        .respond_with(ResponseTemplate::new(308))
        .expect(1)
        .mount(&server)
        .await;

    // Final chunk completes the session
    Mock::given(method("PUT"))
        .and(path("/upload-session/big"))
        .and(header(
            "Content-Range",
            format!("bytes {}-{}/{}", CHUNK, total - 1, total),
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "file-big",
            "name": "site.tar"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = upload_client(&server);
    let session_url = format!("{}/upload-session/big", server.uri());
    let (reports, progress) = recording_progress();

    let file = upload::upload_file(&client, &session_url, &archive, total, Some(progress))
        .await
        .expect("upload failed");

    assert_eq!(file.id, "file-big");
    assert_eq!(
        *reports.lock().unwrap(),
        vec![(CHUNK, total), (total, total)]
    );
}

#[tokio::test]
async fn test_upload_chunk_intermediate_returns_none() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/upload-session/mid"))
        .and(header("Content-Range", "bytes 0-2/10"))
        .respond_with(ResponseTemplate::new(308))
        .mount(&server)
        .await;

    let client = reqwest::Client::new();
    let session_url = format!("{}/upload-session/mid", server.uri());
    let result = upload::upload_chunk(&client, &session_url, "tok", &[1, 2, 3], 0, 10)
        .await
        .expect("chunk upload failed");

    assert!(result.is_none());
}

#[tokio::test]
async fn test_upload_chunk_failure_includes_status_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/upload-session/bad"))
        .respond_with(ResponseTemplate::new(500).set_body_string("backend exploded"))
        .mount(&server)
        .await;

    let client = reqwest::Client::new();
    let session_url = format!("{}/upload-session/bad", server.uri());
    let err = upload::upload_chunk(&client, &session_url, "tok", &[1, 2, 3], 0, 3)
        .await
        .unwrap_err();

    let msg = err.to_string();
    assert!(msg.contains("500"));
    assert!(msg.contains("backend exploded"));
}

#[tokio::test]
async fn test_completed_upload_without_id_yields_empty_id() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/upload-session/no-id"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .mount(&server)
        .await;

    let client = reqwest::Client::new();
    let session_url = format!("{}/upload-session/no-id", server.uri());
    let result = upload::upload_chunk(&client, &session_url, "tok", &[9], 0, 1)
        .await
        .expect("chunk upload failed");

    let file = result.expect("final chunk should produce a resource");
    assert!(file.id.is_empty());
}
