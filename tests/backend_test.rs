//! End-to-end exercise of `Backend` against a mocked Graph endpoint, wiring
//! together resolution, the pipeline, and folder creation the way a real
//! embedding application would.

use std::collections::HashMap;
use std::sync::Arc;

use onedrive_backend::error::Error;
use onedrive_backend::resolver::FixedDrivePath;
use onedrive_backend::token::StaticTokenProvider;
use onedrive_backend::{Backend, Config};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_bytes, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config(root_url: &str) -> Config {
    config_with(root_url, &[])
}

fn config_with(root_url: &str, extra: &[(&str, &str)]) -> Config {
    let mut map = HashMap::new();
    map.insert("auth-id".to_owned(), "user-1".to_owned());
    map.insert("root-url".to_owned(), root_url.to_owned());
    for (k, v) in extra {
        map.insert((*k).to_owned(), (*v).to_owned());
    }
    let mut cfg = Config::from_map(&map).unwrap();
    cfg.timeouts.short = std::time::Duration::from_secs(5);
    cfg
}

fn backend(server: &MockServer, cfg: Config) -> Backend {
    Backend::new(
        cfg,
        Arc::new(StaticTokenProvider::new("token")),
        Box::new(FixedDrivePath {
            api_version: format!("{}/v1.0", server.uri()),
            drive_path: "/me/drive".to_owned(),
        }),
        reqwest::Client::new(),
    )
}

#[tokio::test]
async fn list_follows_pagination_through_the_backend() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1.0/me/drive/root:/backup:/children"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "value": [{"id": "1", "name": "a.txt", "file": {}}],
            "@odata.nextLink": format!("{}/page2", server.uri()),
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/page2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "value": [{"id": "2", "name": "b.txt", "file": {}}],
        })))
        .mount(&server)
        .await;

    let backend = backend(&server, config("https://example.test/backup"));

    let items = backend.list(&CancellationToken::new()).await.unwrap();
    let names: Vec<_> = items.into_iter().filter_map(|i| i.name).collect();
    assert_eq!(names, vec!["a.txt", "b.txt"]);
}

#[tokio::test]
async fn list_missing_root_reports_folder_missing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1.0/me/drive/root:/backup:/children"))
        .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
            "error": {"code": "itemNotFound", "message": "missing"}
        })))
        .mount(&server)
        .await;

    let backend = backend(&server, config("https://example.test/backup"));
    let err = backend.list(&CancellationToken::new()).await.unwrap_err();
    assert!(matches!(err, Error::FolderMissing { path } if path == "/backup"));
}

#[tokio::test]
async fn create_folder_path_walks_each_segment() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1.0/me/drive/root:/backup"))
        .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
            "error": {"code": "itemNotFound", "message": "missing"}
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1.0/me/drive/root/children"))
        .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
            "id": "ROOT-BACKUP", "name": "backup", "folder": {}
        })))
        .mount(&server)
        .await;

    let backend = backend(&server, config("https://example.test/backup"));

    let id = backend.create_folder_path(&CancellationToken::new()).await.unwrap();
    assert_eq!(id.as_deref(), Some("ROOT-BACKUP"));
}

#[tokio::test]
async fn quota_reports_none_when_all_zero() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1.0/me/drive"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "drive-1",
            "quota": {"total": 0, "used": 0, "remaining": 0},
        })))
        .mount(&server)
        .await;

    let backend = backend(&server, config("https://example.test/backup"));

    assert!(backend.quota(&CancellationToken::new()).await.unwrap().is_none());
}

#[tokio::test]
async fn get_missing_file_reports_file_missing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1.0/me/drive/root:/backup/gone.txt:/content"))
        .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
            "error": {"code": "itemNotFound", "message": "missing"}
        })))
        .mount(&server)
        .await;

    let backend = backend(&server, config("https://example.test/backup"));
    let mut sink = Vec::new();
    let err = backend.get("gone.txt", &mut sink, &CancellationToken::new()).await.unwrap_err();
    assert!(matches!(err, Error::FileMissing { name } if name == "gone.txt"));
}

#[tokio::test]
async fn test_is_idempotent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1.0/me/drive/root:/backup"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "ROOT-BACKUP", "name": "backup", "folder": {}
        })))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/v1.0/me/drive/root:/backup/.backend-test-probe:/content"))
        .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
            "id": "PROBE", "name": ".backend-test-probe", "size": 2, "file": {}
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1.0/me/drive/root:/backup/.backend-test-probe:/content"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"ok".to_vec()))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/v1.0/me/drive/root:/backup/.backend-test-probe"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let backend = backend(&server, config("https://example.test/backup"));
    backend.test(&CancellationToken::new()).await.unwrap();
    backend.test(&CancellationToken::new()).await.unwrap();
}

#[tokio::test]
async fn round_trip_small_put_get() {
    let server = MockServer::start().await;
    let data = b"hello world".to_vec();
    Mock::given(method("PUT"))
        .and(path("/v1.0/me/drive/root:/backup/greeting.txt:/content"))
        .and(body_bytes(data.clone()))
        .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
            "id": "SMALL1", "name": "greeting.txt", "size": data.len(), "file": {}
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1.0/me/drive/root:/backup/greeting.txt:/content"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(data.clone()))
        .mount(&server)
        .await;

    let backend = backend(&server, config("https://example.test/backup"));
    let cancel = CancellationToken::new();

    let mut source = std::io::Cursor::new(data.clone());
    backend.put("greeting.txt", &mut source, data.len() as u64, &cancel).await.unwrap();

    let mut sink = Vec::new();
    backend.get("greeting.txt", &mut sink, &cancel).await.unwrap();
    assert_eq!(sink, data);
}

#[tokio::test]
async fn round_trip_chunked_put_get() {
    let server = MockServer::start().await;
    // fragment-size "4000000" clamps down to 3_932_160 (12 * 320 KiB); a
    // 4_000_000-byte file is split into two fragments.
    let data: Vec<u8> = (0..4_000_000u32).map(|i| (i % 251) as u8).collect();

    Mock::given(method("POST"))
        .and(path("/v1.0/me/drive/root:/backup/big.bin:/createUploadSession"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "uploadUrl": format!("{}/upload/chunked-roundtrip", server.uri()),
        })))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/upload/chunked-roundtrip"))
        .and(wiremock::matchers::header("Content-Range", "bytes 0-3932159/4000000"))
        .and(body_bytes(data[0..3_932_160].to_vec()))
        .respond_with(ResponseTemplate::new(202).set_body_json(serde_json::json!({"nextExpectedRanges": ["3932160-"]})))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/upload/chunked-roundtrip"))
        .and(wiremock::matchers::header("Content-Range", "bytes 3932160-3999999/4000000"))
        .and(body_bytes(data[3_932_160..].to_vec()))
        .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
            "id": "BIG1", "name": "big.bin", "size": data.len(), "file": {}
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1.0/me/drive/root:/backup/big.bin:/content"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(data.clone()))
        .mount(&server)
        .await;

    let backend = backend(
        &server,
        config_with("https://example.test/backup", &[("fragment-size", "4000000")]),
    );
    let cancel = CancellationToken::new();

    let mut source = std::io::Cursor::new(data.clone());
    backend.put("big.bin", &mut source, data.len() as u64, &cancel).await.unwrap();

    let mut sink = Vec::new();
    backend.get("big.bin", &mut sink, &cancel).await.unwrap();
    assert_eq!(sink, data);
}
