mod common;

use cidfan_core::ErrorKind;
use cidfan_core::input::{DirectoryEntry, DirectoryInput, FileInput};
use cidfan_uploader::{PinningAuth, PinningUploader, Uploader};
use common::can_bind_localhost;
use httpmock::Method::{GET, POST};
use httpmock::MockServer;
use serde_json::json;

const CID: &str = "bafybeihdwdcefgh4dqkjv67uzcmw7ojee6xedzdetojuzjevtenxquvyku";

fn jwt(server: &MockServer) -> PinningUploader {
    PinningUploader::new(
        "pinata",
        &server.base_url(),
        PinningAuth::Jwt("pin-jwt".to_string()),
        reqwest::Client::new(),
    )
    .unwrap()
}

#[tokio::test]
async fn pinning_file_with_jwt() {
    if !can_bind_localhost() {
        eprintln!("Skipping httpmock tests: cannot bind to localhost");
        return;
    }

    let server = MockServer::start();
    let pin = server.mock(|when, then| {
        when.method(POST)
            .path("/pinning/pinFileToIPFS")
            .header("authorization", "Bearer pin-jwt")
            .body_contains("name=\"pinataOptions\"")
            .body_contains(r#"{"cidVersion":1}"#)
            .body_contains(r#"{"name":"photo.png"}"#)
            .body_contains("filename=\"photo.png\"");
        then.status(200).json_body(json!({
            "IpfsHash": CID,
            "PinSize": 42,
            "Timestamp": "2024-01-01T00:00:00Z"
        }));
    });

    let result = jwt(&server)
        .file(FileInput::memory("photo.png", vec![1u8, 2, 3]))
        .await
        .unwrap();

    pin.assert();
    assert!(result.success);
    assert_eq!(result.cid, CID);
}

#[tokio::test]
async fn pinning_api_key_headers() {
    if !can_bind_localhost() {
        eprintln!("Skipping httpmock tests: cannot bind to localhost");
        return;
    }

    let server = MockServer::start();
    let pin = server.mock(|when, then| {
        when.method(POST)
            .path("/pinning/pinFileToIPFS")
            .header("pinata_api_key", "key-1")
            .header("pinata_secret_api_key", "secret-1")
            .body_contains("filename=\"text.txt\"");
        then.status(200).json_body(json!({ "IpfsHash": CID }));
    });

    let uploader = PinningUploader::new(
        "pinata",
        &server.base_url(),
        PinningAuth::ApiKey {
            key: "key-1".to_string(),
            secret: "secret-1".to_string(),
        },
        reqwest::Client::new(),
    )
    .unwrap();

    let result = uploader.text("hello pinning").await;
    pin.assert();
    assert_eq!(result.cid, CID);
}

#[tokio::test]
async fn pinning_directory_nests_under_directory_name() {
    if !can_bind_localhost() {
        eprintln!("Skipping httpmock tests: cannot bind to localhost");
        return;
    }

    let server = MockServer::start();
    let pin = server.mock(|when, then| {
        when.method(POST)
            .path("/pinning/pinFileToIPFS")
            .body_contains("filename=\"site/index.html\"")
            .body_contains("filename=\"site/css/main.css\"")
            .body_contains(r#"{"name":"site"}"#);
        then.status(200).json_body(json!({ "IpfsHash": CID }));
    });

    let input = DirectoryInput::files(vec![
        DirectoryEntry::new("index.html", "<html/>"),
        DirectoryEntry::new("css/main.css", "body{}"),
    ]);
    let result = jwt(&server)
        .with_directory_name("site")
        .directory(input)
        .await
        .unwrap();

    pin.assert();
    assert!(result.success);
}

#[tokio::test]
async fn pinning_named_directory_overrides_default() {
    if !can_bind_localhost() {
        eprintln!("Skipping httpmock tests: cannot bind to localhost");
        return;
    }

    let server = MockServer::start();
    let pin = server.mock(|when, then| {
        when.method(POST)
            .path("/pinning/pinFileToIPFS")
            .body_contains("filename=\"release/a.txt\"");
        then.status(200).json_body(json!({ "IpfsHash": CID }));
    });

    let input = DirectoryInput::files(vec![DirectoryEntry::new("a.txt", "a")]).with_name("release");
    let result = jwt(&server).directory(input).await.unwrap();
    pin.assert();
    assert!(result.success);
}

#[tokio::test]
async fn pinning_rejection_is_backend_failure() {
    if !can_bind_localhost() {
        eprintln!("Skipping httpmock tests: cannot bind to localhost");
        return;
    }

    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/pinning/pinFileToIPFS");
        then.status(401).json_body(json!({ "error": "invalid credentials" }));
    });

    let result = jwt(&server).json(&json!({ "k": "v" })).await;
    assert!(!result.success);
    assert_eq!(result.error_kind, Some(ErrorKind::Backend));
    assert!(result.error.unwrap().contains("invalid credentials"));
}

#[tokio::test]
async fn pinning_response_without_hash_fails() {
    if !can_bind_localhost() {
        eprintln!("Skipping httpmock tests: cannot bind to localhost");
        return;
    }

    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/pinning/pinFileToIPFS");
        then.status(200).json_body(json!({ "ok": true }));
    });

    let result = jwt(&server).text("x").await;
    assert!(!result.success);
    assert_eq!(result.error_kind, Some(ErrorKind::Backend));
}

#[tokio::test]
async fn pinning_health_check_tests_authentication() {
    if !can_bind_localhost() {
        eprintln!("Skipping httpmock tests: cannot bind to localhost");
        return;
    }

    let server = MockServer::start();
    let auth = server.mock(|when, then| {
        when.method(GET)
            .path("/data/testAuthentication")
            .header("authorization", "Bearer pin-jwt");
        then.status(200)
            .json_body(json!({"message": "Congratulations! You are communicating with the Pinata API!"}));
    });
    jwt(&server).health_check().await.unwrap();
    auth.assert();

    let rejected = MockServer::start();
    rejected.mock(|when, then| {
        when.method(GET).path("/data/testAuthentication");
        then.status(401).body("invalid key");
    });
    let err = jwt(&rejected).health_check().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Backend);
}
