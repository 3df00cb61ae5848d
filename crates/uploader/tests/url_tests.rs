mod common;

use cidfan_core::ErrorKind;
use cidfan_uploader::{NodeUploader, PinningAuth, PinningUploader, Uploader};
use common::can_bind_localhost;
use httpmock::Method::{GET, POST};
use httpmock::MockServer;

const CID: &str = "bafkreihdwdcefgh4dqkjv67uzcmw7ojee6xedzdetojuzjevtenxquvyku";

#[tokio::test]
async fn url_download_is_forwarded_with_its_name() {
    if !can_bind_localhost() {
        eprintln!("Skipping httpmock tests: cannot bind to localhost");
        return;
    }

    let origin = MockServer::start();
    let download = origin.mock(|when, then| {
        when.method(GET).path("/files/report.pdf");
        then.status(200).body("%PDF-1.7");
    });

    let node = MockServer::start();
    let add = node.mock(|when, then| {
        when.method(POST)
            .path("/api/v0/add")
            .body_contains("filename=\"report.pdf\"")
            .body_contains("%PDF-1.7");
        then.status(200)
            .body(format!("{{\"Name\":\"report.pdf\",\"Hash\":\"{CID}\",\"Size\":\"8\"}}\n"));
    });

    let uploader = NodeUploader::new("node", &node.base_url(), reqwest::Client::new()).unwrap();
    let result = uploader.url(&origin.url("/files/report.pdf")).await;

    download.assert();
    add.assert();
    assert_eq!(result.cid, CID);
}

#[tokio::test]
async fn url_download_status_is_surfaced() {
    if !can_bind_localhost() {
        eprintln!("Skipping httpmock tests: cannot bind to localhost");
        return;
    }

    let origin = MockServer::start();
    origin.mock(|when, then| {
        when.method(GET).path("/gone");
        then.status(404).body("not here");
    });

    let node = MockServer::start();
    let add = node.mock(|when, then| {
        when.method(POST).path("/api/v0/add");
        then.status(200).body("");
    });

    let uploader = NodeUploader::new("node", &node.base_url(), reqwest::Client::new()).unwrap();
    let result = uploader.url(&origin.url("/gone")).await;

    assert!(!result.success);
    assert!(result.error.unwrap().contains("404"));
    add.assert_hits(0);
}

#[tokio::test]
async fn malformed_url_makes_no_request() {
    if !can_bind_localhost() {
        eprintln!("Skipping httpmock tests: cannot bind to localhost");
        return;
    }

    let node = MockServer::start();
    let add = node.mock(|when, then| {
        when.method(POST).path("/api/v0/add");
        then.status(200).body("");
    });

    let uploader = NodeUploader::new("node", &node.base_url(), reqwest::Client::new()).unwrap();
    for raw in ["not a url", "ftp://example.com/file", "http://"] {
        let result = uploader.url(raw).await;
        assert!(!result.success, "{raw} should fail");
        assert_eq!(result.error_kind, Some(ErrorKind::Input));
    }
    add.assert_hits(0);
}

#[tokio::test]
async fn malformed_url_never_reaches_pinning_service() {
    if !can_bind_localhost() {
        eprintln!("Skipping httpmock tests: cannot bind to localhost");
        return;
    }

    let service = MockServer::start();
    let pin = service.mock(|when, then| {
        when.method(POST).path("/pinning/pinFileToIPFS");
        then.status(200).body(format!("{{\"IpfsHash\":\"{CID}\"}}"));
    });

    let uploader = PinningUploader::new(
        "pinata",
        &service.base_url(),
        PinningAuth::Jwt("pin-jwt".to_string()),
        reqwest::Client::new(),
    )
    .unwrap();
    for raw in ["not a url", "file:///etc/passwd", "https://"] {
        let result = uploader.url(raw).await;
        assert!(!result.success, "{raw} should fail");
        assert!(result.cid.is_empty());
        assert_eq!(result.error_kind, Some(ErrorKind::Input));
    }
    pin.assert_hits(0);
}
