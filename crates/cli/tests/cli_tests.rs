#![allow(deprecated)] // cargo_bin is deprecated but still functional

use assert_cmd::Command;
use cidfan_core::car::{decode_header, read_sections};
use cidfan_core::input::DirectoryEntry;
use cidfan_core::{EncoderConfig, pack};
use httpmock::Method::POST;
use httpmock::MockServer;
use predicates::str::contains;
use std::fs;
use std::net::TcpListener;
use tempfile::TempDir;

const CID: &str = "bafkreibm6jg3ux5qumhcn2b3flc3tyu6dmlb4xa7u5bf44yegnrjhc4yeq";

fn can_bind_localhost() -> bool {
    TcpListener::bind("127.0.0.1:0").is_ok()
}

fn cidfan(config: &std::path::Path) -> Command {
    let mut cmd = Command::cargo_bin("cidfan").unwrap();
    cmd.env_remove("CIDFAN_CONFIG")
        .env("RUST_LOG", "warn")
        .arg("--config")
        .arg(config);
    cmd
}

fn site(temp: &TempDir) -> std::path::PathBuf {
    let root = temp.path().join("site");
    fs::create_dir_all(root.join("docs")).unwrap();
    fs::write(root.join("readme.txt"), "hello").unwrap();
    fs::write(root.join("docs/guide.md"), "# guide").unwrap();
    root
}

fn site_entries() -> Vec<DirectoryEntry> {
    vec![
        DirectoryEntry::new("docs/guide.md", "# guide"),
        DirectoryEntry::new("readme.txt", "hello"),
    ]
}

#[tokio::test]
async fn car_prints_root_of_directory() {
    let temp = TempDir::new().unwrap();
    let dir = site(&temp);
    let expected = pack(site_entries(), EncoderConfig::default()).await.unwrap();

    cidfan(&temp.path().join("none.toml"))
        .arg("car")
        .arg(&dir)
        .assert()
        .success()
        .stdout(format!("{}\n", expected.root));
}

#[tokio::test]
async fn car_output_matches_buffered_archive() {
    let temp = TempDir::new().unwrap();
    let dir = site(&temp);
    let out = temp.path().join("site.car");
    let expected = pack(site_entries(), EncoderConfig::default()).await.unwrap();

    cidfan(&temp.path().join("none.toml"))
        .arg("car")
        .arg(&dir)
        .arg("-o")
        .arg(&out)
        .assert()
        .success()
        .stdout(contains(expected.root.to_string()));

    let written = fs::read(&out).unwrap();
    let (roots, _) = decode_header(&written).unwrap();
    assert_eq!(roots, vec![expected.root]);
    assert_eq!(written, expected.bytes.to_vec());
    assert!(!read_sections(&written).unwrap().is_empty());
}

#[test]
fn car_missing_directory_fails() {
    let temp = TempDir::new().unwrap();
    cidfan(&temp.path().join("none.toml"))
        .arg("car")
        .arg(temp.path().join("absent"))
        .assert()
        .failure()
        .stderr(contains("absent"));
}

#[test]
fn pins_prints_wrapper_for_wrapped_add() {
    let temp = TempDir::new().unwrap();
    let response = temp.path().join("add.ndjson");
    fs::write(
        &response,
        concat!(
            "{\"Name\":\"a.txt\",\"Hash\":\"bafyA\",\"Size\":\"5\"}\n",
            "{\"Name\":\"\",\"Hash\":\"bafyWRAP\",\"Size\":\"60\"}\n",
        ),
    )
    .unwrap();

    let output = cidfan(&temp.path().join("none.toml"))
        .arg("pins")
        .arg(&response)
        .arg("--wrap")
        .output()
        .unwrap();
    assert!(output.status.success());
    let pins: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(pins, serde_json::json!([{ "cid": "bafyWRAP", "size": 60 }]));
}

fn node_config(temp: &TempDir, server: &MockServer) -> std::path::PathBuf {
    let path = temp.path().join("cidfan.toml");
    fs::write(
        &path,
        format!(
            "[[backends]]\ntype = \"node\"\nid = \"local-node\"\nendpoint = \"{}\"\n",
            server.base_url()
        ),
    )
    .unwrap();
    path
}

#[test]
fn upload_text_prints_aggregate() {
    if !can_bind_localhost() {
        eprintln!("Skipping httpmock tests: cannot bind to localhost");
        return;
    }

    let server = MockServer::start();
    let add = server.mock(|when, then| {
        when.method(POST)
            .path("/api/v0/add")
            .body_contains("filename=\"text.txt\"")
            .body_contains("hello from the cli");
        then.status(200)
            .body(format!("{{\"Name\":\"text.txt\",\"Hash\":\"{CID}\",\"Size\":\"26\"}}\n"));
    });

    let temp = TempDir::new().unwrap();
    let output = cidfan(&node_config(&temp, &server))
        .arg("upload")
        .arg("text")
        .arg("hello from the cli")
        .output()
        .unwrap();

    add.assert();
    assert!(output.status.success());
    let result: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(result["success"], true);
    assert_eq!(result["cid"], CID);
    assert_eq!(result["allNodesSucceeded"], true);
}

#[test]
fn upload_fails_when_no_backend_succeeds() {
    if !can_bind_localhost() {
        eprintln!("Skipping httpmock tests: cannot bind to localhost");
        return;
    }

    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/api/v0/add");
        then.status(502).body("bad gateway");
    });

    let temp = TempDir::new().unwrap();
    cidfan(&node_config(&temp, &server))
        .arg("upload")
        .arg("json")
        .arg(r#"{"k":"v"}"#)
        .assert()
        .failure()
        .stdout(contains("\"success\": false"))
        .stdout(contains("\"cid\": \"\""))
        .stderr(contains("no backend succeeded"));
}

#[test]
fn upload_without_backends_is_rejected() {
    let temp = TempDir::new().unwrap();
    cidfan(&temp.path().join("none.toml"))
        .arg("upload")
        .arg("text")
        .arg("x")
        .assert()
        .failure()
        .stderr(contains("no usable backends"));
}

#[test]
fn backends_lists_ids_and_kinds() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("cidfan.toml");
    fs::write(
        &path,
        format!(
            concat!(
                "[[backends]]\ntype = \"node\"\nendpoint = \"http://127.0.0.1:5001\"\n\n",
                "[[backends]]\ntype = \"object_store\"\nvendor = \"generic\"\npath = \"{}\"\n",
            ),
            temp.path().join("objects").display()
        ),
    )
    .unwrap();

    cidfan(&path)
        .arg("backends")
        .assert()
        .success()
        .stdout(contains("127.0.0.1:5001"))
        .stdout(contains("node"))
        .stdout(contains("local"))
        .stdout(contains("object_store"));
}

#[test]
fn backends_check_reports_each_backend() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("cidfan.toml");
    fs::write(
        &path,
        format!(
            concat!(
                "[[backends]]\ntype = \"object_store\"\nvendor = \"generic\"\npath = \"{}\"\n\n",
                "[[backends]]\ntype = \"node\"\nid = \"offline\"\nendpoint = \"http://127.0.0.1:9\"\n",
            ),
            temp.path().join("objects").display()
        ),
    )
    .unwrap();

    cidfan(&path)
        .arg("backends")
        .arg("--check")
        .assert()
        .failure()
        .stdout(contains("STATUS"))
        .stdout(contains("ok"))
        .stdout(contains("error:"))
        .stderr(contains("1 backend(s) failed the health check"));
}
