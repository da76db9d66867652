//! The compiled `datafetch` binary

mod common;

use serde_json::json;
use std::process::Command;
use tempfile::TempDir;

use common::read_manifest;

fn datafetch() -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_datafetch"));
    command.env("RUST_LOG", "warn");
    command
}

#[test]
fn test_cli_writes_manifest() {
    let inputs = TempDir::new().unwrap();
    let job_dir = TempDir::new().unwrap();

    let input = inputs.path().join("input.tsv");
    std::fs::write(&input, "a b\r\nc  d\r\n").unwrap();

    let request = inputs.path().join("request.json");
    std::fs::write(
        &request,
        json!({"targets": [{
            "destination": {"type": "hdas"},
            "elements": [{
                "src": "path",
                "path": input,
                "ext": "tabular",
                "to_posix_lines": true,
                "space_to_tab": true
            }]
        }]})
        .to_string(),
    )
    .unwrap();

    let output = datafetch()
        .arg("--request")
        .arg(&request)
        .arg("--working-directory")
        .arg(job_dir.path())
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    // logs go to stderr only
    assert!(output.stdout.is_empty());

    let manifest = read_manifest(job_dir.path());
    let element = &manifest["__unnamed_outputs"][0]["elements"][0];
    assert_eq!(element["ext"], "tabular");

    let staged = std::fs::read_to_string(element["filename"].as_str().unwrap()).unwrap();
    assert_eq!(staged, "a\tb\nc\td\n");
    // the source file is untouched
    assert_eq!(std::fs::read_to_string(&input).unwrap(), "a b\r\nc  d\r\n");
}

#[test]
fn test_cli_rejects_existing_manifest() {
    let inputs = TempDir::new().unwrap();
    let job_dir = TempDir::new().unwrap();
    std::fs::write(job_dir.path().join("galaxy.json"), "{}").unwrap();

    let request = inputs.path().join("request.json");
    std::fs::write(&request, r#"{"targets": []}"#).unwrap();

    let output = datafetch()
        .arg("--request")
        .arg(&request)
        .arg("--working-directory")
        .arg(job_dir.path())
        .output()
        .unwrap();

    assert!(!output.status.success());
    assert_eq!(
        std::fs::read_to_string(job_dir.path().join("galaxy.json")).unwrap(),
        "{}"
    );
    assert!(!job_dir.path().join("staging").exists());
}

#[test]
fn test_cli_custom_manifest_name_from_config() {
    let inputs = TempDir::new().unwrap();
    let job_dir = TempDir::new().unwrap();

    let config = inputs.path().join("datafetch.toml");
    std::fs::write(&config, "[staging]\nmanifest_file = \"outputs.json\"\n").unwrap();

    let request = inputs.path().join("request.json");
    std::fs::write(
        &request,
        json!({"targets": [{
            "destination": {"type": "hdas"},
            "elements": [{"src": "pasted", "paste_content": "x"}]
        }]})
        .to_string(),
    )
    .unwrap();

    let status = datafetch()
        .arg("--request")
        .arg(&request)
        .arg("--working-directory")
        .arg(job_dir.path())
        .arg("--config")
        .arg(&config)
        .status()
        .unwrap();

    assert!(status.success());
    assert!(job_dir.path().join("outputs.json").is_file());
    assert!(!job_dir.path().join("galaxy.json").exists());
}

#[test]
fn test_cli_malformed_request() {
    let inputs = TempDir::new().unwrap();
    let job_dir = TempDir::new().unwrap();

    let request = inputs.path().join("request.json");
    std::fs::write(&request, "{not json").unwrap();

    let output = datafetch()
        .arg("--request")
        .arg(&request)
        .arg("--working-directory")
        .arg(job_dir.path())
        .output()
        .unwrap();

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("malformed request"));
    assert!(!job_dir.path().join("galaxy.json").exists());
}
