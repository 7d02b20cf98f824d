//! CLI integration tests
//!
//! Drive the `nexcon` binary against documents in a scratch directory.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

fn nexcon(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_nexcon"))
        .current_dir(dir)
        .env("RUST_LOG", "off")
        .args(args)
        .output()
        .expect("Failed to execute CLI")
}

fn assert_success(output: &Output) -> String {
    assert!(
        output.status.success(),
        "CLI command should succeed. Stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).to_string()
}

fn init_doc(dir: &TempDir) -> PathBuf {
    let doc = dir.path().join("instrument.json");
    assert_success(&nexcon(dir.path(), &["init", doc.to_str().unwrap()]));
    doc
}

fn apply_json(dir: &TempDir, doc: &Path, command: &str) -> String {
    let cmd_path = dir.path().join("cmd.json");
    fs::write(&cmd_path, command).unwrap();
    assert_success(&nexcon(
        dir.path(),
        &["apply", doc.to_str().unwrap(), cmd_path.to_str().unwrap()],
    ))
}

#[test]
fn test_init_then_list_components() {
    let dir = TempDir::new().unwrap();
    let doc = init_doc(&dir);

    let stdout = assert_success(&nexcon(dir.path(), &["components", doc.to_str().unwrap()]));
    assert_eq!(stdout.trim(), "/entry/sample\tNXsample");
}

#[test]
fn test_init_refuses_to_overwrite() {
    let dir = TempDir::new().unwrap();
    let doc = init_doc(&dir);

    let output = nexcon(dir.path(), &["init", doc.to_str().unwrap()]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("already exists"));
}

#[test]
fn test_apply_and_chain() {
    let dir = TempDir::new().unwrap();
    let doc = init_doc(&dir);

    apply_json(
        &dir,
        &doc,
        r#"{"command":"create_component","name":"detector","nx_class":"NXdetector"}"#,
    );
    apply_json(
        &dir,
        &doc,
        r#"{"command":"add_rotation","component":"/entry/instrument/detector",
            "axis":{"x":0.0,"y":0.0,"z":1.0},"angle":90.0}"#,
    );
    apply_json(
        &dir,
        &doc,
        r#"{"command":"set_component_depends_on","component":"/entry/instrument/detector",
            "target":"/entry/instrument/detector/transformations/rotation_1"}"#,
    );

    let stdout = assert_success(&nexcon(
        dir.path(),
        &["chain", doc.to_str().unwrap(), "/entry/instrument/detector"],
    ));
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 1);
    assert!(lines[0].starts_with("/entry/instrument/detector/transformations/rotation_1\tRotation\t90 degrees"));

    assert_success(&nexcon(dir.path(), &["validate", doc.to_str().unwrap()]));
}

#[test]
fn test_apply_failure_leaves_document() {
    let dir = TempDir::new().unwrap();
    let doc = init_doc(&dir);
    let before = fs::read_to_string(&doc).unwrap();

    let cmd_path = dir.path().join("cmd.json");
    fs::write(
        &cmd_path,
        r#"{"command":"remove_component","component":"/entry/instrument/ghost"}"#,
    )
    .unwrap();
    let output = nexcon(
        dir.path(),
        &["apply", doc.to_str().unwrap(), cmd_path.to_str().unwrap()],
    );

    assert!(!output.status.success());
    assert_eq!(fs::read_to_string(&doc).unwrap(), before);
}

#[test]
fn test_export_uses_settings_file() {
    let dir = TempDir::new().unwrap();
    let doc = init_doc(&dir);
    fs::write(
        dir.path().join("nexcon.yaml"),
        "broker: kafka.test:9092\noutput_file_name: run_42.nxs\n",
    )
    .unwrap();
    let out = dir.path().join("write.json");

    assert_success(&nexcon(
        dir.path(),
        &[
            "export",
            doc.to_str().unwrap(),
            "--output",
            out.to_str().unwrap(),
        ],
    ));

    let write: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(write["cmd"], "FileWriter_new");
    assert_eq!(write["broker"], "kafka.test:9092");
    assert_eq!(write["file_attributes"]["file_name"], "run_42.nxs");
    assert_eq!(write["nexus_structure"]["children"][0]["name"], "/entry");
}

#[test]
fn test_export_flags_override_settings() {
    let dir = TempDir::new().unwrap();
    let doc = init_doc(&dir);

    let stdout = assert_success(&nexcon(
        dir.path(),
        &[
            "export",
            doc.to_str().unwrap(),
            "--file-name",
            "override.nxs",
            "--job-id",
            "job-7",
        ],
    ));

    let write: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(write["broker"], "localhost:9092");
    assert_eq!(write["job_id"], "job-7");
    assert_eq!(write["file_attributes"]["file_name"], "override.nxs");
}

fn find_named<'a>(node: &'a serde_json::Value, name: &str) -> Option<&'a serde_json::Value> {
    if node["name"] == name {
        return Some(node);
    }
    node["children"]
        .as_array()?
        .iter()
        .find_map(|child| find_named(child, name))
}

#[test]
fn test_export_includes_document_streams_and_links() {
    let dir = TempDir::new().unwrap();
    let doc = init_doc(&dir);
    apply_json(
        &dir,
        &doc,
        r#"{"command":"create_component","name":"detector","nx_class":"NXdetector"}"#,
    );
    apply_json(
        &dir,
        &doc,
        r#"{"command":"add_stream","parent":"/entry/instrument/detector","name":"events",
            "fields":{"topic":{"type":"str","value":"det_events"}}}"#,
    );
    apply_json(
        &dir,
        &doc,
        r#"{"command":"add_link","parent":"/entry/sample","name":"detector_data",
            "target":"/entry/instrument/detector"}"#,
    );

    // WHEN exporting with no flag files
    let stdout = assert_success(&nexcon(dir.path(), &["export", doc.to_str().unwrap()]));
    let write: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let structure = &write["nexus_structure"];

    // THEN the document's markers are emitted
    let events = find_named(structure, "/entry/instrument/detector/events").unwrap();
    assert_eq!(events["children"][0]["type"], "stream");
    assert_eq!(events["children"][0]["stream"]["topic"], "det_events");
    let link = find_named(structure, "/entry/sample/detector_data").unwrap();
    assert_eq!(
        link["children"][0],
        serde_json::json!({"type": "link", "name": "detector_data", "target": "/entry/instrument/detector"})
    );

    // WHEN a streams file names the same group
    let streams = dir.path().join("streams.json");
    fs::write(
        &streams,
        r#"{"/entry/instrument/detector/events": {"topic": "override_events"}}"#,
    )
    .unwrap();
    let stdout = assert_success(&nexcon(
        dir.path(),
        &["export", doc.to_str().unwrap(), "--streams", streams.to_str().unwrap()],
    ));
    let write: serde_json::Value = serde_json::from_str(&stdout).unwrap();

    // THEN the file's entry wins
    let events = find_named(&write["nexus_structure"], "/entry/instrument/detector/events").unwrap();
    assert_eq!(events["children"][0]["stream"], serde_json::json!({"topic": "override_events"}));
}
