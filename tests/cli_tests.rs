use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

/// Helper to create a mimedb command
fn mimedb_cmd() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("mimedb"))
}

fn package_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/data/sample-types.xml")
}

/// Command preloaded with the sample package.
fn with_package() -> Command {
    let mut cmd = mimedb_cmd();
    cmd.arg("--package").arg(package_path());
    cmd
}

#[test]
fn test_help() {
    mimedb_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Resolve MIME types"));
}

#[test]
fn test_version() {
    mimedb_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("mimedb"));
}

#[test]
fn test_no_sources_is_an_error() {
    mimedb_cmd()
        .args(["name", "a.txt"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("no type data given"));
}

#[test]
fn test_name() {
    with_package()
        .args(["name", "backup.tar.bz2"])
        .assert()
        .success()
        .stdout("application/x-bzip-compressed-tar\n");
}

#[test]
fn test_name_no_match_exit_code() {
    with_package()
        .args(["name", "no-extension"])
        .assert()
        .code(1)
        .stdout("");
}

#[test]
fn test_name_json() {
    let output = with_package()
        .args(["--json", "name", "notes.txt"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["types"], serde_json::json!(["text/plain"]));
    assert_eq!(value["suffix"], "txt");
}

#[test]
fn test_data() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("picture");
    let mut header = vec![0u8; 64];
    header[..2].copy_from_slice(b"BM");
    header[14] = 0x28;
    fs::write(&file, header).unwrap();

    with_package()
        .arg("data")
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains("image/bmp (accuracy 80)"));
}

#[test]
fn test_data_from_stdin() {
    with_package()
        .args(["data", "-"])
        .write_stdin("#!/bin/sh\nexit 0\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("application/x-shellscript"));
}

#[test]
fn test_data_missing_file() {
    with_package()
        .args(["data", "/nonexistent/file"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Failed to open"));
}

#[test]
fn test_type() {
    with_package()
        .args(["type", "image/x-png"])
        .assert()
        .success()
        .stdout(predicate::str::contains("image/png"))
        .stdout(predicate::str::contains("PNG image"))
        .stdout(predicate::str::contains("image-png"));
}

#[test]
fn test_parents() {
    with_package()
        .args(["parents", "application/x-shellscript"])
        .assert()
        .success()
        .stdout("application/x-executable\ntext/plain\n");

    with_package()
        .args(["parents", "--all", "text/x-c++src"])
        .assert()
        .success()
        .stdout("text/x-csrc\ntext/plain\napplication/octet-stream\n");
}

#[test]
fn test_alias() {
    with_package()
        .args(["alias", "image/x-bmp"])
        .assert()
        .success()
        .stdout("image/bmp\n");
}

#[test]
fn test_list() {
    with_package()
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("application/x-bzip\tBzip archive"))
        .stdout(predicate::str::contains("text/x-makefile\tMakefile"));
}

#[test]
fn test_compile_then_query_cache() {
    let dir = TempDir::new().unwrap();
    let cache = dir.path().join("mime.cache");

    with_package()
        .arg("compile")
        .arg("--output")
        .arg(&cache)
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote"));
    assert!(cache.exists());

    mimedb_cmd()
        .arg("--cache")
        .arg(&cache)
        .args(["name", "main.C"])
        .assert()
        .success()
        .stdout("text/x-c++src\n");
}

#[test]
fn test_compile_needs_package() {
    let dir = TempDir::new().unwrap();
    let cache = dir.path().join("in.cache");
    fs::write(&cache, b"not a cache").unwrap();

    mimedb_cmd()
        .arg("--cache")
        .arg(&cache)
        .arg("compile")
        .arg("--output")
        .arg(dir.path().join("out.cache"))
        .assert()
        .code(2)
        .stderr(predicate::str::contains("at least one --package"));
}

#[test]
fn test_config_file() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("mimedb.json");
    fs::write(
        &config,
        serde_json::json!({ "packages": [package_path()] }).to_string(),
    )
    .unwrap();

    mimedb_cmd()
        .arg("--config")
        .arg(&config)
        .args(["name", "a.bz2"])
        .assert()
        .success()
        .stdout("application/x-bzip\n");
}

#[test]
fn test_bad_cache_is_skipped() {
    let dir = TempDir::new().unwrap();
    let cache = dir.path().join("mime.cache");
    fs::write(&cache, b"garbage").unwrap();

    with_package()
        .arg("--cache")
        .arg(&cache)
        .args(["name", "a.png"])
        .assert()
        .success()
        .stdout("image/png\n");
}
