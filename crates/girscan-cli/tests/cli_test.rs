//! Integration tests for the girscan binary.
//!
//! Each test runs the built executable inside a scratch directory so no
//! stray `girscan.toml` is picked up.

use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

const UNIT: &str = r#"{
  "symbols": [
    {
      "kind": "function",
      "ident": "foo_answer",
      "source_filename": "foo.h",
      "line": 3,
      "base_type": {
        "kind": "function",
        "base_type": { "kind": "basic", "name": "int" }
      }
    }
  ],
  "comments": [
    {
      "text": "/**\n * foo_answer:\n *\n * Returns: the answer\n */",
      "filename": "foo.c",
      "line": 10
    }
  ]
}"#;

fn girscan(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_girscan"))
        .current_dir(dir)
        .env_remove("RUST_LOG")
        .env("NO_COLOR", "1")
        .args(args)
        .output()
        .expect("failed to run girscan")
}

fn scratch() -> TempDir {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("foo.json"), UNIT).unwrap();
    dir
}

// ────────────────────────────────────────────────────────────────────────────
// scan
// ────────────────────────────────────────────────────────────────────────────

#[test]
fn test_scan_to_stdout() {
    let dir = scratch();
    let out = girscan(dir.path(), &["scan", "-n", "Foo", "--nsversion", "1.0", "foo.json"]);
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));
    let gir = String::from_utf8(out.stdout).unwrap();
    assert!(gir.contains("<namespace name=\"Foo\" version=\"1.0\""));
    assert!(gir.contains("c:identifier=\"foo_answer\""));
}

#[test]
fn test_scan_with_config_file() {
    let dir = scratch();
    std::fs::write(
        dir.path().join("girscan.toml"),
        "[namespace]\nname = \"Foo\"\nversion = \"1.0\"\n[scan]\nunits = [\"foo.json\"]\noutput = \"out/Foo-1.0.gir\"\n",
    )
    .unwrap();
    let out = girscan(dir.path(), &["scan", "--reparse-validate"]);
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));
    let gir = std::fs::read_to_string(dir.path().join("out/Foo-1.0.gir")).unwrap();
    assert!(gir.contains("<function name=\"answer\""));
}

#[test]
fn test_scan_needs_a_namespace() {
    let dir = scratch();
    let out = girscan(dir.path(), &["scan", "foo.json"]);
    assert!(!out.status.success());
}

#[test]
fn test_scan_missing_include_fails() {
    let dir = scratch();
    let out = girscan(
        dir.path(),
        &[
            "scan",
            "-n",
            "Foo",
            "--nsversion",
            "1.0",
            "-i",
            "Missing-9.0",
            "--include-dir",
            ".",
            "foo.json",
        ],
    );
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("Missing-9.0"));
}

// ────────────────────────────────────────────────────────────────────────────
// passthrough
// ────────────────────────────────────────────────────────────────────────────

#[test]
fn test_passthrough_reproduces_scan_output() {
    let dir = scratch();
    let out = girscan(
        dir.path(),
        &["scan", "-n", "Foo", "--nsversion", "1.0", "-o", "Foo-1.0.gir", "foo.json"],
    );
    assert!(out.status.success());

    let out = girscan(dir.path(), &["passthrough", "Foo-1.0.gir"]);
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));
    let original = std::fs::read_to_string(dir.path().join("Foo-1.0.gir")).unwrap();
    assert_eq!(String::from_utf8(out.stdout).unwrap(), original);
}

// ────────────────────────────────────────────────────────────────────────────
// doc-check
// ────────────────────────────────────────────────────────────────────────────

#[test]
fn test_doc_check_clean_unit() {
    let dir = scratch();
    let out = girscan(dir.path(), &["doc-check", "foo.json"]);
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));
}

#[test]
fn test_doc_check_reports_missing_colon() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("bad.json"),
        r#"{"comments": [{"text": "/**\n * foo_answer (skip)\n *\n * Returns: the answer\n */", "filename": "foo.c", "line": 1}]}"#,
    )
    .unwrap();
    let out = girscan(dir.path(), &["doc-check", "bad.json"]);
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("W1004"));

    let out = girscan(dir.path(), &["doc-check", "--disable", "missing-colon", "bad.json"]);
    assert!(out.status.success());
}

#[test]
fn test_doc_check_rewrite() {
    let dir = scratch();
    let out = girscan(dir.path(), &["doc-check", "--rewrite", "foo.json"]);
    assert!(out.status.success());
    let text = String::from_utf8(out.stdout).unwrap();
    assert!(text.starts_with("/**\n * foo_answer:"));
    assert!(text.contains(" * Returns: the answer"));
}
