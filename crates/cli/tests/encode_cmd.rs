//! CLI tests for `thermalink encode`.

use std::fs;
use std::io::Write;
use std::process::{Command, Stdio};

use assert_cmd::cargo;

fn thermalink() -> Command {
    Command::new(cargo::cargo_bin!("thermalink"))
}

fn run_with_stdin(args: &[&str], stdin_body: &str) -> std::process::Output {
    let mut child = thermalink()
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn thermalink command");
    {
        let stdin = child.stdin.as_mut().expect("stdin handle");
        stdin
            .write_all(stdin_body.as_bytes())
            .expect("write stdin body");
    }
    child.wait_with_output().expect("wait for output")
}

fn json_stdout(output: &std::process::Output) -> serde_json::Value {
    let stdout = String::from_utf8_lossy(&output.stdout);
    serde_json::from_str(&stdout).unwrap_or_else(|e| panic!("invalid JSON ({e}): {stdout}"))
}

#[test]
fn text_job_reports_protocol_and_hex() {
    let output = thermalink()
        .args(["encode", "-p", "cpcl", "--hex", "text", "hello"])
        .args(["--output", "json"])
        .output()
        .expect("run encode");

    assert!(output.status.success());
    let json = json_stdout(&output);
    assert_eq!(json["success"], true);
    assert_eq!(json["protocol"], "cpcl");
    assert!(json["bytes"].as_u64().is_some_and(|n| n > 0));
    let hex = json["hex"].as_str().expect("hex string");
    assert!(hex.starts_with("21 20 30"), "hex: {hex}");
}

#[test]
fn hex_is_omitted_unless_requested() {
    let output = thermalink()
        .args(["encode", "-p", "tspl", "text", "hello", "--output", "json"])
        .output()
        .expect("run encode");

    let json = json_stdout(&output);
    assert_eq!(json["protocol"], "tspl");
    assert!(json.get("hex").is_none());
}

#[test]
fn label_is_written_to_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("label.cpcl");

    let output = thermalink()
        .args(["encode", "-p", "cpcl", "--out", path.to_str().unwrap()])
        .args(["label", "--title", "Order 42", "--qr", "https://example.com/42"])
        .args(["--output", "json"])
        .output()
        .expect("run encode");

    assert!(output.status.success());
    let written = fs::read_to_string(&path).unwrap();
    assert!(written.starts_with("! 0 200 200 240 1\r\n"), "{written:?}");
    assert!(written.contains("Order 42"));
    assert!(written.ends_with("FORM\r\nPRINT\r\n"));
    assert_eq!(json_stdout(&output)["bytes"], written.len());
}

#[test]
fn copies_flag_reaches_the_header() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("copies.cpcl");

    let output = thermalink()
        .args(["encode", "-p", "cpcl", "--copies", "3", "--out", path.to_str().unwrap()])
        .args(["text", "x", "--output", "json"])
        .output()
        .expect("run encode");

    assert!(output.status.success());
    let written = fs::read_to_string(&path).unwrap();
    assert!(written.lines().next().is_some_and(|l| l.ends_with(" 3")), "{written:?}");
}

#[test]
fn name_marker_selects_niimbot_framing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("job.bin");

    let output = thermalink()
        .args(["encode", "--name", "Niimbot D110", "--out", path.to_str().unwrap()])
        .args(["text", "hi", "--output", "json"])
        .output()
        .expect("run encode");

    assert!(output.status.success());
    assert_eq!(json_stdout(&output)["protocol"], "niimbot");
    let bytes = fs::read(&path).unwrap();
    assert_eq!(bytes.first(), Some(&0x02));
    assert_eq!(bytes.last(), Some(&0x03));
}

#[test]
fn text_from_stdin() {
    let output = run_with_stdin(
        &["encode", "-p", "tspl", "--hex", "text", "-", "--output", "json"],
        "from stdin\n",
    );

    assert!(output.status.success());
    let json = json_stdout(&output);
    assert_eq!(json["protocol"], "tspl");
    // "from stdin" as hex, with the trailing newline trimmed.
    let hex = json["hex"].as_str().unwrap().replace(' ', "");
    assert!(hex.contains("66726F6D20737464696E"), "hex: {hex}");
    assert!(!hex.contains("737464696E0A"), "newline kept: {hex}");
}

#[test]
fn oversized_niimbot_text_fails_with_envelope() {
    let text = "x".repeat(400);
    let output = thermalink()
        .args(["encode", "-p", "niimbot", "text", text.as_str(), "--output", "json"])
        .output()
        .expect("run encode");

    assert!(!output.status.success());
    let json = json_stdout(&output);
    assert_eq!(json["success"], false);
    assert_eq!(json["error"], "command_failed");
    let message = json["message"].as_str().unwrap();
    assert!(message.contains("niimbot"), "message: {message}");
    assert!(message.contains("255"), "message: {message}");
}

#[test]
fn pretty_errors_go_to_stderr() {
    let text = "x".repeat(400);
    let output = thermalink()
        .args(["encode", "-p", "niimbot", "text", text.as_str(), "--output", "pretty"])
        .output()
        .expect("run encode");

    assert!(!output.status.success());
    assert!(output.stdout.is_empty());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("error:"), "stderr: {stderr}");
}

#[test]
fn test_page_is_written_to_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("test-page.cpcl");

    let output = thermalink()
        .args(["encode", "-p", "cpcl", "--out", path.to_str().unwrap()])
        .args(["test-page", "--stamp", "2026-10-14 09:30", "--output", "json"])
        .output()
        .expect("run encode");

    assert!(output.status.success());
    let written = fs::read_to_string(&path).unwrap();
    assert!(written.starts_with("! 0 200 200 425 1\r\n"), "{written:?}");
    assert!(written.contains("TEXT 4 0 0 50 TEST PAGE\r\n"));
    assert!(written.contains("Printed: 2026-10-14 09:30"));
    assert!(written.contains("B 128 1 1 40 50 280 TEST123\r\n"));
}

#[test]
fn test_page_is_refused_for_tspl() {
    let output = thermalink()
        .args(["encode", "-p", "tspl", "test-page", "--output", "json"])
        .output()
        .expect("run encode");

    assert!(!output.status.success());
    let json = json_stdout(&output);
    assert_eq!(json["success"], false);
    let message = json["message"].as_str().unwrap();
    assert!(message.contains("test_page"), "message: {message}");
}

#[test]
fn help_lists_job_kinds() {
    let output = thermalink()
        .args(["encode", "--help"])
        .output()
        .expect("run encode --help");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for needle in ["text", "label", "test-page", "probe", "--hex", "--out"] {
        assert!(stdout.contains(needle), "missing {needle} in help:\n{stdout}");
    }
}
