// Integration tests for the `tgrid` binary.
// Run with: cargo test -p tallygrid-cli --test cli_tests -- --nocapture

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use rust_xlsxwriter::Workbook as XlsxWorkbook;

fn tgrid(dir: &Path) -> Command {
    let settings = dir.join("settings.toml");
    if !settings.exists() {
        std::fs::write(&settings, "").unwrap();
    }
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_tgrid"));
    cmd.current_dir(dir);
    cmd.arg("--config").arg(settings);
    cmd
}

fn write_template(dir: &Path) -> PathBuf {
    let mut wb = XlsxWorkbook::new();
    for name in ["Cumulative", "01"] {
        let ws = wb.add_worksheet().set_name(name).unwrap();
        for (col, header) in ["Sr", "Item Description", "Colombo", "Galle", "Total"].iter().enumerate() {
            ws.write_string(0, col as u16, *header).unwrap();
        }
        ws.write_number(1, 0, 1).unwrap();
        ws.write_string(1, 1, "Item A").unwrap();
        ws.write_number(2, 0, 2).unwrap();
        ws.write_string(2, 1, "Item B").unwrap();
    }
    let path = dir.join("achievement.xlsx");
    wb.save(&path).unwrap();
    path
}

fn stdout_json(output: &Output) -> serde_json::Value {
    serde_json::from_slice(&output.stdout).expect("valid JSON on stdout")
}

// ---------------------------------------------------------------------------
// build
// ---------------------------------------------------------------------------

#[test]
fn build_writes_report_and_json_summary() {
    let dir = tempfile::tempdir().unwrap();
    let template = write_template(dir.path());
    let payload = dir.path().join("payload.json");
    std::fs::write(
        &payload,
        r#"[
            {"itemName": "Item A", "territory": "Colombo", "date": "2024-01-01", "qty": 10},
            {"itemName": "Item A", "territory": "Colombo", "date": "2024-01-02", "qty": 5}
        ]"#,
    )
    .unwrap();

    let output = tgrid(dir.path())
        .args(["build", "-t", template.to_str().unwrap(), "-p", payload.to_str().unwrap()])
        .args(["--start", "2024-01-01", "--end", "2024-01-02", "-o", "out", "--json"])
        .output()
        .expect("tgrid build");
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let doc = stdout_json(&output);
    assert_eq!(doc["fileName"], "achievement_2024-01-01_to_2024-01-02.xlsx");
    assert_eq!(doc["summary"]["recordCount"], 2);
    assert_eq!(doc["summary"]["skippedRecords"], 0);
    assert!(dir
        .path()
        .join("out/achievement_2024-01-01_to_2024-01-02.xlsx")
        .exists());
}

#[test]
fn build_reads_payload_from_stdin() {
    use std::io::Write;
    use std::process::Stdio;

    let dir = tempfile::tempdir().unwrap();
    let template = write_template(dir.path());

    let mut child = tgrid(dir.path())
        .args(["build", "-t", template.to_str().unwrap(), "-p", "-"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn tgrid");
    child
        .stdin
        .take()
        .unwrap()
        .write_all(br#"{"daily": [{"sr": 2, "territory": "Galle", "qty": 3}]}"#)
        .unwrap();
    let output = child.wait_with_output().unwrap();

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("achievement_report.xlsx"), "stdout: {stdout}");
    assert!(dir.path().join("achievement_report.xlsx").exists());
}

#[test]
fn build_rejects_invalid_payload() {
    let dir = tempfile::tempdir().unwrap();
    let template = write_template(dir.path());
    let payload = dir.path().join("payload.json");
    std::fs::write(&payload, "{not json").unwrap();

    let output = tgrid(dir.path())
        .args(["build", "-t", template.to_str().unwrap(), "-p", payload.to_str().unwrap()])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(30));
}

#[test]
fn build_missing_template_exit_code() {
    let dir = tempfile::tempdir().unwrap();
    let payload = dir.path().join("payload.json");
    std::fs::write(&payload, "[]").unwrap();

    let output = tgrid(dir.path())
        .args(["build", "-t", "no-such-template.xlsx", "-p", payload.to_str().unwrap()])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(10));
    assert!(String::from_utf8_lossy(&output.stderr).starts_with("error:"));
}

#[test]
fn build_unrecognized_template_exit_code() {
    let dir = tempfile::tempdir().unwrap();
    let mut wb = XlsxWorkbook::new();
    wb.add_worksheet().write_string(0, 0, "notes only").unwrap();
    let template = dir.path().join("notes.xlsx");
    wb.save(&template).unwrap();
    let payload = dir.path().join("payload.json");
    std::fs::write(&payload, "[]").unwrap();

    let output = tgrid(dir.path())
        .args(["build", "-t", template.to_str().unwrap(), "-p", payload.to_str().unwrap()])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(21));
    assert!(String::from_utf8_lossy(&output.stderr).contains("template format not recognized"));
}

#[test]
fn malformed_settings_exit_code() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("settings.toml"), "[fetch]\ntimeout_secs = 0\n").unwrap();

    let output = tgrid(dir.path()).args(["tokens", "x"]).output().unwrap();
    assert!(output.status.success(), "tokens does not read settings");

    let template = write_template(dir.path());
    let output = tgrid(dir.path())
        .args(["inspect", "-t", template.to_str().unwrap()])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(3));
}

// ---------------------------------------------------------------------------
// inspect / tokens
// ---------------------------------------------------------------------------

#[test]
fn inspect_reports_schema_per_sheet() {
    let dir = tempfile::tempdir().unwrap();
    let template = write_template(dir.path());

    let output = tgrid(dir.path())
        .args(["inspect", "-t", template.to_str().unwrap(), "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let sheets = stdout_json(&output);
    let sheets = sheets.as_array().unwrap();
    assert_eq!(sheets.len(), 2);
    assert_eq!(sheets[0]["name"], "Cumulative");
    assert_eq!(sheets[0]["cumulative"], true);
    assert_eq!(sheets[0]["header_row"], 1);
    assert_eq!(sheets[0]["item_column"], "B");
    assert_eq!(sheets[0]["items"], 2);
    assert_eq!(sheets[0]["territories"].as_array().unwrap().len(), 3);
}

#[test]
fn inspect_unknown_sheet_is_usage_error() {
    let dir = tempfile::tempdir().unwrap();
    let template = write_template(dir.path());

    let output = tgrid(dir.path())
        .args(["inspect", "-t", template.to_str().unwrap(), "--sheet", "99"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn tokens_json() {
    let dir = tempfile::tempdir().unwrap();
    let output = tgrid(dir.path())
        .args(["tokens", "Suger 1Kg Pack", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    assert_eq!(stdout_json(&output), serde_json::json!(["1kg", "sugar"]));
}
