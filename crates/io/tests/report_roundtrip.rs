use std::path::PathBuf;

use httpmock::prelude::*;
use pretty_assertions::assert_eq;
use rust_xlsxwriter::{Format, Formula, Workbook as XlsxWorkbook};
use serde_json::json;

use tallygrid_engine::cell::{CellValue, NumberFormat};
use tallygrid_engine::sheet::MergedRange;
use tallygrid_io::xlsx::import_bytes;
use tallygrid_io::{build_report, DefaultSource, ReportError, ReportRequest};
use tallygrid_recon::{ReconConfig, ReconError};

// -------------------------------------------------------------------------
// Fixtures
// -------------------------------------------------------------------------

/// Cumulative + two day sheets; Sr | Item Description | Colombo | Galle | Total.
fn template_bytes() -> Vec<u8> {
    let mut wb = XlsxWorkbook::new();
    for name in ["Cumulative", "01", "02"] {
        let ws = wb.add_worksheet().set_name(name).unwrap();
        ws.write_string(0, 0, "Achievement Report").unwrap();
        for (col, header) in ["Sr", "Item Description", "Colombo", "Galle", "Total"].iter().enumerate() {
            ws.write_string(2, col as u16, *header).unwrap();
        }
        for (i, item) in ["Item A", "Item B"].iter().enumerate() {
            let row = 3 + i as u32;
            ws.write_number(row, 0, (i + 1) as f64).unwrap();
            ws.write_string(row, 1, *item).unwrap();
            ws.write_formula(row, 4, Formula::new(format!("=SUM(C{0}:D{0})", row + 1)))
                .unwrap();
        }
    }
    wb.save_to_buffer().unwrap()
}

fn write_template(dir: &tempfile::TempDir) -> PathBuf {
    let path = dir.path().join("achievement.xlsx");
    std::fs::write(&path, template_bytes()).unwrap();
    path
}

fn payload() -> serde_json::Value {
    json!([
        {"itemName": "Item A", "territory": "Colombo", "date": "2024-01-01", "qty": 10},
        {"itemName": "Item A", "territory": "Colombo", "date": "2024-01-02", "qty": 5}
    ])
}

// -------------------------------------------------------------------------
// End to end
// -------------------------------------------------------------------------

#[test]
fn file_template_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_template(&dir);

    let request = ReportRequest {
        template: path.to_string_lossy().into_owned(),
        payload: payload(),
        start_date: Some("2024-01-01".into()),
        end_date: Some("2024-01-02".into()),
    };
    let output = build_report(&DefaultSource::default(), &request, &ReconConfig::default()).unwrap();

    assert_eq!(output.file_name, "achievement_2024-01-01_to_2024-01-02.xlsx");
    assert_eq!(output.summary.template_name, "achievement.xlsx");
    assert_eq!(output.summary.record_count, 2);
    assert_eq!(output.summary.skipped_records, 0);
    assert_eq!(output.summary.filled_cells, 3);
    assert_eq!(output.summary.sheets_updated, 3);

    let wb = import_bytes(&output.workbook_bytes).unwrap();
    assert_eq!(wb.sheet_names(), vec!["Cumulative", "01", "02"]);
    let cumulative = wb.sheet_by_name("Cumulative").unwrap();
    assert_eq!(cumulative.value(3, 2), &CellValue::Number(15.0));
    assert_eq!(wb.sheet_by_name("01").unwrap().value(3, 2), &CellValue::Number(10.0));
    assert_eq!(wb.sheet_by_name("02").unwrap().value(3, 2), &CellValue::Number(5.0));
    assert!(cumulative.is_formula(3, 4));
}

#[test]
fn template_formatting_survives_the_report() {
    let mut template = XlsxWorkbook::new();
    let ws = template.add_worksheet().set_name("Cumulative").unwrap();
    let date = Format::new().set_bold().set_num_format("yyyy-mm-dd");
    ws.write_number_with_format(0, 0, 45292.0, &date).unwrap();
    ws.merge_range(1, 0, 1, 2, "Achievement Report", &Format::new().set_bold()).unwrap();
    for (col, header) in ["Sr", "Item Description", "Colombo", "Galle"].iter().enumerate() {
        ws.write_string(2, col as u16, *header).unwrap();
    }
    ws.write_number(3, 0, 1.0).unwrap();
    ws.write_string(3, 1, "Item A").unwrap();
    ws.set_column_width(1, 30.0).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("styled.xlsx");
    std::fs::write(&path, template.save_to_buffer().unwrap()).unwrap();

    let request = ReportRequest {
        template: path.to_string_lossy().into_owned(),
        payload: payload(),
        start_date: None,
        end_date: None,
    };
    let output = build_report(&DefaultSource::default(), &request, &ReconConfig::default()).unwrap();
    assert_eq!(output.summary.filled_cells, 1);

    let wb = import_bytes(&output.workbook_bytes).unwrap();
    let sheet = wb.sheet_by_name("Cumulative").unwrap();
    assert_eq!(sheet.value(3, 2), &CellValue::Number(15.0));

    let a1 = sheet.format(0, 0).unwrap();
    assert!(a1.bold);
    assert_eq!(a1.number_format, Some(NumberFormat::Custom("yyyy-mm-dd".into())));
    assert_eq!(sheet.value(0, 0), &CellValue::Number(45292.0));

    assert_eq!(
        sheet.merged_ranges(),
        &[MergedRange { first_row: 1, first_col: 0, last_row: 1, last_col: 2 }]
    );
    assert_eq!(sheet.value(1, 0), &CellValue::Text("Achievement Report".into()));
    assert!(sheet.format(1, 0).unwrap().bold);

    let width = sheet.col_widths().get(&1).copied().unwrap();
    assert!((width - 30.0).abs() < 0.01, "width {width}");
}

#[test]
fn summary_serializes_camel_case() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_template(&dir);

    let request = ReportRequest {
        template: format!("file://{}", path.display()),
        payload: payload(),
        start_date: None,
        end_date: None,
    };
    let output = build_report(&DefaultSource::default(), &request, &ReconConfig::default()).unwrap();
    assert_eq!(output.file_name, "achievement_report.xlsx");

    let summary = serde_json::to_value(&output.summary).unwrap();
    assert_eq!(summary["recordCount"], json!(2));
    assert_eq!(summary["skippedRecords"], json!(0));
    assert_eq!(summary["templateName"], json!("achievement.xlsx"));
    assert!(summary.get("startDate").is_none());
}

#[test]
fn http_template_round_trip() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET).path("/templates/daily.xlsx");
        then.status(200).body(template_bytes());
    });

    let request = ReportRequest {
        template: server.url("/templates/daily.xlsx?token=abc"),
        payload: json!({"daily": [{"sr": 2, "territory": "Galle (B)", "day": 2, "qty": "7"}]}),
        start_date: Some("2024-01-02".into()),
        end_date: None,
    };
    let output = build_report(&DefaultSource::default(), &request, &ReconConfig::default()).unwrap();
    mock.assert();

    assert_eq!(output.file_name, "daily_2024-01-02.xlsx");
    let wb = import_bytes(&output.workbook_bytes).unwrap();
    assert_eq!(wb.sheet_by_name("02").unwrap().value(4, 3), &CellValue::Number(7.0));
    assert_eq!(wb.sheet_by_name("Cumulative").unwrap().value(4, 3), &CellValue::Number(7.0));
}

#[test]
fn unrecognized_template_fails_the_build() {
    let mut wb = XlsxWorkbook::new();
    wb.add_worksheet().write_string(0, 0, "just notes").unwrap();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("notes.xlsx");
    std::fs::write(&path, wb.save_to_buffer().unwrap()).unwrap();

    let request = ReportRequest {
        template: path.to_string_lossy().into_owned(),
        payload: payload(),
        start_date: None,
        end_date: None,
    };
    let err = build_report(&DefaultSource::default(), &request, &ReconConfig::default()).unwrap_err();
    assert!(matches!(err, ReportError::Recon(ReconError::TemplateNotRecognized { .. })));
}
