use std::collections::HashMap;

use chrono::{DateTime, Datelike, NaiveDate};
use serde_json::Value;
use tallygrid_engine::workbook::Workbook;

use crate::aggregate::RunningTotals;
use crate::config::ReconConfig;
use crate::error::ReconError;
use crate::extract::{extract_records, RawPayload};
use crate::model::{CumulativeSource, Entry, Record, ReconSummary};
use crate::normalize::normalize_key;
use crate::resolve::extract_entries;
use crate::schema::{build_sheet_context, HeaderLabels, SheetContext};
use crate::writer::apply_entries;

/// Lazily built schemas, at most one per sheet name per run.
struct SheetContexts {
    labels: HeaderLabels,
    built: HashMap<String, Option<SheetContext>>,
}

impl SheetContexts {
    fn new(labels: HeaderLabels) -> Self {
        Self { labels, built: HashMap::new() }
    }

    fn get_mut(&mut self, workbook: &Workbook, name: &str) -> Option<&mut SheetContext> {
        let labels = &self.labels;
        self.built
            .entry(name.to_string())
            .or_insert_with(|| {
                let ctx = build_sheet_context(workbook, name, labels);
                if ctx.is_none() {
                    log::debug!("sheet '{name}' has no recognizable schema");
                }
                ctx
            })
            .as_mut()
    }
}

/// Sheets written to, in first-write order.
#[derive(Default)]
struct WriteLog {
    filled_cells: usize,
    sheets_updated: Vec<String>,
}

impl WriteLog {
    fn record(&mut self, sheet: &str, written: usize) {
        if written == 0 {
            return;
        }
        self.filled_cells += written;
        if !self.sheets_updated.iter().any(|s| s == sheet) {
            self.sheets_updated.push(sheet.to_string());
        }
    }
}

/// Merge `payload` into `workbook` in place.
///
/// Daily records go to the sheet named after their day of month; the
/// cumulative sheet receives either the payload's own cumulative block or the
/// running totals of every numeric daily entry.
pub fn run(
    workbook: &mut Workbook,
    payload: &RawPayload,
    config: &ReconConfig,
) -> Result<ReconSummary, ReconError> {
    let records = extract_records(payload);
    let mut contexts = SheetContexts::new(HeaderLabels::from_config(config));

    let names: Vec<String> = workbook.sheet_names().iter().map(|s| s.to_string()).collect();
    let mut recognized = false;
    for name in &names {
        recognized |= contexts.get_mut(workbook, name).is_some();
    }
    if !recognized {
        return Err(ReconError::TemplateNotRecognized { sheets: names });
    }

    let cumulative_sheet = find_cumulative_sheet(workbook, &config.cumulative_markers);
    if let Some(name) = &cumulative_sheet {
        log::info!("cumulative sheet: '{name}'");
    }

    let mut writes = WriteLog::default();
    let mut skipped = 0;
    let mut totals = RunningTotals::new();

    // Daily pass
    for record in &records.daily {
        let day_sheet = day_sheet_for(workbook, record)
            .filter(|name| Some(name) != cumulative_sheet.as_ref())
            .filter(|name| contexts.get_mut(workbook, name).is_some());

        let Some(target) = day_sheet.as_ref().or(cumulative_sheet.as_ref()) else {
            skipped += 1;
            continue;
        };
        let Some(ctx) = contexts.get_mut(workbook, target) else {
            skipped += 1;
            continue;
        };
        let entries = extract_entries(record, ctx);
        if entries.is_empty() {
            log::debug!("skipped daily record: no row on '{target}'");
            skipped += 1;
            continue;
        }
        for entry in &entries {
            totals.add(entry);
        }

        if let Some(day) = &day_sheet {
            let written = write_to(workbook, &mut contexts, day, &entries);
            writes.record(day, written);
        }
    }

    // Cumulative pass
    let mut cumulative_source = CumulativeSource::None;
    match cumulative_sheet.as_deref() {
        Some(name) if contexts.get_mut(workbook, name).is_some() => {
            if !records.cumulative.is_empty() {
                if !totals.is_empty() {
                    log::debug!(
                        "explicit cumulative block wins; {} running totals discarded",
                        totals.len()
                    );
                }
                cumulative_source = CumulativeSource::Explicit;
                for record in &records.cumulative {
                    let entries = match contexts.get_mut(workbook, name) {
                        Some(ctx) => extract_entries(record, ctx),
                        None => Vec::new(),
                    };
                    if entries.is_empty() {
                        log::debug!("skipped cumulative record: no row on '{name}'");
                        skipped += 1;
                        continue;
                    }
                    let written = write_to(workbook, &mut contexts, name, &entries);
                    writes.record(name, written);
                }
            } else if !totals.is_empty() {
                cumulative_source = CumulativeSource::Derived;
                let written = write_to(workbook, &mut contexts, name, &totals.into_entries());
                writes.record(name, written);
            }
        }
        _ => {
            if !records.cumulative.is_empty() {
                log::warn!(
                    "{} cumulative records dropped: no cumulative sheet schema",
                    records.cumulative.len()
                );
            }
            skipped += records.cumulative.len();
        }
    }

    workbook.set_full_calc_on_load(true);

    let summary = ReconSummary {
        record_count: records.daily.len() + records.cumulative.len(),
        daily_records: records.daily.len(),
        cumulative_records: records.cumulative.len(),
        filled_cells: writes.filled_cells,
        sheets_updated: writes.sheets_updated,
        skipped_records: skipped,
        cumulative_sheet,
        cumulative_source,
    };
    log::info!(
        "reconciled {} records: {} cells filled on {} sheets, {} skipped",
        summary.record_count,
        summary.filled_cells,
        summary.sheets_updated.len(),
        summary.skipped_records
    );
    Ok(summary)
}

fn write_to(
    workbook: &mut Workbook,
    contexts: &mut SheetContexts,
    sheet_name: &str,
    entries: &[Entry],
) -> usize {
    let Some(ctx) = contexts.get_mut(workbook, sheet_name) else {
        return 0;
    };
    let Some(sheet) = workbook.sheet_by_name_mut(sheet_name) else {
        return 0;
    };
    apply_entries(sheet, ctx, entries)
}

/// First sheet with a marker at the start of one of its words; otherwise the
/// first sheet. "Cum Sales" carries `cum`, "Documents" does not.
pub fn find_cumulative_sheet(workbook: &Workbook, markers: &[String]) -> Option<String> {
    let markers: Vec<String> = markers
        .iter()
        .map(|m| normalize_key(m))
        .filter(|m| !m.is_empty())
        .collect();
    let names = workbook.sheet_names();
    names
        .iter()
        .find(|name| markers.iter().any(|m| has_word_marker(name, m)))
        .or_else(|| names.first())
        .map(|s| s.to_string())
}

/// Whether the normalized `marker` begins at a word boundary of `name`.
fn has_word_marker(name: &str, marker: &str) -> bool {
    let mut at_boundary = true;
    for (i, ch) in name.char_indices() {
        let word_char = ch.is_alphanumeric();
        if word_char && at_boundary && normalize_key(&name[i..]).starts_with(marker) {
            return true;
        }
        at_boundary = !word_char;
    }
    false
}

/// Existing sheet for a record's day: `"05"` first, then `"5"`.
fn day_sheet_for(workbook: &Workbook, record: &Record) -> Option<String> {
    let (_, value) = record.date_field()?;
    let day = day_of_month(value)?;
    [format!("{day:02}"), day.to_string()]
        .into_iter()
        .find(|name| workbook.sheet_by_name(name).is_some())
}

/// Day of month (1..=31) of a date/day field value.
pub fn day_of_month(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => {
            let f = n.as_f64()?;
            (f.fract() == 0.0 && (1.0..=31.0).contains(&f)).then_some(f as u32)
        }
        Value::String(s) => day_from_str(s.trim()),
        _ => None,
    }
}

fn day_from_str(s: &str) -> Option<u32> {
    if s.is_empty() {
        return None;
    }
    if s.bytes().all(|b| b.is_ascii_digit()) {
        return s.parse::<u32>().ok().filter(|d| (1..=31).contains(d));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.day());
    }
    // YYYY-MM-DD, optionally followed by a time
    if let Some(head) = s.get(..10) {
        let rest = &s[10..];
        if rest.is_empty() || rest.starts_with('T') || rest.starts_with(' ') {
            if let Ok(date) = NaiveDate::parse_from_str(head, "%Y-%m-%d") {
                return Some(date.day());
            }
        }
    }
    ["%d/%m/%Y", "%d-%m-%Y"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
        .map(|date| date.day())
}

/// Output file name: template base name plus the requested date range.
pub fn report_file_name(template_name: &str, start: Option<&str>, end: Option<&str>) -> String {
    let base = template_name
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .filter(|stem| !stem.is_empty())
        .unwrap_or(template_name);
    let base = if base.trim().is_empty() { "template" } else { base.trim() };

    let start = start.map(str::trim).filter(|s| !s.is_empty());
    let end = end.map(str::trim).filter(|s| !s.is_empty());
    match (start, end) {
        (Some(start), Some(end)) => format!("{base}_{start}_to_{end}.xlsx"),
        (Some(start), None) => format!("{base}_{start}.xlsx"),
        (None, Some(end)) => format!("{base}_{end}.xlsx"),
        (None, None) => format!("{base}_report.xlsx"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tallygrid_engine::sheet::Sheet;

    #[test]
    fn day_from_numbers_and_strings() {
        assert_eq!(day_of_month(&json!(5)), Some(5));
        assert_eq!(day_of_month(&json!(5.0)), Some(5));
        assert_eq!(day_of_month(&json!(0)), None);
        assert_eq!(day_of_month(&json!(32)), None);
        assert_eq!(day_of_month(&json!(4.5)), None);
        assert_eq!(day_of_month(&json!("07")), Some(7));
        assert_eq!(day_of_month(&json!("2024-01-09")), Some(9));
        assert_eq!(day_of_month(&json!("2024-01-09 13:45:00")), Some(9));
        assert_eq!(day_of_month(&json!("2024-01-09T13:45:00")), Some(9));
        assert_eq!(day_of_month(&json!("2024-01-09T23:30:00+05:30")), Some(9));
        assert_eq!(day_of_month(&json!("21/03/2024")), Some(21));
        assert_eq!(day_of_month(&json!("21-03-2024")), Some(21));
        assert_eq!(day_of_month(&json!("yesterday")), None);
        assert_eq!(day_of_month(&json!(null)), None);
    }

    #[test]
    fn cumulative_sheet_by_marker_or_first() {
        let wb = Workbook::from_sheets(vec![Sheet::new("01"), Sheet::new("MTD Summary")]);
        let markers = ReconConfig::default().cumulative_markers;
        assert_eq!(find_cumulative_sheet(&wb, &markers).as_deref(), Some("MTD Summary"));

        let wb = Workbook::from_sheets(vec![Sheet::new("Report"), Sheet::new("01")]);
        assert_eq!(find_cumulative_sheet(&wb, &markers).as_deref(), Some("Report"));

        assert_eq!(find_cumulative_sheet(&Workbook::new(), &markers), None);
    }

    #[test]
    fn cumulative_marker_must_start_a_word() {
        let markers = ReconConfig::default().cumulative_markers;
        let wb = Workbook::from_sheets(vec![
            Sheet::new("Documents"),
            Sheet::new("Accumulated Notes"),
            Sheet::new("Cumulative"),
        ]);
        assert_eq!(find_cumulative_sheet(&wb, &markers).as_deref(), Some("Cumulative"));

        let wb = Workbook::from_sheets(vec![Sheet::new("Documents"), Sheet::new("Sales (Cum)")]);
        assert_eq!(find_cumulative_sheet(&wb, &markers).as_deref(), Some("Sales (Cum)"));

        let wb = Workbook::from_sheets(vec![Sheet::new("Documents"), Sheet::new("01")]);
        assert_eq!(find_cumulative_sheet(&wb, &markers).as_deref(), Some("Documents"));
    }

    #[test]
    fn file_names() {
        assert_eq!(
            report_file_name("achievement.xlsx", Some("2024-01-01"), Some("2024-01-31")),
            "achievement_2024-01-01_to_2024-01-31.xlsx"
        );
        assert_eq!(report_file_name("achievement.xlsx", Some("2024-01-01"), None), "achievement_2024-01-01.xlsx");
        assert_eq!(report_file_name("achievement", None, Some("2024-01-31")), "achievement_2024-01-31.xlsx");
        assert_eq!(report_file_name("achievement.xlsx", Some(" "), None), "achievement_report.xlsx");
        assert_eq!(report_file_name("", None, None), "template_report.xlsx");
    }

    #[test]
    fn unrecognized_template_is_an_error() {
        let mut wb = Workbook::from_sheets(vec![Sheet::new("Blank")]);
        let err = run(&mut wb, &RawPayload::Empty, &ReconConfig::default()).unwrap_err();
        assert!(err.to_string().contains("template format not recognized"));
        assert!(!wb.full_calc_on_load());
    }
}
