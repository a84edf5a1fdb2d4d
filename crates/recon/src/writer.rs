use tallygrid_engine::cell::CellValue;
use tallygrid_engine::cell_id::CellRef;
use tallygrid_engine::sheet::Sheet;

use crate::matcher::resolve_item_row;
use crate::model::{Entry, EntryValue};
use crate::schema::SheetContext;

/// Apply write intents to `sheet`. Returns the number of cells written.
///
/// Entries whose row or column cannot be resolved, or whose target is a total
/// column or a formula cell, are dropped.
pub fn apply_entries(sheet: &mut Sheet, ctx: &mut SheetContext, entries: &[Entry]) -> usize {
    let mut written = 0;
    for entry in entries {
        let row = resolve_item_row(ctx, entry.item_key.as_deref(), entry.item_label.as_deref())
            .or_else(|| entry.sr_key.as_deref().and_then(|k| ctx.sr_row(k)));
        let Some(row) = row else {
            continue;
        };
        let Some(col) = ctx.resolve_column(&entry.territory) else {
            log::trace!("'{}': no column for territory {:?}", ctx.sheet_name, entry.territory);
            continue;
        };
        if ctx.is_total_column(col) {
            continue;
        }
        if write_value(sheet, row, col, &entry.value) {
            written += 1;
        }
    }
    written
}

/// Write one value. Numbers landing on numbers accumulate; formula cells are
/// left untouched. Returns whether the cell was written.
pub fn write_value(sheet: &mut Sheet, row: usize, col: usize, value: &EntryValue) -> bool {
    let existing = sheet.value(row, col);
    if existing.is_formula() {
        log::trace!("'{}'!{}: formula cell kept", sheet.name, CellRef::new(row, col));
        return false;
    }

    let next = match (existing, value) {
        (CellValue::Number(current), EntryValue::Number(n)) => CellValue::Number(current + n),
        (_, EntryValue::Number(n)) => CellValue::Number(*n),
        (_, EntryValue::Text(s)) => CellValue::Text(s.clone()),
        (_, EntryValue::Bool(b)) => CellValue::Bool(*b),
    };
    sheet.set_value(row, col, next);
    true
}
