// Excel import (xlsx, xls, xlsb, ods) and export (xlsx only)
//
// Import: values and formulas, with each formula's cached result kept.
//         For xlsx templates, cell formats, merged ranges, column widths and
//         row heights are read from the package (see xlsx_styles).
// Export: values, formulas and that formatting.
//         The written workbook always asks Excel to recalculate on open.

use std::io::Cursor;

use calamine::{open_workbook_auto_from_rs, Data, Range, Reader};
use rust_xlsxwriter::{
    Color, Format, FormatAlign, FormatBorder, FormatUnderline, Formula, Workbook as XlsxWorkbook,
    Worksheet,
};
use tallygrid_engine::cell::{BorderStyle, CellFormat, CellValue, HorizontalAlign, NumberFormat, VerticalAlign};
use tallygrid_engine::sheet::Sheet;
use tallygrid_engine::workbook::Workbook;

use crate::error::XlsxError;
use crate::xlsx_styles::{self, TemplateFormatting};

/// Maximum dimensions for a sheet
const MAX_ROWS: usize = 1_048_576;
const MAX_COLS: usize = 16_384;

/// Read a workbook from in-memory file bytes.
pub fn import_bytes(bytes: &[u8]) -> Result<Workbook, XlsxError> {
    let mut source = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| XlsxError::Open(e.to_string()))?;

    let sheet_names = source.sheet_names().to_vec();
    if sheet_names.is_empty() {
        return Err(XlsxError::NoSheets);
    }

    // xls/ods templates are not zip packages; they import without formatting
    let formatting = match xlsx_styles::read_formatting(bytes, &sheet_names) {
        Ok(formatting) => Some(formatting),
        Err(e) => {
            log::debug!("template formatting not read: {e}");
            None
        }
    };

    let mut workbook = Workbook::new();
    for (index, name) in sheet_names.iter().enumerate() {
        let range = source.worksheet_range(name).map_err(|e| XlsxError::Sheet {
            name: name.clone(),
            message: e.to_string(),
        })?;

        let mut sheet = Sheet::new(name);
        import_values(&mut sheet, &range);

        // Formula range may start at a different offset than the value range
        match source.worksheet_formula(name) {
            Ok(formulas) => import_formulas(&mut sheet, &formulas),
            Err(e) => log::debug!("sheet '{name}': formulas unavailable ({e})"),
        }

        if let Some(formatting) = &formatting {
            import_formatting(&mut sheet, formatting, index);
        }

        log::debug!("imported sheet '{name}' ({} cells)", sheet.cell_count());
        if workbook.add_sheet(sheet).is_none() {
            log::warn!("duplicate sheet name '{name}' ignored");
        }
    }

    Ok(workbook)
}

fn import_values(sheet: &mut Sheet, range: &Range<Data>) {
    let (start_row, start_col) = range.start().unwrap_or((0, 0));
    for (row_idx, row) in range.rows().enumerate() {
        let target_row = start_row as usize + row_idx;
        if target_row >= MAX_ROWS {
            break;
        }
        for (col_idx, cell) in row.iter().enumerate() {
            let target_col = start_col as usize + col_idx;
            if target_col >= MAX_COLS {
                break;
            }
            let value = cell_value(cell);
            if !value.is_empty() {
                sheet.set_value(target_row, target_col, value);
            }
        }
    }
}

fn cell_value(cell: &Data) -> CellValue {
    match cell {
        Data::Empty => CellValue::Empty,
        Data::String(s) if s.is_empty() => CellValue::Empty,
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Float(n) => CellValue::Number(*n),
        Data::Int(n) => CellValue::Number(*n as f64),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::Error(e) => CellValue::Text(format!("#{e:?}")),
        // Serial number; the 1900 date system is assumed
        Data::DateTime(dt) => CellValue::Number(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::Text(s.clone()),
    }
}

fn import_formulas(sheet: &mut Sheet, formulas: &Range<String>) {
    let (start_row, start_col) = formulas.start().unwrap_or((0, 0));
    for (row_idx, row) in formulas.rows().enumerate() {
        let target_row = start_row as usize + row_idx;
        if target_row >= MAX_ROWS {
            break;
        }
        for (col_idx, source) in row.iter().enumerate() {
            let target_col = start_col as usize + col_idx;
            if target_col >= MAX_COLS || source.is_empty() {
                continue;
            }
            let cached = sheet.value(target_row, target_col).clone();
            sheet.set_value(target_row, target_col, CellValue::formula(source, Some(cached)));
        }
    }
}

fn import_formatting(sheet: &mut Sheet, formatting: &TemplateFormatting, index: usize) {
    let Some(layout) = formatting.sheets.get(index) else {
        return;
    };
    for &(row, col, style_id) in &layout.cell_styles {
        if let Some(format) = formatting.style(style_id) {
            sheet.set_format(row, col, format.clone());
        }
    }
    for &range in &layout.merged {
        if !sheet.add_merged_range(range) {
            log::warn!("sheet '{}': merged range {range:?} ignored", sheet.name);
        }
    }
    for &(col, width) in &layout.col_widths {
        sheet.set_col_width(col, character_width(width));
    }
    for &(row, height) in &layout.row_heights {
        sheet.set_row_height(row, height);
    }
}

/// A stored `<col width>` counts a 5px cell padding against a 7px digit;
/// set_column_width adds it back, so import strips it.
fn character_width(stored: f64) -> f64 {
    const DIGIT: f64 = 7.0;
    const PADDING: f64 = 5.0;
    if stored >= (DIGIT + PADDING) / DIGIT {
        stored - PADDING / DIGIT
    } else {
        stored * DIGIT / (DIGIT + PADDING)
    }
}

/// Serialize a workbook to xlsx bytes, sheets in workbook order.
pub fn export_bytes(workbook: &Workbook) -> Result<Vec<u8>, XlsxError> {
    let mut xlsx = XlsxWorkbook::new();

    for sheet in workbook.sheets() {
        let worksheet = xlsx
            .add_worksheet()
            .set_name(&sheet.name)
            .map_err(|e| XlsxError::Write(format!("sheet '{}': {e}", sheet.name)))?;
        export_layout(sheet, worksheet)?;
        export_merges(sheet, worksheet)?;
        export_sheet_cells(sheet, worksheet)?;
    }

    // rust_xlsxwriter always writes fullCalcOnLoad, so the flag needs no extra work
    if !workbook.full_calc_on_load() {
        log::debug!("workbook not flagged for recalculation; Excel recalculates on load regardless");
    }

    xlsx.save_to_buffer().map_err(|e| XlsxError::Write(e.to_string()))
}

fn export_layout(sheet: &Sheet, worksheet: &mut Worksheet) -> Result<(), XlsxError> {
    for (&col, &width) in sheet.col_widths() {
        if col >= MAX_COLS {
            continue;
        }
        worksheet
            .set_column_width(col as u16, width)
            .map_err(|e| XlsxError::Write(format!("'{}' column {col} width: {e}", sheet.name)))?;
    }
    for (&row, &height) in sheet.row_heights() {
        if row >= MAX_ROWS {
            continue;
        }
        worksheet
            .set_row_height(row as u32, height)
            .map_err(|e| XlsxError::Write(format!("'{}' row {row} height: {e}", sheet.name)))?;
    }
    Ok(())
}

/// Merges go first: merge_range blanks the whole block, then the top-left
/// cell is overwritten with its real value by export_sheet_cells.
fn export_merges(sheet: &Sheet, worksheet: &mut Worksheet) -> Result<(), XlsxError> {
    for merge in sheet.merged_ranges() {
        let format = sheet
            .format(merge.first_row, merge.first_col)
            .map(build_format)
            .unwrap_or_else(Format::new);
        worksheet
            .merge_range(
                merge.first_row as u32,
                merge.first_col as u16,
                merge.last_row as u32,
                merge.last_col as u16,
                "",
                &format,
            )
            .map_err(|e| XlsxError::Write(format!("'{}' merge {merge:?}: {e}", sheet.name)))?;
    }
    Ok(())
}

/// Returns the number of cells written.
fn export_sheet_cells(sheet: &Sheet, worksheet: &mut Worksheet) -> Result<usize, XlsxError> {
    let mut written = 0;
    for (&(row, col), cell) in sheet.cells_iter() {
        if row >= MAX_ROWS || col >= MAX_COLS || cell.value.is_empty() {
            continue;
        }
        if sheet.is_merge_hidden(row, col) {
            log::debug!("'{}' cell ({row}, {col}) hidden by a merge, not written", sheet.name);
            continue;
        }
        let format = sheet.format(row, col).map(build_format).unwrap_or_else(Format::new);
        let (row32, col16) = (row as u32, col as u16);
        let result = match &cell.value {
            CellValue::Empty => continue,
            CellValue::Text(s) => worksheet.write_string_with_format(row32, col16, s, &format).map(|_| ()),
            CellValue::Number(n) => worksheet.write_number_with_format(row32, col16, *n, &format).map(|_| ()),
            CellValue::Bool(b) => worksheet.write_boolean_with_format(row32, col16, *b, &format).map(|_| ()),
            CellValue::Formula { source, cached } => {
                let mut formula = Formula::new(source);
                if let Some(cached) = cached {
                    formula = formula.set_result(cached.display());
                }
                worksheet.write_formula_with_format(row32, col16, formula, &format).map(|_| ())
            }
        };
        result.map_err(|e| {
            XlsxError::Write(format!("'{}' cell ({row}, {col}): {e}", sheet.name))
        })?;
        written += 1;
    }

    // Blank cells keep fills and borders, e.g. the empty grid a report fills in
    for (&(row, col), format) in sheet.formats_iter() {
        if row >= MAX_ROWS
            || col >= MAX_COLS
            || !sheet.value(row, col).is_empty()
            || !format.is_visible_when_blank()
            || sheet.merged_ranges().iter().any(|m| m.contains(row, col))
        {
            continue;
        }
        worksheet
            .write_blank(row as u32, col as u16, &build_format(format))
            .map_err(|e| XlsxError::Write(format!("'{}' cell ({row}, {col}): {e}", sheet.name)))?;
    }
    Ok(written)
}

fn build_format(cell_format: &CellFormat) -> Format {
    let mut format = Format::new();

    match &cell_format.number_format {
        Some(NumberFormat::Builtin(id)) => format = format.set_num_format_index(*id),
        Some(NumberFormat::Custom(code)) => format = format.set_num_format(code),
        None => {}
    }

    if cell_format.bold {
        format = format.set_bold();
    }
    if cell_format.italic {
        format = format.set_italic();
    }
    if cell_format.underline {
        format = format.set_underline(FormatUnderline::Single);
    }
    if cell_format.strikethrough {
        format = format.set_font_strikethrough();
    }
    if let Some(name) = &cell_format.font_name {
        format = format.set_font_name(name);
    }
    if let Some(size) = cell_format.font_size {
        format = format.set_font_size(size);
    }
    if let Some(rgb) = cell_format.font_color {
        format = format.set_font_color(Color::RGB(rgb));
    }
    if let Some(rgb) = cell_format.fill_color {
        format = format.set_background_color(Color::RGB(rgb));
    }

    let borders = &cell_format.borders;
    if let Some(style) = borders.top {
        format = format.set_border_top(border_style(style));
    }
    if let Some(style) = borders.right {
        format = format.set_border_right(border_style(style));
    }
    if let Some(style) = borders.bottom {
        format = format.set_border_bottom(border_style(style));
    }
    if let Some(style) = borders.left {
        format = format.set_border_left(border_style(style));
    }

    if let Some(align) = cell_format.h_align {
        format = format.set_align(match align {
            HorizontalAlign::Left => FormatAlign::Left,
            HorizontalAlign::Center => FormatAlign::Center,
            HorizontalAlign::Right => FormatAlign::Right,
            HorizontalAlign::Fill => FormatAlign::Fill,
            HorizontalAlign::Justify => FormatAlign::Justify,
            HorizontalAlign::CenterAcross => FormatAlign::CenterAcross,
            HorizontalAlign::Distributed => FormatAlign::Distributed,
        });
    }
    if let Some(align) = cell_format.v_align {
        format = format.set_align(match align {
            VerticalAlign::Top => FormatAlign::Top,
            VerticalAlign::Center => FormatAlign::VerticalCenter,
            VerticalAlign::Bottom => FormatAlign::Bottom,
            VerticalAlign::Justify => FormatAlign::VerticalJustify,
            VerticalAlign::Distributed => FormatAlign::VerticalDistributed,
        });
    }
    if cell_format.wrap_text {
        format = format.set_text_wrap();
    }

    format
}

fn border_style(style: BorderStyle) -> FormatBorder {
    match style {
        BorderStyle::Thin => FormatBorder::Thin,
        BorderStyle::Medium => FormatBorder::Medium,
        BorderStyle::Dashed => FormatBorder::Dashed,
        BorderStyle::Dotted => FormatBorder::Dotted,
        BorderStyle::Thick => FormatBorder::Thick,
        BorderStyle::Double => FormatBorder::Double,
        BorderStyle::Hair => FormatBorder::Hair,
        BorderStyle::MediumDashed => FormatBorder::MediumDashed,
        BorderStyle::DashDot => FormatBorder::DashDot,
        BorderStyle::MediumDashDot => FormatBorder::MediumDashDot,
        BorderStyle::DashDotDot => FormatBorder::DashDotDot,
        BorderStyle::MediumDashDotDot => FormatBorder::MediumDashDotDot,
        BorderStyle::SlantDashDot => FormatBorder::SlantDashDot,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tallygrid_engine::cell::CellBorders;
    use tallygrid_engine::sheet::MergedRange;

    fn sample() -> Workbook {
        let mut cumulative = Sheet::new("Cumulative");
        cumulative.set_value(0, 0, CellValue::Text("Item Description".into()));
        cumulative.set_value(0, 1, CellValue::Text("Colombo".into()));
        cumulative.set_value(1, 0, CellValue::Text("Item A".into()));
        cumulative.set_value(1, 1, CellValue::Number(15.0));
        cumulative.set_value(2, 1, CellValue::formula("SUM(B2:B2)", Some(CellValue::Number(15.0))));
        cumulative.set_value(3, 1, CellValue::Bool(true));
        let mut wb = Workbook::from_sheets(vec![cumulative, Sheet::new("01")]);
        wb.set_full_calc_on_load(true);
        wb
    }

    #[test]
    fn export_then_import_keeps_values_and_formulas() {
        let bytes = export_bytes(&sample()).unwrap();
        let wb = import_bytes(&bytes).unwrap();

        assert_eq!(wb.sheet_names(), vec!["Cumulative", "01"]);
        let sheet = wb.sheet_by_name("Cumulative").unwrap();
        assert_eq!(sheet.value(0, 0), &CellValue::Text("Item Description".into()));
        assert_eq!(sheet.value(1, 1), &CellValue::Number(15.0));
        assert_eq!(sheet.value(3, 1), &CellValue::Bool(true));
        assert!(sheet.is_formula(2, 1));
        match sheet.value(2, 1) {
            CellValue::Formula { source, .. } => assert_eq!(source, "SUM(B2:B2)"),
            other => panic!("expected formula, got {other:?}"),
        }
    }

    #[test]
    fn formats_merges_and_sizes_survive_a_round_trip() {
        let mut sheet = Sheet::new("Cumulative");
        sheet.set_value(0, 0, CellValue::Number(45292.0));
        sheet.set_format(
            0,
            0,
            CellFormat {
                number_format: Some(NumberFormat::Custom("yyyy-mm-dd".into())),
                bold: true,
                ..Default::default()
            },
        );
        sheet.set_value(1, 0, CellValue::Text("Northern Region".into()));
        sheet.set_format(
            1,
            0,
            CellFormat {
                h_align: Some(HorizontalAlign::Center),
                fill_color: Some(0xFFFF00),
                ..Default::default()
            },
        );
        assert!(sheet.add_merged_range(MergedRange { first_row: 1, first_col: 0, last_row: 1, last_col: 2 }));
        // Blank but bordered, as in an unfilled report grid
        let bordered = CellFormat {
            borders: CellBorders { bottom: Some(BorderStyle::Thin), ..Default::default() },
            ..Default::default()
        };
        sheet.set_format(3, 1, bordered.clone());
        sheet.set_value(2, 1, CellValue::Number(12.5));
        sheet.set_format(2, 1, CellFormat { number_format: Some(NumberFormat::Builtin(4)), ..Default::default() });
        sheet.set_col_width(1, 20.0);
        sheet.set_row_height(0, 30.0);

        let bytes = export_bytes(&Workbook::from_sheets(vec![sheet])).unwrap();
        let wb = import_bytes(&bytes).unwrap();
        let sheet = wb.sheet_by_name("Cumulative").unwrap();

        let date = sheet.format(0, 0).unwrap();
        assert!(date.bold);
        assert_eq!(date.number_format, Some(NumberFormat::Custom("yyyy-mm-dd".into())));
        assert_eq!(sheet.value(0, 0), &CellValue::Number(45292.0));

        let title = sheet.format(1, 0).unwrap();
        assert_eq!(title.h_align, Some(HorizontalAlign::Center));
        assert_eq!(title.fill_color, Some(0xFFFF00));
        assert_eq!(
            sheet.merged_ranges(),
            &[MergedRange { first_row: 1, first_col: 0, last_row: 1, last_col: 2 }]
        );
        assert_eq!(sheet.value(1, 0), &CellValue::Text("Northern Region".into()));

        assert_eq!(sheet.format(2, 1).unwrap().number_format, Some(NumberFormat::Builtin(4)));
        assert_eq!(sheet.format(3, 1), Some(&bordered));
        assert!(sheet.value(3, 1).is_empty());

        let width = sheet.col_widths().get(&1).copied().unwrap();
        assert!((width - 20.0).abs() < 0.01, "width {width}");
        assert_eq!(sheet.row_heights().get(&0), Some(&30.0));
    }

    #[test]
    fn stored_column_widths_lose_their_padding() {
        assert!((character_width(20.7109375) - 20.0).abs() < 0.01);
        assert!((character_width(8.43 + 5.0 / 7.0) - 8.43).abs() < 0.001);
        assert!((character_width(12.0 / 14.0) - 0.5).abs() < 0.001);
    }

    #[test]
    fn garbage_bytes_are_rejected() {
        let err = import_bytes(b"definitely not a spreadsheet").unwrap_err();
        assert!(matches!(err, XlsxError::Open(_)));
    }

    #[test]
    fn cell_value_conversion() {
        assert_eq!(cell_value(&Data::Int(3)), CellValue::Number(3.0));
        assert_eq!(cell_value(&Data::String(String::new())), CellValue::Empty);
        assert_eq!(cell_value(&Data::Float(2.5)), CellValue::Number(2.5));
    }
}
