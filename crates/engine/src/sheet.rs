use std::collections::BTreeMap;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use super::cell::{Cell, CellFormat, CellValue};

static EMPTY: CellValue = CellValue::Empty;

/// Bounding box of the populated cells on a sheet (inclusive, zero-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UsedRange {
    pub first_row: usize,
    pub first_col: usize,
    pub last_row: usize,
    pub last_col: usize,
}

impl UsedRange {
    pub fn rows(&self) -> std::ops::RangeInclusive<usize> {
        self.first_row..=self.last_row
    }

    pub fn cols(&self) -> std::ops::RangeInclusive<usize> {
        self.first_col..=self.last_col
    }
}

/// A merged block of cells (inclusive, zero-based). The value lives in the
/// top-left cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MergedRange {
    pub first_row: usize,
    pub first_col: usize,
    pub last_row: usize,
    pub last_col: usize,
}

impl MergedRange {
    pub fn contains(&self, row: usize, col: usize) -> bool {
        (self.first_row..=self.last_row).contains(&row)
            && (self.first_col..=self.last_col).contains(&col)
    }

    pub fn is_single_cell(&self) -> bool {
        self.first_row == self.last_row && self.first_col == self.last_col
    }
}

/// A sparse grid of cells.
///
/// Formats are stored apart from values: writing or clearing a value never
/// touches the cell's format.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Sheet {
    pub name: String,
    cells: FxHashMap<(usize, usize), Cell>,
    #[serde(default)]
    formats: FxHashMap<(usize, usize), CellFormat>,
    #[serde(default)]
    merged: Vec<MergedRange>,
    /// Column widths in Excel character units
    #[serde(default)]
    col_widths: BTreeMap<usize, f64>,
    /// Row heights in points
    #[serde(default)]
    row_heights: BTreeMap<usize, f64>,
}

impl Sheet {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// Value at (row, col); unpopulated cells read as `Empty`.
    pub fn value(&self, row: usize, col: usize) -> &CellValue {
        self.cells
            .get(&(row, col))
            .map(|c| &c.value)
            .unwrap_or(&EMPTY)
    }

    /// Display text at (row, col), trimmed.
    pub fn text(&self, row: usize, col: usize) -> String {
        self.value(row, col).display().trim().to_string()
    }

    /// Store a value. Writing `Empty` removes the cell.
    pub fn set_value(&mut self, row: usize, col: usize, value: CellValue) {
        if matches!(value, CellValue::Empty) {
            self.cells.remove(&(row, col));
        } else {
            self.cells.insert((row, col), Cell::new(value));
        }
    }

    pub fn is_formula(&self, row: usize, col: usize) -> bool {
        self.value(row, col).is_formula()
    }

    /// Iterate over all populated cells (unordered)
    pub fn cells_iter(&self) -> impl Iterator<Item = (&(usize, usize), &Cell)> {
        self.cells.iter()
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    pub fn format(&self, row: usize, col: usize) -> Option<&CellFormat> {
        self.formats.get(&(row, col))
    }

    /// Store a format. The default format removes the entry.
    pub fn set_format(&mut self, row: usize, col: usize, format: CellFormat) {
        if format.is_default() {
            self.formats.remove(&(row, col));
        } else {
            self.formats.insert((row, col), format);
        }
    }

    /// Iterate over all formatted cells (unordered)
    pub fn formats_iter(&self) -> impl Iterator<Item = (&(usize, usize), &CellFormat)> {
        self.formats.iter()
    }

    pub fn merged_ranges(&self) -> &[MergedRange] {
        &self.merged
    }

    /// Record a merge. Inverted, single-cell, and overlapping ranges are
    /// refused; returns whether the range was added.
    pub fn add_merged_range(&mut self, range: MergedRange) -> bool {
        if range.first_row > range.last_row
            || range.first_col > range.last_col
            || range.is_single_cell()
        {
            return false;
        }
        let overlaps = self.merged.iter().any(|m| {
            m.first_row <= range.last_row
                && range.first_row <= m.last_row
                && m.first_col <= range.last_col
                && range.first_col <= m.last_col
        });
        if overlaps {
            return false;
        }
        self.merged.push(range);
        true
    }

    /// Whether (row, col) sits inside a merge but is not its top-left cell.
    pub fn is_merge_hidden(&self, row: usize, col: usize) -> bool {
        self.merged
            .iter()
            .any(|m| m.contains(row, col) && (row, col) != (m.first_row, m.first_col))
    }

    pub fn col_widths(&self) -> &BTreeMap<usize, f64> {
        &self.col_widths
    }

    pub fn set_col_width(&mut self, col: usize, width: f64) {
        self.col_widths.insert(col, width);
    }

    pub fn row_heights(&self) -> &BTreeMap<usize, f64> {
        &self.row_heights
    }

    pub fn set_row_height(&mut self, row: usize, height: f64) {
        self.row_heights.insert(row, height);
    }

    /// Bounding box of non-empty cells, or `None` for a blank sheet.
    pub fn used_range(&self) -> Option<UsedRange> {
        let mut range: Option<UsedRange> = None;
        for (&(row, col), cell) in &self.cells {
            if cell.value.is_empty() {
                continue;
            }
            range = Some(match range {
                None => UsedRange { first_row: row, first_col: col, last_row: row, last_col: col },
                Some(r) => UsedRange {
                    first_row: r.first_row.min(row),
                    first_col: r.first_col.min(col),
                    last_row: r.last_row.max(row),
                    last_col: r.last_col.max(col),
                },
            });
        }
        range
    }
}
