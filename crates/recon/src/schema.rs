//! Template schema inspection.
//!
//! Finds, for one worksheet, the header row, the item-description column, the
//! territory columns, and a row index for every item and serial number.

use std::collections::{BTreeSet, HashMap};

use serde::Serialize;
use tallygrid_engine::sheet::Sheet;
use tallygrid_engine::workbook::Workbook;

use crate::config::ReconConfig;
use crate::normalize::{is_total_key, normalize_key, normalize_territory_key, serial_key};
use crate::tokenize::{tokenize, TokenSet};

/// Normalized header labels, prepared once per run from a [`ReconConfig`].
#[derive(Debug, Clone)]
pub struct HeaderLabels {
    pub primary: String,
    pub secondary: String,
    pub item_targets: Vec<String>,
    pub scan_rows: usize,
}

impl HeaderLabels {
    pub fn from_config(config: &ReconConfig) -> Self {
        Self {
            primary: normalize_key(&config.header.primary_label),
            secondary: normalize_key(&config.header.secondary_label),
            item_targets: config
                .header
                .item_labels
                .iter()
                .map(|l| normalize_key(l))
                .filter(|l| !l.is_empty())
                .collect(),
            scan_rows: config.header.scan_rows,
        }
    }
}

impl Default for HeaderLabels {
    fn default() -> Self {
        Self::from_config(&ReconConfig::default())
    }
}

/// A territory column as written in the template header.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TerritoryColumn {
    pub col: usize,
    pub header: String,
    pub is_total: bool,
}

/// Inferred layout of one sheet.
///
/// Immutable once built, except `item_match_cache`, which only grows.
#[derive(Debug, Clone, Serialize)]
pub struct SheetContext {
    pub sheet_name: String,
    pub header_row: usize,
    pub item_column: usize,
    /// Leftmost populated column; holds serial numbers.
    pub first_column: usize,
    pub columns: Vec<TerritoryColumn>,
    pub column_map: HashMap<String, usize>,
    pub total_columns: BTreeSet<usize>,
    pub item_row_map: HashMap<String, usize>,
    pub sr_row_map: HashMap<String, usize>,
    pub item_token_index: Vec<(usize, TokenSet)>,
    #[serde(skip)]
    pub(crate) item_match_cache: HashMap<String, Option<usize>>,
}

impl SheetContext {
    /// Column for a territory label: suffix-stripped key first, raw key second.
    pub fn resolve_column(&self, territory: &str) -> Option<usize> {
        let stripped = normalize_territory_key(territory);
        if let Some(&col) = self.column_map.get(&stripped) {
            return Some(col);
        }
        self.column_map.get(&normalize_key(territory)).copied()
    }

    pub fn is_total_column(&self, col: usize) -> bool {
        self.total_columns.contains(&col)
    }

    pub fn sr_row(&self, sr_key: &str) -> Option<usize> {
        self.sr_row_map.get(sr_key).copied()
    }

    pub fn cached_matches(&self) -> usize {
        self.item_match_cache.len()
    }
}

/// Build the schema of `sheet_name`, or `None` if the sheet is missing,
/// blank, or has no recognizable header row.
pub fn build_sheet_context(
    workbook: &Workbook,
    sheet_name: &str,
    labels: &HeaderLabels,
) -> Option<SheetContext> {
    let sheet = workbook.sheet_by_name(sheet_name)?;
    inspect_sheet(sheet, labels)
}

pub fn inspect_sheet(sheet: &Sheet, labels: &HeaderLabels) -> Option<SheetContext> {
    let range = sheet.used_range()?;

    let scan_end = range.last_row.min(range.first_row + labels.scan_rows.saturating_sub(1));
    let find_label = |target: &str| -> Option<usize> {
        if target.is_empty() {
            return None;
        }
        (range.first_row..=scan_end).find(|&row| {
            range
                .cols()
                .any(|col| normalize_key(&sheet.text(row, col)) == target)
        })
    };
    let header_row = find_label(&labels.primary).or_else(|| find_label(&labels.secondary))?;

    let item_column = range
        .cols()
        .find(|&col| {
            let key = normalize_key(&sheet.text(header_row, col));
            labels.item_targets.contains(&key)
        })
        .unwrap_or(range.first_col + 1);

    let mut columns = Vec::new();
    let mut column_map = HashMap::new();
    let mut total_columns = BTreeSet::new();
    for col in (item_column + 1)..=range.last_col {
        let header = sheet.text(header_row, col);
        let literal = normalize_key(&header);
        if literal.is_empty() {
            continue;
        }
        let is_total = is_total_key(&literal);
        if is_total {
            total_columns.insert(col);
        }
        let territory = normalize_territory_key(&header);
        column_map.entry(literal).or_insert(col);
        if !territory.is_empty() {
            column_map.entry(territory).or_insert(col);
        }
        columns.push(TerritoryColumn { col, header, is_total });
    }

    let mut item_row_map = HashMap::new();
    let mut sr_row_map = HashMap::new();
    let mut item_token_index = Vec::new();
    for row in (header_row + 1)..=range.last_row {
        let label = sheet.text(row, item_column);
        let key = normalize_key(&label);
        if !key.is_empty() && !is_total_key(&key) {
            item_row_map.entry(key).or_insert(row);
            let tokens = tokenize(&label);
            if !tokens.is_empty() {
                item_token_index.push((row, tokens));
            }
        }

        if range.first_col != item_column {
            let sr = serial_key(&sheet.text(row, range.first_col));
            if !sr.is_empty() {
                sr_row_map.entry(sr).or_insert(row);
            }
        }
    }

    if column_map.is_empty() {
        log::debug!("sheet '{}' has a header row but no territory columns", sheet.name);
    }

    Some(SheetContext {
        sheet_name: sheet.name.clone(),
        header_row,
        item_column,
        first_column: range.first_col,
        columns,
        column_map,
        total_columns,
        item_row_map,
        sr_row_map,
        item_token_index,
        item_match_cache: HashMap::new(),
    })
}
