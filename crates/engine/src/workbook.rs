use serde::{Deserialize, Serialize};

use super::sheet::Sheet;

/// An ordered collection of named sheets
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Workbook {
    sheets: Vec<Sheet>,
    /// Ask the consuming application to recalculate every formula when the
    /// file is next opened. Cached formula results go stale once raw cells change.
    #[serde(default)]
    full_calc_on_load: bool,
}

impl Workbook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_sheets(sheets: Vec<Sheet>) -> Self {
        Self { sheets, full_calc_on_load: false }
    }

    pub fn sheet_count(&self) -> usize {
        self.sheets.len()
    }

    pub fn sheets(&self) -> &[Sheet] {
        &self.sheets
    }

    pub fn sheet(&self, index: usize) -> Option<&Sheet> {
        self.sheets.get(index)
    }

    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|s| s.name.as_str()).collect()
    }

    /// Exact (case-sensitive) sheet lookup.
    pub fn sheet_by_name(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|s| s.name == name)
    }

    pub fn sheet_by_name_mut(&mut self, name: &str) -> Option<&mut Sheet> {
        self.sheets.iter_mut().find(|s| s.name == name)
    }

    /// Append a sheet. Returns `None` if the name is already taken.
    pub fn add_sheet(&mut self, sheet: Sheet) -> Option<usize> {
        if self.sheet_by_name(&sheet.name).is_some() {
            return None;
        }
        self.sheets.push(sheet);
        Some(self.sheets.len() - 1)
    }

    pub fn full_calc_on_load(&self) -> bool {
        self.full_calc_on_load
    }

    pub fn set_full_calc_on_load(&mut self, value: bool) {
        self.full_calc_on_load = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::CellValue;

    #[test]
    fn test_add_sheet_rejects_duplicate_name() {
        let mut wb = Workbook::new();
        assert_eq!(wb.add_sheet(Sheet::new("01")), Some(0));
        assert_eq!(wb.add_sheet(Sheet::new("02")), Some(1));
        assert_eq!(wb.add_sheet(Sheet::new("01")), None);
        assert_eq!(wb.sheet_names(), vec!["01", "02"]);
    }

    #[test]
    fn test_sheet_by_name_mut() {
        let mut wb = Workbook::from_sheets(vec![Sheet::new("Cumulative")]);
        wb.sheet_by_name_mut("Cumulative")
            .unwrap()
            .set_value(1, 2, CellValue::Number(3.0));
        assert_eq!(wb.sheet(0).unwrap().value(1, 2), &CellValue::Number(3.0));
        assert!(wb.sheet_by_name("cumulative").is_none());
    }

    #[test]
    fn test_full_calc_flag_defaults_off() {
        let mut wb = Workbook::new();
        assert!(!wb.full_calc_on_load());
        wb.set_full_calc_on_load(true);
        assert!(wb.full_calc_on_load());
    }
}
