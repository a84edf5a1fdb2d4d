//! `tallygrid-engine`: in-memory workbook model.
//!
//! Cells, sheets, and workbooks as loaded from a report template. Formulas
//! are stored verbatim with their cached results and are never evaluated.

pub mod cell;
pub mod cell_id;
pub mod sheet;
pub mod workbook;
