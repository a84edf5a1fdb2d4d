use serde::{Deserialize, Serialize};

/// Value held by a template cell.
///
/// Formulas carry the cached result the template was saved with (if any);
/// nothing in the workspace evaluates them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CellValue {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    Formula { source: String, cached: Option<Box<CellValue>> },
}

impl Default for CellValue {
    fn default() -> Self {
        CellValue::Empty
    }
}

impl CellValue {
    /// Build a formula value. A leading `=` is stripped so sources are stored uniformly.
    pub fn formula(source: &str, cached: Option<CellValue>) -> Self {
        let source = source.trim();
        let source = source.strip_prefix('=').unwrap_or(source);
        CellValue::Formula {
            source: source.to_string(),
            cached: cached.filter(|c| !c.is_empty()).map(Box::new),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    pub fn is_formula(&self) -> bool {
        matches!(self, CellValue::Formula { .. })
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Text shown for the cell. Formulas display their cached result.
    pub fn display(&self) -> String {
        match self {
            CellValue::Empty => String::new(),
            CellValue::Text(s) => s.clone(),
            CellValue::Number(n) => format_number(*n),
            CellValue::Bool(b) => if *b { "TRUE".to_string() } else { "FALSE".to_string() },
            CellValue::Formula { cached, .. } => {
                cached.as_deref().map(CellValue::display).unwrap_or_default()
            }
        }
    }
}

/// General number display: integers without decimals.
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

// ============================================================================
// Formatting carried over from the template
// ============================================================================

/// Number format of a cell: one of Excel's built-in ids or a custom code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NumberFormat {
    Builtin(u8),
    Custom(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HorizontalAlign {
    Left,
    Center,
    Right,
    Fill,
    Justify,
    CenterAcross,
    Distributed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VerticalAlign {
    Top,
    Center,
    Bottom,
    Justify,
    Distributed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BorderStyle {
    Thin,
    Medium,
    Dashed,
    Dotted,
    Thick,
    Double,
    Hair,
    MediumDashed,
    DashDot,
    MediumDashDot,
    DashDotDot,
    MediumDashDotDot,
    SlantDashDot,
}

/// Line style of each cell edge; `None` = no border.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellBorders {
    pub top: Option<BorderStyle>,
    pub right: Option<BorderStyle>,
    pub bottom: Option<BorderStyle>,
    pub left: Option<BorderStyle>,
}

impl CellBorders {
    pub fn is_empty(&self) -> bool {
        self.top.is_none() && self.right.is_none() && self.bottom.is_none() && self.left.is_none()
    }
}

/// Formatting of one cell as the template was saved. Colors are `0xRRGGBB`.
///
/// The reconciliation never changes formats; they are read with the template
/// and written back unchanged so the report keeps its look.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CellFormat {
    pub number_format: Option<NumberFormat>,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub strikethrough: bool,
    pub font_name: Option<String>,
    pub font_size: Option<f64>,
    pub font_color: Option<u32>,
    pub fill_color: Option<u32>,
    pub borders: CellBorders,
    pub h_align: Option<HorizontalAlign>,
    pub v_align: Option<VerticalAlign>,
    pub wrap_text: bool,
}

impl CellFormat {
    pub fn is_default(&self) -> bool {
        *self == CellFormat::default()
    }

    /// Whether the format shows on a cell with no value (fill, borders).
    pub fn is_visible_when_blank(&self) -> bool {
        self.fill_color.is_some() || !self.borders.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    pub value: CellValue,
}

impl Cell {
    pub fn new(value: CellValue) -> Self {
        Self { value }
    }
}
