use serde::Serialize;
use serde_json::{Map, Value};

use crate::normalize::normalize_key;

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// Normalized names of fields that carry a record's date or day-of-month.
pub const DATE_FIELDS: &[&str] = &[
    "date",
    "day",
    "reportdate",
    "achievementdate",
    "salesdate",
    "transactiondate",
    "invoicedate",
];

/// One flattened input row (one item x one day, or one item x the cumulative period).
///
/// Field order is the order of the source document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: Map<String, Value>,
}

impl Record {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// First non-null field whose normalized name is a date/day field.
    pub fn date_field(&self) -> Option<(&String, &Value)> {
        date_field_of(&self.fields)
    }
}

pub(crate) fn date_field_of(fields: &Map<String, Value>) -> Option<(&String, &Value)> {
    fields
        .iter()
        .find(|(k, v)| !v.is_null() && DATE_FIELDS.contains(&normalize_key(k).as_str()))
}

/// Records split by destination.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedRecords {
    pub daily: Vec<Record>,
    pub cumulative: Vec<Record>,
}

// ---------------------------------------------------------------------------
// Entries
// ---------------------------------------------------------------------------

/// Value of one write intent.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum EntryValue {
    Number(f64),
    Text(String),
    Bool(bool),
}

impl EntryValue {
    /// Convert a payload value. `None` means "write nothing".
    ///
    /// Numeric strings become numbers so they accumulate; arrays and objects
    /// are written as their JSON text.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::Bool(b) => Some(EntryValue::Bool(*b)),
            Value::Number(n) => n.as_f64().filter(|f| f.is_finite()).map(EntryValue::Number),
            Value::String(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    return None;
                }
                match trimmed.parse::<f64>() {
                    Ok(n) if n.is_finite() => Some(EntryValue::Number(n)),
                    _ => Some(EntryValue::Text(trimmed.to_string())),
                }
            }
            Value::Array(_) | Value::Object(_) => Some(EntryValue::Text(value.to_string())),
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            EntryValue::Number(n) => Some(*n),
            _ => None,
        }
    }
}

/// A resolved write intent: which item/serial row, which territory column, what value.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub item_key: Option<String>,
    pub item_label: Option<String>,
    pub sr_key: Option<String>,
    pub territory: String,
    pub value: EntryValue,
}

// ---------------------------------------------------------------------------
// Summary
// ---------------------------------------------------------------------------

/// Where the cumulative sheet's values came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CumulativeSource {
    /// The payload carried its own cumulative block.
    Explicit,
    /// Summed from the daily records.
    Derived,
    /// Nothing to write (no cumulative sheet schema or no numeric daily entries).
    None,
}

impl std::fmt::Display for CumulativeSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Explicit => write!(f, "explicit"),
            Self::Derived => write!(f, "derived"),
            Self::None => write!(f, "none"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconSummary {
    pub record_count: usize,
    pub daily_records: usize,
    pub cumulative_records: usize,
    pub filled_cells: usize,
    /// Sheets that received at least one value, in first-write order.
    pub sheets_updated: Vec<String>,
    pub skipped_records: usize,
    pub cumulative_sheet: Option<String>,
    pub cumulative_source: CumulativeSource,
}
