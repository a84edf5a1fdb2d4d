//! Payload extraction and flattening.
//!
//! Payloads arrive in whatever shape the reporting backend produced: a bare
//! list, or an object with the rows under one of several container keys,
//! sometimes one entry per day with the item rows nested inside. Key lists
//! are searched in order; the first array found wins.

use serde_json::{Map, Value};

use crate::model::{date_field_of, ExtractedRecords, Record};

/// Container keys holding a precomputed cumulative block.
pub const CUMULATIVE_KEYS: &[&str] = &["cumulative", "cum", "summary"];

/// Container keys holding the daily rows.
pub const DAILY_KEYS: &[&str] = &[
    "daily",
    "details",
    "records",
    "rows",
    "list",
    "achievementReportDTOs",
    "achievementReportDtos",
];

/// Keys under which one element nests its own per-item rows.
pub const NESTED_KEYS: &[&str] = &[
    "achievementReportDTOs",
    "achievementReportDtos",
    "items",
    "rows",
    "details",
    "data",
    "list",
];

/// Top-level payload shape.
#[derive(Debug, Clone, PartialEq)]
pub enum RawPayload {
    List(Vec<Value>),
    Container(Map<String, Value>),
    /// Scalars and `null` carry no records.
    Empty,
}

impl RawPayload {
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Array(items) => RawPayload::List(items),
            Value::Object(map) => RawPayload::Container(map),
            _ => RawPayload::Empty,
        }
    }
}

impl From<Value> for RawPayload {
    fn from(value: Value) -> Self {
        RawPayload::from_value(value)
    }
}

/// Split a payload into flattened daily and cumulative records.
pub fn extract_records(payload: &RawPayload) -> ExtractedRecords {
    match payload {
        RawPayload::List(items) => ExtractedRecords {
            daily: flatten(items),
            cumulative: Vec::new(),
        },
        RawPayload::Container(map) => {
            let cumulative = first_array(map, CUMULATIVE_KEYS);
            let daily = first_array(map, DAILY_KEYS).or_else(|| {
                let cumulative_key = cumulative.map(|(k, _)| k);
                map.iter()
                    .filter(|(k, _)| Some(k.as_str()) != cumulative_key)
                    .find_map(|(k, v)| v.as_array().map(|items| (k.as_str(), items)))
            });

            if let Some((key, _)) = daily {
                log::debug!("daily records under '{key}'");
            }
            if let Some((key, _)) = cumulative {
                log::debug!("cumulative records under '{key}'");
            }

            ExtractedRecords {
                daily: daily.map(|(_, items)| flatten(items)).unwrap_or_default(),
                cumulative: cumulative.map(|(_, items)| flatten(items)).unwrap_or_default(),
            }
        }
        RawPayload::Empty => ExtractedRecords::default(),
    }
}

fn first_array<'a>(map: &'a Map<String, Value>, keys: &[&'static str]) -> Option<(&'a str, &'a Vec<Value>)> {
    keys.iter().find_map(|key| {
        map.get_key_value(*key)
            .and_then(|(k, v)| v.as_array().map(|items| (k.as_str(), items)))
    })
}

/// Expand elements that nest their own item rows; children without a
/// date/day field inherit the parent's. Non-object elements are dropped.
pub fn flatten(items: &[Value]) -> Vec<Record> {
    let mut records = Vec::with_capacity(items.len());
    for item in items {
        let Value::Object(fields) = item else {
            continue;
        };

        let Some(nested) = NESTED_KEYS
            .iter()
            .find_map(|key| fields.get(*key).and_then(Value::as_array))
        else {
            records.push(Record::new(fields.clone()));
            continue;
        };

        let parent_date = date_field_of(fields);
        for child in nested {
            let Value::Object(child_fields) = child else {
                continue;
            };
            let mut child_fields = child_fields.clone();
            if date_field_of(&child_fields).is_none() {
                if let Some((key, value)) = parent_date {
                    child_fields.insert(key.clone(), value.clone());
                }
            }
            records.push(Record::new(child_fields));
        }
    }
    records
}
