//! Record -> write intents for one sheet.

use std::collections::{HashMap, HashSet};

use serde_json::Value;

use crate::matcher::resolve_item_row;
use crate::model::{Entry, EntryValue, Record, DATE_FIELDS};
use crate::normalize::{normalize_key, serial_key};
use crate::schema::SheetContext;

/// Item description fields, in priority order.
pub const ITEM_FIELDS: &[&str] = &[
    "itemDescription",
    "itemName",
    "item",
    "productName",
    "skuName",
    "sku",
    "itemDesc",
];

/// Serial / row-number fields, in priority order.
pub const SERIAL_FIELDS: &[&str] = &["sr", "srNo", "serial", "serialNo", "row", "rowNo"];

/// Value fields paired with a single `territory*` field, in priority order.
pub const VALUE_FIELDS: &[&str] = &[
    "soldQty",
    "totalSoldValue",
    "value",
    "qty",
    "quantity",
    "sales",
    "amount",
    "total",
    "achievement",
    "target",
];

/// Fields holding a territory -> value map.
pub const TERRITORY_MAP_FIELDS: &[&str] = &["values", "territories", "territoryValues", "areaValues"];

/// Normalized field name -> original field name (first spelling wins).
struct FieldIndex<'a> {
    record: &'a Record,
    by_key: HashMap<String, &'a str>,
}

impl<'a> FieldIndex<'a> {
    fn new(record: &'a Record) -> Self {
        let mut by_key = HashMap::with_capacity(record.len());
        for (name, _) in record.fields() {
            by_key.entry(normalize_key(name)).or_insert(name.as_str());
        }
        Self { record, by_key }
    }

    /// First candidate present with a non-null value: (original name, value).
    fn first(&self, candidates: &[&str]) -> Option<(&'a str, &'a Value)> {
        candidates.iter().find_map(|candidate| {
            let name = *self.by_key.get(&normalize_key(candidate))?;
            let value = self.record.get(name)?;
            (!value.is_null()).then_some((name, value))
        })
    }
}

/// Text of a scalar field, trimmed; `None` when blank.
fn scalar_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => match n.as_f64() {
            Some(f) => tallygrid_engine::cell::format_number(f),
            None => n.to_string(),
        },
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

fn is_territory_field(normalized: &str) -> bool {
    normalized.starts_with("territory")
        && !TERRITORY_MAP_FIELDS.iter().any(|f| normalize_key(f) == normalized)
}

/// Among the `territory*` fields, the first whose text names a column of
/// `ctx`; otherwise the first non-blank one.
fn pick_territory<'a>(
    fields: impl Iterator<Item = (&'a String, &'a Value)>,
    ctx: &SheetContext,
) -> Option<String> {
    let mut fallback = None;
    for (name, value) in fields {
        if !is_territory_field(&normalize_key(name)) {
            continue;
        }
        let Some(text) = scalar_text(value) else {
            continue;
        };
        if ctx.resolve_column(&text).is_some() {
            return Some(text);
        }
        fallback.get_or_insert(text);
    }
    fallback
}

/// Turn one record into write intents against `ctx`.
///
/// Returns nothing when neither the item nor the serial resolves to a row of
/// the sheet; such records do not belong to this template.
pub fn extract_entries(record: &Record, ctx: &mut SheetContext) -> Vec<Entry> {
    let index = FieldIndex::new(record);

    let item = index.first(ITEM_FIELDS);
    let item_label = item.and_then(|(_, v)| scalar_text(v));
    let item_key = item_label.as_deref().map(normalize_key).filter(|k| !k.is_empty());

    let serial = index.first(SERIAL_FIELDS);
    let sr_key = serial
        .and_then(|(_, v)| scalar_text(v))
        .map(|s| serial_key(&s))
        .filter(|k| !k.is_empty());

    let item_row = resolve_item_row(ctx, item_key.as_deref(), item_label.as_deref());
    let sr_row = sr_key.as_deref().and_then(|k| ctx.sr_row(k));
    if item_row.is_none() && sr_row.is_none() {
        return Vec::new();
    }

    let make_entry = |territory: String, value: EntryValue| Entry {
        item_key: item_key.clone(),
        item_label: item_label.clone(),
        sr_key: sr_key.clone(),
        territory,
        value,
    };

    let mut pairs: Vec<(String, &Value)> = Vec::new();

    let territory = pick_territory(record.fields(), ctx);
    let value_field = index.first(VALUE_FIELDS);

    if let (Some(territory), Some((_, value))) = (territory, value_field) {
        pairs.push((territory, value));
    } else if let Some((_, map)) = index.first(TERRITORY_MAP_FIELDS) {
        collect_territory_map(map, ctx, &mut pairs);
    } else {
        let mut used: HashSet<&str> = HashSet::new();
        for (name, _) in [item, serial].into_iter().flatten() {
            used.insert(name);
        }
        for (name, value) in record.fields() {
            let key = normalize_key(name);
            if used.contains(name.as_str()) || DATE_FIELDS.contains(&key.as_str()) {
                continue;
            }
            if ctx.resolve_column(name).is_some() {
                pairs.push((name.clone(), value));
            }
        }
    }

    pairs
        .into_iter()
        .filter_map(|(territory, value)| {
            EntryValue::from_json(value).map(|v| make_entry(territory, v))
        })
        .collect()
}

/// `{"Colombo": 10, "Galle": 5}` or `[{"territory": "Colombo", "qty": 10}, ...]`.
fn collect_territory_map<'a>(
    map: &'a Value,
    ctx: &SheetContext,
    pairs: &mut Vec<(String, &'a Value)>,
) {
    match map {
        Value::Object(fields) => {
            for (territory, value) in fields {
                pairs.push((territory.clone(), value));
            }
        }
        Value::Array(items) => {
            for item in items {
                let Value::Object(fields) = item else {
                    continue;
                };
                let territory = pick_territory(fields.iter(), ctx);
                let value = VALUE_FIELDS.iter().find_map(|candidate| {
                    let wanted = normalize_key(candidate);
                    fields
                        .iter()
                        .find(|(name, v)| normalize_key(name) == wanted && !v.is_null())
                        .map(|(_, v)| v)
                });
                if let (Some(territory), Some(value)) = (territory, value) {
                    pairs.push((territory, value));
                }
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{inspect_sheet, HeaderLabels};
    use serde_json::json;
    use tallygrid_engine::cell::CellValue;
    use tallygrid_engine::sheet::Sheet;

    fn context() -> SheetContext {
        let mut sheet = Sheet::new("01");
        for (col, header) in ["Sr", "Item Description", "Colombo", "Galle", "Total"].iter().enumerate() {
            sheet.set_value(0, col, CellValue::Text(header.to_string()));
        }
        sheet.set_value(1, 0, CellValue::Number(1.0));
        sheet.set_value(1, 1, CellValue::Text("Item A".into()));
        sheet.set_value(2, 0, CellValue::Number(2.0));
        sheet.set_value(2, 1, CellValue::Text("Item B".into()));
        inspect_sheet(&sheet, &HeaderLabels::default()).unwrap()
    }

    fn record(value: Value) -> Record {
        Record::new(value.as_object().unwrap().clone())
    }

    #[test]
    fn single_territory_pair() {
        let mut ctx = context();
        let entries = extract_entries(
            &record(json!({"itemName": "Item A", "territory": "Colombo", "qty": 10, "value": 99})),
            &mut ctx,
        );
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].item_key.as_deref(), Some("itema"));
        assert_eq!(entries[0].territory, "Colombo");
        // `value` outranks `qty` in the value-field list
        assert_eq!(entries[0].value, EntryValue::Number(99.0));
    }

    #[test]
    fn field_names_are_normalized() {
        let mut ctx = context();
        let entries = extract_entries(
            &record(json!({"Item_Name": "Item B", "TerritoryName": "Galle (A)", "SOLD_QTY": "4"})),
            &mut ctx,
        );
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].territory, "Galle (A)");
        assert_eq!(entries[0].value, EntryValue::Number(4.0));
    }

    #[test]
    fn nested_territory_map() {
        let mut ctx = context();
        let entries = extract_entries(
            &record(json!({"itemName": "Item A", "values": {"Colombo": 3, "Galle": null, "Kandy": 1}})),
            &mut ctx,
        );
        let territories: Vec<&str> = entries.iter().map(|e| e.territory.as_str()).collect();
        assert_eq!(territories, vec!["Colombo", "Kandy"]);
    }

    #[test]
    fn nested_territory_list() {
        let mut ctx = context();
        let entries = extract_entries(
            &record(json!({
                "itemName": "Item A",
                "areaValues": [
                    {"territory": "Colombo", "amount": 7},
                    {"territory": "Galle"},
                    "junk"
                ]
            })),
            &mut ctx,
        );
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].value, EntryValue::Number(7.0));
    }

    #[test]
    fn wide_record_uses_territory_columns() {
        let mut ctx = context();
        let entries = extract_entries(
            &record(json!({"sr": 2, "date": "2024-01-02", "Colombo": 1, "galle": 2, "note": "x"})),
            &mut ctx,
        );
        let territories: Vec<&str> = entries.iter().map(|e| e.territory.as_str()).collect();
        assert_eq!(territories, vec!["Colombo", "galle"]);
        assert_eq!(entries[0].sr_key.as_deref(), Some("2"));
        assert!(entries[0].item_key.is_none());
    }

    #[test]
    fn unresolvable_record_yields_nothing() {
        let mut ctx = context();
        let entries = extract_entries(
            &record(json!({"itemName": "Something Else", "territory": "Colombo", "qty": 1})),
            &mut ctx,
        );
        assert!(entries.is_empty());

        let entries = extract_entries(&record(json!({"territory": "Colombo", "qty": 1})), &mut ctx);
        assert!(entries.is_empty());
    }

    #[test]
    fn serial_rescues_unmatched_item() {
        let mut ctx = context();
        let entries = extract_entries(
            &record(json!({"itemName": "Renamed Product", "srNo": "01", "territory": "Galle", "qty": 5})),
            &mut ctx,
        );
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].sr_key.as_deref(), Some("1"));
    }

    #[test]
    fn territory_id_does_not_shadow_territory_name() {
        let mut ctx = context();
        let entries = extract_entries(
            &record(json!({"itemName": "Item A", "territoryId": 7, "territoryName": "Colombo", "qty": 5})),
            &mut ctx,
        );
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].territory, "Colombo");

        let entries = extract_entries(
            &record(json!({
                "itemName": "Item B",
                "areaValues": [{"territoryCode": "T9", "territoryName": "Galle", "amount": 2}]
            })),
            &mut ctx,
        );
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].territory, "Galle");
    }

    #[test]
    fn unresolved_territory_falls_back_to_first_field() {
        let mut ctx = context();
        let entries = extract_entries(
            &record(json!({"itemName": "Item A", "territoryId": 7, "territoryName": "Kandy", "qty": 5})),
            &mut ctx,
        );
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].territory, "7");
    }

    #[test]
    fn blank_values_dropped() {
        let mut ctx = context();
        let entries = extract_entries(
            &record(json!({"itemName": "Item A", "territory": "Colombo", "qty": "  "})),
            &mut ctx,
        );
        assert!(entries.is_empty());
    }
}
