use std::collections::BTreeMap;

use crate::model::{Entry, EntryValue};
use crate::normalize::{normalize_key, normalize_territory_key};

/// Identity of one cumulative cell before it is resolved against a sheet.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct TotalKey {
    pub item_key: Option<String>,
    pub sr_key: Option<String>,
    pub territory_key: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunningTotal {
    /// Labels as first seen; used to resolve the cumulative row and column.
    pub item_label: Option<String>,
    pub territory: String,
    pub total: f64,
    pub entry_count: usize,
}

/// Sum of every numeric daily entry, grouped by (item, serial, territory).
#[derive(Debug, Clone, Default)]
pub struct RunningTotals {
    groups: BTreeMap<TotalKey, RunningTotal>,
}

impl RunningTotals {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one entry. Non-numeric values are not summed. Returns whether it counted.
    pub fn add(&mut self, entry: &Entry) -> bool {
        let Some(value) = entry.value.as_number() else {
            return false;
        };
        let mut territory_key = normalize_territory_key(&entry.territory);
        if territory_key.is_empty() {
            territory_key = normalize_key(&entry.territory);
        }
        let key = TotalKey {
            item_key: entry.item_key.clone(),
            sr_key: entry.sr_key.clone(),
            territory_key,
        };
        let total = self.groups.entry(key).or_insert_with(|| RunningTotal {
            item_label: entry.item_label.clone(),
            territory: entry.territory.clone(),
            total: 0.0,
            entry_count: 0,
        });
        total.total += value;
        total.entry_count += 1;
        true
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn get(&self, key: &TotalKey) -> Option<&RunningTotal> {
        self.groups.get(key)
    }

    /// One numeric entry per group, in key order.
    pub fn into_entries(self) -> Vec<Entry> {
        self.groups
            .into_iter()
            .map(|(key, total)| Entry {
                item_key: key.item_key,
                item_label: total.item_label,
                sr_key: key.sr_key,
                territory: total.territory,
                value: EntryValue::Number(total.total),
            })
            .collect()
    }
}
