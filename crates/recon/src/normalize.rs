//! Comparable keys for headers, record field names, item labels, and territories.

use once_cell::sync::Lazy;
use regex::Regex;

/// `"Colombo (A)"` -> `"Colombo"`
static PAREN_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.*\S)\s*\(\s*[A-Za-z]\s*\)\s*$").unwrap());

/// `"Colombo - A"`, `"Colombo/B"`, `"Colombo C"` -> `"Colombo"`
static SEPARATOR_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.*?\S)\s*[\s/-]\s*[A-Za-z]\s*$").unwrap());

/// Lower-case and drop everything outside `[a-z0-9]`.
pub fn normalize_key(value: &str) -> String {
    value
        .chars()
        .flat_map(char::to_lowercase)
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        .collect()
}

/// Strip a single-letter disambiguating suffix from a territory label, then normalize.
///
/// Source systems label the same territory `"Galle (A)"` or `"Galle - B"`
/// while template headers just say `"Galle"`.
pub fn normalize_territory_key(value: &str) -> String {
    normalize_key(&strip_territory_suffix(value))
}

fn strip_territory_suffix(value: &str) -> String {
    let mut label = value.trim().to_string();
    if let Some(caps) = PAREN_SUFFIX.captures(&label) {
        label = caps[1].to_string();
    }
    if let Some(caps) = SEPARATOR_SUFFIX.captures(&label) {
        label = caps[1].to_string();
    }
    label
}

/// Key for a serial/row-number value.
///
/// All-digit keys lose leading zeros so `"007"`, `"7"` and `7.0` agree.
pub fn serial_key(value: &str) -> String {
    let key = normalize_key(value);
    if !key.is_empty() && key.bytes().all(|b| b.is_ascii_digit()) {
        let trimmed = key.trim_start_matches('0');
        if trimmed.is_empty() {
            return "0".to_string();
        }
        return trimmed.to_string();
    }
    key
}

/// Header or item label that denotes an aggregate. Tolerates the `tatal` typo.
pub fn is_total_key(normalized: &str) -> bool {
    normalized.contains("total") || normalized.contains("tatal")
}
