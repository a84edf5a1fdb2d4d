//! Item description tokenizer.
//!
//! Turns free-text item descriptions into a canonical token set so that
//! `"Suger 1Kg Pack"` and `"Sugar 1 kg"` compare equal. The tables are
//! closed and hand-curated against known source-system naming; they are not
//! a spell-checker. Changing an entry changes which historical item names
//! match, so entries are only ever added.

use std::collections::BTreeSet;

/// Order-insensitive, deduplicated tokens.
pub type TokenSet = BTreeSet<String>;

/// Unit spellings -> canonical unit.
const UNIT_SYNONYMS: &[(&str, &str)] = &[
    ("g", "g"),
    ("gr", "g"),
    ("gram", "g"),
    ("grams", "g"),
    ("kg", "kg"),
    ("kgs", "kg"),
    ("l", "l"),
    ("lt", "l"),
    ("ltr", "l"),
    ("litre", "l"),
    ("liter", "l"),
    ("ml", "ml"),
];

/// Known data-entry misspellings. An empty replacement drops the word.
const SPELLING_SYNONYMS: &[(&str, &str)] = &[
    ("suger", "sugar"),
    ("sugur", "sugar"),
    ("margerine", "margarine"),
    ("margrine", "margarine"),
    ("choclate", "chocolate"),
    ("chocolat", "chocolate"),
    ("biscut", "biscuit"),
    ("biscuts", "biscuits"),
    ("buiscuit", "biscuit"),
    ("flor", "flour"),
    ("x", ""),
    ("of", ""),
    ("and", ""),
];

/// Packaging words that never distinguish one item from another.
const STOP_WORDS: &[&str] = &[
    "pack", "packs", "packet", "pkt", "box", "bulk", "bag", "bottle", "btl", "can", "tin", "jar",
    "pouch", "sachet",
];

fn unit_of(word: &str) -> Option<&'static str> {
    UNIT_SYNONYMS
        .iter()
        .find(|(from, _)| *from == word)
        .map(|(_, to)| *to)
}

fn correct_spelling(word: &str) -> &str {
    SPELLING_SYNONYMS
        .iter()
        .find(|(from, _)| *from == word)
        .map(|(_, to)| *to)
        .unwrap_or(word)
}

/// Split `"500g"` into `("500", "g")`. Both halves must be non-empty and the
/// suffix purely alphabetic.
fn split_quantity(word: &str) -> Option<(&str, &str)> {
    let split = word.find(|c: char| !c.is_ascii_digit())?;
    let (digits, suffix) = word.split_at(split);
    if digits.is_empty() || !suffix.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    Some((digits, suffix))
}

fn is_numeral(word: &str) -> bool {
    !word.is_empty() && word.bytes().all(|b| b.is_ascii_digit())
}

/// Token that carries a quantity or size (`"500g"`, `"12"`).
pub fn is_numeric_token(token: &str) -> bool {
    token.as_bytes().first().is_some_and(|b| b.is_ascii_digit())
}

/// Canonical token set for an item description.
pub fn tokenize(description: &str) -> TokenSet {
    let cleaned: String = description
        .chars()
        .flat_map(char::to_lowercase)
        .map(|c| if c.is_ascii_alphanumeric() { c } else { ' ' })
        .collect();
    let words: Vec<&str> = cleaned.split_whitespace().collect();

    let mut tokens = TokenSet::new();
    let mut i = 0;
    while i < words.len() {
        let word = words[i];

        if let Some((digits, suffix)) = split_quantity(word) {
            let unit = unit_of(suffix).unwrap_or(suffix);
            tokens.insert(format!("{digits}{unit}"));
            i += 1;
            continue;
        }

        if is_numeral(word) {
            if let Some(unit) = words.get(i + 1).and_then(|next| unit_of(next)) {
                tokens.insert(format!("{word}{unit}"));
                i += 2;
                continue;
            }
            tokens.insert(word.to_string());
            i += 1;
            continue;
        }

        let corrected = correct_spelling(word);
        if !corrected.is_empty() && !STOP_WORDS.contains(&corrected) {
            tokens.insert(corrected.to_string());
        }
        i += 1;
    }

    tokens
}
