use crate::normalize::normalize_key;
use crate::schema::SheetContext;
use crate::tokenize::{is_numeric_token, tokenize, TokenSet};

/// Minimum Jaccard similarity for a fuzzy item match.
pub const MATCH_THRESHOLD: f64 = 0.5;

/// Resolve an item to a template row.
///
/// Exact normalized-key hit first; otherwise token-set similarity against
/// every indexed item row. Fuzzy outcomes (including "no match") are cached
/// on the context by normalized label.
pub fn resolve_item_row(
    ctx: &mut SheetContext,
    item_key: Option<&str>,
    item_label: Option<&str>,
) -> Option<usize> {
    if let Some(&row) = item_key.filter(|k| !k.is_empty()).and_then(|k| ctx.item_row_map.get(k)) {
        return Some(row);
    }

    let label = item_label?;
    let tokens = tokenize(label);
    if tokens.is_empty() {
        return None;
    }

    let cache_key = normalize_key(label);
    if let Some(&cached) = ctx.item_match_cache.get(&cache_key) {
        return cached;
    }

    let outcome = best_candidate(&tokens, &ctx.item_token_index);
    match outcome {
        Some(row) => log::debug!("'{}': fuzzy item match {label:?} -> row {}", ctx.sheet_name, row + 1),
        None => log::debug!("'{}': no item match for {label:?}", ctx.sheet_name),
    }
    ctx.item_match_cache.insert(cache_key, outcome);
    outcome
}

/// Highest-scoring row at or above the threshold. Ties keep the earliest row.
fn best_candidate(tokens: &TokenSet, index: &[(usize, TokenSet)]) -> Option<usize> {
    let wants_quantity = tokens.iter().any(|t| is_numeric_token(t));

    let mut best: Option<(usize, f64)> = None;
    for (row, candidate) in index {
        if wants_quantity && quantity_conflict(tokens, candidate) {
            continue;
        }
        let score = jaccard(tokens, candidate);
        if best.map_or(true, |(_, s)| score > s) {
            best = Some((*row, score));
        }
    }

    best.filter(|(_, score)| meets_threshold(*score)).map(|(row, _)| row)
}

/// Candidate states a size/quantity and none of them is the one asked for.
fn quantity_conflict(tokens: &TokenSet, candidate: &TokenSet) -> bool {
    let mut candidate_numeric = candidate.iter().filter(|t| is_numeric_token(t)).peekable();
    if candidate_numeric.peek().is_none() {
        return false;
    }
    !candidate_numeric.any(|t| tokens.contains(t))
}

/// |A ∩ B| / |A ∪ B|
pub fn jaccard(a: &TokenSet, b: &TokenSet) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}

pub fn meets_threshold(score: f64) -> bool {
    score >= MATCH_THRESHOLD
}
