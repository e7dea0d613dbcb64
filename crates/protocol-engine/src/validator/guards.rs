//! Guards shared by the suggestion validator and the rule engine's exclusion check
//!
//! Each guard compares an original text with a proposed replacement and
//! returns the reason it objects, or `None`.

use crate::config::PatternTables;
use crate::extractors::numeric::missing_tokens;
use crate::patterns::OBJECTIVE_CRITERIA;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref OBJECTIVE_PATTERNS: Vec<Regex> = OBJECTIVE_CRITERIA
        .iter()
        .map(|source| Regex::new(source).unwrap())
        .collect();
}

/// Any numeric token of `original` altered or missing in `suggested`
pub fn numeric_change(original: &str, suggested: &str) -> Option<String> {
    let missing = missing_tokens(original, suggested);
    if missing.is_empty() {
        return None;
    }
    let values: Vec<&str> = missing.iter().map(|t| t.raw.as_str()).collect();
    Some(format!("numeric value altered or removed: {}", values.join(", ")))
}

/// Endpoint groups named in `original` with no equivalent term left in `suggested`
pub fn endpoint_change(original: &str, suggested: &str, tables: &PatternTables) -> Option<String> {
    let lost: Vec<&str> = tables
        .endpoint_groups
        .iter()
        .filter(|group| group.is_present(original) && !group.is_present(suggested))
        .map(|group| group.label.as_str())
        .collect();
    if lost.is_empty() {
        return None;
    }
    Some(format!("endpoint removed or altered: {}", lost.join(", ")))
}

/// Claim wording of `original` that `suggested` drops
pub fn claim_removed(original: &str, suggested: &str, tables: &PatternTables) -> Option<String> {
    let lost = claim_labels(tables, |claim| claim.is_match(original) && !claim.is_match(suggested));
    (!lost.is_empty()).then(|| format!("claim wording removed: {}", lost.join(", ")))
}

/// Claim wording that `suggested` introduces
pub fn claim_introduced(original: &str, suggested: &str, tables: &PatternTables) -> Option<String> {
    let added = claim_labels(tables, |claim| !claim.is_match(original) && claim.is_match(suggested));
    (!added.is_empty()).then(|| format!("new claim wording introduced: {}", added.join(", ")))
}

fn claim_labels(tables: &PatternTables, keep: impl Fn(&Regex) -> bool) -> Vec<&str> {
    tables
        .claim_keywords
        .iter()
        .filter(|claim| keep(&claim.regex))
        .map(|claim| claim.label.as_str())
        .collect()
}

/// Changes no rewrite may make: numbers, dosages and named endpoints
pub fn protected_change(original: &str, suggested: &str, tables: &PatternTables) -> Option<String> {
    numeric_change(original, suggested).or_else(|| endpoint_change(original, suggested, tables))
}

/// Vague triggers of `original` that survive into `suggested`
pub fn vague_triggers_kept(original: &str, suggested: &str, tables: &PatternTables) -> Vec<String> {
    tables
        .vague_triggers
        .iter()
        .filter(|trigger| trigger.regex.is_match(original) && trigger.regex.is_match(suggested))
        .map(|trigger| trigger.label.clone())
        .collect()
}

pub fn has_vague_trigger(text: &str, tables: &PatternTables) -> bool {
    tables.vague_triggers.iter().any(|trigger| trigger.regex.is_match(text))
}

/// A grade, comparator, measured value, time bound or document reference
pub fn has_objective_criterion(text: &str) -> bool {
    OBJECTIVE_PATTERNS.iter().any(|pattern| pattern.is_match(text))
}
