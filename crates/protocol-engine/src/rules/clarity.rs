//! Clarity of obligations

use super::{match_case, rewrite_matches, ComplianceRule, Rewrite};
use crate::config::PatternTables;
use lazy_static::lazy_static;
use regex::Regex;
use shared_types::{IssueCategory, Severity};

lazy_static! {
    static ref SHOULD_PROCEDURE: Regex = Regex::new(concat!(
        r"(?i)\b(?P<should>should)\s+(?:be\s+)?",
        r"(?:performed|obtained|collected|recorded|completed|documented|reported|assessed|measured|conducted|submitted|stored|reviewed|",
        r"perform|obtain|collect|record|complete|document|report|assess|measure|conduct|submit|store|review)\b"
    ))
    .unwrap();

    /// Dosing sentences keep their hedging; they often encode clinical judgment
    static ref DOSING: Regex =
        Regex::new(r"(?i)\b(?:doses?|dosing|dosage|mg|administer(?:ed)?)\b").unwrap();
}

/// CLR-001: "should" on a procedural obligation
pub struct MandatoryLanguageRule;

impl ComplianceRule for MandatoryLanguageRule {
    fn id(&self) -> &'static str {
        "CLR-001"
    }

    fn category(&self) -> IssueCategory {
        IssueCategory::Clarity
    }

    fn severity(&self) -> Severity {
        Severity::Advisory
    }

    fn short_description(&self) -> &'static str {
        "Procedural obligation uses \"should\""
    }

    fn check(&self, sentence: &str, _tables: &PatternTables) -> Option<Rewrite> {
        if DOSING.is_match(sentence) {
            return None;
        }
        let (improved, matched) = rewrite_matches(sentence, &SHOULD_PROCEDURE, |caps| {
            let should = caps.name("should")?;
            let whole = caps.get(0)?;
            let rest = &whole.as_str()[should.end() - whole.start()..];
            Some(format!("{}{}", match_case(should.as_str(), "must"), rest))
        })?;

        Some(Rewrite {
            improved,
            matched,
            detail: "Required procedures read as mandatory (\"must\"); reserve \"should\" for recommendations."
                .to_string(),
        })
    }
}
