//! Safety reporting rules

use super::{match_case, rewrite_matches, ComplianceRule, Rewrite};
use crate::config::PatternTables;
use lazy_static::lazy_static;
use regex::Regex;
use shared_types::{IssueCategory, Severity};

/// Reporting deadline substituted for vague urgency
pub const AE_REPORTING_DEADLINE: &str = "within 24 hours of site awareness";

lazy_static! {
    static ref ADVERSE_EVENT: Regex = Regex::new(
        r"(?i)\b(?:(?:serious\s+)?adverse\s+(?:events?|reactions?)|S?AEs?|SUSARs?)\b"
    )
    .unwrap();

    static ref REPORTING: Regex = Regex::new(
        r"(?i)\b(?:report(?:ed|ing|s)?|notif(?:y|ied|ication)|communicated|submitted)\b"
    )
    .unwrap();

    static ref VAGUE_URGENCY: Regex = Regex::new(
        r"(?i)\b(?:promptly|immediately|as\s+soon\s+as\s+(?:possible|practicable|feasible)|without\s+(?:undue\s+)?delay|in\s+a\s+timely\s+(?:manner|fashion)|expeditiously)\b"
    )
    .unwrap();

    static ref STATED_DEADLINE: Regex = Regex::new(
        r"(?i)\bwithin\s+(?:\d+|one|two|three|seven|twenty-four)\s*(?:hours?|hrs?|h|days?|calendar\s+days?)\b"
    )
    .unwrap();
}

/// SAF-001: adverse event reporting without an explicit deadline
pub struct AdverseEventDeadlineRule;

impl ComplianceRule for AdverseEventDeadlineRule {
    fn id(&self) -> &'static str {
        "SAF-001"
    }

    fn category(&self) -> IssueCategory {
        IssueCategory::Safety
    }

    fn severity(&self) -> Severity {
        Severity::Critical
    }

    fn short_description(&self) -> &'static str {
        "Adverse event reporting has no explicit deadline"
    }

    fn check(&self, sentence: &str, _tables: &PatternTables) -> Option<Rewrite> {
        if !ADVERSE_EVENT.is_match(sentence)
            || !REPORTING.is_match(sentence)
            || STATED_DEADLINE.is_match(sentence)
        {
            return None;
        }

        let (improved, matched) = rewrite_matches(sentence, &VAGUE_URGENCY, |caps| {
            Some(match_case(&caps[0], AE_REPORTING_DEADLINE))
        })?;

        Some(Rewrite {
            detail: format!(
                "Reporting \"{}\" cannot be audited. State the sponsor notification deadline: {}.",
                matched.join("\", \""),
                AE_REPORTING_DEADLINE
            ),
            improved,
            matched,
        })
    }
}
