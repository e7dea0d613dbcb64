//! Informed consent rules

use super::{match_case, rewrite_matches, ComplianceRule, Rewrite};
use crate::config::PatternTables;
use lazy_static::lazy_static;
use regex::Regex;
use shared_types::{IssueCategory, Severity};

lazy_static! {
    static ref CONSENT: Regex = Regex::new(r"(?i)\b(?:consent|ICF)\b").unwrap();

    static ref OBTAINED_AFTER: Regex = Regex::new(
        r"(?i)\b(?:(?:may|can|could|will)\s+be|is|are)\s+obtained\s+(?:after|following)\b(?P<clause>[^.;]*)"
    )
    .unwrap();

    static ref UNWRITTEN_CONSENT: Regex =
        Regex::new(r"(?i)\b(?:verbal|oral)\s+(?:informed\s+)?consent\b").unwrap();

    static ref WRITTEN: Regex = Regex::new(r"(?i)\bwritten\b").unwrap();
}

const CONSENT_BEFORE_PROCEDURES: &str =
    "must be obtained before any study-specific procedure is performed";

const CONSENT_TIMING_DETAIL: &str =
    "Informed consent must precede every study-specific procedure, including screening.";

/// REG-001: consent obtained after study procedures have started
pub struct ConsentTimingRule;

impl ComplianceRule for ConsentTimingRule {
    fn id(&self) -> &'static str {
        "REG-001"
    }

    fn category(&self) -> IssueCategory {
        IssueCategory::Regulatory
    }

    fn severity(&self) -> Severity {
        Severity::Critical
    }

    fn short_description(&self) -> &'static str {
        "Consent is allowed after study procedures"
    }

    fn check(&self, sentence: &str, _tables: &PatternTables) -> Option<Rewrite> {
        if !CONSENT.is_match(sentence) {
            return None;
        }
        let (improved, matched) = rewrite_matches(sentence, &OBTAINED_AFTER, |_| {
            Some(CONSENT_BEFORE_PROCEDURES.to_string())
        })?;

        Some(Rewrite {
            improved,
            matched,
            detail: CONSENT_TIMING_DETAIL.to_string(),
        })
    }

    /// Keep the named event ("the Day 1 dose") and move consent ahead of it
    fn fallback(&self, sentence: &str, _tables: &PatternTables) -> Option<Rewrite> {
        if !CONSENT.is_match(sentence) {
            return None;
        }
        let (improved, matched) = rewrite_matches(sentence, &OBTAINED_AFTER, |caps| {
            let clause = caps.name("clause").map_or("", |m| m.as_str().trim_end());
            if clause.trim().is_empty() {
                return Some(CONSENT_BEFORE_PROCEDURES.to_string());
            }
            Some(format!(
                "must be obtained before{} and before any other study-specific procedure",
                clause
            ))
        })?;

        Some(Rewrite {
            improved,
            matched,
            detail: CONSENT_TIMING_DETAIL.to_string(),
        })
    }
}

/// REG-002: consent that is not documented in writing
pub struct WrittenConsentRule;

impl ComplianceRule for WrittenConsentRule {
    fn id(&self) -> &'static str {
        "REG-002"
    }

    fn category(&self) -> IssueCategory {
        IssueCategory::Regulatory
    }

    fn severity(&self) -> Severity {
        Severity::Major
    }

    fn short_description(&self) -> &'static str {
        "Consent is not documented in writing"
    }

    fn check(&self, sentence: &str, _tables: &PatternTables) -> Option<Rewrite> {
        // "verbal consent, confirmed in writing" is already compliant
        if WRITTEN.is_match(sentence) {
            return None;
        }
        let (improved, matched) = rewrite_matches(sentence, &UNWRITTEN_CONSENT, |caps| {
            Some(match_case(&caps[0], "written informed consent"))
        })?;

        Some(Rewrite {
            improved,
            matched,
            detail: "Consent must be documented on a signed and dated written informed consent form."
                .to_string(),
        })
    }
}
