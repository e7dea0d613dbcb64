//! Preferred terminology

use super::{match_case, rewrite_matches, ComplianceRule, Rewrite};
use crate::config::PatternTables;
use lazy_static::lazy_static;
use regex::Regex;
use shared_types::{IssueCategory, Severity};

lazy_static! {
    static ref SUBJECT: Regex =
        Regex::new(r"(?i)\b(?P<word>subject(?P<plural>s)?)\b(?P<to>\s+to\b)?").unwrap();

    static ref STUDY_DRUG: Regex =
        Regex::new(r"(?i)\bstudy\s+(?:drug|medication)(?P<plural>s)?\b").unwrap();
}

/// TRM-001: "subject" -> "participant"
///
/// The replacement is the canonical lowercase term; only an all-caps source
/// (a heading) keeps its casing. "subject to" is left alone.
pub struct ParticipantRule;

impl ComplianceRule for ParticipantRule {
    fn id(&self) -> &'static str {
        "TRM-001"
    }

    fn category(&self) -> IssueCategory {
        IssueCategory::Terminology
    }

    fn severity(&self) -> Severity {
        Severity::Minor
    }

    fn short_description(&self) -> &'static str {
        "Use \"participant\" instead of \"subject\""
    }

    fn check(&self, sentence: &str, _tables: &PatternTables) -> Option<Rewrite> {
        let (improved, matched) = rewrite_matches(sentence, &SUBJECT, |caps| {
            if caps.name("to").is_some() {
                return None;
            }
            let word = &caps["word"];
            let replacement = if caps.name("plural").is_some() {
                "participants"
            } else {
                "participant"
            };
            if word.len() > 1 && word.chars().all(|c| c.is_uppercase()) {
                Some(replacement.to_uppercase())
            } else {
                Some(replacement.to_string())
            }
        })?;

        Some(Rewrite {
            improved,
            matched,
            detail: "Current guidance refers to people enrolled in a trial as participants.".to_string(),
        })
    }
}

/// TRM-002: "study drug" -> "study intervention"
pub struct StudyInterventionRule;

impl ComplianceRule for StudyInterventionRule {
    fn id(&self) -> &'static str {
        "TRM-002"
    }

    fn category(&self) -> IssueCategory {
        IssueCategory::Terminology
    }

    fn severity(&self) -> Severity {
        Severity::Minor
    }

    fn short_description(&self) -> &'static str {
        "Use \"study intervention\" instead of \"study drug\""
    }

    fn check(&self, sentence: &str, _tables: &PatternTables) -> Option<Rewrite> {
        let (improved, matched) = rewrite_matches(sentence, &STUDY_DRUG, |caps| {
            let plural = if caps.name("plural").is_some() { "s" } else { "" };
            Some(match_case(&caps[0], &format!("study intervention{}", plural)))
        })?;

        Some(Rewrite {
            improved,
            matched,
            detail: "\"Study intervention\" covers drugs, devices and procedures alike.".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn participant(sentence: &str) -> Option<String> {
        ParticipantRule
            .check(sentence, &PatternTables::builtin())
            .map(|r| r.improved)
    }

    #[test]
    fn test_subjects_become_participants() {
        assert_eq!(
            participant("Subjects will be enrolled").as_deref(),
            Some("participants will be enrolled")
        );
        assert_eq!(
            participant("Each subject's diary is reviewed.").as_deref(),
            Some("Each participant's diary is reviewed.")
        );
        assert_eq!(
            participant("SUBJECT DISPOSITION").as_deref(),
            Some("PARTICIPANT DISPOSITION")
        );
    }

    #[test]
    fn test_subject_to_is_not_terminology() {
        assert!(participant("Dosing is subject to sponsor approval.").is_none());
        assert_eq!(
            participant("Subjects are subject to review.").as_deref(),
            Some("participants are subject to review.")
        );
    }

    #[test]
    fn test_study_drug() {
        let rewrite = StudyInterventionRule
            .check("Study drug is dispensed at each visit.", &PatternTables::builtin())
            .unwrap();
        assert_eq!(rewrite.improved, "Study intervention is dispensed at each visit.");
    }
}
