//! Ambiguous wording: vague conditional triggers and "and/or"

use super::{match_case, rewrite_matches, ComplianceRule, Rewrite};
use crate::config::PatternTables;
use lazy_static::lazy_static;
use regex::Regex;
use shared_types::{IssueCategory, Severity};

lazy_static! {
    static ref AND_OR: Regex = Regex::new(
        r"\b(?P<a>[A-Za-z][A-Za-z-]*)\s+and\s*/\s*or\s+(?P<b>[A-Za-z][A-Za-z-]*)\b"
    )
    .unwrap();
}

/// AMB-001: a condition nobody can verify ("unless safety concern arises")
///
/// Triggers and their rewrites come from the shared pattern tables, the same
/// ones the suggestion validator checks against.
pub struct VagueTriggerRule;

impl ComplianceRule for VagueTriggerRule {
    fn id(&self) -> &'static str {
        "AMB-001"
    }

    fn category(&self) -> IssueCategory {
        IssueCategory::Ambiguity
    }

    fn severity(&self) -> Severity {
        Severity::Major
    }

    fn short_description(&self) -> &'static str {
        "Conditional trigger is not objectively measurable"
    }

    fn check(&self, sentence: &str, tables: &PatternTables) -> Option<Rewrite> {
        let mut improved = sentence.to_string();
        let mut matched = Vec::new();
        let mut labels = Vec::new();

        for trigger in &tables.vague_triggers {
            let rewritten = rewrite_matches(&improved, &trigger.regex, |caps| {
                Some(match_case(&caps[0], &trigger.objective_rewrite))
            });
            if let Some((text, found)) = rewritten {
                improved = text;
                matched.extend(found);
                labels.push(trigger.label.as_str());
            }
        }

        if matched.is_empty() {
            return None;
        }
        Some(Rewrite {
            detail: format!(
                "Vague trigger ({}) replaced with a measurable criterion; adjust the grade or threshold to the protocol's safety plan.",
                labels.join(", ")
            ),
            improved,
            matched,
        })
    }
}

/// AMB-002: "A and/or B"
pub struct AndOrRule;

impl ComplianceRule for AndOrRule {
    fn id(&self) -> &'static str {
        "AMB-002"
    }

    fn category(&self) -> IssueCategory {
        IssueCategory::Ambiguity
    }

    fn severity(&self) -> Severity {
        Severity::Minor
    }

    fn short_description(&self) -> &'static str {
        "\"and/or\" leaves the requirement open"
    }

    fn check(&self, sentence: &str, _tables: &PatternTables) -> Option<Rewrite> {
        let (improved, matched) = rewrite_matches(sentence, &AND_OR, |caps| {
            Some(format!("{}, {}, or both", &caps["a"], &caps["b"]))
        })?;
        Some(Rewrite {
            improved,
            matched,
            detail: "State whether either item alone satisfies the requirement.".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_vague_trigger_rewritten() {
        let rewrite = VagueTriggerRule
            .check(
                "Dosing continues unless safety concern arises.",
                &PatternTables::builtin(),
            )
            .unwrap();
        assert_eq!(
            rewrite.improved,
            "Dosing continues unless a Grade 3 or higher adverse event (CTCAE v5.0) occurs."
        );
        assert_eq!(rewrite.matched, vec!["unless safety concern arises".to_string()]);
    }

    #[test]
    fn test_several_triggers_in_one_sentence() {
        let rewrite = VagueTriggerRule
            .check(
                "Repeat labs as clinically indicated and hold dosing for significant toxicity.",
                &PatternTables::builtin(),
            )
            .unwrap();
        assert_eq!(rewrite.matched.len(), 2);
        assert!(rewrite.improved.contains("Grade 2 or higher per CTCAE v5.0"));
        assert!(rewrite.improved.contains("Grade 3 or higher toxicity (CTCAE v5.0)"));
    }

    #[test]
    fn test_objective_trigger_passes() {
        assert!(VagueTriggerRule
            .check(
                "Hold dosing if ALT > 3 x ULN.",
                &PatternTables::builtin()
            )
            .is_none());
    }

    #[test]
    fn test_and_or() {
        let rewrite = AndOrRule
            .check("Report nausea and/or vomiting.", &PatternTables::builtin())
            .unwrap();
        assert_eq!(rewrite.improved, "Report nausea, vomiting, or both.");
    }
}
