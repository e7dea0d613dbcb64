//! Gatekeeping for machine-suggested edits
//!
//! [`SuggestionValidator`] decides whether a suggested rewrite may be shown.
//! All checks run and their reasons accumulate; the result carries the
//! strongest severity seen. Faults fail closed.

pub mod guards;

use crate::config::{PatternTables, DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_MIN_INPUT_CHARS};
use crate::fault;
use shared_types::{ValidationContext, ValidationResult, ViolationSeverity};

type Finding = (ViolationSeverity, String);

pub struct SuggestionValidator<'a> {
    tables: &'a PatternTables,
    confidence_threshold: f64,
    min_input_chars: usize,
}

impl<'a> SuggestionValidator<'a> {
    pub fn new(tables: &'a PatternTables) -> Self {
        Self {
            tables,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            min_input_chars: DEFAULT_MIN_INPUT_CHARS,
        }
    }

    pub fn with_confidence_threshold(mut self, confidence_threshold: f64) -> Self {
        self.confidence_threshold = confidence_threshold;
        self
    }

    pub fn with_min_input_chars(mut self, min_input_chars: usize) -> Self {
        self.min_input_chars = min_input_chars;
        self
    }

    pub fn validate(&self, original: &str, suggested: &str, context: &ValidationContext) -> ValidationResult {
        if original.trim().is_empty() || suggested.trim().is_empty() {
            return ValidationResult::reject("malformed input: original and suggestion must both be non-empty");
        }
        if original.trim().chars().count() < self.min_input_chars {
            return ValidationResult::reject("malformed input: original text is too short to validate");
        }

        let result = fault::contain(
            "suggestion_validator",
            &[original, suggested],
            || ValidationResult::reject("internal fault during validation; suggestion withheld"),
            || ValidationResult::from_findings(self.findings(original, suggested, context)),
        );

        tracing::debug!(
            rule_id = context.rule_id.as_deref().unwrap_or("-"),
            accepted = result.accepted,
            severity = ?result.severity_of_violation,
            reasons = result.reasons.len(),
            "suggestion validated"
        );
        result
    }

    fn findings(&self, original: &str, suggested: &str, context: &ValidationContext) -> Vec<Finding> {
        let mut findings = Vec::new();

        if let Some(reason) = guards::numeric_change(original, suggested) {
            findings.push((ViolationSeverity::Reject, reason));
        }

        if let Some(reason) = guards::endpoint_change(original, suggested, self.tables) {
            findings.push((ViolationSeverity::Reject, reason));
        }
        if let Some(reason) = guards::claim_removed(original, suggested, self.tables) {
            findings.push((ViolationSeverity::Reject, reason));
        }
        if let Some(reason) = guards::claim_introduced(original, suggested, self.tables) {
            findings.push((ViolationSeverity::Flag, reason));
        }

        findings.extend(self.completeness(original, suggested));
        findings.extend(self.confidence_floor(context));
        findings
    }

    /// A vague trigger must be replaced by something measurable, not reworded
    fn completeness(&self, original: &str, suggested: &str) -> Option<Finding> {
        if !guards::has_vague_trigger(original, self.tables) {
            return None;
        }
        let kept = guards::vague_triggers_kept(original, suggested, self.tables);
        if !kept.is_empty() {
            return Some((
                ViolationSeverity::Reject,
                format!("vague conditional trigger still present: {}", kept.join(", ")),
            ));
        }
        if !guards::has_objective_criterion(suggested) {
            return Some((
                ViolationSeverity::Flag,
                "vague trigger removed but no objective criterion (grade, threshold, time bound or section reference) given"
                    .to_string(),
            ));
        }
        None
    }

    fn confidence_floor(&self, context: &ValidationContext) -> Option<Finding> {
        let threshold = context.min_confidence.unwrap_or(self.confidence_threshold);
        if !is_probability(threshold) {
            return Some((
                ViolationSeverity::Reject,
                format!("confidence threshold {} is not within [0, 1]", threshold),
            ));
        }

        let confidence = context.confidence?;
        if !is_probability(confidence) {
            return Some((
                ViolationSeverity::Reject,
                format!("confidence {} is not within [0, 1]", confidence),
            ));
        }
        (confidence < threshold).then(|| {
            (
                ViolationSeverity::Flag,
                format!("confidence {:.2} is below threshold {:.2}", confidence, threshold),
            )
        })
    }
}

fn is_probability(value: f64) -> bool {
    value.is_finite() && (0.0..=1.0).contains(&value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn validate(original: &str, suggested: &str, context: &ValidationContext) -> ValidationResult {
        let tables = PatternTables::builtin();
        SuggestionValidator::new(&tables).validate(original, suggested, context)
    }

    fn with_confidence(confidence: f64) -> ValidationContext {
        ValidationContext {
            confidence: Some(confidence),
            ..Default::default()
        }
    }

    #[test]
    fn test_numeric_alteration_rejected() {
        let result = validate("Dose is 200mg BID", "Dose is 400mg BID", &ValidationContext::default());
        assert!(!result.accepted);
        assert!(result.reasons.iter().any(|r| r.contains("numeric")));
        assert_eq!(result.severity_of_violation, Some(ViolationSeverity::Reject));
    }

    #[test]
    fn test_adjacent_number_change_rejected() {
        let context = ValidationContext::default();
        for (original, suggested) in [
            ("Administer 2 10mg tablets daily", "Administer 2 20mg tablets daily"),
            ("Doses of 100 200 mg are tested", "Doses of 100 900 mg are tested"),
        ] {
            let result = validate(original, suggested, &context);
            assert!(!result.accepted, "{}", suggested);
            assert!(result.reasons[0].starts_with("numeric value altered"));
        }
    }

    #[test]
    fn test_sign_flip_rejected() {
        let context = ValidationContext::default();
        let result = validate("Screening starts on Day -14", "Screening starts on Day 14", &context);
        assert_eq!(result.severity_of_violation, Some(ViolationSeverity::Reject));
        assert!(result.reasons[0].contains("-14"));
        assert!(!validate("Hold dosing below -2 C", "Hold dosing below 2 C", &context).accepted);
        assert!(validate("Screening starts on Day -14", "Screening begins on Day −14", &context).accepted);
    }

    #[test]
    fn test_verbatim_numbers_pass() {
        let result = validate(
            "Subjects receive 200 mg daily",
            "participants receive 200 mg daily",
            &ValidationContext::default(),
        );
        assert!(result.accepted);
        assert!(result.reasons.is_empty());
        assert_eq!(result.severity_of_violation, None);
    }

    #[test]
    fn test_reworded_trigger_is_incomplete() {
        let result = validate(
            "unless safety concern arises",
            "unless a safety concern arises",
            &ValidationContext::default(),
        );
        assert!(!result.accepted);
        assert!(result.is_hard_reject());
    }

    #[test]
    fn test_objective_trigger_accepted() {
        let result = validate(
            "unless safety concern arises",
            "unless Grade 3+ AE occurs per MOP Section 6.2",
            &ValidationContext::default(),
        );
        assert!(result.accepted, "{:?}", result.reasons);
    }

    #[test]
    fn test_removed_trigger_without_criterion_is_flagged() {
        let result = validate(
            "Repeat labs as clinically indicated.",
            "Repeat labs when the investigator decides.",
            &ValidationContext::default(),
        );
        assert!(!result.accepted);
        assert_eq!(result.severity_of_violation, Some(ViolationSeverity::Flag));
    }

    #[test]
    fn test_endpoint_removal_rejected() {
        let result = validate(
            "The primary endpoint is overall survival.",
            "The main goal is longer life.",
            &ValidationContext::default(),
        );
        assert!(result.is_hard_reject());
        assert!(result.reasons[0].contains("endpoint"));
    }

    #[test]
    fn test_new_claim_is_flagged() {
        let result = validate(
            "The study compares two regimens.",
            "The study proves superiority of one regimen.",
            &ValidationContext::default(),
        );
        assert_eq!(result.severity_of_violation, Some(ViolationSeverity::Flag));
    }

    #[test]
    fn test_confidence_floor() {
        let original = "Subjects will be enrolled";
        let suggested = "participants will be enrolled";

        assert!(validate(original, suggested, &with_confidence(0.9)).accepted);

        let low = validate(original, suggested, &with_confidence(0.5));
        assert_eq!(low.severity_of_violation, Some(ViolationSeverity::Flag));

        let strict = ValidationContext {
            confidence: Some(0.9),
            min_confidence: Some(0.95),
            rule_id: Some("TRM-001".to_string()),
        };
        assert!(!validate(original, suggested, &strict).accepted);

        let broken = validate(original, suggested, &with_confidence(f64::NAN));
        assert!(broken.is_hard_reject());
    }

    #[test]
    fn test_reasons_accumulate_with_strongest_severity() {
        let result = validate("Dose is 200mg BID", "Dose is 400mg BID", &with_confidence(0.1));
        assert_eq!(result.reasons.len(), 2);
        assert_eq!(result.severity_of_violation, Some(ViolationSeverity::Reject));
    }

    #[test]
    fn test_empty_input_rejected() {
        assert!(validate("", "anything", &ValidationContext::default()).is_hard_reject());
        assert!(validate("Dose is 200mg", "   ", &ValidationContext::default()).is_hard_reject());
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn severity_set_iff_rejected(
                original in "\\PC*",
                suggested in "\\PC*",
                confidence in proptest::option::of(-1.0f64..2.0),
            ) {
                let context = ValidationContext { confidence, ..Default::default() };
                let result = validate(&original, &suggested, &context);
                prop_assert_eq!(result.accepted, result.severity_of_violation.is_none());
                prop_assert_eq!(result.accepted, result.reasons.is_empty());
            }
        }
    }
}
