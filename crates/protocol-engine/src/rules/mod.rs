//! Deterministic compliance rules for protocol text
//!
//! Every rule is a unit struct implementing [`ComplianceRule`]. The engine
//! runs each rule over every sentence, in the fixed priority order of
//! [`all_rules`], so issues come out ordered by (rule priority, offset).

pub mod ambiguity;
pub mod clarity;
pub mod consent;
pub mod safety;
pub mod terminology;

use crate::config::{PatternTables, DEFAULT_MIN_INPUT_CHARS, RULE_CONFIDENCE};
use crate::diff;
use crate::fault;
use crate::patterns::{push_unique, split_sentences, Sentence};
use crate::validator::guards;
use lazy_static::lazy_static;
use regex::{Captures, Regex};
use shared_types::{ComplianceIssue, IssueCategory, Severity, TextPosition};

/// A single deterministic check
pub trait ComplianceRule: Send + Sync {
    /// Stable identifier (e.g., "TRM-001")
    fn id(&self) -> &'static str;

    fn category(&self) -> IssueCategory;

    fn severity(&self) -> Severity;

    fn short_description(&self) -> &'static str;

    /// Check one sentence; `Some` carries the rewritten sentence
    fn check(&self, sentence: &str, tables: &PatternTables) -> Option<Rewrite>;

    /// Narrower rewrite tried when `check`'s rewrite would change a number
    /// or an endpoint
    fn fallback(&self, _sentence: &str, _tables: &PatternTables) -> Option<Rewrite> {
        None
    }
}

/// A rule's proposed replacement for one sentence
#[derive(Debug, Clone, PartialEq)]
pub struct Rewrite {
    pub improved: String,
    /// Matched phrases, in order of appearance
    pub matched: Vec<String>,
    pub detail: String,
}

/// All rules, in priority order
pub fn all_rules() -> Vec<Box<dyn ComplianceRule>> {
    vec![
        Box::new(safety::AdverseEventDeadlineRule),
        Box::new(consent::ConsentTimingRule),
        Box::new(consent::WrittenConsentRule),
        Box::new(ambiguity::VagueTriggerRule),
        Box::new(ambiguity::AndOrRule),
        Box::new(terminology::ParticipantRule),
        Box::new(terminology::StudyInterventionRule),
        Box::new(clarity::MandatoryLanguageRule),
    ]
}

lazy_static! {
    static ref RULES: Vec<Box<dyn ComplianceRule>> = all_rules();
}

/// Rewrite every match of `pattern` in `sentence`. A `None` from `replace`
/// leaves that match untouched. Returns `None` when nothing was rewritten.
pub(crate) fn rewrite_matches(
    sentence: &str,
    pattern: &Regex,
    mut replace: impl FnMut(&Captures) -> Option<String>,
) -> Option<(String, Vec<String>)> {
    let mut improved = String::with_capacity(sentence.len() + 16);
    let mut matched = Vec::new();
    let mut last = 0;

    for caps in pattern.captures_iter(sentence) {
        let Some(m) = caps.get(0) else { continue };
        if let Some(replacement) = replace(&caps) {
            improved.push_str(&sentence[last..m.start()]);
            improved.push_str(&replacement);
            last = m.end();
            push_unique(&mut matched, m.as_str().to_string());
        }
    }

    if matched.is_empty() {
        return None;
    }
    improved.push_str(&sentence[last..]);
    Some((improved, matched))
}

/// Carry the capitalization of `original` over to `replacement`
pub(crate) fn match_case(original: &str, replacement: &str) -> String {
    let letters: Vec<char> = original.chars().filter(|c| c.is_alphabetic()).collect();
    if letters.len() > 1 && letters.iter().all(|c| c.is_uppercase()) {
        return replacement.to_uppercase();
    }
    match (original.chars().next(), replacement.chars().next()) {
        (Some(first), Some(head)) if first.is_uppercase() => {
            head.to_uppercase().chain(replacement.chars().skip(1)).collect()
        }
        _ => replacement.to_string(),
    }
}

/// Runs the rule library over raw protocol text
pub struct ComplianceRuleEngine<'a> {
    tables: &'a PatternTables,
    rules: &'a [Box<dyn ComplianceRule>],
    min_input_chars: usize,
}

impl<'a> ComplianceRuleEngine<'a> {
    pub fn new(tables: &'a PatternTables) -> Self {
        Self {
            tables,
            rules: &RULES,
            min_input_chars: DEFAULT_MIN_INPUT_CHARS,
        }
    }

    pub fn with_min_input_chars(mut self, min_input_chars: usize) -> Self {
        self.min_input_chars = min_input_chars;
        self
    }

    pub fn rules(&self) -> impl Iterator<Item = &dyn ComplianceRule> {
        self.rules.iter().map(|rule| rule.as_ref())
    }

    pub fn scan(&self, text: &str) -> Vec<ComplianceIssue> {
        if text.trim().chars().count() < self.min_input_chars {
            tracing::debug!(input_len = text.len(), "scan skipped: input too short");
            return Vec::new();
        }

        let sentences = split_sentences(text);
        let mut issues = Vec::new();
        for rule in self.rules() {
            // A faulting rule loses its own findings only
            let found = fault::contain(rule.id(), &[text], Vec::new, || {
                sentences
                    .iter()
                    .filter_map(|sentence| self.check_sentence(rule, sentence))
                    .collect::<Vec<_>>()
            });
            issues.extend(found);
        }

        tracing::debug!(input_len = text.len(), issues = issues.len(), "scan complete");
        issues
    }

    fn check_sentence(&self, rule: &dyn ComplianceRule, sentence: &Sentence) -> Option<ComplianceIssue> {
        let rewrite = rule.check(sentence.text, self.tables)?;
        if rewrite.improved == sentence.text {
            return None;
        }

        // No rule may touch a number, a dosage or a named endpoint
        let rewrite = match guards::protected_change(sentence.text, &rewrite.improved, self.tables) {
            None => rewrite,
            Some(reason) => match self.guarded_fallback(rule, sentence) {
                Some(fallback) => {
                    tracing::debug!(
                        rule_id = rule.id(),
                        offset = sentence.offset,
                        reason = %reason,
                        "rewrite replaced by fallback"
                    );
                    fallback
                }
                None => {
                    tracing::warn!(
                        rule_id = rule.id(),
                        offset = sentence.offset,
                        reason = %reason,
                        "rewrite dropped by exclusion guard"
                    );
                    return None;
                }
            },
        };

        let mut evidence = vec![sentence.text.to_string()];
        evidence.extend(rewrite.matched);

        Some(ComplianceIssue {
            rule_id: rule.id().to_string(),
            category: rule.category(),
            severity: rule.severity(),
            short_description: rule.short_description().to_string(),
            detail: rewrite.detail,
            minimal_fix: diff::minimal_fix(sentence.text, &rewrite.improved),
            improved_text: rewrite.improved,
            evidence,
            confidence: RULE_CONFIDENCE,
            text_position: Some(TextPosition {
                start_offset: sentence.offset,
                end_offset: sentence.offset + sentence.text.len(),
            }),
        })
    }

    fn guarded_fallback(&self, rule: &dyn ComplianceRule, sentence: &Sentence) -> Option<Rewrite> {
        rule.fallback(sentence.text, self.tables).filter(|fallback| {
            fallback.improved != sentence.text
                && guards::protected_change(sentence.text, &fallback.improved, self.tables).is_none()
        })
    }
}
