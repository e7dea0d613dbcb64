//! Protocol entity extraction
//!
//! Six independent matchers, one per entity category. Each runs inside its
//! own fault boundary so a broken matcher empties only its own category.

use crate::config::{PatternTables, DEFAULT_MIN_INPUT_CHARS};
use crate::fault;
use crate::patterns::{clause_from, collapse_whitespace, push_unique};
use lazy_static::lazy_static;
use regex::Regex;
use shared_types::{ProtocolEntities, Timeline};

lazy_static! {
    static ref VISIT_NAME_PATTERNS: Vec<Regex> = vec![
        Regex::new(r"(?i)\b(?:screening|baseline|randomi[sz]ation|early\s+termination|unscheduled|follow[\s-]?up)(?:\s+visit)?\b").unwrap(),
        Regex::new(r"(?i)\bend[\s-]+of[\s-]+(?:study|treatment)(?:\s+visit)?\b").unwrap(),
        Regex::new(r"(?i)\b(?:day|week|month)\s*[-−]?\d+\b").unwrap(),
        Regex::new(r"(?i)\bvisit\s+\d+\b").unwrap(),
    ];

    static ref TIMEPOINT_PATTERNS: Vec<Regex> = vec![
        Regex::new(r"(?i)\b(?:day|week|month)\s*[-−]?\d+\b").unwrap(),
        Regex::new(r"(?i)\b\d+(?:\.\d+)?\s*(?:hours?|hrs?|h|minutes?|mins?)\s*(?:pre|post)[\s-]?dose\b").unwrap(),
        Regex::new(r"(?i)\b(?:pre|post)[\s-]?dose\b").unwrap(),
        Regex::new(r"(?i)\bend\s+of\s+infusion\b").unwrap(),
        Regex::new(r"(?i)\btrough\b").unwrap(),
    ];

    static ref SAFETY_THRESHOLD_PATTERNS: Vec<Regex> = vec![
        Regex::new(r"(?i)\bgrade\s*(?:[≥>]=?\s*)?[1-5]\+?(?:\s+or\s+(?:higher|greater|above|worse))?").unwrap(),
        Regex::new(concat!(
            r"(?i)\b(?:ALT|AST|total\s+bilirubin|bilirubin|creatinine|QTcF|QTc|ANC|neutrophils?|platelets?|ha?emoglobin|eGFR|CrCl|",
            r"systolic\s+blood\s+pressure|diastolic\s+blood\s+pressure|SBP|DBP|heart\s+rate|temperature)\s*",
            r"(?:of\s+)?(?:[<>≤≥]=?|greater\s+than|less\s+than|above|below|exceeding)\s*\d+(?:\.\d+)?",
            r"(?:\s*(?:[x×]\s*ULN|ms(?:ec)?|mg/dL|g/dL|mL/min(?:/1\.73\s*m2)?|mmHg|bpm|°C|%|x\s*10\^?9/L|/mm3))?"
        ))
        .unwrap(),
        Regex::new(r"(?i)\bCTCAE\s*(?:v(?:ersion)?\s*)?\d+(?:\.\d+)?").unwrap(),
    ];

    static ref DOCUMENT_REF_PATTERNS: Vec<Regex> = vec![
        Regex::new(r"(?i)\b(?:section|table|figure)\s+\d+(?:\.\d+)*\b").unwrap(),
        Regex::new(r"(?i)\b(?:appendix|annex|attachment)\s+(?:\d+(?:\.\d+)*|[A-Z])\b").unwrap(),
        Regex::new(r"\b(?:MOP|IB|ICF|SoA|SAP)\b").unwrap(),
        Regex::new(r"(?i)\b(?:manual\s+of\s+(?:procedures|operations)|investigator'?s\s+brochure|informed\s+consent\s+form|schedule\s+of\s+(?:activities|assessments)|statistical\s+analysis\s+plan|pharmacy\s+manual|laboratory\s+manual)\b").unwrap(),
        Regex::new(r"(?i)\bprotocol\s+(?:version|v\.?)\s*\d+(?:\.\d+)*").unwrap(),
    ];
}

const SMALL_WORDS: &[&str] = &["of", "to", "and", "or"];

/// Pattern-driven entity extraction over raw protocol text
pub struct EntityExtractor<'a> {
    tables: &'a PatternTables,
    min_input_chars: usize,
}

impl<'a> EntityExtractor<'a> {
    pub fn new(tables: &'a PatternTables) -> Self {
        Self {
            tables,
            min_input_chars: DEFAULT_MIN_INPUT_CHARS,
        }
    }

    pub fn with_min_input_chars(mut self, min_input_chars: usize) -> Self {
        self.min_input_chars = min_input_chars;
        self
    }

    /// Extract all entity categories. With a timeline, visit names are
    /// reconciled against the timeline's own visit names.
    pub fn extract(&self, text: &str, timeline: Option<&Timeline>) -> ProtocolEntities {
        if text.trim().chars().count() < self.min_input_chars {
            tracing::debug!(input_len = text.len(), "entity extraction skipped: input too short");
            return ProtocolEntities::default();
        }

        let entities = ProtocolEntities {
            visit_names: self.isolated("entity_extractor::visit_names", text, || {
                reconcile_visit_names(extract_visit_names(text), timeline)
            }),
            assessment_types: self.isolated("entity_extractor::assessment_types", text, || {
                self.extract_assessments(text)
            }),
            timepoints: self.isolated("entity_extractor::timepoints", text, || extract_timepoints(text)),
            safety_thresholds: self.isolated("entity_extractor::safety_thresholds", text, || {
                collect_matches(&SAFETY_THRESHOLD_PATTERNS, text, collapse_whitespace)
            }),
            document_refs: self.isolated("entity_extractor::document_refs", text, || {
                collect_matches(&DOCUMENT_REF_PATTERNS, text, collapse_whitespace)
            }),
            conditional_triggers: self.isolated("entity_extractor::conditional_triggers", text, || {
                self.extract_conditional_triggers(text)
            }),
        };

        tracing::debug!(
            input_len = text.len(),
            total = entities.total(),
            "entities extracted"
        );
        entities
    }

    fn isolated(
        &self,
        category: &'static str,
        text: &str,
        matcher: impl FnOnce() -> Vec<String>,
    ) -> Vec<String> {
        fault::contain(category, &[text], Vec::new, matcher)
    }

    fn extract_assessments(&self, text: &str) -> Vec<String> {
        let mut found: Vec<(usize, String)> = Vec::new();
        for entry in &self.tables.assessments {
            if let Some(m) = entry.regex.find(text) {
                found.push((m.start(), entry.label.clone()));
            }
        }
        found.sort_by_key(|(offset, _)| *offset);

        let mut set = Vec::new();
        for (_, label) in found {
            push_unique(&mut set, label);
        }
        set
    }

    fn extract_conditional_triggers(&self, text: &str) -> Vec<String> {
        let mut found: Vec<(usize, String)> = Vec::new();
        let patterns = self
            .tables
            .conditional_phrases
            .iter()
            .map(|p| &p.regex)
            .chain(self.tables.vague_triggers.iter().map(|t| &t.regex));

        for regex in patterns {
            for m in regex.find_iter(text) {
                let clause = collapse_whitespace(clause_from(text, m.start())).to_lowercase();
                found.push((m.start(), clause));
            }
        }
        found.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| b.1.len().cmp(&a.1.len())));

        let mut set = Vec::new();
        let mut last_start = None;
        for (start, clause) in found {
            // Overlapping table entries at one position report the longest clause once
            if last_start == Some(start) {
                continue;
            }
            last_start = Some(start);
            push_unique(&mut set, clause);
        }
        set
    }
}

fn collect_matches(patterns: &[Regex], text: &str, normalize: fn(&str) -> String) -> Vec<String> {
    let mut found: Vec<(usize, String)> = patterns
        .iter()
        .flat_map(|p| p.find_iter(text).map(|m| (m.start(), normalize(m.as_str()))))
        .collect();
    found.sort_by_key(|(offset, _)| *offset);

    let mut set = Vec::new();
    for (_, value) in found {
        push_unique(&mut set, value);
    }
    set
}

fn extract_visit_names(text: &str) -> Vec<String> {
    collect_matches(&VISIT_NAME_PATTERNS, text, canonical_visit_name)
}

fn extract_timepoints(text: &str) -> Vec<String> {
    collect_matches(&TIMEPOINT_PATTERNS, text, |raw| {
        let lower = raw.trim().to_lowercase();
        if lower.starts_with("day") || lower.starts_with("week") || lower.starts_with("month") {
            canonical_visit_name(raw)
        } else {
            collapse_whitespace(&lower)
        }
    })
}

/// "week  4" -> "Week 4", "end-of-study visit" -> "End of Study Visit"
pub fn canonical_visit_name(raw: &str) -> String {
    let spaced = raw
        .replace('−', "-")
        .replace("end-of-", "end of ")
        .replace("End-of-", "End of ")
        .replace("-of-", " of ");
    let spaced = split_unit_number(&spaced);

    collapse_whitespace(&spaced)
        .split(' ')
        .enumerate()
        .map(|(idx, word)| {
            let lower = word.to_lowercase();
            if idx > 0 && SMALL_WORDS.contains(&lower.as_str()) {
                lower
            } else {
                let mut chars = lower.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect(),
                    None => String::new(),
                }
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// "Week4" -> "Week 4", "Day-28" -> "Day -28"; "Follow-up" is left alone
fn split_unit_number(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + 1);
    let mut chars = raw.chars().peekable();
    let mut prev_alpha = false;
    while let Some(ch) = chars.next() {
        let signed_number = ch == '-' && chars.peek().is_some_and(|c| c.is_ascii_digit());
        if prev_alpha && (ch.is_ascii_digit() || signed_number) {
            out.push(' ');
        }
        prev_alpha = ch.is_alphabetic();
        out.push(ch);
    }
    out
}

fn normalized_key(name: &str) -> String {
    canonical_visit_name(name)
        .to_lowercase()
        .trim_end_matches(" visit")
        .to_string()
}

/// Timeline names first; free-text names that duplicate one are dropped
fn reconcile_visit_names(free_text: Vec<String>, timeline: Option<&Timeline>) -> Vec<String> {
    let Some(timeline) = timeline else {
        return free_text;
    };

    let mut names = Vec::new();
    for name in timeline.visit_names() {
        push_unique(&mut names, name.to_string());
    }
    let known: Vec<String> = names.iter().map(|n| normalized_key(n)).collect();

    for name in free_text {
        if !known.contains(&normalized_key(&name)) {
            push_unique(&mut names, name);
        }
    }
    names
}
