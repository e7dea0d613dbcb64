//! Engine configuration and the compiled pattern tables
//!
//! Configuration is read once at process start (JSON, every field optional)
//! and compiled into an immutable [`PatternTables`] shared by reference with
//! every component. Nothing here is mutated after construction.

use crate::patterns::{
    ASSESSMENTS, CLAIM_KEYWORDS, CONDITIONAL_PHRASES, ENDPOINT_GROUPS, VAGUE_TRIGGERS,
};
use lazy_static::lazy_static;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Inputs shorter than this (after trimming) are treated as malformed
pub const DEFAULT_MIN_INPUT_CHARS: usize = 3;

/// Default confidence floor for suggestions
pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.7;

/// Confidence attached to every rule-engine issue
pub const RULE_CONFIDENCE: f64 = 1.0;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("pattern '{label}' does not compile: {source}")]
    InvalidPattern {
        label: String,
        #[source]
        source: regex::Error,
    },

    #[error("confidence threshold must be within [0, 1], got {0}")]
    InvalidThreshold(f64),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub min_input_chars: usize,
    pub validator: ValidatorConfig,
    pub patterns: PatternConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_input_chars: DEFAULT_MIN_INPUT_CHARS,
            validator: ValidatorConfig::default(),
            patterns: PatternConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.check()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    fn check(&self) -> Result<(), ConfigError> {
        let threshold = self.validator.confidence_threshold;
        if !threshold.is_finite() || !(0.0..=1.0).contains(&threshold) {
            return Err(ConfigError::InvalidThreshold(threshold));
        }
        Ok(())
    }

    pub fn compile(&self) -> Result<PatternTables, ConfigError> {
        self.check()?;
        self.patterns.compile()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    /// Tier/plan confidence floor; a per-call context may override it
    pub confidence_threshold: f64,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhraseEntry {
    pub pattern: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VagueTriggerEntry {
    pub pattern: String,
    pub label: String,
    pub objective_rewrite: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointGroupEntry {
    pub label: String,
    pub terms: Vec<String>,
}

/// Externally configurable phrase tables (regex sources, case-insensitive)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternConfig {
    pub conditional_phrases: Vec<PhraseEntry>,
    pub vague_triggers: Vec<VagueTriggerEntry>,
    pub endpoint_groups: Vec<EndpointGroupEntry>,
    pub claim_keywords: Vec<PhraseEntry>,
    pub assessments: Vec<PhraseEntry>,
}

fn phrase_entries(table: &[(&str, &str)]) -> Vec<PhraseEntry> {
    table
        .iter()
        .map(|(pattern, label)| PhraseEntry {
            pattern: pattern.to_string(),
            label: label.to_string(),
        })
        .collect()
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            conditional_phrases: phrase_entries(CONDITIONAL_PHRASES),
            vague_triggers: VAGUE_TRIGGERS
                .iter()
                .map(|(pattern, label, rewrite)| VagueTriggerEntry {
                    pattern: pattern.to_string(),
                    label: label.to_string(),
                    objective_rewrite: rewrite.to_string(),
                })
                .collect(),
            endpoint_groups: ENDPOINT_GROUPS
                .iter()
                .map(|(label, terms)| EndpointGroupEntry {
                    label: label.to_string(),
                    terms: terms.iter().map(|t| t.to_string()).collect(),
                })
                .collect(),
            claim_keywords: phrase_entries(CLAIM_KEYWORDS),
            assessments: phrase_entries(ASSESSMENTS),
        }
    }
}

impl PatternConfig {
    pub fn compile(&self) -> Result<PatternTables, ConfigError> {
        let conditional_phrases = compile_phrases(&self.conditional_phrases)?;
        let claim_keywords = compile_phrases(&self.claim_keywords)?;
        let assessments = compile_phrases(&self.assessments)?;

        let vague_triggers = self
            .vague_triggers
            .iter()
            .map(|entry| {
                Ok(VagueTrigger {
                    regex: compile_phrase(&entry.pattern, &entry.label)?,
                    label: entry.label.clone(),
                    objective_rewrite: entry.objective_rewrite.clone(),
                })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        let endpoint_groups = self
            .endpoint_groups
            .iter()
            .map(|entry| {
                let terms = entry
                    .terms
                    .iter()
                    .map(|term| compile_term(term, &entry.label))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(EndpointGroup {
                    label: entry.label.clone(),
                    terms,
                })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        Ok(PatternTables {
            conditional_phrases,
            vague_triggers,
            endpoint_groups,
            claim_keywords,
            assessments,
        })
    }
}

fn compile_phrases(entries: &[PhraseEntry]) -> Result<Vec<LabeledPattern>, ConfigError> {
    entries
        .iter()
        .map(|entry| {
            Ok(LabeledPattern {
                regex: compile_phrase(&entry.pattern, &entry.label)?,
                label: entry.label.clone(),
            })
        })
        .collect()
}

/// Phrase sources are wrapped in word boundaries and matched case-insensitively
fn compile_phrase(pattern: &str, label: &str) -> Result<Regex, ConfigError> {
    RegexBuilder::new(&format!(r"\b(?:{})\b", pattern))
        .case_insensitive(true)
        .build()
        .map_err(|source| ConfigError::InvalidPattern {
            label: label.to_string(),
            source,
        })
}

/// Endpoint terms are literals. Abbreviations ("OS", "pCR") match
/// case-sensitively so ordinary words do not trip them.
fn compile_term(term: &str, label: &str) -> Result<Regex, ConfigError> {
    let uppercase = term.chars().filter(char::is_ascii_uppercase).count();
    let abbreviation = !term.contains(char::is_whitespace) && uppercase >= 2;
    let escaped = regex::escape(term).replace(r"\ ", r"\s+").replace(' ', r"\s+");
    RegexBuilder::new(&format!(r"\b{}\b", escaped))
        .case_insensitive(!abbreviation)
        .build()
        .map_err(|source| ConfigError::InvalidPattern {
            label: label.to_string(),
            source,
        })
}

#[derive(Debug, Clone)]
pub struct LabeledPattern {
    pub regex: Regex,
    pub label: String,
}

#[derive(Debug, Clone)]
pub struct VagueTrigger {
    pub regex: Regex,
    pub label: String,
    pub objective_rewrite: String,
}

#[derive(Debug, Clone)]
pub struct EndpointGroup {
    pub label: String,
    pub terms: Vec<Regex>,
}

impl EndpointGroup {
    pub fn is_present(&self, text: &str) -> bool {
        self.terms.iter().any(|term| term.is_match(text))
    }
}

/// Compiled, read-only phrase tables
#[derive(Debug, Clone)]
pub struct PatternTables {
    pub conditional_phrases: Vec<LabeledPattern>,
    pub vague_triggers: Vec<VagueTrigger>,
    pub endpoint_groups: Vec<EndpointGroup>,
    pub claim_keywords: Vec<LabeledPattern>,
    pub assessments: Vec<LabeledPattern>,
}

lazy_static! {
    static ref BUILTIN_TABLES: Arc<PatternTables> = Arc::new(
        PatternConfig::default()
            .compile()
            .expect("built-in pattern tables compile"),
    );
}

impl PatternTables {
    /// Tables compiled from the built-in defaults, shared process-wide
    pub fn builtin() -> Arc<PatternTables> {
        Arc::clone(&BUILTIN_TABLES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_tables_compile() {
        let tables = PatternTables::builtin();
        assert_eq!(tables.conditional_phrases.len(), CONDITIONAL_PHRASES.len());
        assert_eq!(tables.vague_triggers.len(), VAGUE_TRIGGERS.len());
        assert_eq!(tables.endpoint_groups.len(), ENDPOINT_GROUPS.len());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config =
            EngineConfig::from_json_str(r#"{"validator": {"confidence_threshold": 0.9}}"#).unwrap();
        assert_eq!(config.validator.confidence_threshold, 0.9);
        assert_eq!(config.min_input_chars, DEFAULT_MIN_INPUT_CHARS);
        assert_eq!(config.patterns, PatternConfig::default());
    }

    #[test]
    fn test_rejects_out_of_range_threshold() {
        let err = EngineConfig::from_json_str(r#"{"validator": {"confidence_threshold": 1.5}}"#)
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidThreshold(t) if t == 1.5));
    }

    #[test]
    fn test_rejects_bad_pattern() {
        let mut config = EngineConfig::default();
        config.patterns.conditional_phrases.push(PhraseEntry {
            pattern: "(unclosed".to_string(),
            label: "broken".to_string(),
        });
        let err = config.compile().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPattern { ref label, .. } if label == "broken"));
    }

    #[test]
    fn test_missing_file_reports_path() {
        let err = EngineConfig::from_path("/nonexistent/protocol-engine.json").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/protocol-engine.json"));
    }

    #[test]
    fn test_abbreviation_terms_are_case_sensitive() {
        let tables = PatternTables::builtin();
        let os = tables
            .endpoint_groups
            .iter()
            .find(|g| g.label == "overall survival")
            .unwrap();
        assert!(os.is_present("median OS was 14 months"));
        assert!(os.is_present("Overall Survival"));
        assert!(!os.is_present("the os of the participant"));
    }
}
