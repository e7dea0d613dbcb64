//! Clinical-trial protocol analysis core
//!
//! Four independent, pure operations over protocol text:
//!
//! - [`extract_entities`]: visit names, assessments, timepoints, safety
//!   thresholds, document references and conditional triggers
//! - [`parse_timeline`]: the schedule of assessments as a visit graph
//! - [`scan`]: deterministic compliance rules with ready-to-paste rewrites
//! - [`validate`]: accept, flag or reject a suggested rewrite
//!
//! None of them fails outward. Malformed input and internal faults turn into
//! the operation's neutral result (rejecting, for the validator).

pub mod config;
pub mod diff;
pub mod extractors;
pub mod fault;
pub mod patterns;
pub mod rules;
pub mod timeline;
pub mod validator;

pub use config::{ConfigError, EngineConfig, PatternTables};
pub use extractors::EntityExtractor;
pub use rules::{ComplianceRule, ComplianceRuleEngine};
pub use shared_types::{
    ComplianceIssue, IssueCategory, ProtocolEntities, Severity, Timeline, ValidationContext,
    ValidationResult, ViolationSeverity, Visit, VisitGap, VisitWindow,
};
pub use timeline::TimelineParser;
pub use validator::SuggestionValidator;

use config::{DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_MIN_INPUT_CHARS};
use lazy_static::lazy_static;
use std::sync::Arc;

/// Engine facade holding the compiled pattern tables
///
/// Cheap to clone; clones share the same tables.
#[derive(Debug, Clone)]
pub struct ProtocolEngine {
    tables: Arc<PatternTables>,
    confidence_threshold: f64,
    min_input_chars: usize,
}

impl ProtocolEngine {
    /// Engine over the built-in tables
    pub fn new() -> Self {
        Self {
            tables: PatternTables::builtin(),
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            min_input_chars: DEFAULT_MIN_INPUT_CHARS,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Result<Self, ConfigError> {
        let tables = config.compile()?;
        tracing::info!(
            conditional_phrases = tables.conditional_phrases.len(),
            vague_triggers = tables.vague_triggers.len(),
            endpoint_groups = tables.endpoint_groups.len(),
            confidence_threshold = config.validator.confidence_threshold,
            "protocol engine configured"
        );
        Ok(Self {
            tables: Arc::new(tables),
            confidence_threshold: config.validator.confidence_threshold,
            min_input_chars: config.min_input_chars,
        })
    }

    pub fn tables(&self) -> &PatternTables {
        &self.tables
    }

    pub fn confidence_threshold(&self) -> f64 {
        self.confidence_threshold
    }

    pub fn extract_entities(&self, text: &str, timeline: Option<&Timeline>) -> ProtocolEntities {
        EntityExtractor::new(&self.tables)
            .with_min_input_chars(self.min_input_chars)
            .extract(text, timeline)
    }

    pub fn parse_timeline(&self, text: &str) -> Option<Timeline> {
        TimelineParser::new(&self.tables)
            .with_min_input_chars(self.min_input_chars)
            .parse(text)
    }

    pub fn scan(&self, text: &str) -> Vec<ComplianceIssue> {
        ComplianceRuleEngine::new(&self.tables)
            .with_min_input_chars(self.min_input_chars)
            .scan(text)
    }

    pub fn validate(&self, original: &str, suggested: &str, context: &ValidationContext) -> ValidationResult {
        SuggestionValidator::new(&self.tables)
            .with_confidence_threshold(self.confidence_threshold)
            .with_min_input_chars(self.min_input_chars)
            .validate(original, suggested, context)
    }

    pub fn extract_entities_bytes(&self, bytes: &[u8], timeline: Option<&Timeline>) -> ProtocolEntities {
        decode(bytes, "entity_extractor")
            .map(|text| self.extract_entities(text, timeline))
            .unwrap_or_default()
    }

    pub fn parse_timeline_bytes(&self, bytes: &[u8]) -> Option<Timeline> {
        decode(bytes, "timeline_parser").and_then(|text| self.parse_timeline(text))
    }

    pub fn scan_bytes(&self, bytes: &[u8]) -> Vec<ComplianceIssue> {
        decode(bytes, "rule_engine")
            .map(|text| self.scan(text))
            .unwrap_or_default()
    }

    pub fn validate_bytes(&self, original: &[u8], suggested: &[u8], context: &ValidationContext) -> ValidationResult {
        match (
            decode(original, "suggestion_validator"),
            decode(suggested, "suggestion_validator"),
        ) {
            (Some(original), Some(suggested)) => self.validate(original, suggested, context),
            _ => ValidationResult::reject("malformed input: text is not valid UTF-8"),
        }
    }
}

impl Default for ProtocolEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn decode<'b>(bytes: &'b [u8], component: &'static str) -> Option<&'b str> {
    match std::str::from_utf8(bytes) {
        Ok(text) => Some(text),
        Err(err) => {
            tracing::warn!(
                component,
                input_len = bytes.len(),
                valid_up_to = err.valid_up_to(),
                "input is not valid UTF-8"
            );
            None
        }
    }
}

lazy_static! {
    static ref DEFAULT_ENGINE: ProtocolEngine = ProtocolEngine::new();
}

/// [`ProtocolEngine::extract_entities`] on the built-in tables
pub fn extract_entities(text: &str, timeline: Option<&Timeline>) -> ProtocolEntities {
    DEFAULT_ENGINE.extract_entities(text, timeline)
}

/// [`ProtocolEngine::parse_timeline`] on the built-in tables
pub fn parse_timeline(text: &str) -> Option<Timeline> {
    DEFAULT_ENGINE.parse_timeline(text)
}

/// [`ProtocolEngine::scan`] on the built-in tables
pub fn scan(text: &str) -> Vec<ComplianceIssue> {
    DEFAULT_ENGINE.scan(text)
}

/// [`ProtocolEngine::validate`] on the built-in tables
pub fn validate(original: &str, suggested: &str, context: &ValidationContext) -> ValidationResult {
    DEFAULT_ENGINE.validate(original, suggested, context)
}
