use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextPosition {
    pub start_offset: usize, // Byte offset in the scanned text
    pub end_offset: usize,   // End byte offset (exclusive)
}

/// Four-level grading used by every compliance rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Critical,
    Major,
    Minor,
    Advisory,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::Major => "major",
            Severity::Minor => "minor",
            Severity::Advisory => "advisory",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueCategory {
    Safety,
    Regulatory,
    Ambiguity,
    Terminology,
    Clarity,
}

impl IssueCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueCategory::Safety => "safety",
            IssueCategory::Regulatory => "regulatory",
            IssueCategory::Ambiguity => "ambiguity",
            IssueCategory::Terminology => "terminology",
            IssueCategory::Clarity => "clarity",
        }
    }
}

/// A single finding produced by the rule engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceIssue {
    pub rule_id: String, // e.g., "TRM-001"
    pub category: IssueCategory,
    pub severity: Severity,
    pub short_description: String,
    pub detail: String,
    /// Drop-in replacement for the first evidence excerpt
    pub improved_text: String,
    pub evidence: Vec<String>,
    pub confidence: f64,
    pub minimal_fix: Option<String>,
    pub text_position: Option<TextPosition>,
}

/// Entities pulled out of protocol text, one insertion-ordered set per category
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolEntities {
    pub visit_names: Vec<String>,
    pub assessment_types: Vec<String>,
    pub timepoints: Vec<String>,
    pub safety_thresholds: Vec<String>,
    pub document_refs: Vec<String>,
    pub conditional_triggers: Vec<String>,
}

impl ProtocolEntities {
    pub fn is_empty(&self) -> bool {
        self.visit_names.is_empty()
            && self.assessment_types.is_empty()
            && self.timepoints.is_empty()
            && self.safety_thresholds.is_empty()
            && self.document_refs.is_empty()
            && self.conditional_triggers.is_empty()
    }

    pub fn total(&self) -> usize {
        self.visit_names.len()
            + self.assessment_types.len()
            + self.timepoints.len()
            + self.safety_thresholds.len()
            + self.document_refs.len()
            + self.conditional_triggers.len()
    }
}

/// How a rejected suggestion may be surfaced
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationSeverity {
    /// Display with a warning attached
    Flag,
    /// Never display
    Reject,
}

/// Caller-supplied context for a single validation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationContext {
    /// Confidence reported by whatever produced the suggestion
    pub confidence: Option<f64>,
    /// Overrides the configured confidence floor (tier/plan setting)
    pub min_confidence: Option<f64>,
    pub rule_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub accepted: bool,
    pub reasons: Vec<String>,
    pub severity_of_violation: Option<ViolationSeverity>,
}

impl ValidationResult {
    pub fn accept() -> Self {
        Self {
            accepted: true,
            reasons: Vec::new(),
            severity_of_violation: None,
        }
    }

    pub fn reject(reason: impl Into<String>) -> Self {
        Self {
            accepted: false,
            reasons: vec![reason.into()],
            severity_of_violation: Some(ViolationSeverity::Reject),
        }
    }

    /// Build a result from accumulated findings; no findings means accepted.
    pub fn from_findings(findings: Vec<(ViolationSeverity, String)>) -> Self {
        let severity = findings.iter().map(|(s, _)| *s).max();
        Self {
            accepted: severity.is_none(),
            reasons: findings.into_iter().map(|(_, r)| r).collect(),
            severity_of_violation: severity,
        }
    }

    pub fn is_hard_reject(&self) -> bool {
        self.severity_of_violation == Some(ViolationSeverity::Reject)
    }
}
