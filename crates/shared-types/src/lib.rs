//! Fixed-shape records exchanged between the protocol engine and its host.

pub mod timeline;
pub mod types;

pub use timeline::{Timeline, Visit, VisitGap, VisitWindow};
pub use types::{
    ComplianceIssue, IssueCategory, ProtocolEntities, Severity, TextPosition, ValidationContext,
    ValidationResult, ViolationSeverity,
};
