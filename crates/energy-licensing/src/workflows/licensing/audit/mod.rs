//! Audit reports and their versioned findings.

mod domain;
mod service;

pub use domain::{
    AuditReport, AuditReportVersion, AuditStatus, ComplianceStatus, NewAuditReport, RiskLevel,
    VersionContent, VersionOutcome, VersionSubmission,
};
pub use service::AuditVersionWorkflow;
