use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::workflows::licensing::domain::{InspectionId, ReportId, RequestId, UserId, VersionId};
use crate::workflows::licensing::error::WorkflowError;
use crate::workflows::licensing::transitions::WorkflowStatus;

/// Status shared by audit reports and their versions.
///
/// A report's status is a write-through mirror of its latest version's status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditStatus {
    Draft,
    Submitted,
    UnderReview,
    Approved,
    Rejected,
    NeedsEdit,
}

impl AuditStatus {
    pub const ALL: [Self; 6] = [
        Self::Draft,
        Self::Submitted,
        Self::UnderReview,
        Self::Approved,
        Self::Rejected,
        Self::NeedsEdit,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Submitted => "submitted",
            Self::UnderReview => "under_review",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::NeedsEdit => "needs_edit",
        }
    }

    pub fn can_submit(self) -> bool {
        self.can_transition_to(Self::Submitted)
    }

    pub fn can_review(self) -> bool {
        self.can_transition_to(Self::UnderReview)
    }

    pub fn can_approve(self) -> bool {
        self.can_transition_to(Self::Approved)
    }

    pub fn can_reject(self) -> bool {
        self.can_transition_to(Self::Rejected)
    }

    pub fn can_request_edit(self) -> bool {
        self.can_transition_to(Self::NeedsEdit)
    }

    /// Whether a new version may supersede a latest version in this status.
    pub const fn accepts_new_version(self) -> bool {
        matches!(self, Self::Draft | Self::NeedsEdit | Self::Rejected)
    }
}

impl WorkflowStatus for AuditStatus {
    fn label(self) -> &'static str {
        AuditStatus::label(self)
    }

    fn successors(self) -> &'static [Self] {
        use AuditStatus::*;
        match self {
            Draft => &[Submitted],
            Submitted => &[UnderReview, Approved, Rejected, NeedsEdit],
            UnderReview => &[Approved, Rejected, NeedsEdit],
            Approved | Rejected | NeedsEdit => &[],
        }
    }
}

impl FromStr for AuditStatus {
    type Err = WorkflowError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|status| status.label() == normalized)
            .ok_or_else(|| WorkflowError::invalid_enum("audit status", value))
    }
}

/// Ordered from most to least compliant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplianceStatus {
    Compliant,
    PartiallyCompliant,
    NonCompliant,
}

impl ComplianceStatus {
    pub const ALL: [Self; 3] = [Self::Compliant, Self::PartiallyCompliant, Self::NonCompliant];

    pub const fn label(self) -> &'static str {
        match self {
            Self::Compliant => "compliant",
            Self::PartiallyCompliant => "partially_compliant",
            Self::NonCompliant => "non_compliant",
        }
    }

    pub const fn is_highest(self) -> bool {
        matches!(self, Self::Compliant)
    }
}

impl FromStr for ComplianceStatus {
    type Err = WorkflowError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|status| status.label() == normalized)
            .ok_or_else(|| WorkflowError::invalid_enum("compliance status", value))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub const ALL: [Self; 4] = [Self::Low, Self::Medium, Self::High, Self::Critical];

    pub const fn label(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl FromStr for RiskLevel {
    type Err = WorkflowError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|level| level.label() == normalized)
            .ok_or_else(|| WorkflowError::invalid_enum("risk level", value))
    }
}

/// Findings as typed by the inspector, before enum validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionSubmission {
    pub summary: String,
    #[serde(default)]
    pub findings: String,
    #[serde(default)]
    pub recommendations: String,
    pub compliance_status: String,
    pub risk_level: String,
}

/// Validated findings stored on a version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionContent {
    pub summary: String,
    pub findings: String,
    pub recommendations: String,
    pub compliance_status: ComplianceStatus,
    pub risk_level: RiskLevel,
}

/// Review outcome of a version; the variants are mutually exclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum VersionOutcome {
    Pending,
    Approved {
        approved_by_id: UserId,
        comments: Option<String>,
    },
    Rejected {
        rejected_by_id: UserId,
        reason: String,
        comments: Option<String>,
    },
    EditRequested {
        requested_by_id: UserId,
        comments: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditReportVersion {
    pub id: VersionId,
    pub report_id: ReportId,
    pub version_number: u32,
    pub content: VersionContent,
    pub status: AuditStatus,
    pub submitted_by_id: UserId,
    pub outcome: VersionOutcome,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub revision: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditReport {
    pub id: ReportId,
    pub request_id: RequestId,
    pub inspection_id: InspectionId,
    pub inspector_id: UserId,
    pub reviewer_id: Option<UserId>,
    pub status: AuditStatus,
    pub compliance_status: ComplianceStatus,
    pub risk_level: RiskLevel,
    /// Highest version number ever issued for this report.
    pub latest_version: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub revision: u64,
}

impl AuditReport {
    /// Copy the derived fields from the report's latest version.
    pub(crate) fn mirror(&mut self, version: &AuditReportVersion, at: DateTime<Utc>) {
        self.status = version.status;
        self.compliance_status = version.content.compliance_status;
        self.risk_level = version.content.risk_level;
        self.latest_version = version.version_number;
        self.updated_at = at;
    }

    pub fn is_approved_and_compliant(&self) -> bool {
        self.status == AuditStatus::Approved && self.compliance_status.is_highest()
    }
}

/// Input for opening a report on an inspection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAuditReport {
    pub request_id: RequestId,
    pub inspection_id: InspectionId,
    pub inspector_id: UserId,
    pub content: VersionSubmission,
}
