use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::WorkflowError;

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "-{}"), self.0)
            }
        }
    };
}

numeric_id!(
    /// Identifier of a license request, assigned by the store on insert.
    RequestId,
    "req"
);
numeric_id!(ReportId, "rpt");
numeric_id!(VersionId, "ver");
numeric_id!(ReminderId, "rem");
numeric_id!(
    /// Inspection record owned by the scheduling system outside this core.
    InspectionId,
    "insp"
);
numeric_id!(UserId, "user");

/// Entity types the store can resolve by (type, id).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    LicenseRequest,
    AuditReport,
    AuditReportVersion,
    DeadlineReminder,
}

impl EntityKind {
    pub const fn label(self) -> &'static str {
        match self {
            Self::LicenseRequest => "license_request",
            Self::AuditReport => "audit_report",
            Self::AuditReportVersion => "audit_report_version",
            Self::DeadlineReminder => "deadline_reminder",
        }
    }
}

/// Polymorphic reference to a stored entity.
///
/// References are always resolved through the store; nothing holds a pointer
/// to the referenced entity, whose lifetime is independent of the holder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "entity_type", content = "entity_id", rename_all = "snake_case")]
pub enum EntityRef {
    LicenseRequest(RequestId),
    AuditReport(ReportId),
    AuditReportVersion(VersionId),
    DeadlineReminder(ReminderId),
}

impl EntityRef {
    pub const fn kind(self) -> EntityKind {
        match self {
            Self::LicenseRequest(_) => EntityKind::LicenseRequest,
            Self::AuditReport(_) => EntityKind::AuditReport,
            Self::AuditReportVersion(_) => EntityKind::AuditReportVersion,
            Self::DeadlineReminder(_) => EntityKind::DeadlineReminder,
        }
    }

    pub const fn raw_id(self) -> u64 {
        match self {
            Self::LicenseRequest(id) => id.0,
            Self::AuditReport(id) => id.0,
            Self::AuditReportVersion(id) => id.0,
            Self::DeadlineReminder(id) => id.0,
        }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.kind().label(), self.raw_id())
    }
}

/// Parties in the approval pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Applicant,
    DepartmentStaff,
    Inspector,
    DepartmentHead,
    Auditor,
    Administrator,
}

/// Actions a role may be entitled to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Inspect,
    Review,
    Assign,
}

impl Capability {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Inspect => "inspect",
            Self::Review => "review",
            Self::Assign => "assign",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Role {
    pub const ALL: [Self; 6] = [
        Self::Applicant,
        Self::DepartmentStaff,
        Self::Inspector,
        Self::DepartmentHead,
        Self::Auditor,
        Self::Administrator,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            Self::Applicant => "applicant",
            Self::DepartmentStaff => "department_staff",
            Self::Inspector => "inspector",
            Self::DepartmentHead => "department_head",
            Self::Auditor => "auditor",
            Self::Administrator => "administrator",
        }
    }

    pub const fn can_inspect(self) -> bool {
        matches!(self, Self::Inspector)
    }

    pub const fn can_review(self) -> bool {
        matches!(self, Self::Auditor | Self::DepartmentHead)
    }

    pub const fn can_assign(self) -> bool {
        matches!(
            self,
            Self::DepartmentStaff | Self::DepartmentHead | Self::Administrator
        )
    }

    pub const fn has(self, capability: Capability) -> bool {
        match capability {
            Capability::Inspect => self.can_inspect(),
            Capability::Review => self.can_review(),
            Capability::Assign => self.can_assign(),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Role {
    type Err = WorkflowError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|role| role.label() == normalized)
            .ok_or_else(|| WorkflowError::invalid_enum("role", value))
    }
}

/// Account record resolved through the user directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAccount {
    pub id: UserId,
    pub name: String,
    pub role: Role,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Normal,
    High,
    Urgent,
}
