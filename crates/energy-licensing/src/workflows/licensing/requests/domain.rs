use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::workflows::licensing::domain::{RequestId, Role, UserId};
use crate::workflows::licensing::error::WorkflowError;
use crate::workflows::licensing::repository::Recipient;
use crate::workflows::licensing::transitions::WorkflowStatus;

/// Status of a license request in the approval pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Draft,
    NewRequest,
    Accepted,
    Assigned,
    Appointment,
    Inspecting,
    InspectionDone,
    DocumentEdit,
    ReportApproved,
    Approved,
    Rejected,
    RejectedFinal,
}

impl RequestStatus {
    pub const ALL: [Self; 12] = [
        Self::Draft,
        Self::NewRequest,
        Self::Accepted,
        Self::Assigned,
        Self::Appointment,
        Self::Inspecting,
        Self::InspectionDone,
        Self::DocumentEdit,
        Self::ReportApproved,
        Self::Approved,
        Self::Rejected,
        Self::RejectedFinal,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::NewRequest => "new_request",
            Self::Accepted => "accepted",
            Self::Assigned => "assigned",
            Self::Appointment => "appointment",
            Self::Inspecting => "inspecting",
            Self::InspectionDone => "inspection_done",
            Self::DocumentEdit => "document_edit",
            Self::ReportApproved => "report_approved",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::RejectedFinal => "rejected_final",
        }
    }

    pub const fn can_be_assigned(self) -> bool {
        matches!(self, Self::Accepted | Self::DocumentEdit)
    }

    pub const fn is_inspection_done(self) -> bool {
        matches!(
            self,
            Self::InspectionDone | Self::DocumentEdit | Self::ReportApproved
        )
    }

    /// Statuses in which the request must carry an assigned inspector.
    pub const fn requires_inspector(self) -> bool {
        matches!(
            self,
            Self::Assigned
                | Self::Appointment
                | Self::Inspecting
                | Self::InspectionDone
                | Self::DocumentEdit
                | Self::ReportApproved
                | Self::Approved
        )
    }

    /// Who has to act next for the request to make progress.
    pub const fn responsible_party(self) -> Option<ResponsibleParty> {
        match self {
            Self::Draft | Self::DocumentEdit => Some(ResponsibleParty::Applicant),
            Self::NewRequest | Self::Accepted => {
                Some(ResponsibleParty::Role(Role::DepartmentStaff))
            }
            Self::Assigned | Self::Appointment | Self::Inspecting => {
                Some(ResponsibleParty::AssignedInspector)
            }
            Self::InspectionDone => Some(ResponsibleParty::Role(Role::DepartmentStaff)),
            Self::ReportApproved => Some(ResponsibleParty::Role(Role::DepartmentHead)),
            Self::Approved | Self::Rejected | Self::RejectedFinal => None,
        }
    }
}

impl WorkflowStatus for RequestStatus {
    fn label(self) -> &'static str {
        RequestStatus::label(self)
    }

    fn successors(self) -> &'static [Self] {
        use RequestStatus::*;
        match self {
            Draft => &[NewRequest],
            NewRequest => &[Accepted, Rejected],
            Accepted => &[Assigned],
            Assigned => &[Appointment],
            Appointment => &[Inspecting],
            Inspecting => &[InspectionDone],
            InspectionDone => &[DocumentEdit, RejectedFinal],
            DocumentEdit => &[ReportApproved, Assigned],
            ReportApproved => &[Approved, RejectedFinal],
            Approved | Rejected | RejectedFinal => &[],
        }
    }
}

impl FromStr for RequestStatus {
    type Err = WorkflowError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|status| status.label() == normalized)
            .ok_or_else(|| WorkflowError::invalid_enum("request status", value))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponsibleParty {
    Applicant,
    AssignedInspector,
    Role(Role),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LicenseType {
    Generation,
    Transmission,
    Distribution,
    Supply,
    Storage,
}

impl LicenseType {
    pub const ALL: [Self; 5] = [
        Self::Generation,
        Self::Transmission,
        Self::Distribution,
        Self::Supply,
        Self::Storage,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            Self::Generation => "generation",
            Self::Transmission => "transmission",
            Self::Distribution => "distribution",
            Self::Supply => "supply",
            Self::Storage => "storage",
        }
    }
}

impl FromStr for LicenseType {
    type Err = WorkflowError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|kind| kind.label() == normalized)
            .ok_or_else(|| WorkflowError::invalid_enum("license type", value))
    }
}

/// Raw application form as received from the applicant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewLicenseRequest {
    pub facility_name: String,
    pub facility_address: String,
    pub license_type: String,
    pub capacity_kw: u32,
}

/// Validated facility details attached to a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationDetails {
    pub facility_name: String,
    pub facility_address: String,
    pub license_type: LicenseType,
    pub capacity_kw: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub location: String,
}

/// Overlay recorded by the deadline scheduler; the primary status is untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverdueFlag {
    pub flagged_at: DateTime<Utc>,
    pub status_at_flag: RequestStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseRequest {
    pub id: RequestId,
    pub applicant_id: UserId,
    pub details: ApplicationDetails,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    deadline: DateTime<Utc>,
    pub assigned_inspector_id: Option<UserId>,
    pub assigned_by_id: Option<UserId>,
    pub assigned_at: Option<DateTime<Utc>>,
    pub appointment: Option<Appointment>,
    pub inspection_date: Option<DateTime<Utc>>,
    pub completion_date: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    pub overdue: Option<OverdueFlag>,
    /// Optimistic concurrency token, bumped by the store on every write.
    pub revision: u64,
}

impl LicenseRequest {
    pub(crate) fn draft(
        applicant_id: UserId,
        details: ApplicationDetails,
        created_at: DateTime<Utc>,
        deadline: DateTime<Utc>,
    ) -> Self {
        Self {
            id: RequestId(0),
            applicant_id,
            details,
            status: RequestStatus::Draft,
            created_at,
            updated_at: created_at,
            deadline,
            assigned_inspector_id: None,
            assigned_by_id: None,
            assigned_at: None,
            appointment: None,
            inspection_date: None,
            completion_date: None,
            rejection_reason: None,
            overdue: None,
            revision: 0,
        }
    }

    /// Deadline fixed at creation; there is no setter.
    pub fn deadline(&self) -> DateTime<Utc> {
        self.deadline
    }

    pub fn is_overdue(&self) -> bool {
        self.overdue.is_some()
    }

    pub fn is_terminal(&self) -> bool {
        WorkflowStatus::is_terminal(self.status)
    }

    /// When the request was flagged, while it still sits in the status it was flagged in.
    pub fn stalled_since(&self) -> Option<DateTime<Utc>> {
        self.overdue
            .filter(|flag| flag.status_at_flag == self.status)
            .map(|flag| flag.flagged_at)
    }

    /// Concrete addressee for reminders about this request, if anyone is
    /// expected to act.
    pub fn responsible_recipient(&self) -> Option<Recipient> {
        match self.status.responsible_party()? {
            ResponsibleParty::Applicant => Some(Recipient::User(self.applicant_id)),
            ResponsibleParty::AssignedInspector => {
                self.assigned_inspector_id.map(Recipient::User)
            }
            ResponsibleParty::Role(role) => Some(Recipient::Role(role)),
        }
    }

    /// Past deadline, still open, and not yet escalated.
    pub fn needs_escalation(&self, now: DateTime<Utc>) -> bool {
        !self.is_terminal() && !self.is_overdue() && self.deadline < now
    }
}
