//! Workflow core for energy-facility licensing.
//!
//! License requests and audit reports only change status through
//! [`RequestStateMachine`] and [`AuditVersionWorkflow`]; the
//! [`DeadlineScheduler`] layers overdue flags and reminder dispatch on top of
//! the same store. Every write is an optimistic read-modify-write against the
//! [`EntityStore`], so two actors racing from the same observed state cannot
//! both win.

pub mod audit;
pub mod deadlines;
pub mod domain;
mod error;
pub mod memory;
pub mod repository;
pub mod requests;
pub mod router;
pub mod transitions;
mod validation;
mod workflow;

#[cfg(test)]
mod tests;

pub use audit::{
    AuditReport, AuditReportVersion, AuditStatus, AuditVersionWorkflow, ComplianceStatus,
    NewAuditReport, RiskLevel, VersionContent, VersionOutcome, VersionSubmission,
};
pub use deadlines::{
    DeadlinePolicy, DeadlineReminder, DeadlineScheduler, ScanSummary, SchedulerError,
    SchedulerStatus, TickReport, REQUEST_DEADLINE_DAYS,
};
pub use domain::{
    Capability, EntityKind, EntityRef, InspectionId, Priority, ReminderId, ReportId, RequestId,
    Role, UserAccount, UserId, VersionId,
};
pub use error::WorkflowError;
pub use memory::{
    DeliveredNotification, InMemoryEntityStore, InMemoryUserDirectory, RecordingNotificationSink,
};
pub use repository::{
    DirectoryError, EntitySnapshot, EntityStore, Notification, NotificationError,
    NotificationSink, Recipient, StoreError, UserDirectory,
};
pub use requests::{
    ApplicationDetails, Appointment, LicenseRequest, LicenseType, NewLicenseRequest,
    OverdueFlag, RequestStateMachine, RequestStatus, ResponsibleParty,
};
pub use router::licensing_router;
pub use transitions::WorkflowStatus;
pub use workflow::LicensingWorkflow;
