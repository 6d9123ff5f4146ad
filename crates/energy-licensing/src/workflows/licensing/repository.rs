use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::audit::{AuditReport, AuditReportVersion};
use super::deadlines::DeadlineReminder;
use super::domain::{
    Capability, EntityRef, Priority, ReminderId, ReportId, RequestId, Role, UserAccount, UserId,
    VersionId,
};
use super::error::WorkflowError;
use super::requests::LicenseRequest;

/// Persistence boundary for every workflow entity.
///
/// Each `save_*` call is a conditional write: it succeeds only when the
/// stored revision still equals the revision carried by the argument, and it
/// returns the stored entity with its revision bumped. Calls that touch two
/// entities (a version and its report) apply both writes or neither.
pub trait EntityStore: Send + Sync {
    fn insert_request(&self, request: LicenseRequest) -> Result<LicenseRequest, StoreError>;
    fn request(&self, id: RequestId) -> Result<LicenseRequest, StoreError>;
    fn save_request(&self, request: &LicenseRequest) -> Result<LicenseRequest, StoreError>;
    fn delete_request(&self, request: &LicenseRequest) -> Result<(), StoreError>;
    /// Set the overdue overlay without touching any other field.
    fn flag_overdue(
        &self,
        id: RequestId,
        expected_revision: u64,
        at: DateTime<Utc>,
    ) -> Result<LicenseRequest, StoreError>;
    fn find_overdue(&self, now: DateTime<Utc>) -> Result<Vec<LicenseRequest>, StoreError>;

    /// Store a report together with its first version, assigning both ids.
    fn insert_report(
        &self,
        report: AuditReport,
        first_version: AuditReportVersion,
    ) -> Result<(AuditReport, AuditReportVersion), StoreError>;
    fn report(&self, id: ReportId) -> Result<AuditReport, StoreError>;
    fn reports_for_request(&self, id: RequestId) -> Result<Vec<AuditReport>, StoreError>;
    /// Remove a report and all of its versions.
    fn delete_report(&self, report: &AuditReport) -> Result<(), StoreError>;

    fn version(&self, id: VersionId) -> Result<AuditReportVersion, StoreError>;
    /// Versions of a report ordered by version number.
    fn versions(&self, report: ReportId) -> Result<Vec<AuditReportVersion>, StoreError>;
    /// Append the next version and mirror it onto the report in one write.
    ///
    /// Fails with [`StoreError::ConcurrentModification`] if the report moved
    /// on or the version number is not exactly one past the highest issued.
    fn append_version(
        &self,
        report: &AuditReport,
        version: AuditReportVersion,
    ) -> Result<(AuditReport, AuditReportVersion), StoreError>;
    fn save_version(
        &self,
        report: &AuditReport,
        version: &AuditReportVersion,
    ) -> Result<(AuditReport, AuditReportVersion), StoreError>;
    fn delete_version(
        &self,
        report: &AuditReport,
        version: VersionId,
    ) -> Result<AuditReport, StoreError>;

    fn insert_reminder(&self, reminder: DeadlineReminder) -> Result<DeadlineReminder, StoreError>;
    fn reminder(&self, id: ReminderId) -> Result<DeadlineReminder, StoreError>;
    fn reminders_for(&self, entity: EntityRef) -> Result<Vec<DeadlineReminder>, StoreError>;
    fn delete_reminders_for(&self, entity: EntityRef) -> Result<usize, StoreError>;
    fn find_due_reminders(&self, now: DateTime<Utc>)
        -> Result<Vec<DeadlineReminder>, StoreError>;
    /// Claim a reminder. A reminder that already fired is a conflict.
    fn mark_reminder_fired(
        &self,
        id: ReminderId,
        at: DateTime<Utc>,
    ) -> Result<DeadlineReminder, StoreError>;

    /// Resolve a polymorphic reference.
    fn get(&self, entity: EntityRef) -> Result<EntitySnapshot, StoreError> {
        Ok(match entity {
            EntityRef::LicenseRequest(id) => EntitySnapshot::Request(self.request(id)?),
            EntityRef::AuditReport(id) => EntitySnapshot::Report(self.report(id)?),
            EntityRef::AuditReportVersion(id) => EntitySnapshot::Version(self.version(id)?),
            EntityRef::DeadlineReminder(id) => EntitySnapshot::Reminder(self.reminder(id)?),
        })
    }
}

/// Entity resolved from an [`EntityRef`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "entity_type", content = "entity", rename_all = "snake_case")]
pub enum EntitySnapshot {
    Request(LicenseRequest),
    Report(AuditReport),
    Version(AuditReportVersion),
    Reminder(DeadlineReminder),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(EntityRef),
    #[error("{0} was modified concurrently")]
    ConcurrentModification(EntityRef),
    #[error("{0} already exists")]
    Conflict(EntityRef),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Message handed to the notification collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub message: String,
    pub priority: Priority,
    pub entity: EntityRef,
}

impl Notification {
    pub fn new(
        title: impl Into<String>,
        message: impl Into<String>,
        priority: Priority,
        entity: EntityRef,
    ) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            priority,
            entity,
        }
    }
}

/// Outbound notification hook (e-mail, in-app inbox, chat bridge).
///
/// Delivery is fire-and-forget: a failure is logged and never undoes the
/// transition that triggered it.
pub trait NotificationSink: Send + Sync {
    fn notify_user(&self, user: UserId, notification: &Notification)
        -> Result<(), NotificationError>;
    fn notify_role(&self, role: Role, notification: &Notification)
        -> Result<(), NotificationError>;
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum NotificationError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
}

/// Addressee of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Recipient {
    User(UserId),
    Role(Role),
}

impl fmt::Display for Recipient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Recipient::User(user) => write!(f, "{user}"),
            Recipient::Role(role) => write!(f, "role:{role}"),
        }
    }
}

pub(crate) fn deliver<N: NotificationSink + ?Sized>(
    sink: &N,
    recipient: Recipient,
    notification: &Notification,
) -> bool {
    let result = match recipient {
        Recipient::User(user) => sink.notify_user(user, notification),
        Recipient::Role(role) => sink.notify_role(role, notification),
    };
    match result {
        Ok(()) => true,
        Err(error) => {
            warn!(
                %recipient,
                entity = %notification.entity,
                error = %error,
                "notification delivery failed"
            );
            false
        }
    }
}

/// Read-only access to user accounts and their roles.
pub trait UserDirectory: Send + Sync {
    fn find_user(&self, id: UserId) -> Result<Option<UserAccount>, DirectoryError>;
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum DirectoryError {
    #[error("user directory unavailable: {0}")]
    Unavailable(String),
}

/// Resolve `user` and check that their role grants `capability`.
///
/// Unknown users are treated as lacking the capability.
pub(crate) fn require_capability<D: UserDirectory + ?Sized>(
    directory: &D,
    user: UserId,
    capability: Capability,
) -> Result<UserAccount, WorkflowError> {
    match directory.find_user(user)? {
        Some(account) if account.role.has(capability) => Ok(account),
        _ => Err(WorkflowError::MissingCapability { user, capability }),
    }
}
