//! In-process adapters used by the API service, the demo, and tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use chrono::{DateTime, Utc};

use super::audit::{AuditReport, AuditReportVersion};
use super::deadlines::DeadlineReminder;
use super::domain::{
    EntityRef, ReminderId, ReportId, RequestId, Role, UserAccount, UserId, VersionId,
};
use super::repository::{
    DirectoryError, EntityStore, Notification, NotificationError, NotificationSink, Recipient,
    StoreError, UserDirectory,
};
use super::requests::{LicenseRequest, OverdueFlag};

#[derive(Debug, Default)]
struct StoreState {
    last_id: u64,
    requests: BTreeMap<RequestId, LicenseRequest>,
    reports: BTreeMap<ReportId, AuditReport>,
    versions: BTreeMap<VersionId, AuditReportVersion>,
    reminders: BTreeMap<ReminderId, DeadlineReminder>,
}

impl StoreState {
    fn next_id(&mut self) -> u64 {
        self.last_id += 1;
        self.last_id
    }

    fn current_request(&self, id: RequestId, revision: u64) -> Result<&LicenseRequest, StoreError> {
        let entity = EntityRef::LicenseRequest(id);
        let stored = self.requests.get(&id).ok_or(StoreError::NotFound(entity))?;
        if stored.revision == revision {
            Ok(stored)
        } else {
            Err(StoreError::ConcurrentModification(entity))
        }
    }

    fn current_report(&self, id: ReportId, revision: u64) -> Result<&AuditReport, StoreError> {
        let entity = EntityRef::AuditReport(id);
        let stored = self.reports.get(&id).ok_or(StoreError::NotFound(entity))?;
        if stored.revision == revision {
            Ok(stored)
        } else {
            Err(StoreError::ConcurrentModification(entity))
        }
    }
}

/// Entity store backed by ordered maps behind one mutex.
///
/// Every call takes the lock once, so revision checks and the writes they
/// guard are atomic with respect to other callers.
#[derive(Debug, Default, Clone)]
pub struct InMemoryEntityStore {
    state: Arc<Mutex<StoreState>>,
}

impl InMemoryEntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> Result<MutexGuard<'_, StoreState>, StoreError> {
        self.state
            .lock()
            .map_err(|_| StoreError::Unavailable("entity store mutex poisoned".to_string()))
    }
}

impl EntityStore for InMemoryEntityStore {
    fn insert_request(&self, mut request: LicenseRequest) -> Result<LicenseRequest, StoreError> {
        let mut state = self.state()?;
        request.id = RequestId(state.next_id());
        request.revision = 1;
        state.requests.insert(request.id, request.clone());
        Ok(request)
    }

    fn request(&self, id: RequestId) -> Result<LicenseRequest, StoreError> {
        self.state()?
            .requests
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound(EntityRef::LicenseRequest(id)))
    }

    fn save_request(&self, request: &LicenseRequest) -> Result<LicenseRequest, StoreError> {
        let mut state = self.state()?;
        state.current_request(request.id, request.revision)?;
        let mut stored = request.clone();
        stored.revision += 1;
        state.requests.insert(stored.id, stored.clone());
        Ok(stored)
    }

    fn delete_request(&self, request: &LicenseRequest) -> Result<(), StoreError> {
        let mut state = self.state()?;
        state.current_request(request.id, request.revision)?;
        state.requests.remove(&request.id);
        Ok(())
    }

    fn flag_overdue(
        &self,
        id: RequestId,
        expected_revision: u64,
        at: DateTime<Utc>,
    ) -> Result<LicenseRequest, StoreError> {
        let mut state = self.state()?;
        let mut stored = state.current_request(id, expected_revision)?.clone();
        if stored.overdue.is_some() {
            return Err(StoreError::ConcurrentModification(EntityRef::LicenseRequest(id)));
        }
        stored.overdue = Some(OverdueFlag {
            flagged_at: at,
            status_at_flag: stored.status,
        });
        stored.revision += 1;
        state.requests.insert(id, stored.clone());
        Ok(stored)
    }

    fn find_overdue(&self, now: DateTime<Utc>) -> Result<Vec<LicenseRequest>, StoreError> {
        Ok(self
            .state()?
            .requests
            .values()
            .filter(|request| request.needs_escalation(now))
            .cloned()
            .collect())
    }

    fn insert_report(
        &self,
        mut report: AuditReport,
        mut first_version: AuditReportVersion,
    ) -> Result<(AuditReport, AuditReportVersion), StoreError> {
        let mut state = self.state()?;
        report.id = ReportId(state.next_id());
        report.revision = 1;
        first_version.id = VersionId(state.next_id());
        first_version.report_id = report.id;
        first_version.revision = 1;
        report.mirror(&first_version, first_version.created_at);

        state.reports.insert(report.id, report.clone());
        state.versions.insert(first_version.id, first_version.clone());
        Ok((report, first_version))
    }

    fn report(&self, id: ReportId) -> Result<AuditReport, StoreError> {
        self.state()?
            .reports
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound(EntityRef::AuditReport(id)))
    }

    fn reports_for_request(&self, id: RequestId) -> Result<Vec<AuditReport>, StoreError> {
        Ok(self
            .state()?
            .reports
            .values()
            .filter(|report| report.request_id == id)
            .cloned()
            .collect())
    }

    fn delete_report(&self, report: &AuditReport) -> Result<(), StoreError> {
        let mut state = self.state()?;
        state.current_report(report.id, report.revision)?;
        state.reports.remove(&report.id);
        state.versions.retain(|_, version| version.report_id != report.id);
        Ok(())
    }

    fn version(&self, id: VersionId) -> Result<AuditReportVersion, StoreError> {
        self.state()?
            .versions
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound(EntityRef::AuditReportVersion(id)))
    }

    fn versions(&self, report: ReportId) -> Result<Vec<AuditReportVersion>, StoreError> {
        let state = self.state()?;
        if !state.reports.contains_key(&report) {
            return Err(StoreError::NotFound(EntityRef::AuditReport(report)));
        }
        let mut versions: Vec<_> = state
            .versions
            .values()
            .filter(|version| version.report_id == report)
            .cloned()
            .collect();
        versions.sort_by_key(|version| version.version_number);
        Ok(versions)
    }

    fn append_version(
        &self,
        report: &AuditReport,
        mut version: AuditReportVersion,
    ) -> Result<(AuditReport, AuditReportVersion), StoreError> {
        let mut state = self.state()?;
        let issued = state.current_report(report.id, report.revision)?.latest_version;
        if version.version_number != issued + 1 {
            return Err(StoreError::ConcurrentModification(EntityRef::AuditReport(
                report.id,
            )));
        }

        version.id = VersionId(state.next_id());
        version.report_id = report.id;
        version.revision = 1;

        let mut updated = report.clone();
        updated.mirror(&version, version.created_at);
        updated.revision += 1;

        state.reports.insert(updated.id, updated.clone());
        state.versions.insert(version.id, version.clone());
        Ok((updated, version))
    }

    fn save_version(
        &self,
        report: &AuditReport,
        version: &AuditReportVersion,
    ) -> Result<(AuditReport, AuditReportVersion), StoreError> {
        let mut state = self.state()?;
        let latest = state.current_report(report.id, report.revision)?.latest_version;
        let entity = EntityRef::AuditReportVersion(version.id);
        let stored = state
            .versions
            .get(&version.id)
            .filter(|stored| stored.report_id == report.id)
            .ok_or(StoreError::NotFound(entity))?;
        if stored.revision != version.revision {
            return Err(StoreError::ConcurrentModification(entity));
        }

        let mut saved = version.clone();
        saved.revision += 1;

        let mut updated = report.clone();
        if saved.version_number == latest {
            updated.mirror(&saved, saved.updated_at);
        }
        updated.revision += 1;

        state.reports.insert(updated.id, updated.clone());
        state.versions.insert(saved.id, saved.clone());
        Ok((updated, saved))
    }

    fn delete_version(
        &self,
        report: &AuditReport,
        version: VersionId,
    ) -> Result<AuditReport, StoreError> {
        let mut state = self.state()?;
        let latest = state.current_report(report.id, report.revision)?.latest_version;
        let entity = EntityRef::AuditReportVersion(version);
        let stored = state
            .versions
            .get(&version)
            .filter(|stored| stored.report_id == report.id)
            .ok_or(StoreError::NotFound(entity))?;
        if stored.version_number == latest {
            return Err(StoreError::Conflict(entity));
        }

        state.versions.remove(&version);
        let mut updated = report.clone();
        updated.revision += 1;
        state.reports.insert(updated.id, updated.clone());
        Ok(updated)
    }

    fn insert_reminder(
        &self,
        mut reminder: DeadlineReminder,
    ) -> Result<DeadlineReminder, StoreError> {
        let mut state = self.state()?;
        reminder.id = ReminderId(state.next_id());
        state.reminders.insert(reminder.id, reminder.clone());
        Ok(reminder)
    }

    fn reminder(&self, id: ReminderId) -> Result<DeadlineReminder, StoreError> {
        self.state()?
            .reminders
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound(EntityRef::DeadlineReminder(id)))
    }

    fn reminders_for(&self, entity: EntityRef) -> Result<Vec<DeadlineReminder>, StoreError> {
        Ok(self
            .state()?
            .reminders
            .values()
            .filter(|reminder| reminder.entity == entity)
            .cloned()
            .collect())
    }

    fn delete_reminders_for(&self, entity: EntityRef) -> Result<usize, StoreError> {
        let mut state = self.state()?;
        let before = state.reminders.len();
        state.reminders.retain(|_, reminder| reminder.entity != entity);
        Ok(before - state.reminders.len())
    }

    fn find_due_reminders(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<DeadlineReminder>, StoreError> {
        Ok(self
            .state()?
            .reminders
            .values()
            .filter(|reminder| reminder.is_due(now))
            .cloned()
            .collect())
    }

    fn mark_reminder_fired(
        &self,
        id: ReminderId,
        at: DateTime<Utc>,
    ) -> Result<DeadlineReminder, StoreError> {
        let mut state = self.state()?;
        let entity = EntityRef::DeadlineReminder(id);
        let reminder = state
            .reminders
            .get_mut(&id)
            .ok_or(StoreError::NotFound(entity))?;
        if reminder.fired_at.is_some() {
            return Err(StoreError::ConcurrentModification(entity));
        }
        reminder.fired_at = Some(at);
        Ok(reminder.clone())
    }
}

/// A notification as it was handed to the sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveredNotification {
    pub recipient: Recipient,
    pub notification: Notification,
}

/// Sink that keeps every delivery in memory; can be switched to fail.
#[derive(Debug, Default, Clone)]
pub struct RecordingNotificationSink {
    delivered: Arc<Mutex<Vec<DeliveredNotification>>>,
    failing: Arc<AtomicBool>,
}

impl RecordingNotificationSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent deliveries fail with a transport error.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn delivered(&self) -> Vec<DeliveredNotification> {
        self.delivered
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    pub fn delivered_to(&self, recipient: Recipient) -> Vec<Notification> {
        self.delivered()
            .into_iter()
            .filter(|delivery| delivery.recipient == recipient)
            .map(|delivery| delivery.notification)
            .collect()
    }

    fn record(
        &self,
        recipient: Recipient,
        notification: &Notification,
    ) -> Result<(), NotificationError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(NotificationError::Transport("sink offline".to_string()));
        }
        let mut guard = self
            .delivered
            .lock()
            .map_err(|_| NotificationError::Transport("sink mutex poisoned".to_string()))?;
        guard.push(DeliveredNotification {
            recipient,
            notification: notification.clone(),
        });
        Ok(())
    }
}

impl NotificationSink for RecordingNotificationSink {
    fn notify_user(
        &self,
        user: UserId,
        notification: &Notification,
    ) -> Result<(), NotificationError> {
        self.record(Recipient::User(user), notification)
    }

    fn notify_role(
        &self,
        role: Role,
        notification: &Notification,
    ) -> Result<(), NotificationError> {
        self.record(Recipient::Role(role), notification)
    }
}

#[derive(Debug, Default, Clone)]
pub struct InMemoryUserDirectory {
    users: Arc<RwLock<HashMap<UserId, UserAccount>>>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_users(accounts: impl IntoIterator<Item = UserAccount>) -> Self {
        let directory = Self::default();
        for account in accounts {
            directory.insert(account);
        }
        directory
    }

    pub fn insert(&self, account: UserAccount) {
        if let Ok(mut users) = self.users.write() {
            users.insert(account.id, account);
        }
    }
}

impl UserDirectory for InMemoryUserDirectory {
    fn find_user(&self, id: UserId) -> Result<Option<UserAccount>, DirectoryError> {
        let users = self
            .users
            .read()
            .map_err(|_| DirectoryError::Unavailable("directory lock poisoned".to_string()))?;
        Ok(users.get(&id).cloned())
    }
}
