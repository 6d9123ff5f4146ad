use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::domain::DeadlineReminder;
use crate::clock::Clock;
use crate::config::SchedulerConfig;
use crate::workflows::licensing::audit::AuditStatus;
use crate::workflows::licensing::domain::{EntityRef, Priority, Role};
use crate::workflows::licensing::repository::{
    deliver, EntitySnapshot, EntityStore, Notification, NotificationSink, Recipient, StoreError,
};
use crate::workflows::licensing::requests::LicenseRequest;

/// Outcome counts for one pass of a periodic duty.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScanSummary {
    pub scanned: usize,
    pub acted: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Result of running both duties once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TickReport {
    pub ran_at: DateTime<Utc>,
    pub overdue: ScanSummary,
    pub reminders: ScanSummary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerStatus {
    Stopped,
    Running,
}

#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("deadline scheduler is already running")]
    AlreadyRunning,
    #[error("deadline scheduler is disabled by configuration")]
    Disabled,
    #[error(transparent)]
    Store(#[from] StoreError),
}

enum Lifecycle {
    Stopped,
    Running(CancellationToken),
}

/// Background owner of overdue detection and reminder dispatch.
///
/// Constructed once and shared through an `Arc`. The scheduler only writes
/// the overdue overlay and reminder claims; statuses are left to the state
/// machines.
pub struct DeadlineScheduler<S, N> {
    store: Arc<S>,
    notifications: Arc<N>,
    clock: Arc<dyn Clock>,
    config: SchedulerConfig,
    lifecycle: Mutex<Lifecycle>,
}

impl<S, N> DeadlineScheduler<S, N>
where
    S: EntityStore + 'static,
    N: NotificationSink + 'static,
{
    pub fn new(
        store: Arc<S>,
        notifications: Arc<N>,
        clock: Arc<dyn Clock>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            store,
            notifications,
            clock,
            config,
            lifecycle: Mutex::new(Lifecycle::Stopped),
        }
    }

    pub fn status(&self) -> SchedulerStatus {
        match *self.lifecycle() {
            Lifecycle::Stopped => SchedulerStatus::Stopped,
            Lifecycle::Running(_) => SchedulerStatus::Running,
        }
    }

    /// Spawn the periodic loop on the current tokio runtime.
    pub fn start(self: &Arc<Self>) -> Result<JoinHandle<()>, SchedulerError> {
        if !self.config.enabled {
            return Err(SchedulerError::Disabled);
        }

        let token = {
            let mut lifecycle = self.lifecycle();
            if matches!(*lifecycle, Lifecycle::Running(_)) {
                return Err(SchedulerError::AlreadyRunning);
            }
            let token = CancellationToken::new();
            *lifecycle = Lifecycle::Running(token.clone());
            token
        };

        info!(
            overdue_interval_secs = self.config.overdue_interval.as_secs(),
            reminder_interval_secs = self.config.reminder_interval.as_secs(),
            "deadline scheduler starting"
        );

        let scheduler = Arc::clone(self);
        Ok(tokio::spawn(async move {
            let mut overdue = interval(scheduler.config.overdue_interval);
            let mut reminders = interval(scheduler.config.reminder_interval);
            overdue.set_missed_tick_behavior(MissedTickBehavior::Delay);
            reminders.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = overdue.tick() => {
                        let now = scheduler.clock.now();
                        if let Err(error) = scheduler.detect_overdue(now) {
                            warn!(error = %error, "overdue scan failed");
                        }
                    }
                    _ = reminders.tick() => {
                        let now = scheduler.clock.now();
                        if let Err(error) = scheduler.dispatch_reminders(now) {
                            warn!(error = %error, "reminder scan failed");
                        }
                    }
                }
            }

            info!("deadline scheduler stopped");
        }))
    }

    /// Signal the loop to stop after any tick in progress. Returns whether
    /// the scheduler was running.
    pub fn stop(&self) -> bool {
        let previous = std::mem::replace(&mut *self.lifecycle(), Lifecycle::Stopped);
        match previous {
            Lifecycle::Running(token) => {
                token.cancel();
                true
            }
            Lifecycle::Stopped => false,
        }
    }

    /// Run both duties once, outside the timer.
    pub fn run_once(&self) -> Result<TickReport, SchedulerError> {
        let now = self.clock.now();
        let overdue = self.detect_overdue(now)?;
        let reminders = self.dispatch_reminders(now)?;
        Ok(TickReport {
            ran_at: now,
            overdue,
            reminders,
        })
    }

    /// Flag and escalate open requests whose deadline has passed.
    pub fn detect_overdue(&self, now: DateTime<Utc>) -> Result<ScanSummary, StoreError> {
        let candidates = self.store.find_overdue(now)?;
        let mut summary = ScanSummary {
            scanned: candidates.len(),
            ..ScanSummary::default()
        };

        for request in candidates {
            if !request.needs_escalation(now) {
                summary.skipped += 1;
                continue;
            }
            match self.store.flag_overdue(request.id, request.revision, now) {
                Ok(flagged) => {
                    self.escalate(&flagged);
                    summary.acted += 1;
                }
                Err(StoreError::ConcurrentModification(_)) => {
                    debug!(request_id = %request.id, "request moved during overdue scan");
                    summary.skipped += 1;
                }
                Err(error) => {
                    warn!(
                        request_id = %request.id,
                        error = %error,
                        "failed to flag overdue request"
                    );
                    summary.failed += 1;
                }
            }
        }

        info!(
            scanned = summary.scanned,
            flagged = summary.acted,
            skipped = summary.skipped,
            failed = summary.failed,
            "overdue scan finished"
        );
        Ok(summary)
    }

    /// Claim and send reminders whose lead window has opened.
    pub fn dispatch_reminders(&self, now: DateTime<Utc>) -> Result<ScanSummary, StoreError> {
        let due = self.store.find_due_reminders(now)?;
        let mut summary = ScanSummary {
            scanned: due.len(),
            ..ScanSummary::default()
        };

        for reminder in due {
            let recipient = match self.store.get(reminder.entity) {
                Ok(snapshot) => reminder_recipient(&snapshot),
                Err(StoreError::NotFound(_)) => None,
                Err(error) => {
                    warn!(
                        reminder_id = %reminder.id,
                        error = %error,
                        "failed to resolve reminder target"
                    );
                    summary.failed += 1;
                    continue;
                }
            };

            match self.store.mark_reminder_fired(reminder.id, now) {
                Ok(_) => {}
                Err(StoreError::ConcurrentModification(_)) => {
                    debug!(reminder_id = %reminder.id, "reminder already claimed");
                    summary.skipped += 1;
                    continue;
                }
                Err(error) => {
                    warn!(reminder_id = %reminder.id, error = %error, "failed to claim reminder");
                    summary.failed += 1;
                    continue;
                }
            }

            match recipient {
                Some(recipient) => {
                    deliver(
                        self.notifications.as_ref(),
                        recipient,
                        &reminder_notification(&reminder),
                    );
                    summary.acted += 1;
                }
                None => {
                    debug!(
                        reminder_id = %reminder.id,
                        entity = %reminder.entity,
                        "reminder consumed without notice"
                    );
                    summary.skipped += 1;
                }
            }
        }

        info!(
            scanned = summary.scanned,
            sent = summary.acted,
            skipped = summary.skipped,
            failed = summary.failed,
            "reminder scan finished"
        );
        Ok(summary)
    }

    fn escalate(&self, request: &LicenseRequest) {
        let notification = Notification::new(
            "License request overdue",
            format!(
                "{} passed its deadline of {} while {}",
                request.details.facility_name,
                request.deadline().date_naive(),
                request.status.label()
            ),
            Priority::Urgent,
            EntityRef::LicenseRequest(request.id),
        );
        deliver(
            self.notifications.as_ref(),
            Recipient::Role(Role::DepartmentHead),
            &notification,
        );
        info!(
            request_id = %request.id,
            status = request.status.label(),
            "overdue request escalated"
        );
    }

    fn lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Who should hear about a reminder, or `None` when nobody is expected to
/// act any more.
fn reminder_recipient(snapshot: &EntitySnapshot) -> Option<Recipient> {
    match snapshot {
        EntitySnapshot::Request(request) => request.responsible_recipient(),
        EntitySnapshot::Report(report) => match report.status {
            AuditStatus::Approved => None,
            AuditStatus::Submitted | AuditStatus::UnderReview => Some(
                report
                    .reviewer_id
                    .map(Recipient::User)
                    .unwrap_or(Recipient::Role(Role::Auditor)),
            ),
            AuditStatus::Draft | AuditStatus::NeedsEdit | AuditStatus::Rejected => {
                Some(Recipient::User(report.inspector_id))
            }
        },
        EntitySnapshot::Version(_) | EntitySnapshot::Reminder(_) => None,
    }
}

fn reminder_notification(reminder: &DeadlineReminder) -> Notification {
    let priority = if reminder.reminder_days <= 7 {
        Priority::High
    } else {
        Priority::Normal
    };
    Notification::new(
        "Deadline approaching",
        format!(
            "{} is due on {} ({} day reminder)",
            reminder.entity,
            reminder.deadline_date.date_naive(),
            reminder.reminder_days
        ),
        priority,
        reminder.entity,
    )
}
