use chrono::{DateTime, NaiveDate, Utc};
use energy_licensing::clock::Clock;
use energy_licensing::config::AppConfig;
use energy_licensing::workflows::licensing::{
    InMemoryEntityStore, InMemoryUserDirectory, LicensingWorkflow, Notification,
    NotificationError, NotificationSink, Role, UserAccount, UserId,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::info;

pub(crate) type ServiceWorkflow =
    LicensingWorkflow<InMemoryEntityStore, LoggingNotificationSink, InMemoryUserDirectory>;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Notification sink that writes every delivery to the tracing pipeline.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct LoggingNotificationSink;

impl NotificationSink for LoggingNotificationSink {
    fn notify_user(
        &self,
        user: UserId,
        notification: &Notification,
    ) -> Result<(), NotificationError> {
        info!(
            recipient = %user,
            entity = %notification.entity,
            priority = ?notification.priority,
            title = %notification.title,
            "{}",
            notification.message
        );
        Ok(())
    }

    fn notify_role(
        &self,
        role: Role,
        notification: &Notification,
    ) -> Result<(), NotificationError> {
        info!(
            recipient = %role,
            entity = %notification.entity,
            priority = ?notification.priority,
            title = %notification.title,
            "{}",
            notification.message
        );
        Ok(())
    }
}

/// Accounts available until a real identity provider is wired in.
pub(crate) fn seeded_accounts() -> Vec<UserAccount> {
    [
        (1, "Demo Applicant", Role::Applicant),
        (2, "Licensing Desk", Role::DepartmentStaff),
        (3, "Field Inspector", Role::Inspector),
        (4, "Compliance Auditor", Role::Auditor),
        (5, "Department Head", Role::DepartmentHead),
    ]
    .into_iter()
    .map(|(id, name, role)| UserAccount {
        id: UserId(id),
        name: name.to_string(),
        role,
    })
    .collect()
}

pub(crate) fn build_workflow(config: &AppConfig, clock: Arc<dyn Clock>) -> Arc<ServiceWorkflow> {
    Arc::new(LicensingWorkflow::new(
        Arc::new(InMemoryEntityStore::new()),
        Arc::new(LoggingNotificationSink),
        Arc::new(InMemoryUserDirectory::with_users(seeded_accounts())),
        clock,
        config.scheduler.clone(),
        &config.deadlines,
    ))
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

/// Midnight UTC of a `YYYY-MM-DD` date.
pub(crate) fn parse_day_start(raw: &str) -> Result<DateTime<Utc>, String> {
    let date = parse_date(raw)?;
    date.and_hms_opt(0, 0, 0)
        .map(|midnight| midnight.and_utc())
        .ok_or_else(|| format!("'{raw}' has no midnight"))
}
