use chrono::{DateTime, Duration, Utc};

use super::domain::DeadlineReminder;
use crate::config::DeadlineConfig;
use crate::workflows::licensing::domain::EntityRef;

/// Fixed processing window for a license request, in days.
pub const REQUEST_DEADLINE_DAYS: i64 = 90;

/// Deadline arithmetic and reminder lead times.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeadlinePolicy {
    review_window: Duration,
    request_reminder_days: Vec<u32>,
    report_reminder_days: Vec<u32>,
}

impl DeadlinePolicy {
    pub fn new(
        review_window_days: u32,
        request_reminder_days: Vec<u32>,
        report_reminder_days: Vec<u32>,
    ) -> Self {
        Self {
            review_window: Duration::days(i64::from(review_window_days)),
            request_reminder_days: normalize(request_reminder_days),
            report_reminder_days: normalize(report_reminder_days),
        }
    }

    pub fn request_deadline(&self, created_at: DateTime<Utc>) -> DateTime<Utc> {
        saturating_add(created_at, Duration::days(REQUEST_DEADLINE_DAYS))
    }

    pub fn review_deadline(&self, created_at: DateTime<Utc>) -> DateTime<Utc> {
        saturating_add(created_at, self.review_window)
    }

    pub fn request_reminders(
        &self,
        entity: EntityRef,
        created_at: DateTime<Utc>,
        deadline: DateTime<Utc>,
    ) -> Vec<DeadlineReminder> {
        reminders(entity, created_at, deadline, &self.request_reminder_days)
    }

    pub fn report_reminders(
        &self,
        entity: EntityRef,
        created_at: DateTime<Utc>,
        deadline: DateTime<Utc>,
    ) -> Vec<DeadlineReminder> {
        reminders(entity, created_at, deadline, &self.report_reminder_days)
    }
}

impl Default for DeadlinePolicy {
    fn default() -> Self {
        Self::from(&DeadlineConfig::default())
    }
}

impl From<&DeadlineConfig> for DeadlinePolicy {
    fn from(config: &DeadlineConfig) -> Self {
        Self::new(
            config.review_window_days,
            config.request_reminder_days.clone(),
            config.report_reminder_days.clone(),
        )
    }
}

fn saturating_add(at: DateTime<Utc>, by: Duration) -> DateTime<Utc> {
    at.checked_add_signed(by).unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Largest lead first, duplicates collapsed.
fn normalize(mut leads: Vec<u32>) -> Vec<u32> {
    leads.sort_unstable_by(|a, b| b.cmp(a));
    leads.dedup();
    leads
}

fn reminders(
    entity: EntityRef,
    created_at: DateTime<Utc>,
    deadline: DateTime<Utc>,
    leads: &[u32],
) -> Vec<DeadlineReminder> {
    leads
        .iter()
        .map(|lead| DeadlineReminder::pending(entity, deadline, *lead))
        .filter(|reminder| reminder.remind_at() >= created_at)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::licensing::domain::{ReportId, RequestId};
    use chrono::TimeZone;

    #[test]
    fn request_deadline_is_ninety_days_out() {
        let policy = DeadlinePolicy::default();
        let created = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(
            policy.request_deadline(created),
            Utc.with_ymd_and_hms(2024, 3, 31, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn reminders_skip_leads_before_creation_and_collapse_duplicates() {
        let policy = DeadlinePolicy::new(5, vec![7, 30, 7, 120], vec![3, 10]);
        let created = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let entity = EntityRef::LicenseRequest(RequestId(3));

        let leads: Vec<u32> = policy
            .request_reminders(entity, created, policy.request_deadline(created))
            .iter()
            .map(|reminder| reminder.reminder_days)
            .collect();
        assert_eq!(leads, vec![30, 7]);

        let report = EntityRef::AuditReport(ReportId(1));
        let review = policy.report_reminders(report, created, policy.review_deadline(created));
        assert_eq!(review.len(), 1);
        assert_eq!(review[0].reminder_days, 3);
        assert_eq!(review[0].entity, report);
    }

    #[test]
    fn out_of_range_days_never_panic() {
        let policy = DeadlinePolicy::new(4_000_000_000, vec![4_000_000_000, 7], vec![3]);
        let created = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let entity = EntityRef::LicenseRequest(RequestId(9));

        let leads: Vec<u32> = policy
            .request_reminders(entity, created, policy.request_deadline(created))
            .iter()
            .map(|reminder| reminder.reminder_days)
            .collect();
        assert_eq!(leads, vec![7]);
        assert_eq!(policy.review_deadline(created), DateTime::<Utc>::MAX_UTC);
    }
}
