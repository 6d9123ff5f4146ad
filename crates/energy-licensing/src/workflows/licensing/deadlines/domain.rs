use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::workflows::licensing::domain::{EntityRef, ReminderId};

/// At-most-once notification scheduled ahead of an entity's deadline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeadlineReminder {
    pub id: ReminderId,
    pub entity: EntityRef,
    pub deadline_date: DateTime<Utc>,
    pub reminder_days: u32,
    pub fired_at: Option<DateTime<Utc>>,
}

impl DeadlineReminder {
    pub(crate) fn pending(
        entity: EntityRef,
        deadline_date: DateTime<Utc>,
        reminder_days: u32,
    ) -> Self {
        Self {
            id: ReminderId(0),
            entity,
            deadline_date,
            reminder_days,
            fired_at: None,
        }
    }

    /// Start of the reminder window, clamped to the earliest representable instant.
    pub fn remind_at(&self) -> DateTime<Utc> {
        self.deadline_date
            .checked_sub_signed(Duration::days(i64::from(self.reminder_days)))
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// Unfired and inside `[deadline - lead, deadline)`.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.fired_at.is_none() && self.remind_at() <= now && now < self.deadline_date
    }

    pub fn has_fired(&self) -> bool {
        self.fired_at.is_some()
    }
}
