//! Deadline computation, reminders, and the background scheduler.

mod domain;
mod policy;
mod scheduler;

pub use domain::DeadlineReminder;
pub use policy::{DeadlinePolicy, REQUEST_DEADLINE_DAYS};
pub use scheduler::{DeadlineScheduler, ScanSummary, SchedulerError, SchedulerStatus, TickReport};
