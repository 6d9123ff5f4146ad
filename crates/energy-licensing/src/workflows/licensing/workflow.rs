use std::sync::Arc;

use crate::clock::Clock;
use crate::config::{DeadlineConfig, SchedulerConfig};

use super::audit::AuditVersionWorkflow;
use super::deadlines::{DeadlinePolicy, DeadlineScheduler};
use super::repository::{EntityStore, NotificationSink, UserDirectory};
use super::requests::RequestStateMachine;

/// The three workflow components wired over one store, sink, and clock.
pub struct LicensingWorkflow<S, N, D> {
    requests: RequestStateMachine<S, N, D>,
    audits: AuditVersionWorkflow<S, N, D>,
    scheduler: Arc<DeadlineScheduler<S, N>>,
}

impl<S, N, D> LicensingWorkflow<S, N, D>
where
    S: EntityStore + 'static,
    N: NotificationSink + 'static,
    D: UserDirectory + 'static,
{
    pub fn new(
        store: Arc<S>,
        notifications: Arc<N>,
        directory: Arc<D>,
        clock: Arc<dyn Clock>,
        scheduler: SchedulerConfig,
        deadlines: &DeadlineConfig,
    ) -> Self {
        let policy = DeadlinePolicy::from(deadlines);
        Self {
            requests: RequestStateMachine::new(
                Arc::clone(&store),
                Arc::clone(&notifications),
                Arc::clone(&directory),
                Arc::clone(&clock),
                policy.clone(),
            ),
            audits: AuditVersionWorkflow::new(
                Arc::clone(&store),
                Arc::clone(&notifications),
                directory,
                Arc::clone(&clock),
                policy,
            ),
            scheduler: Arc::new(DeadlineScheduler::new(store, notifications, clock, scheduler)),
        }
    }

    pub fn requests(&self) -> &RequestStateMachine<S, N, D> {
        &self.requests
    }

    pub fn audits(&self) -> &AuditVersionWorkflow<S, N, D> {
        &self.audits
    }

    pub fn scheduler(&self) -> &Arc<DeadlineScheduler<S, N>> {
        &self.scheduler
    }
}
