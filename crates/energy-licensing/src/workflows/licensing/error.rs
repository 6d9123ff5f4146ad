use super::domain::{Capability, EntityRef, ReportId, RequestId, UserId};
use super::repository::{DirectoryError, StoreError};

/// Error raised by the transition primitives.
///
/// Only [`WorkflowError::ConcurrentModification`] is transient; every other
/// variant reports a request that will fail the same way if repeated.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("{action} is not allowed for {entity} in status {from}")]
    InvalidTransition {
        entity: EntityRef,
        from: &'static str,
        action: &'static str,
    },
    #[error("'{value}' is not a valid {field}")]
    InvalidEnumValue { field: &'static str, value: String },
    #[error("{0} not found")]
    NotFound(EntityRef),
    #[error("{0} was modified concurrently")]
    ConcurrentModification(EntityRef),
    #[error("version {version_number} is the latest version of {report} and cannot be deleted")]
    CannotDeleteLatest {
        report: ReportId,
        version_number: u32,
    },
    #[error("a non-empty reason is required")]
    MissingReason,
    #[error("{field} must not be empty")]
    MissingField { field: &'static str },
    #[error("{user} lacks the {capability} capability")]
    MissingCapability { user: UserId, capability: Capability },
    #[error("{user} is not the inspector assigned to {request}")]
    NotAssignedInspector { user: UserId, request: RequestId },
    #[error("{user} does not own {entity}")]
    NotOwner { user: UserId, entity: EntityRef },
    #[error("store failure: {0}")]
    Store(#[source] StoreError),
    #[error(transparent)]
    Directory(#[from] DirectoryError),
}

impl WorkflowError {
    pub(crate) fn invalid_enum(field: &'static str, value: &str) -> Self {
        Self::InvalidEnumValue {
            field,
            value: value.to_string(),
        }
    }

    /// Whether the caller may retry after re-reading the entity.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ConcurrentModification(_))
    }
}

impl From<StoreError> for WorkflowError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::NotFound(entity) => Self::NotFound(entity),
            StoreError::ConcurrentModification(entity) => Self::ConcurrentModification(entity),
            other => Self::Store(other),
        }
    }
}
