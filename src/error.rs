use thiserror::Error;

use crate::{
    dao::storage::StorageError,
    state::{
        matches::{InvalidDraft, LifecycleError, RosterViolation},
        state_machine::InvalidTransition,
    },
};

/// Errors that can occur in service layer operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Storage backend is unavailable.
    #[error("storage unavailable")]
    Unavailable(#[source] StorageError),
    /// Invalid input provided by the caller.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// A lifecycle or roster rule rejected the operation.
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
}

impl ServiceError {
    /// The lifecycle error behind this failure, if any.
    pub fn lifecycle(&self) -> Option<&LifecycleError> {
        match self {
            ServiceError::Lifecycle(err) => Some(err),
            _ => None,
        }
    }

    /// Whether the failure is an illegal phase transition.
    pub fn is_illegal_transition(&self) -> bool {
        matches!(
            self,
            ServiceError::Lifecycle(LifecycleError::IllegalTransition(_))
        )
    }
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        ServiceError::Unavailable(err)
    }
}

impl From<InvalidDraft> for ServiceError {
    fn from(err: InvalidDraft) -> Self {
        ServiceError::InvalidInput(err.0)
    }
}

impl From<InvalidTransition> for ServiceError {
    fn from(err: InvalidTransition) -> Self {
        ServiceError::Lifecycle(err.into())
    }
}

impl From<RosterViolation> for ServiceError {
    fn from(err: RosterViolation) -> Self {
        ServiceError::Lifecycle(err.into())
    }
}
