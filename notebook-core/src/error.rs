use thiserror::Error;

use crate::lifecycle::Rejected;
use crate::model::InstanceId;

/// Why a console operation was not applied
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum OperationError {
    /// Form input failed validation; nothing was submitted
    #[error("invalid {field}: {reason}")]
    Validation { field: &'static str, reason: String },

    /// The lifecycle table does not allow the action in the current status
    #[error("instance {id}: {reason}")]
    Rejected { id: InstanceId, reason: Rejected },

    #[error("instance not found: {id}")]
    NotFound { id: InstanceId },

    /// The manager was disposed; no further operations are accepted
    #[error("console has been disposed")]
    Disposed,
}

impl OperationError {
    pub fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field,
            reason: reason.into(),
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected { .. })
    }
}
