use sanka_types::ActivityId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("invalid activity: {field}: {reason}")]
    InvalidActivity { field: &'static str, reason: String },

    #[error("activity not found: {0}")]
    ActivityNotFound(ActivityId),

    #[error("activity {0} is full")]
    ActivityFull(ActivityId),

    #[error("storage error: {0}")]
    Storage(#[from] sanka_store::StoreError),
}

impl CatalogError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidActivity {
            field,
            reason: reason.into(),
        }
    }
}
