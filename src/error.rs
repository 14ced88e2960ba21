use thiserror::Error;

use crate::models::TaskId;
use crate::notify::NotifyError;
use crate::storage::StorageError;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("task not found: {0}")]
    NotFound(TaskId),

    #[error("persistence failure: {0}")]
    Persistence(#[from] StorageError),

    #[error("scheduling failure: {0}")]
    Scheduling(#[from] NotifyError),
}
