use crate::core::model::DownloadStatus;

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum QueueError {
    #[error("a download run is already active")]
    RunActive,

    #[error("item {index}: cannot move from {from:?} to {to:?}")]
    InvalidTransition {
        index: usize,
        from: DownloadStatus,
        to: DownloadStatus,
    },

    #[error("no queue item at index {0}")]
    IndexOutOfRange(usize),
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum CoordinatorError {
    #[error("a download run is already in progress")]
    AlreadyRunning,
}
