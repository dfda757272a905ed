//! Error types for the job queue and job bodies.

use jobwatch_status::StatusError;
use thiserror::Error;

/// Errors that may occur while handing a job to the queue.
#[derive(Debug, Error)]
pub enum JobQueueError {
    #[error("failed to enqueue job: {0}")]
    Backend(String),

    #[error("failed to record job status: {0}")]
    Status(#[from] StatusError),
}

/// Ready-made error type for job bodies.
///
/// Any type implementing `std::error::Error + From<StatusError>` works as a
/// [`JobExecutor::Error`](crate::JobExecutor::Error); this one covers the
/// common case.
#[derive(Debug, Error)]
pub enum JobError {
    #[error(transparent)]
    Status(#[from] StatusError),

    #[error("invalid arguments: {0}")]
    InvalidArgs(String),

    #[error("job execution failed: {0}")]
    ExecutionFailed(String),
}
