//! Job executor trait for implementing job bodies.

use async_trait::async_trait;
use jobwatch_status::StatusError;
use serde_json::Value;

use crate::error::JobError;
use crate::handle::StatusHandle;

/// The unit of work a [`StatusWorker`](crate::StatusWorker) runs.
///
/// The body receives the arguments captured at enqueue time and a
/// [`StatusHandle`] for reporting progress. Stopping on a kill request is
/// the body's own business. Progress writes fail with
/// [`StatusError::Killed`] once a request is pending, so propagating them
/// with `?` is enough; bodies that go long without reporting can poll
/// [`StatusHandle::kill_if_requested`]. Nothing interrupts a body that does
/// neither.
#[async_trait]
pub trait JobExecutor: Send + Sync {
    /// Error returned by the body. Status store failures convert into it.
    type Error: std::error::Error + From<StatusError> + Send + Sync + 'static;

    /// Returns the job type this executor handles.
    fn job_type(&self) -> &str;

    /// Execute the job.
    async fn execute(&self, args: Vec<Value>, status: &StatusHandle) -> Result<(), Self::Error>;
}

/// An executor that completes immediately without touching its arguments.
#[derive(Debug, Default, Clone)]
pub struct NoOpExecutor {
    job_type: String,
}

impl NoOpExecutor {
    pub fn new(job_type: impl Into<String>) -> Self {
        Self {
            job_type: job_type.into(),
        }
    }
}

#[async_trait]
impl JobExecutor for NoOpExecutor {
    type Error = JobError;

    fn job_type(&self) -> &str {
        &self.job_type
    }

    async fn execute(&self, _args: Vec<Value>, _status: &StatusHandle) -> Result<(), JobError> {
        Ok(())
    }
}
