//! Status-tracking wrapper around a job executor.

use std::fmt;
use std::sync::Arc;

use jobwatch_status::{JobStatus, NewStatus, StatusClient};
use serde_json::Value;
use tracing::{info, warn};

use crate::client::JobQueueClient;
use crate::error::JobQueueError;
use crate::executor::JobExecutor;
use crate::handle::StatusHandle;
use crate::types::{JobOutcome, JobRequest, DEFAULT_QUEUE};

/// Drives a job's status record around an executor.
///
/// ```text
/// waiting ──> working ──> complete | failed | killed
///    └──────────────────────────────────> killed   (kill requested before start)
/// ```
///
/// Each job id is assumed to run on at most one worker at a time; the queue
/// in front of the worker is responsible for that.
pub struct StatusWorker<E> {
    executor: Arc<E>,
    status: StatusClient,
    queue: String,
}

impl<E> Clone for StatusWorker<E> {
    fn clone(&self) -> Self {
        Self {
            executor: self.executor.clone(),
            status: self.status.clone(),
            queue: self.queue.clone(),
        }
    }
}

impl<E: JobExecutor> fmt::Debug for StatusWorker<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatusWorker")
            .field("job_type", &self.executor.job_type())
            .field("queue", &self.queue)
            .finish()
    }
}

impl<E: JobExecutor> StatusWorker<E> {
    pub fn new(executor: E, status: StatusClient) -> Self {
        Self {
            executor: Arc::new(executor),
            status,
            queue: DEFAULT_QUEUE.to_owned(),
        }
    }

    pub fn with_queue(mut self, queue: impl Into<String>) -> Self {
        self.queue = queue.into();
        self
    }

    #[inline]
    pub fn job_type(&self) -> &str {
        self.executor.job_type()
    }

    #[inline]
    pub fn queue(&self) -> &str {
        &self.queue
    }

    #[inline]
    pub fn status_client(&self) -> &StatusClient {
        &self.status
    }

    /// Record a `waiting` status holding `args`, then queue the job id.
    pub async fn enqueue(
        &self,
        queue: &JobQueueClient,
        args: Vec<Value>,
    ) -> Result<String, JobQueueError> {
        let container = self
            .status
            .create(
                NewStatus::new()
                    .with_args(args)
                    .with_worker(self.job_type())
                    .with_queue(&self.queue),
            )
            .await?;
        let job_id = container.job_id().to_owned();

        let request = JobRequest::new(&job_id, self.job_type(), &self.queue);
        if let Err(error) = queue.enqueue(request).await {
            // A record without a queue entry would sit in `waiting` until it expires
            if let Err(cleanup) = container.delete().await {
                warn!(
                    job_id = %job_id,
                    error = %cleanup,
                    "failed to remove status of unqueued job"
                );
            }
            return Err(error);
        }
        Ok(job_id)
    }

    /// Run the job `job_id` once.
    ///
    /// Errors from the executor are returned exactly as produced, after the
    /// record has been marked `failed`. A body that ends with its record
    /// already `killed` reports [`JobOutcome::Killed`] whatever it returned.
    pub async fn perform(&self, job_id: &str) -> Result<JobOutcome, E::Error> {
        let mut container = self.status.load(job_id).await?;

        if container.is_kill_requested().await? {
            container.kill().await?;
            info!(job_id, worker = self.job_type(), "kill requested before start, job skipped");
            return Ok(JobOutcome::Killed);
        }

        container.set_status(JobStatus::Working);
        container.clear_message();
        container.save().await?;
        info!(job_id, worker = self.job_type(), "job started");

        let args = container.args().to_vec();
        let handle = StatusHandle::new(container);

        match self.executor.execute(args, &handle).await {
            Ok(()) => {
                if handle.status().await == JobStatus::Killed {
                    return Ok(JobOutcome::Killed);
                }
                handle.finish(JobStatus::Complete, None).await?;
                info!(job_id, worker = self.job_type(), "job complete");
                Ok(JobOutcome::Complete)
            }
            Err(error) => {
                // A body unwinding from a kill, usually via `StatusError::Killed`
                if handle.status().await == JobStatus::Killed {
                    info!(job_id, worker = self.job_type(), %error, "job stopped after kill");
                    return Ok(JobOutcome::Killed);
                }
                if let Err(save_error) =
                    handle.finish(JobStatus::Failed, Some(error.to_string())).await
                {
                    warn!(job_id, error = %save_error, "failed to record job failure");
                }
                warn!(job_id, worker = self.job_type(), %error, "job failed");
                Err(error)
            }
        }
    }

    /// Take the next job of this worker's type off its queue and perform it.
    /// Returns `None` when nothing is queued.
    pub async fn work_one(&self, queue: &JobQueueClient) -> Result<Option<JobOutcome>, E::Error> {
        let Some(request) = queue.dequeue(&self.queue, self.job_type()).await else {
            return Ok(None);
        };
        self.perform(&request.job_id).await.map(Some)
    }
}
