//! Live view of the running job's status record.

use std::sync::Arc;

use jobwatch_status::{Attribute, Container, JobStatus, StatusError, StatusRecord};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::info;

/// Handle a job body uses to publish progress and to notice kill requests.
///
/// Every setter writes through to the store immediately. Clones share the
/// same record, so a body can pass the handle to helper tasks.
///
/// Cancellation is cooperative. Every progress write checks for a pending
/// kill request afterwards; when one is found the record is finalized as
/// `killed` and the write returns [`StatusError::Killed`], so a body that
/// propagates errors with `?` stops at its next progress report.
#[derive(Debug, Clone)]
pub struct StatusHandle {
    job_id: Arc<str>,
    container: Arc<Mutex<Container>>,
}

impl StatusHandle {
    pub(crate) fn new(container: Container) -> Self {
        Self {
            job_id: Arc::from(container.job_id()),
            container: Arc::new(Mutex::new(container)),
        }
    }

    #[inline]
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// Copy of the record as this worker last wrote it.
    pub async fn snapshot(&self) -> StatusRecord {
        self.container.lock().await.record().clone()
    }

    pub async fn status(&self) -> JobStatus {
        self.container.lock().await.status()
    }

    /// Report progress. `message` replaces the current message; `None`
    /// clears it.
    pub async fn at(&self, at: u64, message: Option<&str>) -> Result<(), StatusError> {
        self.update([
            Attribute::At(at),
            Attribute::Message(message.map(str::to_owned)),
        ])
        .await
    }

    pub async fn set_total(&self, total: u64) -> Result<(), StatusError> {
        self.update([Attribute::Total(total)]).await
    }

    pub async fn set_message(&self, message: Option<&str>) -> Result<(), StatusError> {
        self.update([Attribute::Message(message.map(str::to_owned))])
            .await
    }

    pub async fn set_payload(&self, payload: impl Into<Value>) -> Result<(), StatusError> {
        self.update([Attribute::Payload(payload.into())]).await
    }

    /// Apply several changes with a single save, then check for a kill
    /// request.
    pub async fn update(
        &self,
        changes: impl IntoIterator<Item = Attribute>,
    ) -> Result<(), StatusError> {
        let changes: Vec<Attribute> = changes.into_iter().collect();
        let mut container = self.container.lock().await;
        container.update(changes).await?;
        if !container.is_kill_requested().await? {
            return Ok(());
        }
        container.kill().await?;
        info!(job_id = %self.job_id, at = container.at(), "kill noticed during progress update");
        Err(StatusError::Killed(self.job_id.to_string()))
    }

    /// Whether a controller has asked this job to stop.
    pub async fn kill_requested(&self) -> Result<bool, StatusError> {
        self.container.lock().await.is_kill_requested().await
    }

    /// Mark the job `killed` and consume the request.
    ///
    /// The body should return right after calling this; the worker leaves a
    /// killed record as it is.
    pub async fn kill(&self) -> Result<(), StatusError> {
        self.container.lock().await.kill().await
    }

    /// Finalize as killed if a kill was requested. Returns `true` when the
    /// body should stop.
    pub async fn kill_if_requested(&self) -> Result<bool, StatusError> {
        let mut container = self.container.lock().await;
        if !container.is_kill_requested().await? {
            return Ok(false);
        }
        container.kill().await?;
        info!(job_id = %self.job_id, at = container.at(), "job honored kill request");
        Ok(true)
    }

    /// Move to a terminal status with `message`, then save.
    pub(crate) async fn finish(
        &self,
        status: JobStatus,
        message: Option<String>,
    ) -> Result<(), StatusError> {
        self.container
            .lock()
            .await
            .update([Attribute::Status(status), Attribute::Message(message)])
            .await
    }
}
