//! Core types for the job queue.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Queue name used when a worker does not pick one.
pub const DEFAULT_QUEUE: &str = "default";

/// A queued unit of work.
///
/// The job's arguments are not part of the request: they live in the status
/// record, so a redelivery replays the job by id alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRequest {
    pub job_id: String,
    pub job_type: String,
    pub queue: String,
    pub enqueued_at: DateTime<Utc>,
}

impl JobRequest {
    #[inline]
    pub fn new(
        job_id: impl Into<String>,
        job_type: impl Into<String>,
        queue: impl Into<String>,
    ) -> Self {
        Self {
            job_id: job_id.into(),
            job_type: job_type.into(),
            queue: queue.into(),
            enqueued_at: Utc::now(),
        }
    }
}

/// Result returned after a job has been enqueued.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnqueueResult {
    pub job_id: String,
    /// Requests waiting in the same queue, this one included.
    pub queue_depth: usize,
}

/// How a performed job ended, when it did not fail.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum JobOutcome {
    Complete,
    Killed,
}

impl std::fmt::Display for JobOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Complete => "complete",
            Self::Killed => "killed",
        })
    }
}
