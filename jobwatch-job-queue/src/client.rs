//! In-memory stand-in for the job queue.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::debug;

use crate::error::JobQueueError;
use crate::types::{EnqueueResult, JobRequest};

/// Default number of requests a queue accepts before refusing more.
const DEFAULT_CAPACITY: usize = 10_000;

/// Pending requests grouped by queue name, oldest first.
#[derive(Debug, Default)]
struct JobQueueState {
    queues: HashMap<String, VecDeque<JobRequest>>,
}

impl JobQueueState {
    fn push(&mut self, request: JobRequest) -> usize {
        let queue = self.queues.entry(request.queue.clone()).or_default();
        queue.push_back(request);
        queue.len()
    }

    /// Remove the oldest request in `queue` for `job_type`.
    fn pop_matching(&mut self, queue: &str, job_type: &str) -> Option<JobRequest> {
        let pending = self.queues.get_mut(queue)?;
        let index = pending.iter().position(|r| r.job_type == job_type)?;
        pending.remove(index)
    }

    /// Count pending requests, optionally for one queue.
    fn count(&self, queue: Option<&str>) -> usize {
        match queue {
            Some(name) => self.queues.get(name).map_or(0, VecDeque::len),
            None => self.queues.values().map(VecDeque::len).sum(),
        }
    }

    fn clear(&mut self) {
        self.queues.clear();
    }
}

/// Minimal broker that hands job ids from producers to workers inside one
/// process.
///
/// It exists so the status lifecycle can be exercised end to end; retry,
/// scheduling and cross-process delivery belong to a real queue.
#[derive(Clone)]
pub struct JobQueueClient {
    state: Arc<RwLock<JobQueueState>>,
    capacity: usize,
}

impl fmt::Debug for JobQueueClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobQueueClient")
            .field("state", &"<RwLock<JobQueueState>>")
            .field("capacity", &self.capacity)
            .finish()
    }
}

impl Default for JobQueueClient {
    fn default() -> Self {
        Self::new()
    }
}

impl JobQueueClient {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// A client whose queues each hold at most `capacity` requests.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            state: Arc::new(RwLock::new(JobQueueState::default())),
            capacity,
        }
    }

    /// Add a request to the back of its queue.
    pub async fn enqueue(&self, request: JobRequest) -> Result<EnqueueResult, JobQueueError> {
        let mut state = self.state.write().await;
        if state.count(Some(&request.queue)) >= self.capacity {
            return Err(JobQueueError::Backend(format!(
                "queue {} is full ({} pending)",
                request.queue, self.capacity
            )));
        }

        let job_id = request.job_id.clone();
        debug!(
            job_id = %job_id,
            queue = %request.queue,
            job_type = %request.job_type,
            "job enqueued"
        );
        let queue_depth = state.push(request);
        Ok(EnqueueResult {
            job_id,
            queue_depth,
        })
    }

    /// Take the oldest request of `job_type` from `queue`.
    pub async fn dequeue(&self, queue: &str, job_type: &str) -> Option<JobRequest> {
        let mut state = self.state.write().await;
        state.pop_matching(queue, job_type)
    }

    /// Number of pending requests, optionally for one queue.
    pub async fn pending(&self, queue: Option<&str>) -> usize {
        let state = self.state.read().await;
        state.count(queue)
    }

    /// Drop every pending request.
    pub async fn clear(&self) {
        let mut state = self.state.write().await;
        state.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fifo_per_queue_and_type() {
        let client = JobQueueClient::new();
        client.enqueue(JobRequest::new("a", "export", "default")).await.unwrap();
        client.enqueue(JobRequest::new("b", "import", "default")).await.unwrap();
        let result = client
            .enqueue(JobRequest::new("c", "export", "default"))
            .await
            .unwrap();
        assert_eq!(result.queue_depth, 3);
        client.enqueue(JobRequest::new("d", "export", "low")).await.unwrap();

        assert_eq!(client.pending(None).await, 4);
        assert_eq!(client.pending(Some("default")).await, 3);

        let first = client.dequeue("default", "export").await.unwrap();
        let second = client.dequeue("default", "export").await.unwrap();
        assert_eq!(first.job_id, "a");
        assert_eq!(second.job_id, "c");
        assert!(client.dequeue("default", "export").await.is_none());
        assert_eq!(client.dequeue("default", "import").await.unwrap().job_id, "b");

        client.clear().await;
        assert_eq!(client.pending(None).await, 0);
    }

    #[tokio::test]
    async fn refuses_requests_beyond_capacity() {
        let client = JobQueueClient::with_capacity(1);
        client.enqueue(JobRequest::new("a", "export", "default")).await.unwrap();
        let err = client
            .enqueue(JobRequest::new("b", "export", "default"))
            .await
            .unwrap_err();
        assert!(matches!(err, JobQueueError::Backend(_)));
        // other queues are unaffected
        client.enqueue(JobRequest::new("c", "export", "low")).await.unwrap();
    }
}
