//! Job lifecycle tracking on top of a shared status store.
//!
//! A [`StatusWorker`] wraps any [`JobExecutor`]: enqueueing records the job's
//! arguments in a `waiting` status record and queues only its id; performing
//! loads the record, honors a kill that arrived before the job started,
//! flips it to `working`, runs the body and finally records `complete`,
//! `failed` or `killed`.
//!
//! # Architecture
//!
//! - [`StatusWorker`] - the lifecycle wrapper
//! - [`JobExecutor`] - trait for implementing job bodies
//! - [`StatusHandle`] - progress reporting and kill polling for a running body
//! - [`JobQueueClient`] - in-memory queue carrying job ids to workers
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use jobwatch_job_queue::{
//!     async_trait, JobError, JobExecutor, JobQueueClient, StatusHandle, StatusWorker,
//! };
//! use jobwatch_status::StatusClient;
//! use jobwatch_store::MemoryStore;
//! use serde_json::{json, Value};
//!
//! struct Export;
//!
//! #[async_trait]
//! impl JobExecutor for Export {
//!     type Error = JobError;
//!
//!     fn job_type(&self) -> &str {
//!         "export"
//!     }
//!
//!     async fn execute(&self, args: Vec<Value>, status: &StatusHandle) -> Result<(), JobError> {
//!         status.set_total(args.len() as u64).await?;
//!         for (i, _row) in args.iter().enumerate() {
//!             if status.kill_if_requested().await? {
//!                 return Ok(());
//!             }
//!             status.at(i as u64 + 1, Some("exporting")).await?;
//!         }
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let status = StatusClient::new(Arc::new(MemoryStore::new()));
//!     let queue = JobQueueClient::new();
//!     let worker = StatusWorker::new(Export, status);
//!
//!     let job_id = worker.enqueue(&queue, vec![json!("a"), json!("b")]).await?;
//!     worker.work_one(&queue).await?;
//!     println!("{job_id} finished");
//!     Ok(())
//! }
//! ```

mod client;
mod error;
mod executor;
mod handle;
mod types;
mod worker;

pub use client::JobQueueClient;
pub use error::{JobError, JobQueueError};
pub use executor::{JobExecutor, NoOpExecutor};
pub use handle::StatusHandle;
pub use types::{EnqueueResult, JobOutcome, JobRequest, DEFAULT_QUEUE};
pub use worker::StatusWorker;

// Re-export async_trait for convenience when implementing JobExecutor
pub use async_trait::async_trait;
