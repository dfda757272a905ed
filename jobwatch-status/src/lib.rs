//! Job status records kept in a shared store.
//!
//! Workers publish progress for the job they are running and controllers
//! read it back or ask a job to stop, possibly from another machine. All
//! coordination goes through a [`StatusStore`](jobwatch_store::StatusStore);
//! nothing is held in process memory between calls.
//!
//! # Architecture
//!
//! - [`StatusClient`] - creates and loads records, lists and bulk-deletes them
//! - [`Container`] - one record plus save/reload/kill operations
//! - [`KillRegistry`] - sorted set of pending kill requests
//! - [`JobStatus`] - `waiting`, `working`, `complete`, `failed`, `killed`
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use jobwatch_status::{NewStatus, StatusClient};
//! use jobwatch_store::MemoryStore;
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), jobwatch_status::StatusError> {
//!     let client = StatusClient::new(Arc::new(MemoryStore::new()));
//!     let mut status = client
//!         .create(NewStatus::new().with_args(vec![json!("x")]).with_worker("export"))
//!         .await?;
//!
//!     status.update_attributes([("total", json!(10)), ("at", json!(3))]).await?;
//!     assert_eq!(status.pct_complete(), 30);
//!
//!     status.request_kill().await?;
//!     assert!(!status.is_killable().await?);
//!     Ok(())
//! }
//! ```

mod client;
mod container;
mod error;
mod kill;
mod record;
mod status;

pub use client::{
    new_job_id, NewStatus, StatusClient, StatusOptions, DEFAULT_KEY_PREFIX, DEFAULT_KILL_KEY,
    DEFAULT_TTL,
};
pub use container::Container;
pub use error::StatusError;
pub use kill::KillRegistry;
pub use record::{Attribute, StatusRecord};
pub use status::JobStatus;
