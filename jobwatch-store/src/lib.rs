//! Store contract for job status tracking.
//!
//! The status layer never talks to a concrete database. Everything it needs
//! is expressed by the [`StatusStore`] trait: plain string keys with a TTL,
//! pattern scans over the key space and a handful of sorted-set commands.
//!
//! # Backends
//!
//! - [`RedisStore`] - shared store for workers and controllers on different hosts
//! - [`MemoryStore`] - process-local store, used by tests and single-process setups
//!
//! # Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use jobwatch_store::{RedisStore, StatusStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), jobwatch_store::StoreError> {
//!     let store = RedisStore::connect("redis://127.0.0.1:6379").await?;
//!     store.set_with_ttl("status:abc", "{}", Duration::from_secs(60)).await?;
//!     assert!(store.exists("status:abc").await?);
//!     Ok(())
//! }
//! ```

mod bound;
mod error;
mod memory;
mod pattern;
mod redis_store;
mod store;

pub use bound::ScoreBound;
pub use error::StoreError;
pub use memory::MemoryStore;
pub use redis_store::RedisStore;
pub use store::{StatusStore, MAX_TTL};

// Re-export async_trait for convenience when implementing StatusStore
pub use async_trait::async_trait;
