//! The store contract.

use std::time::Duration;

use async_trait::async_trait;

use crate::bound::ScoreBound;
use crate::error::StoreError;

/// Longest expiry a backend applies. Longer TTLs are clamped to it.
pub const MAX_TTL: Duration = Duration::from_secs(60 * 60 * 24 * 365 * 100);

/// Operations the status layer needs from the shared store.
///
/// Every method maps onto a single store command, so each one is atomic on
/// its own. Nothing here spans more than one command; callers that touch
/// several keys do so as independent steps.
#[async_trait]
pub trait StatusStore: Send + Sync {
    /// Fetch the string stored at `key`.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Fetch several keys at once, preserving order. Missing keys yield `None`.
    async fn get_many(&self, keys: &[String]) -> Result<Vec<Option<String>>, StoreError>;

    /// Overwrite `key` with `value`, expiring it after `ttl` (at least one
    /// second, at most [`MAX_TTL`]).
    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration)
        -> Result<(), StoreError>;

    /// Remove keys, returning how many existed.
    async fn delete(&self, keys: &[String]) -> Result<u64, StoreError>;

    async fn exists(&self, key: &str) -> Result<bool, StoreError>;

    /// All keys matching a glob pattern, in no particular order.
    async fn scan_keys(&self, pattern: &str) -> Result<Vec<String>, StoreError>;

    /// Number of keys matching a glob pattern.
    async fn count_keys(&self, pattern: &str) -> Result<u64, StoreError> {
        Ok(self.scan_keys(pattern).await?.len() as u64)
    }

    /// Add `member` to the sorted set at `key`, or update its score.
    async fn sorted_set_add(&self, key: &str, member: &str, score: f64)
        -> Result<(), StoreError>;

    /// Remove members from a sorted set, returning how many were present.
    async fn sorted_set_remove(&self, key: &str, members: &[String]) -> Result<u64, StoreError>;

    async fn sorted_set_score(&self, key: &str, member: &str) -> Result<Option<f64>, StoreError>;

    /// Members with scores in `[min, max]`, ascending by score.
    async fn sorted_set_range_by_score(
        &self,
        key: &str,
        min: ScoreBound,
        max: ScoreBound,
    ) -> Result<Vec<(String, f64)>, StoreError>;

    /// Remove members with scores in `[min, max]` in one command.
    async fn sorted_set_remove_range_by_score(
        &self,
        key: &str,
        min: ScoreBound,
        max: ScoreBound,
    ) -> Result<u64, StoreError>;
}
