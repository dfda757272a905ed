//! Registry of pending kill requests.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use jobwatch_store::{ScoreBound, StatusStore, StoreError};
use tracing::debug;

/// One sorted set shared by every job: member = job id, score = the Unix
/// time the kill was requested.
///
/// Requests are advisory. Nothing here interrupts a running job; the job has
/// to look its own id up and stop on its own.
#[derive(Clone)]
pub struct KillRegistry {
    store: Arc<dyn StatusStore>,
    key: String,
}

impl fmt::Debug for KillRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KillRegistry")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

impl KillRegistry {
    pub fn new(store: Arc<dyn StatusStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    /// Name of the sorted set holding the requests.
    #[inline]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Ask `job_id` to stop. Re-requesting refreshes the timestamp.
    pub async fn request(&self, job_id: &str) -> Result<(), StoreError> {
        self.request_at(job_id, Utc::now()).await
    }

    /// Record a request with an explicit timestamp.
    pub async fn request_at(&self, job_id: &str, at: DateTime<Utc>) -> Result<(), StoreError> {
        self.store
            .sorted_set_add(&self.key, job_id, at.timestamp() as f64)
            .await?;
        debug!(job_id, "kill requested");
        Ok(())
    }

    pub async fn is_requested(&self, job_id: &str) -> Result<bool, StoreError> {
        Ok(self.requested_at(job_id).await?.is_some())
    }

    /// When the pending request for `job_id` was made, if there is one.
    pub async fn requested_at(&self, job_id: &str) -> Result<Option<DateTime<Utc>>, StoreError> {
        let score = self.store.sorted_set_score(&self.key, job_id).await?;
        Ok(score.map(score_to_time))
    }

    /// Drop the request for `job_id`, returning whether one was pending.
    pub async fn consume(&self, job_id: &str) -> Result<bool, StoreError> {
        let removed = self
            .store
            .sorted_set_remove(&self.key, &[job_id.to_owned()])
            .await?;
        Ok(removed > 0)
    }

    pub async fn consume_many(&self, job_ids: &[String]) -> Result<u64, StoreError> {
        self.store.sorted_set_remove(&self.key, job_ids).await
    }

    /// Remove every request made strictly before `cutoff` in a single
    /// range delete, so concurrent purges cannot interfere with each other.
    pub async fn purge_before(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        let removed = self
            .store
            .sorted_set_remove_range_by_score(
                &self.key,
                ScoreBound::NegInfinity,
                ScoreBound::Exclusive(cutoff.timestamp() as f64),
            )
            .await?;
        if removed > 0 {
            debug!(removed, %cutoff, "purged expired kill requests");
        }
        Ok(removed)
    }

    /// All outstanding requests, oldest first.
    pub async fn pending(&self) -> Result<Vec<(String, DateTime<Utc>)>, StoreError> {
        let members = self
            .store
            .sorted_set_range_by_score(&self.key, ScoreBound::NegInfinity, ScoreBound::PosInfinity)
            .await?;
        Ok(members
            .into_iter()
            .map(|(job_id, score)| (job_id, score_to_time(score)))
            .collect())
    }
}

#[inline]
fn score_to_time(score: f64) -> DateTime<Utc> {
    DateTime::from_timestamp(score as i64, 0).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use jobwatch_store::MemoryStore;

    fn registry() -> KillRegistry {
        KillRegistry::new(Arc::new(MemoryStore::new()), "kills")
    }

    #[tokio::test]
    async fn request_and_consume() {
        let kills = registry();
        assert!(!kills.is_requested("a").await.unwrap());

        kills.request("a").await.unwrap();
        assert!(kills.is_requested("a").await.unwrap());
        let at = kills.requested_at("a").await.unwrap().unwrap();
        assert!((Utc::now() - at).num_seconds().abs() <= 1);

        assert!(kills.consume("a").await.unwrap());
        assert!(!kills.consume("a").await.unwrap());
        assert!(!kills.is_requested("a").await.unwrap());
    }

    #[tokio::test]
    async fn purge_keeps_recent_requests() {
        let kills = registry();
        let now = Utc::now();
        kills.request_at("old", now - Duration::seconds(100)).await.unwrap();
        kills.request_at("edge", now - Duration::seconds(50)).await.unwrap();
        kills.request_at("new", now).await.unwrap();

        let removed = kills
            .purge_before(now - Duration::seconds(50))
            .await
            .unwrap();
        assert_eq!(removed, 1);

        let pending: Vec<String> = kills
            .pending()
            .await
            .unwrap()
            .into_iter()
            .map(|(job_id, _)| job_id)
            .collect();
        assert_eq!(pending, vec!["edge".to_string(), "new".to_string()]);
    }
}
