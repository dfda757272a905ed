//! In-process store.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;

use crate::bound::ScoreBound;
use crate::error::StoreError;
use crate::pattern::glob_match;
use crate::store::{StatusStore, MAX_TTL};

#[derive(Debug, Clone)]
struct StoredValue {
    value: String,
    expires_at: Instant,
}

impl StoredValue {
    #[inline]
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

/// `now + ttl`, saturating at [`MAX_TTL`] from now.
#[inline]
fn expiry(now: Instant, ttl: Duration) -> Instant {
    now.checked_add(ttl.min(MAX_TTL)).unwrap_or(now)
}

#[derive(Debug, Default)]
struct MemoryState {
    values: DashMap<String, StoredValue>,
    sorted_sets: DashMap<String, HashMap<String, f64>>,
}

/// [`StatusStore`] kept in process memory.
///
/// Expired values are dropped lazily when touched. Each sorted-set command
/// holds the shard lock for its key for its whole duration, which gives the
/// same per-command atomicity the Redis backend has.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remaining lifetime of `key`, or `None` when it is absent or expired.
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        self.state
            .values
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.expires_at - now)
    }

    /// Store `value` without going through the TTL-aware write path.
    ///
    /// Useful for seeding records in tests the way an external writer would.
    pub fn insert_raw(&self, key: impl Into<String>, value: impl Into<String>, ttl: Duration) {
        self.state.values.insert(
            key.into(),
            StoredValue {
                value: value.into(),
                expires_at: expiry(Instant::now(), ttl),
            },
        );
    }

    fn live_value(&self, key: &str) -> Option<String> {
        let now = Instant::now();
        let live = self
            .state
            .values
            .get(key)
            .map(|entry| entry.is_live(now).then(|| entry.value.clone()));
        match live {
            Some(Some(value)) => Some(value),
            Some(None) => {
                self.state.values.remove_if(key, |_, entry| !entry.is_live(now));
                None
            }
            None => None,
        }
    }
}

#[async_trait]
impl StatusStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.live_value(key))
    }

    async fn get_many(&self, keys: &[String]) -> Result<Vec<Option<String>>, StoreError> {
        Ok(keys.iter().map(|key| self.live_value(key)).collect())
    }

    async fn set_with_ttl(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        self.insert_raw(key, value, ttl.max(Duration::from_secs(1)));
        Ok(())
    }

    async fn delete(&self, keys: &[String]) -> Result<u64, StoreError> {
        let now = Instant::now();
        let mut removed = 0;
        for key in keys {
            if let Some((_, entry)) = self.state.values.remove(key) {
                if entry.is_live(now) {
                    removed += 1;
                }
            } else if self.state.sorted_sets.remove(key).is_some() {
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.live_value(key).is_some() || self.state.sorted_sets.contains_key(key))
    }

    async fn scan_keys(&self, pattern: &str) -> Result<Vec<String>, StoreError> {
        let now = Instant::now();
        let mut keys: Vec<String> = self
            .state
            .values
            .iter()
            .filter(|entry| entry.value().is_live(now) && glob_match(pattern, entry.key()))
            .map(|entry| entry.key().clone())
            .collect();
        keys.extend(
            self.state
                .sorted_sets
                .iter()
                .filter(|entry| glob_match(pattern, entry.key()))
                .map(|entry| entry.key().clone()),
        );
        Ok(keys)
    }

    async fn sorted_set_add(&self, key: &str, member: &str, score: f64) -> Result<(), StoreError> {
        self.state
            .sorted_sets
            .entry(key.to_owned())
            .or_default()
            .insert(member.to_owned(), score);
        Ok(())
    }

    async fn sorted_set_remove(&self, key: &str, members: &[String]) -> Result<u64, StoreError> {
        let Some(mut set) = self.state.sorted_sets.get_mut(key) else {
            return Ok(0);
        };
        let removed = members
            .iter()
            .filter(|member| set.remove(member.as_str()).is_some())
            .count() as u64;
        let now_empty = set.is_empty();
        drop(set);
        if now_empty {
            // Redis drops a sorted set once its last member is gone
            self.state.sorted_sets.remove_if(key, |_, set| set.is_empty());
        }
        Ok(removed)
    }

    async fn sorted_set_score(&self, key: &str, member: &str) -> Result<Option<f64>, StoreError> {
        Ok(self
            .state
            .sorted_sets
            .get(key)
            .and_then(|set| set.get(member).copied()))
    }

    async fn sorted_set_range_by_score(
        &self,
        key: &str,
        min: ScoreBound,
        max: ScoreBound,
    ) -> Result<Vec<(String, f64)>, StoreError> {
        let Some(set) = self.state.sorted_sets.get(key) else {
            return Ok(Vec::new());
        };
        let mut members: Vec<(String, f64)> = set
            .iter()
            .filter(|(_, score)| ScoreBound::contains(min, max, **score))
            .map(|(member, &score)| (member.clone(), score))
            .collect();
        members.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        Ok(members)
    }

    async fn sorted_set_remove_range_by_score(
        &self,
        key: &str,
        min: ScoreBound,
        max: ScoreBound,
    ) -> Result<u64, StoreError> {
        let Some(mut set) = self.state.sorted_sets.get_mut(key) else {
            return Ok(0);
        };
        let before = set.len();
        set.retain(|_, score| !ScoreBound::contains(min, max, *score));
        let removed = (before - set.len()) as u64;
        let now_empty = set.is_empty();
        drop(set);
        if now_empty {
            self.state.sorted_sets.remove_if(key, |_, set| set.is_empty());
        }
        Ok(removed)
    }
}
