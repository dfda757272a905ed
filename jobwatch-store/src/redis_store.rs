//! Redis-backed store.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use tracing::debug;

use crate::bound::ScoreBound;
use crate::error::StoreError;
use crate::store::{StatusStore, MAX_TTL};

/// Number of keys requested per `SCAN` round trip.
const SCAN_BATCH: usize = 500;

/// [`StatusStore`] over a multiplexed Redis connection.
///
/// The connection is cheap to clone and safe to share between tasks, so a
/// single `RedisStore` can back every worker in a process.
#[derive(Clone)]
pub struct RedisStore {
    conn: MultiplexedConnection,
}

impl fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisStore")
            .field("conn", &"<MultiplexedConnection>")
            .finish()
    }
}

impl RedisStore {
    /// Open a connection to the server at `url`.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(url)
            .map_err(|e| StoreError::Connection(format!("invalid redis url: {e}")))?;
        let conn = client.get_multiplexed_async_connection().await?;
        debug!("redis store connected");
        Ok(Self { conn })
    }

    /// Wrap an already established connection.
    pub fn from_connection(conn: MultiplexedConnection) -> Self {
        Self { conn }
    }

    #[inline]
    fn conn(&self) -> MultiplexedConnection {
        self.conn.clone()
    }
}

#[async_trait]
impl StatusStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let value = redis::cmd("GET")
            .arg(key)
            .query_async::<Option<String>>(&mut self.conn())
            .await?;
        Ok(value)
    }

    async fn get_many(&self, keys: &[String]) -> Result<Vec<Option<String>>, StoreError> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let values = redis::cmd("MGET")
            .arg(keys)
            .query_async::<Vec<Option<String>>>(&mut self.conn())
            .await?;
        Ok(values)
    }

    async fn set_with_ttl(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        // EX rejects zero and overflowing expiries
        let secs = ttl.min(MAX_TTL).as_secs().max(1);
        redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("EX")
            .arg(secs)
            .query_async::<()>(&mut self.conn())
            .await?;
        Ok(())
    }

    async fn delete(&self, keys: &[String]) -> Result<u64, StoreError> {
        if keys.is_empty() {
            return Ok(0);
        }
        let removed = redis::cmd("DEL")
            .arg(keys)
            .query_async::<u64>(&mut self.conn())
            .await?;
        Ok(removed)
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let count = redis::cmd("EXISTS")
            .arg(key)
            .query_async::<u64>(&mut self.conn())
            .await?;
        Ok(count > 0)
    }

    async fn scan_keys(&self, pattern: &str) -> Result<Vec<String>, StoreError> {
        let mut conn = self.conn();
        let mut cursor: u64 = 0;
        let mut keys = Vec::new();
        loop {
            let (next, batch) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async::<(u64, Vec<String>)>(&mut conn)
                .await?;
            keys.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }
        // SCAN may return a key more than once while the keyspace is rehashing
        keys.sort_unstable();
        keys.dedup();
        Ok(keys)
    }

    async fn sorted_set_add(&self, key: &str, member: &str, score: f64) -> Result<(), StoreError> {
        redis::cmd("ZADD")
            .arg(key)
            .arg(score)
            .arg(member)
            .query_async::<()>(&mut self.conn())
            .await?;
        Ok(())
    }

    async fn sorted_set_remove(&self, key: &str, members: &[String]) -> Result<u64, StoreError> {
        if members.is_empty() {
            return Ok(0);
        }
        let removed = redis::cmd("ZREM")
            .arg(key)
            .arg(members)
            .query_async::<u64>(&mut self.conn())
            .await?;
        Ok(removed)
    }

    async fn sorted_set_score(&self, key: &str, member: &str) -> Result<Option<f64>, StoreError> {
        let score = redis::cmd("ZSCORE")
            .arg(key)
            .arg(member)
            .query_async::<Option<f64>>(&mut self.conn())
            .await?;
        Ok(score)
    }

    async fn sorted_set_range_by_score(
        &self,
        key: &str,
        min: ScoreBound,
        max: ScoreBound,
    ) -> Result<Vec<(String, f64)>, StoreError> {
        let members = redis::cmd("ZRANGEBYSCORE")
            .arg(key)
            .arg(min.to_redis_arg())
            .arg(max.to_redis_arg())
            .arg("WITHSCORES")
            .query_async::<Vec<(String, f64)>>(&mut self.conn())
            .await?;
        Ok(members)
    }

    async fn sorted_set_remove_range_by_score(
        &self,
        key: &str,
        min: ScoreBound,
        max: ScoreBound,
    ) -> Result<u64, StoreError> {
        let removed = redis::cmd("ZREMRANGEBYSCORE")
            .arg(key)
            .arg(min.to_redis_arg())
            .arg(max.to_redis_arg())
            .query_async::<u64>(&mut self.conn())
            .await?;
        Ok(removed)
    }
}
