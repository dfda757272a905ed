//! Entry point for creating, loading and listing status records.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use jobwatch_store::StatusStore;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::container::Container;
use crate::error::StatusError;
use crate::kill::KillRegistry;
use crate::record::StatusRecord;
use crate::status::JobStatus;

/// Default lifetime of a status record after its last save: three days.
pub const DEFAULT_TTL: Duration = Duration::from_secs(60 * 60 * 24 * 3);
pub const DEFAULT_KEY_PREFIX: &str = "status";
pub const DEFAULT_KILL_KEY: &str = "status_kill_requests";

/// Keys fetched per `get_many` call when walking the whole namespace.
const FETCH_BATCH: usize = 500;

/// Key layout and expiry settings.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusOptions {
    /// Record lifetime, refreshed on every save. Kill requests older than
    /// this are purged as well.
    pub ttl: Duration,
    /// Records live under `<key_prefix>:<job_id>`.
    pub key_prefix: String,
    /// Sorted set holding pending kill requests. Must not fall under
    /// `<key_prefix>:`.
    pub kill_key: String,
}

impl Default for StatusOptions {
    #[inline]
    fn default() -> Self {
        Self {
            ttl: DEFAULT_TTL,
            key_prefix: DEFAULT_KEY_PREFIX.to_owned(),
            kill_key: DEFAULT_KILL_KEY.to_owned(),
        }
    }
}

impl StatusOptions {
    #[inline]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }
}

/// Attributes for a record about to be created.
///
/// Anything left unset keeps the record defaults: `waiting`, zero progress,
/// no message and a `null` payload.
#[derive(Debug, Clone, Default)]
pub struct NewStatus {
    /// Id handed out by the job framework. A fresh one is generated if absent.
    pub job_id: Option<String>,
    pub args: Vec<Value>,
    pub worker_name: String,
    pub queue_name: String,
    pub status: JobStatus,
    pub at: u64,
    pub total: u64,
    pub message: Option<String>,
    pub payload: Value,
}

impl NewStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_job_id(mut self, job_id: impl Into<String>) -> Self {
        self.job_id = Some(job_id.into());
        self
    }

    pub fn with_args(mut self, args: Vec<Value>) -> Self {
        self.args = args;
        self
    }

    pub fn with_worker(mut self, worker_name: impl Into<String>) -> Self {
        self.worker_name = worker_name.into();
        self
    }

    pub fn with_queue(mut self, queue_name: impl Into<String>) -> Self {
        self.queue_name = queue_name.into();
        self
    }

    pub fn with_status(mut self, status: JobStatus) -> Self {
        self.status = status;
        self
    }

    fn into_record(self) -> StatusRecord {
        let mut record = StatusRecord::new(self.job_id.unwrap_or_else(new_job_id));
        record.args = self.args;
        record.worker_name = self.worker_name;
        record.queue_name = self.queue_name;
        record.status = self.status;
        record.set_total(self.total);
        record.set_at(self.at);
        record.message = self.message;
        record.payload = self.payload;
        record
    }
}

/// Generate a 24 character hex job id.
pub fn new_job_id() -> String {
    let mut id = uuid::Uuid::new_v4().simple().to_string();
    id.truncate(24);
    id
}

/// Handle on the status namespace of one store.
///
/// Cheap to clone; every [`Container`] keeps a copy so it can save and
/// reload itself.
#[derive(Clone)]
pub struct StatusClient {
    store: Arc<dyn StatusStore>,
    options: Arc<StatusOptions>,
    kills: KillRegistry,
}

impl fmt::Debug for StatusClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatusClient")
            .field("store", &"<dyn StatusStore>")
            .field("options", &self.options)
            .finish()
    }
}

impl StatusClient {
    pub fn new(store: Arc<dyn StatusStore>) -> Self {
        Self::with_options(store, StatusOptions::default())
    }

    pub fn with_options(store: Arc<dyn StatusStore>, options: StatusOptions) -> Self {
        let kills = KillRegistry::new(store.clone(), options.kill_key.clone());
        Self {
            store,
            options: Arc::new(options),
            kills,
        }
    }

    #[inline]
    pub fn options(&self) -> &StatusOptions {
        &self.options
    }

    #[inline]
    pub fn kill_registry(&self) -> &KillRegistry {
        &self.kills
    }

    #[inline]
    pub(crate) fn store(&self) -> &dyn StatusStore {
        self.store.as_ref()
    }

    /// Store key of the record for `job_id`.
    #[inline]
    pub fn status_key(&self, job_id: &str) -> String {
        format!("{}:{}", self.options.key_prefix, job_id)
    }

    fn key_pattern(&self) -> String {
        format!("{}:*", self.options.key_prefix)
    }

    fn job_id_from_key<'a>(&self, key: &'a str) -> Option<&'a str> {
        key.strip_prefix(self.options.key_prefix.as_str())
            .and_then(|rest| rest.strip_prefix(':'))
    }

    /// Build a record from `new`, persist it and return it.
    pub async fn create(&self, new: NewStatus) -> Result<Container, StatusError> {
        let mut container = Container::from_record(self.clone(), new.into_record());
        container.save().await?;
        info!(
            job_id = container.job_id(),
            worker = container.worker_name(),
            queue = container.queue_name(),
            "status record created"
        );
        Ok(container)
    }

    /// Fetch the record for `job_id`.
    ///
    /// Every load also purges kill requests older than the record TTL, since
    /// a request that old can no longer reach a live record.
    pub async fn load(&self, job_id: &str) -> Result<Container, StatusError> {
        self.purge_expired_kills().await?;

        let raw = self
            .store
            .get(&self.status_key(job_id))
            .await?
            .ok_or_else(|| StatusError::NotFound(job_id.to_owned()))?;
        let record = self.decode(job_id, &raw)?;
        Ok(Container::from_record(self.clone(), record))
    }

    pub async fn exists(&self, job_id: &str) -> Result<bool, StatusError> {
        Ok(self.store.exists(&self.status_key(job_id)).await?)
    }

    async fn purge_expired_kills(&self) -> Result<u64, StatusError> {
        let cutoff = chrono::Duration::from_std(self.options.ttl)
            .ok()
            .and_then(|ttl| Utc::now().checked_sub_signed(ttl));
        match cutoff {
            Some(cutoff) => Ok(self.kills.purge_before(cutoff).await?),
            None => Ok(0),
        }
    }

    pub(crate) fn decode(&self, job_id: &str, raw: &str) -> Result<StatusRecord, StatusError> {
        let mut record: StatusRecord =
            serde_json::from_str(raw).map_err(|source| StatusError::Decode {
                job_id: job_id.to_owned(),
                source,
            })?;
        // The key is authoritative; older writers did not store the id at all
        record.job_id = job_id.to_owned();
        Ok(record)
    }

    /// Number of stored status records.
    pub async fn size(&self) -> Result<u64, StatusError> {
        Ok(self.store.count_keys(&self.key_pattern()).await?)
    }

    /// `(job_id, status)` for stored records, skipping `offset` and returning
    /// at most `limit`. Pages are taken over job ids in lexical order.
    pub async fn status_jids(
        &self,
        offset: usize,
        limit: Option<usize>,
    ) -> Result<Vec<(String, JobStatus)>, StatusError> {
        let records = self.fetch_page(offset, limit).await?;
        Ok(records
            .into_iter()
            .map(|record| (record.job_id, record.status))
            .collect())
    }

    /// Same page as [`status_jids`](Self::status_jids), as full containers.
    pub async fn statuses(
        &self,
        offset: usize,
        limit: Option<usize>,
    ) -> Result<Vec<Container>, StatusError> {
        let records = self.fetch_page(offset, limit).await?;
        Ok(records
            .into_iter()
            .map(|record| Container::from_record(self.clone(), record))
            .collect())
    }

    /// Delete every record whose status is in `filter` (all records when
    /// `None`) together with their kill requests. Returns how many records
    /// were removed.
    pub async fn delete(&self, filter: Option<&[JobStatus]>) -> Result<u64, StatusError> {
        let keys = self.sorted_keys().await?;

        let doomed: Vec<String> = match filter {
            None => keys,
            Some(statuses) => {
                let mut matched = Vec::new();
                for record in self.fetch_records(&keys).await? {
                    if statuses.contains(&record.status) {
                        matched.push(self.status_key(&record.job_id));
                    }
                }
                matched
            }
        };
        if doomed.is_empty() {
            return Ok(0);
        }

        let job_ids: Vec<String> = doomed
            .iter()
            .filter_map(|key| self.job_id_from_key(key).map(str::to_owned))
            .collect();

        let mut removed = 0;
        for chunk in doomed.chunks(FETCH_BATCH) {
            removed += self.store.delete(chunk).await?;
        }
        self.kills.consume_many(&job_ids).await?;

        info!(removed, filter = ?filter, "status records deleted");
        Ok(removed)
    }

    async fn sorted_keys(&self) -> Result<Vec<String>, StatusError> {
        let mut keys = self.store.scan_keys(&self.key_pattern()).await?;
        keys.sort_unstable();
        keys.dedup();
        Ok(keys)
    }

    async fn fetch_page(
        &self,
        offset: usize,
        limit: Option<usize>,
    ) -> Result<Vec<StatusRecord>, StatusError> {
        let keys = self.sorted_keys().await?;
        let page: Vec<String> = keys
            .into_iter()
            .skip(offset)
            .take(limit.unwrap_or(usize::MAX))
            .collect();
        self.fetch_records(&page).await
    }

    /// Load and decode `keys`. Keys that expired since the scan are dropped,
    /// as are records that no longer decode.
    async fn fetch_records(&self, keys: &[String]) -> Result<Vec<StatusRecord>, StatusError> {
        let mut records = Vec::with_capacity(keys.len());
        for chunk in keys.chunks(FETCH_BATCH) {
            let values = self.store.get_many(chunk).await?;
            for (key, raw) in chunk.iter().zip(values) {
                let (Some(job_id), Some(raw)) = (self.job_id_from_key(key), raw) else {
                    continue;
                };
                match self.decode(job_id, &raw) {
                    Ok(record) => records.push(record),
                    Err(error) => warn!(%error, job_id, "skipping unreadable status record"),
                }
            }
        }
        debug!(requested = keys.len(), found = records.len(), "status records fetched");
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use jobwatch_store::MemoryStore;

    use super::*;

    /// One record per status, keyed by status.
    async fn seed(client: &StatusClient) -> HashMap<JobStatus, String> {
        let mut seeded = HashMap::new();
        for status in JobStatus::ALL {
            let container = client
                .create(NewStatus::new().with_status(*status))
                .await
                .unwrap();
            seeded.insert(*status, container.job_id().to_owned());
        }
        seeded
    }

    fn client() -> StatusClient {
        StatusClient::new(Arc::new(MemoryStore::new()))
    }

    #[test]
    fn key_layout() {
        let client = client();
        assert_eq!(client.status_key("abc"), "status:abc");
        assert_eq!(client.job_id_from_key("status:abc"), Some("abc"));
        assert_eq!(client.job_id_from_key("status_kill_requests"), None);
        assert_eq!(client.kill_registry().key(), DEFAULT_KILL_KEY);
    }

    #[tokio::test]
    async fn oversized_ttl_is_saved_and_loaded() {
        let options = StatusOptions::default().with_ttl(Duration::from_secs(u64::MAX));
        let client = StatusClient::with_options(Arc::new(MemoryStore::new()), options);
        let created = client.create(NewStatus::new()).await.unwrap();
        let loaded = client.load(created.job_id()).await.unwrap();
        assert_eq!(loaded.status(), JobStatus::Waiting);
    }

    #[tokio::test]
    async fn size_counts_records_only() {
        let client = client();
        let seeded = seed(&client).await;
        client.kill_registry().request("someone").await.unwrap();
        assert_eq!(client.size().await.unwrap(), seeded.len() as u64);
    }

    #[tokio::test]
    async fn status_jids_lists_every_record() {
        let client = client();
        let seeded = seed(&client).await;

        let listed: HashMap<String, JobStatus> =
            client.status_jids(0, None).await.unwrap().into_iter().collect();
        assert_eq!(listed.len(), seeded.len());
        for (status, job_id) in &seeded {
            assert_eq!(listed.get(job_id), Some(status));
        }

        assert_eq!(client.status_jids(0, Some(1)).await.unwrap().len(), 1);
        assert_eq!(client.status_jids(4, Some(10)).await.unwrap().len(), 1);
        assert!(client.status_jids(10, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn pages_do_not_overlap() {
        let client = client();
        seed(&client).await;

        let first = client.status_jids(0, Some(3)).await.unwrap();
        let second = client.status_jids(3, Some(3)).await.unwrap();
        assert_eq!(first.len(), 3);
        assert_eq!(second.len(), 2);
        for (job_id, _) in &second {
            assert!(first.iter().all(|(other, _)| other != job_id));
        }
    }

    #[tokio::test]
    async fn statuses_materializes_containers() {
        let client = client();
        let seeded = seed(&client).await;

        let containers = client.statuses(0, None).await.unwrap();
        assert_eq!(containers.len(), seeded.len());
        for container in &containers {
            assert_eq!(seeded[&container.status()], container.job_id());
        }
        assert_eq!(client.statuses(0, Some(1)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn delete_by_status() {
        let client = client();
        let seeded = seed(&client).await;
        let waiting = &seeded[&JobStatus::Waiting];
        client.kill_registry().request(waiting).await.unwrap();

        let removed = client
            .delete(Some(&[JobStatus::Waiting, JobStatus::Complete]))
            .await
            .unwrap();
        assert_eq!(removed, 2);

        let mut left: Vec<String> = client
            .status_jids(0, None)
            .await
            .unwrap()
            .into_iter()
            .map(|(job_id, _)| job_id)
            .collect();
        left.sort();
        let mut expected: Vec<String> = seeded
            .iter()
            .filter(|(status, _)| !matches!(status, JobStatus::Waiting | JobStatus::Complete))
            .map(|(_, job_id)| job_id.clone())
            .collect();
        expected.sort();
        assert_eq!(left, expected);
        assert!(!client.kill_registry().is_requested(waiting).await.unwrap());
    }

    #[tokio::test]
    async fn delete_everything() {
        let client = client();
        seed(&client).await;

        client.delete(None).await.unwrap();
        assert!(client.status_jids(0, None).await.unwrap().is_empty());
        assert_eq!(client.size().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn unreadable_records_are_skipped_by_finders() {
        let store = MemoryStore::new();
        let client = StatusClient::new(Arc::new(store.clone()));
        client.create(NewStatus::new()).await.unwrap();
        store.insert_raw("status:broken", "not json", Duration::from_secs(60));

        assert_eq!(client.size().await.unwrap(), 2);
        assert_eq!(client.status_jids(0, None).await.unwrap().len(), 1);
        assert!(matches!(
            client.load("broken").await,
            Err(StatusError::Decode { .. })
        ));
    }
}
