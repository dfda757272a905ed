//! A single job's status record bound to the store it lives in.

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, info};

use crate::client::StatusClient;
use crate::error::StatusError;
use crate::record::{Attribute, StatusRecord};
use crate::status::JobStatus;

/// In-memory copy of one status record plus the operations that read and
/// write it.
///
/// Setters only touch the local copy; nothing reaches the store until
/// [`save`](Self::save) (or one of the methods that calls it) runs.
#[derive(Debug, Clone)]
pub struct Container {
    client: StatusClient,
    record: StatusRecord,
}

impl Container {
    /// An unsaved `waiting` container for `job_id`.
    pub fn new(client: &StatusClient, job_id: impl Into<String>) -> Self {
        Self::from_record(client.clone(), StatusRecord::new(job_id))
    }

    pub(crate) fn from_record(client: StatusClient, record: StatusRecord) -> Self {
        Self { client, record }
    }

    #[inline]
    pub fn record(&self) -> &StatusRecord {
        &self.record
    }

    #[inline]
    pub fn into_record(self) -> StatusRecord {
        self.record
    }

    #[inline]
    pub fn job_id(&self) -> &str {
        &self.record.job_id
    }

    #[inline]
    pub fn args(&self) -> &[Value] {
        &self.record.args
    }

    #[inline]
    pub fn worker_name(&self) -> &str {
        &self.record.worker_name
    }

    #[inline]
    pub fn queue_name(&self) -> &str {
        &self.record.queue_name
    }

    #[inline]
    pub fn status(&self) -> JobStatus {
        self.record.status
    }

    /// Whether the current status is `status`.
    #[inline]
    pub fn is(&self, status: JobStatus) -> bool {
        self.record.status == status
    }

    #[inline]
    pub fn at(&self) -> u64 {
        self.record.at
    }

    #[inline]
    pub fn total(&self) -> u64 {
        self.record.total
    }

    #[inline]
    pub fn message(&self) -> Option<&str> {
        self.record.message.as_deref()
    }

    #[inline]
    pub fn payload(&self) -> &Value {
        &self.record.payload
    }

    pub fn last_updated_at(&self) -> Option<DateTime<Utc>> {
        self.record
            .last_updated_at
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
    }

    /// Set progress. A value above `total` raises `total` to match.
    pub fn set_at(&mut self, at: u64) {
        self.record.set_at(at);
    }

    pub fn set_total(&mut self, total: u64) {
        self.record.set_total(total);
    }

    pub fn set_status(&mut self, status: JobStatus) {
        self.record.status = status;
    }

    /// Set the message to the string form of `message`.
    pub fn set_message(&mut self, message: impl ToString) {
        self.record.message = Some(message.to_string());
    }

    pub fn clear_message(&mut self) {
        self.record.message = None;
    }

    pub fn set_payload(&mut self, payload: impl Into<Value>) {
        self.record.payload = payload.into();
    }

    /// Completion percentage rounded half up; 0 when `total` is 0.
    pub fn pct_complete(&self) -> u64 {
        if self.record.total == 0 {
            return 0;
        }
        (self.record.at as f64 / self.record.total as f64 * 100.0).round() as u64
    }

    /// Stamp `last_updated_at` and overwrite the stored record, refreshing
    /// its TTL.
    pub async fn save(&mut self) -> Result<(), StatusError> {
        self.record.last_updated_at = Some(Utc::now().timestamp());
        let json = serde_json::to_string(&self.record).map_err(StatusError::Encode)?;
        let options = self.client.options();
        self.client
            .store()
            .set_with_ttl(&self.client.status_key(self.job_id()), &json, options.ttl)
            .await?;
        debug!(job_id = self.job_id(), status = %self.status(), at = self.at(), "status saved");
        Ok(())
    }

    /// Replace the local copy with what is currently stored.
    pub async fn reload(&mut self) -> Result<(), StatusError> {
        let fresh = self.client.load(self.job_id()).await?;
        self.record = fresh.record;
        Ok(())
    }

    /// Remove the stored record and any pending kill request for it.
    pub async fn delete(&self) -> Result<(), StatusError> {
        let key = self.client.status_key(self.job_id());
        self.client.store().delete(&[key]).await?;
        self.client.kill_registry().consume(self.job_id()).await?;
        info!(job_id = self.job_id(), "status record deleted");
        Ok(())
    }

    /// Validate every `name => value` pair, apply them and save.
    ///
    /// If any pair is rejected nothing is applied and nothing is written.
    pub async fn update_attributes<I, K>(&mut self, attrs: I) -> Result<(), StatusError>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: AsRef<str>,
    {
        let changes = attrs
            .into_iter()
            .map(|(name, value)| Attribute::parse(name.as_ref(), value))
            .collect::<Result<Vec<_>, _>>()?;
        self.update(changes).await
    }

    /// Apply already validated changes and save.
    pub async fn update(
        &mut self,
        changes: impl IntoIterator<Item = Attribute>,
    ) -> Result<(), StatusError> {
        let mut changes: Vec<Attribute> = changes.into_iter().collect();
        changes.sort_by_key(Attribute::order);
        for change in changes {
            self.record.apply(change);
        }
        self.save().await
    }

    /// Ask the running job to stop. Advisory only.
    pub async fn request_kill(&self) -> Result<(), StatusError> {
        self.client.kill_registry().request(self.job_id()).await?;
        info!(job_id = self.job_id(), "kill requested");
        Ok(())
    }

    pub async fn is_kill_requested(&self) -> Result<bool, StatusError> {
        Ok(self.client.kill_registry().is_requested(self.job_id()).await?)
    }

    /// True while the job is `waiting` or `working` and has no kill request
    /// pending yet.
    pub async fn is_killable(&self) -> Result<bool, StatusError> {
        if !self.status().is_active() {
            return Ok(false);
        }
        Ok(!self.is_kill_requested().await?)
    }

    /// Mark the job `killed`, save, and consume its kill request.
    pub async fn kill(&mut self) -> Result<(), StatusError> {
        self.record.status = JobStatus::Killed;
        self.save().await?;
        self.client.kill_registry().consume(self.job_id()).await?;
        info!(job_id = self.job_id(), "job killed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use chrono::Utc;
    use jobwatch_store::{MemoryStore, StatusStore};
    use serde_json::json;

    use super::*;
    use crate::client::NewStatus;

    const JID: &str = "c2db8b1b460608fb32d76b7a";

    fn client() -> (StatusClient, MemoryStore) {
        let store = MemoryStore::new();
        (StatusClient::new(Arc::new(store.clone())), store)
    }

    #[tokio::test]
    async fn create_applies_defaults_and_persists() {
        let (client, store) = client();
        let args = vec![json!("arg1"), json!("arg2"), json!({"arg3": "val3"})];

        let container = client
            .create(NewStatus::new().with_job_id(JID).with_args(args.clone()))
            .await
            .unwrap();

        assert_eq!(container.job_id(), JID);
        assert_eq!(container.args(), args.as_slice());
        assert!(container.is(JobStatus::Waiting));
        assert_eq!(container.at(), 0);
        assert_eq!(container.total(), 0);
        assert_eq!(container.message(), None);
        assert_eq!(container.payload(), &Value::Null);
        assert!(store.exists("status:c2db8b1b460608fb32d76b7a").await.unwrap());
    }

    #[tokio::test]
    async fn create_generates_distinct_ids() {
        let (client, _) = client();
        let a = client.create(NewStatus::new()).await.unwrap();
        let b = client.create(NewStatus::new()).await.unwrap();
        assert_eq!(a.job_id().len(), 24);
        assert_ne!(a.job_id(), b.job_id());
    }

    #[tokio::test]
    async fn load_missing_record_is_not_found() {
        let (client, _) = client();
        let err = client.load(JID).await.unwrap_err();
        assert!(matches!(err, StatusError::NotFound(ref id) if id == JID));
    }

    #[tokio::test]
    async fn load_reads_a_foreign_record() {
        let (client, store) = client();
        let raw = json!({
            "args": ["arg1", "arg2"],
            "worker": "SomeWorker",
            "queue": "",
            "status": "complete",
            "at": 50,
            "total": 200,
            "message": "Some message",
            "payload": {},
            "last_updated_at": 1344855831
        });
        store.insert_raw(
            format!("status:{JID}"),
            raw.to_string(),
            Duration::from_secs(60),
        );

        let container = client.load(JID).await.unwrap();
        assert_eq!(container.job_id(), JID);
        assert_eq!(container.args(), &[json!("arg1"), json!("arg2")]);
        assert_eq!(container.worker_name(), "SomeWorker");
        assert!(container.is(JobStatus::Complete));
        assert_eq!(container.at(), 50);
        assert_eq!(container.total(), 200);
        assert_eq!(container.message(), Some("Some message"));
        assert_eq!(container.payload(), &json!({}));
        assert_eq!(container.last_updated_at().unwrap().timestamp(), 1344855831);
    }

    #[tokio::test]
    async fn load_purges_expired_kill_requests() {
        let store = MemoryStore::new();
        let ttl = Duration::from_secs(3600);
        let client = StatusClient::with_options(
            Arc::new(store.clone()),
            crate::StatusOptions::default().with_ttl(ttl),
        );
        let kills = client.kill_registry();
        let now = Utc::now();
        kills
            .request_at("stale", now - chrono::Duration::seconds(3600 + 10))
            .await
            .unwrap();
        kills
            .request_at("fresh", now - chrono::Duration::seconds(3600 - 10))
            .await
            .unwrap();

        // the record being loaded is unrelated to either request
        client
            .create(NewStatus::new().with_job_id(JID))
            .await
            .unwrap();
        client.load(JID).await.unwrap();

        assert!(!kills.is_requested("stale").await.unwrap());
        assert!(kills.is_requested("fresh").await.unwrap());
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let (client, store) = client();
        let mut container = Container::new(&client, JID);
        container.set_total(200);
        container.set_at(50);
        container.set_status(JobStatus::Working);
        container.set_message("Some message");
        container.set_payload(json!({"rows": [1, 2, 3]}));

        let before = Utc::now().timestamp();
        container.save().await.unwrap();
        let after = Utc::now().timestamp();

        let loaded = client.load(JID).await.unwrap();
        let mut expected = container.record().clone();
        expected.last_updated_at = loaded.record().last_updated_at;
        assert_eq!(loaded.record(), &expected);

        let saved_at = loaded.record().last_updated_at.unwrap();
        assert!(saved_at >= before && saved_at <= after);
        assert_eq!(container.record().last_updated_at, Some(saved_at));

        let ttl = store.ttl(&format!("status:{JID}")).unwrap();
        assert!(ttl > Duration::from_secs(60 * 60 * 24 * 2));
    }

    #[tokio::test]
    async fn reload_replaces_local_state() {
        let (client, _) = client();
        let mut container = client
            .create(NewStatus::new().with_job_id(JID))
            .await
            .unwrap();

        let mut other = client.load(JID).await.unwrap();
        other
            .update_attributes([("at", json!(7)), ("message", json!("seven"))])
            .await
            .unwrap();

        assert_eq!(container.at(), 0);
        container.reload().await.unwrap();
        assert_eq!(container.at(), 7);
        assert_eq!(container.message(), Some("seven"));
    }

    #[tokio::test]
    async fn delete_removes_record_and_kill_request() {
        let (client, store) = client();
        store.insert_raw(format!("status:{JID}"), "something", Duration::from_secs(60));
        client.kill_registry().request(JID).await.unwrap();

        Container::new(&client, JID).delete().await.unwrap();

        assert!(!client.exists(JID).await.unwrap());
        assert!(!client.kill_registry().is_requested(JID).await.unwrap());
    }

    #[tokio::test]
    async fn update_attributes_validates_before_writing() {
        let (client, _) = client();
        let mut container = client
            .create(NewStatus::new().with_job_id(JID))
            .await
            .unwrap();

        container
            .update_attributes([
                ("at", json!(1)),
                ("total", json!(3)),
                ("message", json!("msg")),
                ("status", json!("working")),
            ])
            .await
            .unwrap();

        let reloaded = client.load(JID).await.unwrap();
        assert_eq!(reloaded.at(), 1);
        assert_eq!(reloaded.total(), 3);
        assert_eq!(reloaded.message(), Some("msg"));
        assert!(reloaded.is(JobStatus::Working));

        let err = container
            .update_attributes([("total", json!(50)), ("at", json!("Invalid"))])
            .await
            .unwrap_err();
        assert!(err.is_invalid_attribute());
        assert_eq!(container.total(), 3);
        assert_eq!(client.load(JID).await.unwrap().total(), 3);

        let err = container
            .update_attributes([("status", json!("Wrong"))])
            .await
            .unwrap_err();
        assert!(err.is_invalid_attribute());
    }

    #[test]
    fn message_is_coerced_to_string() {
        let (client, _) = client();
        let mut container = Container::new(&client, JID);
        container.set_message("abcd");
        assert_eq!(container.message(), Some("abcd"));

        container.clear_message();
        assert_eq!(container.message(), None);

        container.set_message(42);
        assert_eq!(container.message(), Some("42"));
    }

    #[test]
    fn pct_complete_rounds_half_up() {
        let (client, _) = client();
        let mut container = Container::new(&client, JID);
        assert_eq!(container.pct_complete(), 0);

        container.set_at(1);
        container.set_total(100);
        assert_eq!(container.pct_complete(), 1);

        container.set_at(5);
        container.set_total(200);
        assert_eq!(container.pct_complete(), 3);
    }

    #[test]
    fn lowering_total_pulls_at_down() {
        let (client, _) = client();
        let mut container = Container::new(&client, JID);
        container.set_at(80);
        container.set_total(50);
        assert_eq!(container.at(), 50);
        assert_eq!(container.total(), 50);
    }

    #[tokio::test]
    async fn request_kill_makes_job_unkillable() {
        let (client, _) = client();
        let container = Container::new(&client, JID);
        assert!(!container.is_kill_requested().await.unwrap());
        assert!(container.is_killable().await.unwrap());

        container.request_kill().await.unwrap();

        let requested = client.kill_registry().requested_at(JID).await.unwrap().unwrap();
        assert!((Utc::now() - requested).num_seconds().abs() <= 1);
        assert!(container.is_kill_requested().await.unwrap());
        assert!(!container.is_killable().await.unwrap());
    }

    #[tokio::test]
    async fn killable_only_while_active() {
        let (client, _) = client();
        for status in JobStatus::ALL {
            let mut container = Container::new(&client, format!("job-{status}"));
            container.set_status(*status);
            assert_eq!(container.is_killable().await.unwrap(), status.is_active());
        }
    }

    #[tokio::test]
    async fn kill_finalizes_and_consumes_request() {
        let (client, _) = client();
        let mut container = Container::new(&client, JID);
        container.request_kill().await.unwrap();
        assert!(!container.is(JobStatus::Killed));

        container.kill().await.unwrap();

        assert!(container.is(JobStatus::Killed));
        assert!(!container.is_kill_requested().await.unwrap());
        assert!(client.load(JID).await.unwrap().is(JobStatus::Killed));
    }

    #[test]
    fn status_predicate_matches_only_current_status() {
        let (client, _) = client();
        for current in JobStatus::ALL {
            let mut container = Container::new(&client, JID);
            container.set_status(*current);
            for other in JobStatus::ALL {
                assert_eq!(container.is(*other), current == other);
            }
        }
    }
}
