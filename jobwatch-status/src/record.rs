//! The persisted status record and its validated attribute changes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::StatusError;
use crate::status::JobStatus;

/// Snapshot of a job's progress and outcome as stored under its status key.
///
/// Missing fields fall back to their defaults when decoding, and the field
/// names used by older writers (`worker`, `queue`) are accepted as aliases.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusRecord {
    #[serde(alias = "jid")]
    pub job_id: String,
    pub args: Vec<Value>,
    #[serde(alias = "worker")]
    pub worker_name: String,
    #[serde(alias = "queue")]
    pub queue_name: String,
    pub status: JobStatus,
    pub at: u64,
    pub total: u64,
    pub message: Option<String>,
    pub payload: Value,
    /// Unix timestamp (seconds) of the last save.
    pub last_updated_at: Option<i64>,
}

impl StatusRecord {
    /// A fresh `waiting` record with zeroed progress.
    pub fn new(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            ..Self::default()
        }
    }

    /// Set progress, raising `total` when `at` overtakes it.
    #[inline]
    pub(crate) fn set_at(&mut self, at: u64) {
        self.at = at;
        if at > self.total {
            self.total = at;
        }
    }

    /// Set the expected amount of work. `at` is pulled down with it so that
    /// `at <= total` keeps holding.
    #[inline]
    pub(crate) fn set_total(&mut self, total: u64) {
        self.total = total;
        if self.at > total {
            self.at = total;
        }
    }

    pub(crate) fn apply(&mut self, change: Attribute) {
        match change {
            Attribute::At(at) => self.set_at(at),
            Attribute::Total(total) => self.set_total(total),
            Attribute::Status(status) => self.status = status,
            Attribute::Message(message) => self.message = message,
            Attribute::Payload(payload) => self.payload = payload,
        }
    }
}

/// A validated change to one mutable attribute of a status record.
#[derive(Debug, Clone, PartialEq)]
pub enum Attribute {
    At(u64),
    Total(u64),
    Status(JobStatus),
    Message(Option<String>),
    Payload(Value),
}

impl Attribute {
    /// Validate a loosely typed `name => value` pair.
    ///
    /// `at` and `total` must be non-negative whole numbers, `status` must
    /// name a known status, `message` accepts `null` (clear) or anything with
    /// a string form, and `payload` accepts any value.
    pub fn parse(name: &str, value: Value) -> Result<Self, StatusError> {
        match name {
            "at" => parse_counter(name, &value).map(Self::At),
            "total" => parse_counter(name, &value).map(Self::Total),
            "status" => match value {
                Value::String(s) => s.parse().map(Self::Status),
                other => Err(StatusError::invalid(
                    name,
                    format!("expected a status name, got {other}"),
                )),
            },
            "message" => Ok(Self::Message(coerce_message(value))),
            "payload" => Ok(Self::Payload(value)),
            other => Err(StatusError::invalid(other, "unknown or read-only attribute")),
        }
    }

    /// Within one batch `total` is applied first, then `at`, then the rest.
    #[inline]
    pub(crate) fn order(&self) -> u8 {
        match self {
            Self::Total(_) => 0,
            Self::At(_) => 1,
            _ => 2,
        }
    }
}

fn parse_counter(name: &str, value: &Value) -> Result<u64, StatusError> {
    let Value::Number(number) = value else {
        return Err(StatusError::invalid(name, format!("expected a number, got {value}")));
    };
    if let Some(n) = number.as_u64() {
        return Ok(n);
    }
    match number.as_f64() {
        Some(f) if f >= 0.0 && f.fract() == 0.0 && f <= u64::MAX as f64 => Ok(f as u64),
        _ => Err(StatusError::invalid(
            name,
            format!("expected a non-negative integer, got {number}"),
        )),
    }
}

/// String form of an arbitrary value; `null` clears the message.
fn coerce_message(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}
