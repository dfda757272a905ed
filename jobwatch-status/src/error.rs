//! Status errors.

use jobwatch_store::StoreError;
use thiserror::Error;

/// Errors raised while reading, validating or persisting status records.
#[derive(Debug, Error)]
pub enum StatusError {
    #[error("status not found: {0}")]
    NotFound(String),

    /// A setter or `update_attributes` rejected a value. Nothing was written.
    #[error("invalid value for {name}: {reason}")]
    InvalidAttribute { name: String, reason: String },

    #[error("corrupt status record for {job_id}: {source}")]
    Decode {
        job_id: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode status record: {0}")]
    Encode(#[source] serde_json::Error),

    /// A kill request was noticed while the job reported progress. The
    /// record has already been finalized as `killed`.
    #[error("job {0} was killed")]
    Killed(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl StatusError {
    #[inline]
    pub(crate) fn invalid(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidAttribute {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Whether this is an argument error rather than a store or data problem.
    #[inline]
    pub fn is_invalid_attribute(&self) -> bool {
        matches!(self, Self::InvalidAttribute { .. })
    }

    #[inline]
    pub fn is_killed(&self) -> bool {
        matches!(self, Self::Killed(_))
    }
}
