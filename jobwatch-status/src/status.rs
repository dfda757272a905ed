//! The job status enum.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::StatusError;

/// Declares [`JobStatus`] together with its name table and conversions.
macro_rules! job_statuses {
    ($( $(#[$meta:meta])* $variant:ident => $name:literal ),+ $(,)?) => {
        /// Lifecycle state of a job.
        #[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
        #[serde(rename_all = "lowercase")]
        pub enum JobStatus {
            $( $(#[$meta])* $variant, )+
        }

        impl JobStatus {
            /// Every status, in lifecycle order.
            pub const ALL: &'static [JobStatus] = &[$(Self::$variant),+];

            /// Wire name of the status.
            #[inline]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $name,)+
                }
            }
        }

        impl FromStr for JobStatus {
            type Err = StatusError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($name => Ok(Self::$variant),)+
                    other => Err(StatusError::invalid(
                        "status",
                        format!("unknown status {other:?}"),
                    )),
                }
            }
        }
    };
}

job_statuses! {
    #[default]
    Waiting => "waiting",
    Working => "working",
    Complete => "complete",
    Failed => "failed",
    Killed => "killed",
}

impl JobStatus {
    /// Returns true if no further transition is expected.
    #[inline]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Failed | Self::Killed)
    }

    /// Returns true while a kill request can still be honored.
    #[inline]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Waiting | Self::Working)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
