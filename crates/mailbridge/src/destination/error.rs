//! Destination failure taxonomy.

use std::time::Duration;
use thiserror::Error;

/// Every destination failure falls into exactly one of these classes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DestinationError {
    /// Timeout, throttling or a server-side fault. Worth retrying.
    #[error("Transient destination failure: {reason}")]
    Transient {
        reason: String,
        retry_after: Option<Duration>,
    },

    /// The request was refused as invalid. Retrying the same payload cannot succeed.
    #[error("Destination rejected the request ({status}): {detail}")]
    Rejected { status: u16, detail: String },

    /// The credential was refused.
    #[error("Destination refused the credential ({status}): {detail}")]
    Unauthorized { status: u16, detail: String },

    /// The endpoint could not be reached at all.
    #[error("Destination unreachable: {0}")]
    Unreachable(String),

    /// A response body did not have the expected shape.
    #[error("Unexpected destination response: {0}")]
    Decode(String),
}

impl DestinationError {
    pub fn transient(reason: impl Into<String>) -> Self {
        DestinationError::Transient {
            reason: reason.into(),
            retry_after: None,
        }
    }

    /// Classifies a non-success HTTP status.
    pub fn from_status(status: u16, detail: String, retry_after: Option<Duration>) -> Self {
        match status {
            401 | 403 => DestinationError::Unauthorized { status, detail },
            408 | 429 | 500..=599 => DestinationError::Transient {
                reason: format!("HTTP {}: {}", status, detail),
                retry_after,
            },
            _ => DestinationError::Rejected { status, detail },
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, DestinationError::Transient { .. })
    }

    /// Failures that make every further request pointless.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            DestinationError::Unauthorized { .. } | DestinationError::Unreachable(_)
        )
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            DestinationError::Transient { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}
