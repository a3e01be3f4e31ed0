//! One reconciliation run from mailbox extraction to the final summary.

pub mod cancel;
pub mod coordinator;
pub mod metrics;
pub mod summary;

use thiserror::Error;

use crate::destination::DestinationError;

pub use cancel::CancellationFlag;
pub use coordinator::SessionCoordinator;
pub use metrics::SessionMetrics;
pub use summary::{Issue, SessionSummary, UnresolvedSender};

/// Failures that end a session without a summary.
#[derive(Error, Debug)]
pub enum SessionError {
    /// The destination contact list could not be loaded.
    #[error("Failed to load destination contacts: {0}")]
    ContactLoad(#[source] DestinationError),

    /// A fatal destination failure stopped the run.
    #[error("Session aborted: {0}")]
    Aborted(#[source] DestinationError),

    /// The mailbox walk panicked or was torn down.
    #[error("Mailbox extraction did not complete: {0}")]
    Extraction(String),
}
