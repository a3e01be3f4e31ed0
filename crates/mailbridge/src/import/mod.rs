//! The write pipeline: create, finalize and verify, with retries and a fixed
//! inter-write delay.

pub mod importer;
pub mod rate;
pub mod retry;
pub mod state;
pub mod verify;

pub use importer::{Importer, WriteReport};
pub use rate::RateLimiter;
pub use retry::{with_retry, RetryPolicy};
pub use state::{
    FailureKind, ImportOutcome, ImportResult, ImportState, UnresolvedReason, Verification,
};
pub use verify::{compare, Verifier};
