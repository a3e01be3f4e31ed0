//! Shared test utilities for mailbridge integration tests.
//!
//! - `MemoryDestination`: in-memory CRM with scriptable failures and call counters
//! - `MemoryFolder`: in-memory mailbox tree
//! - `TestHarness`: runs sessions against both
//! - builders for messages and configs

pub mod builders;
pub mod harness;

pub use builders::*;
pub use harness::*;
