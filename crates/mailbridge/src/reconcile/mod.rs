//! Pure reconciliation logic between the mailbox and the destination timeline.
//!
//! Nothing in here performs I/O: contact lookup, the duplicate predicate,
//! party-link construction and body markup are plain functions over data
//! already loaded by the session.

pub mod dedup;
pub mod markup;
pub mod party;
pub mod resolver;

pub use dedup::{is_duplicate, DedupVerdict, DuplicateDetector, DuplicateSource};
pub use markup::to_markup;
pub use party::{build_party_links, PartyLink, PartyRef, PartyRole};
pub use resolver::ContactResolver;
