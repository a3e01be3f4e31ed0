//! Mailbox source: folder-tree access, sender normalization and extraction.
//!
//! A mailbox is consumed read-only. The extractor walks it depth-first and
//! yields one normalized entry per mail item; nothing here talks to the
//! destination.

pub mod address;
pub mod error;
pub mod extract;
pub mod maildir;
pub mod store;

pub use address::parse_sender_address;
pub use error::MailboxError;
pub use extract::{ExtractOptions, ExtractStats, Extracted, Extractor, ImportCandidate};
pub use maildir::MaildirFolder;
pub use store::{MailFolder, MailItem, MailItems, RawMessage};
