//! Mailbox access error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while reading the mailbox. None of them abort a session:
/// the extractor turns them into skip counts.
#[derive(Error, Debug)]
pub enum MailboxError {
    /// The mailbox root does not exist or is not a folder.
    #[error("Mailbox root '{0}' is not a folder")]
    InvalidRoot(PathBuf),

    /// A folder could not be listed.
    #[error("Failed to list folder '{path}': {source}")]
    ListFolder {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A message file could not be read.
    #[error("Failed to read message '{path}': {source}")]
    ReadItem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A message could not be parsed.
    #[error("Failed to parse message '{0}'")]
    Parse(PathBuf),

    /// Store-specific failure reported by a non-filesystem source.
    #[error("Mailbox store error: {0}")]
    Store(String),
}
