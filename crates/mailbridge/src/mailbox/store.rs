use chrono::{DateTime, Utc};

use super::error::MailboxError;

/// A message as the mailbox store hands it out. Never modified.
#[derive(Debug, Clone, PartialEq)]
pub struct RawMessage {
    /// Sender as stored, possibly `Display Name <addr>`.
    pub sender: String,
    pub subject: String,
    pub body: String,
    pub sent_at: Option<DateTime<Utc>>,
    pub received_at: Option<DateTime<Utc>>,
    /// Path of the folder holding the message, `/`-separated.
    pub folder_path: String,
    /// Store-native identifier of the item inside its folder, if any.
    pub item_ref: Option<String>,
}

/// One entry of a folder listing.
#[derive(Debug, Clone, PartialEq)]
pub enum MailItem {
    Mail(RawMessage),
    /// Calendar entries, contacts, notes and anything else that is not mail.
    Other { kind: String },
}

/// Lazily evaluated folder contents. The length is known up front so that a
/// fault mid-folder can account for the items it leaves behind.
pub type MailItems = Box<dyn ExactSizeIterator<Item = Result<MailItem, MailboxError>> + Send>;

/// A folder of a hierarchical mailbox.
pub trait MailFolder: Send {
    /// Folder path from the mailbox root, `/`-separated.
    fn path(&self) -> &str;

    /// The folder's own items in store-native order.
    fn items(&self) -> Result<MailItems, MailboxError>;

    /// Direct child folders in store-native order.
    fn subfolders(&self) -> Result<Vec<Box<dyn MailFolder>>, MailboxError>;
}
