pub mod config;
pub mod destination;
pub mod error;
pub mod import;
pub mod mailbox;
pub mod reconcile;
pub mod sanitize;
pub mod secrets;
pub mod session;

pub use config::{load_config, load_config_from_str, SyncConfig};
pub use destination::{Destination, DestinationError, HttpDestination};
pub use error::{ConfigError, MailbridgeError, Result};
pub use mailbox::{Extractor, ImportCandidate, MailFolder, MaildirFolder, RawMessage};
pub use secrets::{resolve_secret, SecretError};
pub use session::{CancellationFlag, SessionCoordinator, SessionError, SessionSummary};
