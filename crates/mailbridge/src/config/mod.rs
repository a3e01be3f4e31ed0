pub mod loader;
pub mod schema;

pub use loader::{load_config, load_config_from_str, read_config, validate_config};
pub use schema::{
    ConfigOverrides, DedupConfig, DestinationConfig, ImportConfig, MailboxConfig, SyncConfig,
};
