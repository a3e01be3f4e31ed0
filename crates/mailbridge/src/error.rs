use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MailbridgeError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Mailbox error: {0}")]
    Mailbox(#[from] crate::mailbox::MailboxError),

    #[error("Destination error: {0}")]
    Destination(#[from] crate::destination::DestinationError),

    #[error("Secret error: {0}")]
    Secret(#[from] crate::secrets::SecretError),

    #[error("Session error: {0}")]
    Session(#[from] crate::session::SessionError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config YAML: {0}")]
    ParseYaml(#[from] serde_yaml::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Invalid folder pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("Missing required setting: {0}")]
    Missing(&'static str),
}

impl ConfigError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        ConfigError::Validation {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, MailbridgeError>;
