use std::path::Path;

use log::debug;

use crate::config::schema::{SyncConfig, MAX_WINDOW_SECS};
use crate::error::ConfigError;

const MAX_WORKERS: usize = 16;

/// Reads and validates a config file.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<SyncConfig, ConfigError> {
    let config = read_config(path)?;
    validate_config(&config)?;
    Ok(config)
}

/// Reads a config file without validating it, so that command-line
/// overrides can fill in missing values first.
pub fn read_config<P: AsRef<Path>>(path: P) -> Result<SyncConfig, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    debug!("Loaded config file {}", path.display());
    Ok(serde_yaml::from_str(&content)?)
}

pub fn load_config_from_str(content: &str) -> Result<SyncConfig, ConfigError> {
    let config: SyncConfig = serde_yaml::from_str(content)?;

    validate_config(&config)?;

    Ok(config)
}

/// Checks a fully assembled config (file plus overrides) before a session starts.
pub fn validate_config(config: &SyncConfig) -> Result<(), ConfigError> {
    let endpoint = config.destination.endpoint.trim();
    if endpoint.is_empty() {
        return Err(ConfigError::Missing("destination.endpoint"));
    }
    if !endpoint.starts_with("https://") && !endpoint.starts_with("http://") {
        return Err(ConfigError::validation(format!(
            "destination.endpoint must be an http(s) URL, got '{}'",
            crate::sanitize::redact_url(endpoint)
        )));
    }

    if config.destination.owner_id.trim().is_empty() {
        return Err(ConfigError::Missing("destination.ownerId"));
    }

    if config.mailbox.root.is_none() {
        return Err(ConfigError::Missing("mailbox.root"));
    }

    for pattern in &config.mailbox.exclude_folders {
        if let Err(e) = glob::Pattern::new(pattern) {
            return Err(ConfigError::InvalidPattern {
                pattern: pattern.clone(),
                reason: e.to_string(),
            });
        }
    }

    if config.dedup.window_secs == 0 {
        return Err(ConfigError::validation("dedup.windowSecs must be > 0"));
    }
    if config.dedup.window_secs > MAX_WINDOW_SECS {
        return Err(ConfigError::validation(format!(
            "dedup.windowSecs must not exceed {}",
            MAX_WINDOW_SECS
        )));
    }

    let import = &config.import;
    if import.worker_count == 0 || import.worker_count > MAX_WORKERS {
        return Err(ConfigError::validation(format!(
            "import.workerCount must be between 1 and {}",
            MAX_WORKERS
        )));
    }
    if import.max_attempts == 0 {
        return Err(ConfigError::validation("import.maxAttempts must be > 0"));
    }
    if import.recovery_attempts == 0 {
        return Err(ConfigError::validation(
            "import.recoveryAttempts must be > 0",
        ));
    }
    if import.backoff_base_ms > import.backoff_max_ms {
        return Err(ConfigError::validation(
            "import.backoffBaseMs must not exceed import.backoffMaxMs",
        ));
    }
    if import.max_candidates == Some(0) {
        return Err(ConfigError::validation("import.maxCandidates must be > 0"));
    }

    if let Some(sender) = &config.sender_filter {
        if crate::mailbox::address::parse_sender_address(sender).is_none() {
            return Err(ConfigError::validation(format!(
                "senderFilter '{}' is not an email address",
                sender
            )));
        }
    }

    Ok(())
}
