//! Bearer-token resolution for the destination API.
//!
//! The token is looked up once, when a session is built, from the first
//! configured source: inline value, token file, then environment variable.

use secrecy::SecretString;
use std::fs;

use crate::config::DestinationConfig;

#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("No token source configured (need one of: token, tokenFile, tokenEnvVar)")]
    NoSourceProvided,

    #[error("Failed to read token from file '{path}': {source}")]
    FileReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Environment variable '{name}' not set")]
    EnvVarNotSet { name: String },

    #[error("Environment variable '{name}' contains invalid UTF-8")]
    EnvVarNotUnicode { name: String },

    #[error("Token from {origin} is empty")]
    Empty { origin: String },
}

pub type Result<T> = std::result::Result<T, SecretError>;

/// Resolves a secret from an inline value, a file, or an environment variable,
/// in that order. Empty source names are skipped; an empty secret is an error.
pub fn resolve_secret(
    direct: Option<&str>,
    file_path: Option<&str>,
    env_var: Option<&str>,
) -> Result<SecretString> {
    if let Some(value) = direct.filter(|v| !v.is_empty()) {
        return Ok(SecretString::from(value.trim().to_string()));
    }

    if let Some(path) = file_path.filter(|p| !p.is_empty()) {
        let expanded = expand_home(path);
        let content = fs::read_to_string(&expanded).map_err(|e| SecretError::FileReadError {
            path: expanded.clone(),
            source: e,
        })?;
        return non_empty(content.trim(), format!("file '{}'", expanded));
    }

    if let Some(name) = env_var.filter(|n| !n.is_empty()) {
        return match std::env::var(name) {
            Ok(value) => non_empty(value.trim(), format!("environment variable '{}'", name)),
            Err(std::env::VarError::NotPresent) => Err(SecretError::EnvVarNotSet {
                name: name.to_string(),
            }),
            Err(std::env::VarError::NotUnicode(_)) => Err(SecretError::EnvVarNotUnicode {
                name: name.to_string(),
            }),
        };
    }

    Err(SecretError::NoSourceProvided)
}

/// Resolves the bearer token configured for the destination.
pub fn resolve_token(config: &DestinationConfig) -> Result<SecretString> {
    resolve_secret(
        config.token.as_deref(),
        config.token_file.as_deref(),
        config.token_env_var.as_deref(),
    )
}

fn non_empty(value: &str, origin: String) -> Result<SecretString> {
    if value.is_empty() {
        return Err(SecretError::Empty { origin });
    }
    Ok(SecretString::from(value.to_string()))
}

/// Expands a leading `~` to the user's home directory.
fn expand_home(path: &str) -> String {
    if path == "~" || path.starts_with("~/") {
        if let Some(home) = std::env::var_os("HOME").or_else(|| std::env::var_os("USERPROFILE")) {
            return path.replacen('~', &home.to_string_lossy(), 1);
        }
    }
    path.to_string()
}
