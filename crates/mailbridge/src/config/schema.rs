use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::import::retry::RetryPolicy;

/// Complete configuration for one import session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncConfig {
    #[serde(default)]
    pub destination: DestinationConfig,
    #[serde(default)]
    pub mailbox: MailboxConfig,
    #[serde(default)]
    pub dedup: DedupConfig,
    #[serde(default)]
    pub import: ImportConfig,
    /// Only process candidates from this sender address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_filter: Option<String>,
    /// Compute resolutions and duplicates without writing anything.
    #[serde(default)]
    pub dry_run: bool,
}

/// Connection settings for the CRM destination.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DestinationConfig {
    /// Base URL of the Web API (e.g. "https://org.crm.dynamics.com/api/data/v9.2").
    #[serde(default)]
    pub endpoint: String,

    /// Bearer token given inline. Prefer `tokenFile` or `tokenEnvVar`.
    #[serde(default, skip_serializing)]
    pub token: Option<String>,

    /// Path to a file holding the bearer token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_file: Option<String>,

    /// Environment variable holding the bearer token.
    #[serde(default = "default_token_env_var")]
    pub token_env_var: Option<String>,

    /// Internal account that receives every imported message.
    #[serde(default)]
    pub owner_id: String,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

fn default_token_env_var() -> Option<String> {
    Some("MAILBRIDGE_TOKEN".to_string())
}

fn default_request_timeout() -> u64 {
    30
}

fn default_connect_timeout() -> u64 {
    10
}

impl Default for DestinationConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            token: None,
            token_file: None,
            token_env_var: default_token_env_var(),
            owner_id: String::new(),
            request_timeout_secs: default_request_timeout(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

impl DestinationConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// Where the mailbox lives and which of its items are importable.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MailboxConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<PathBuf>,

    /// Glob patterns matched against folder paths; matching folders are not traversed.
    #[serde(default)]
    pub exclude_folders: Vec<String>,

    #[serde(default = "default_true")]
    pub exclude_teams_messages: bool,

    /// Minimum trimmed body length for a message to be importable.
    #[serde(default)]
    pub min_body_length: usize,
}

fn default_true() -> bool {
    true
}

impl Default for MailboxConfig {
    fn default() -> Self {
        Self {
            root: None,
            exclude_folders: Vec::new(),
            exclude_teams_messages: true,
            min_body_length: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DedupConfig {
    /// Two same-subject records closer than this are the same message.
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,

    /// Also treat earlier candidates of the same queue as existing entries.
    #[serde(default)]
    pub within_batch: bool,
}

fn default_window_secs() -> u64 {
    3600
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            window_secs: default_window_secs(),
            within_batch: false,
        }
    }
}

/// Largest window chrono can represent, in whole seconds.
pub const MAX_WINDOW_SECS: u64 = i64::MAX as u64 / 1000;

impl DedupConfig {
    /// The duplicate window. Values past [`MAX_WINDOW_SECS`] saturate.
    pub fn window(&self) -> chrono::Duration {
        i64::try_from(self.window_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .unwrap_or(chrono::Duration::MAX)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportConfig {
    /// Number of contact queues processed concurrently.
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,

    /// Minimum delay between two writes to the destination.
    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,

    /// Attempts per write step, including the first one.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,

    /// Identifier-recovery queries after a create without body.
    #[serde(default = "default_recovery_attempts")]
    pub recovery_attempts: u32,

    /// 0 disables verification, 1 verifies every imported record, n every n-th.
    #[serde(default = "default_verify_every")]
    pub verify_every: u32,

    /// Upper bound on candidates considered in one session.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_candidates: Option<usize>,
}

fn default_worker_count() -> usize {
    2
}

fn default_request_delay_ms() -> u64 {
    1000
}

fn default_max_attempts() -> u32 {
    4
}

fn default_backoff_base_ms() -> u64 {
    500
}

fn default_backoff_max_ms() -> u64 {
    30_000
}

fn default_recovery_attempts() -> u32 {
    3
}

fn default_verify_every() -> u32 {
    1
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            worker_count: default_worker_count(),
            request_delay_ms: default_request_delay_ms(),
            max_attempts: default_max_attempts(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_max_ms: default_backoff_max_ms(),
            recovery_attempts: default_recovery_attempts(),
            verify_every: default_verify_every(),
            max_candidates: None,
        }
    }
}

impl ImportConfig {
    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_attempts,
            Duration::from_millis(self.backoff_base_ms),
            Duration::from_millis(self.backoff_max_ms),
        )
    }

    /// Backoff for identifier recovery: same delays, its own attempt budget.
    pub fn recovery_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.recovery_attempts,
            Duration::from_millis(self.backoff_base_ms),
            Duration::from_millis(self.backoff_max_ms),
        )
    }
}

/// Command-line values that take precedence over the config file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub mailbox_root: Option<PathBuf>,
    pub endpoint: Option<String>,
    pub token_env_var: Option<String>,
    pub token_file: Option<String>,
    pub owner_id: Option<String>,
    pub sender_filter: Option<String>,
    pub dry_run: bool,
    pub window_secs: Option<u64>,
    pub worker_count: Option<usize>,
}

impl SyncConfig {
    pub fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(root) = overrides.mailbox_root {
            self.mailbox.root = Some(root);
        }
        if let Some(endpoint) = overrides.endpoint {
            self.destination.endpoint = endpoint;
        }
        if let Some(var) = overrides.token_env_var {
            self.destination.token_env_var = Some(var);
        }
        if let Some(file) = overrides.token_file {
            self.destination.token_file = Some(file);
        }
        if let Some(owner) = overrides.owner_id {
            self.destination.owner_id = owner;
        }
        if let Some(sender) = overrides.sender_filter {
            self.sender_filter = Some(sender);
        }
        if overrides.dry_run {
            self.dry_run = true;
        }
        if let Some(window) = overrides.window_secs {
            self.dedup.window_secs = window;
        }
        if let Some(workers) = overrides.worker_count {
            self.import.worker_count = workers;
        }
    }
}
