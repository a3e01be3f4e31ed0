//! Builders for test mailboxes, contacts and configs.

#![allow(dead_code)]

use std::path::PathBuf;

use chrono::{DateTime, TimeZone, Utc};

use mailbridge::config::SyncConfig;
use mailbridge::destination::DestinationContact;
use mailbridge::mailbox::{MailItem, RawMessage};

use super::harness::MemoryFolder;

/// 2025-04-01 at the given time, UTC.
pub fn at(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 4, 1, hour, minute, 0).unwrap()
}

pub fn contact(id: &str, address: &str) -> DestinationContact {
    DestinationContact {
        contact_id: id.to_string(),
        primary_address: address.to_string(),
    }
}

/// Builder for `RawMessage` instances.
pub struct MessageBuilder {
    raw: RawMessage,
}

impl MessageBuilder {
    pub fn new(sender: &str, subject: &str) -> Self {
        Self {
            raw: RawMessage {
                sender: sender.to_string(),
                subject: subject.to_string(),
                body: format!("Body of {}", subject),
                sent_at: Some(at(10, 0)),
                received_at: None,
                folder_path: "Mailbox".to_string(),
                item_ref: None,
            },
        }
    }

    pub fn sent(mut self, time: DateTime<Utc>) -> Self {
        self.raw.sent_at = Some(time);
        self
    }

    pub fn received_only(mut self, time: DateTime<Utc>) -> Self {
        self.raw.sent_at = None;
        self.raw.received_at = Some(time);
        self
    }

    pub fn body(mut self, body: &str) -> Self {
        self.raw.body = body.to_string();
        self
    }

    pub fn build(self) -> RawMessage {
        self.raw
    }
}

/// Builder for a `MemoryFolder` tree.
pub struct FolderBuilder {
    folder: MemoryFolder,
}

impl FolderBuilder {
    pub fn new(path: &str) -> Self {
        Self {
            folder: MemoryFolder {
                path: path.to_string(),
                items: Vec::new(),
                children: Vec::new(),
            },
        }
    }

    pub fn message(mut self, message: MessageBuilder) -> Self {
        let mut raw = message.build();
        raw.folder_path = self.folder.path.clone();
        raw.item_ref = Some(format!("{}", self.folder.items.len() + 1));
        self.folder.items.push(Ok(MailItem::Mail(raw)));
        self
    }

    pub fn appointment(mut self) -> Self {
        self.folder.items.push(Ok(MailItem::Other {
            kind: "appointment".to_string(),
        }));
        self
    }

    pub fn fault(mut self) -> Self {
        self.folder.items.push(Err("corrupt item".to_string()));
        self
    }

    pub fn child(mut self, child: FolderBuilder) -> Self {
        self.folder.children.push(child.build());
        self
    }

    pub fn build(self) -> MemoryFolder {
        self.folder
    }
}

/// Builder for `SyncConfig` with test-friendly timings.
pub struct ConfigBuilder {
    config: SyncConfig,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        let mut config = SyncConfig::default();
        config.destination.endpoint = "https://crm.test/api/data/v9.2".to_string();
        config.destination.owner_id = "owner-1".to_string();
        config.mailbox.root = Some(PathBuf::from("/unused"));
        config.import.worker_count = 1;
        config.import.request_delay_ms = 0;
        config.import.backoff_base_ms = 1;
        config.import.backoff_max_ms = 4;
        Self { config }
    }

    pub fn window_secs(mut self, secs: u64) -> Self {
        self.config.dedup.window_secs = secs;
        self
    }

    pub fn within_batch(mut self, enabled: bool) -> Self {
        self.config.dedup.within_batch = enabled;
        self
    }

    pub fn dry_run(mut self, enabled: bool) -> Self {
        self.config.dry_run = enabled;
        self
    }

    pub fn workers(mut self, count: usize) -> Self {
        self.config.import.worker_count = count;
        self
    }

    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.config.import.max_attempts = attempts;
        self
    }

    pub fn recovery_attempts(mut self, attempts: u32) -> Self {
        self.config.import.recovery_attempts = attempts;
        self
    }

    pub fn verify_every(mut self, n: u32) -> Self {
        self.config.import.verify_every = n;
        self
    }

    pub fn sender_filter(mut self, sender: &str) -> Self {
        self.config.sender_filter = Some(sender.to_string());
        self
    }

    pub fn max_candidates(mut self, cap: usize) -> Self {
        self.config.import.max_candidates = Some(cap);
        self
    }

    pub fn build(self) -> SyncConfig {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
