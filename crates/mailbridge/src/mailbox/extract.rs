//! Depth-first extraction of import candidates from a mailbox folder tree.

use chrono::{DateTime, Utc};
use glob::Pattern;
use tracing::{debug, info, warn};

use super::address::parse_sender_address;
use super::store::{MailFolder, MailItem, MailItems, RawMessage};

/// Subject or sender fragments that mark Teams notifications.
const TEAMS_INDICATORS: &[&str] = &["microsoft teams", "teams notification", "teams.microsoft.com"];

const PROGRESS_EVERY: u64 = 500;

/// Normalized, immutable projection of a mailbox message.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportCandidate {
    /// Lowercased, address-only.
    pub sender_address: String,
    pub subject: String,
    pub body: String,
    /// Sent time, falling back to received time.
    pub effective_time: DateTime<Utc>,
    pub source_path: String,
}

/// What the extractor yields per importable mail item.
#[derive(Debug, Clone, PartialEq)]
pub enum Extracted {
    Candidate(ImportCandidate),
    /// The sender field holds no usable address. Never reaches duplicate detection.
    UnparsableSender {
        raw_sender: String,
        subject: String,
        effective_time: DateTime<Utc>,
        source_path: String,
    },
}

/// Filters applied while walking the mailbox.
#[derive(Debug, Clone, Default)]
pub struct ExtractOptions {
    pub exclude_folders: Vec<Pattern>,
    pub exclude_teams_messages: bool,
    pub min_body_length: usize,
}

impl ExtractOptions {
    pub fn from_config(config: &crate::config::MailboxConfig) -> Self {
        let exclude_folders = config
            .exclude_folders
            .iter()
            .filter_map(|p| match Pattern::new(p) {
                Ok(pattern) => Some(pattern),
                Err(e) => {
                    warn!("Ignoring invalid folder pattern '{}': {}", p, e);
                    None
                }
            })
            .collect();

        Self {
            exclude_folders,
            exclude_teams_messages: config.exclude_teams_messages,
            min_body_length: config.min_body_length,
        }
    }
}

/// Counters collected during traversal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractStats {
    /// Mail items read from the store.
    pub scanned: u64,
    /// Items left behind because their folder faulted.
    pub skipped: u64,
    /// Non-mail items, Teams notifications and too-short bodies.
    pub filtered: u64,
    /// Mail without sent and received time.
    pub undated: u64,
    /// Mail whose sender field holds no address.
    pub unparsable_sender: u64,
    pub folders: u64,
    pub folder_faults: u64,
}

/// Lazy depth-first walk over a folder tree: a folder's own items come
/// before its children, siblings keep store order. Not restartable.
pub struct Extractor {
    pending: Vec<Box<dyn MailFolder>>,
    current: Option<(String, MailItems)>,
    options: ExtractOptions,
    stats: ExtractStats,
}

impl Extractor {
    pub fn new(root: Box<dyn MailFolder>, options: ExtractOptions) -> Self {
        Self {
            pending: vec![root],
            current: None,
            options,
            stats: ExtractStats::default(),
        }
    }

    pub fn stats(&self) -> ExtractStats {
        self.stats
    }

    /// Opens the next non-excluded folder and queues its children.
    fn open_next_folder(&mut self) -> bool {
        while let Some(folder) = self.pending.pop() {
            let path = folder.path().to_string();
            if self.is_excluded(&path) {
                debug!("Skipping excluded folder '{}'", path);
                continue;
            }

            self.stats.folders += 1;

            match folder.subfolders() {
                Ok(children) => self.pending.extend(children.into_iter().rev()),
                Err(e) => {
                    warn!("Failed to list subfolders of '{}': {}", path, e);
                    self.stats.folder_faults += 1;
                }
            }

            match folder.items() {
                Ok(items) => {
                    debug!("Scanning folder '{}' ({} items)", path, items.len());
                    self.current = Some((path, items));
                    return true;
                }
                Err(e) => {
                    warn!("Failed to open folder '{}': {}", path, e);
                    self.stats.folder_faults += 1;
                }
            }
        }
        false
    }

    fn is_excluded(&self, path: &str) -> bool {
        self.options
            .exclude_folders
            .iter()
            .any(|pattern| pattern.matches(path))
    }

    fn normalize(&mut self, raw: RawMessage) -> Option<Extracted> {
        if self.options.exclude_teams_messages && is_teams_message(&raw) {
            self.stats.filtered += 1;
            return None;
        }
        if raw.body.trim().chars().count() < self.options.min_body_length {
            self.stats.filtered += 1;
            return None;
        }

        let Some(effective_time) = raw.sent_at.or(raw.received_at) else {
            debug!("Undated message '{}' in '{}'", raw.subject, raw.folder_path);
            self.stats.undated += 1;
            return None;
        };

        let source_path = match &raw.item_ref {
            Some(item) => format!("{}/{}", raw.folder_path, item),
            None => raw.folder_path.clone(),
        };

        match parse_sender_address(&raw.sender) {
            Some(sender_address) => Some(Extracted::Candidate(ImportCandidate {
                sender_address,
                subject: raw.subject,
                body: raw.body,
                effective_time,
                source_path,
            })),
            None => {
                self.stats.unparsable_sender += 1;
                Some(Extracted::UnparsableSender {
                    raw_sender: raw.sender,
                    subject: raw.subject,
                    effective_time,
                    source_path,
                })
            }
        }
    }
}

impl Iterator for Extractor {
    type Item = Extracted;

    fn next(&mut self) -> Option<Extracted> {
        loop {
            let Some((path, items)) = self.current.as_mut() else {
                if !self.open_next_folder() {
                    return None;
                }
                continue;
            };

            match items.next() {
                None => {
                    self.current = None;
                }
                Some(Err(e)) => {
                    let left = items.len() as u64;
                    warn!(
                        "Fault in folder '{}': {}; skipping {} remaining items",
                        path,
                        e,
                        left + 1
                    );
                    self.stats.skipped += left + 1;
                    self.current = None;
                }
                Some(Ok(MailItem::Other { kind })) => {
                    debug!("Ignoring non-mail item ({}) in '{}'", kind, path);
                    self.stats.filtered += 1;
                }
                Some(Ok(MailItem::Mail(raw))) => {
                    self.stats.scanned += 1;
                    if self.stats.scanned % PROGRESS_EVERY == 0 {
                        info!("Scanned {} messages so far", self.stats.scanned);
                    }
                    if let Some(extracted) = self.normalize(raw) {
                        return Some(extracted);
                    }
                }
            }
        }
    }
}

fn is_teams_message(raw: &RawMessage) -> bool {
    let sender = raw.sender.to_lowercase();
    let subject = raw.subject.to_lowercase();
    TEAMS_INDICATORS
        .iter()
        .any(|indicator| sender.contains(indicator) || subject.contains(indicator))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mailbox::error::MailboxError;
    use chrono::TimeZone;

    struct TestFolder {
        path: String,
        items: Vec<Result<MailItem, String>>,
        children: Vec<TestFolder>,
    }

    impl TestFolder {
        fn new(path: &str) -> Self {
            Self {
                path: path.to_string(),
                items: Vec::new(),
                children: Vec::new(),
            }
        }

        fn mail(mut self, sender: &str, subject: &str) -> Self {
            let folder_path = self.path.clone();
            self.items.push(Ok(MailItem::Mail(RawMessage {
                sender: sender.to_string(),
                subject: subject.to_string(),
                body: "body text".to_string(),
                sent_at: Some(Utc.with_ymd_and_hms(2025, 4, 1, 10, 0, 0).unwrap()),
                received_at: None,
                folder_path,
                item_ref: None,
            })));
            self
        }

        fn raw(mut self, raw: RawMessage) -> Self {
            self.items.push(Ok(MailItem::Mail(raw)));
            self
        }

        fn fault(mut self) -> Self {
            self.items.push(Err("disk error".to_string()));
            self
        }

        fn other(mut self) -> Self {
            self.items.push(Ok(MailItem::Other {
                kind: "appointment".to_string(),
            }));
            self
        }

        fn child(mut self, child: TestFolder) -> Self {
            self.children.push(child);
            self
        }
    }

    impl MailFolder for TestFolder {
        fn path(&self) -> &str {
            &self.path
        }

        fn items(&self) -> Result<MailItems, MailboxError> {
            let items: Vec<Result<MailItem, MailboxError>> = self
                .items
                .iter()
                .map(|item| match item {
                    Ok(item) => Ok(item.clone()),
                    Err(e) => Err(MailboxError::Store(e.clone())),
                })
                .collect();
            Ok(Box::new(items.into_iter()))
        }

        fn subfolders(&self) -> Result<Vec<Box<dyn MailFolder>>, MailboxError> {
            Ok(self
                .children
                .iter()
                .map(|c| Box::new(clone_folder(c)) as Box<dyn MailFolder>)
                .collect())
        }
    }

    fn clone_folder(folder: &TestFolder) -> TestFolder {
        TestFolder {
            path: folder.path.clone(),
            items: folder.items.clone(),
            children: folder.children.iter().map(clone_folder).collect(),
        }
    }

    fn subjects(extractor: Extractor) -> Vec<String> {
        extractor
            .map(|e| match e {
                Extracted::Candidate(c) => c.subject,
                Extracted::UnparsableSender { subject, .. } => subject,
            })
            .collect()
    }

    #[test]
    fn test_depth_first_parent_before_children() {
        let root = TestFolder::new("Root")
            .mail("a@x.com", "root-1")
            .child(
                TestFolder::new("Root/Inbox")
                    .mail("a@x.com", "inbox-1")
                    .child(TestFolder::new("Root/Inbox/Sub").mail("a@x.com", "sub-1")),
            )
            .child(TestFolder::new("Root/Sent").mail("a@x.com", "sent-1"))
            .mail("a@x.com", "root-2");

        let extractor = Extractor::new(Box::new(root), ExtractOptions::default());
        assert_eq!(
            subjects(extractor),
            vec!["root-1", "root-2", "inbox-1", "sub-1", "sent-1"]
        );
    }

    #[test]
    fn test_fault_skips_rest_of_folder_only() {
        let root = TestFolder::new("Root")
            .child(
                TestFolder::new("Root/Broken")
                    .mail("a@x.com", "before")
                    .fault()
                    .mail("a@x.com", "lost-1")
                    .mail("a@x.com", "lost-2"),
            )
            .child(TestFolder::new("Root/Fine").mail("a@x.com", "after"));

        let mut extractor = Extractor::new(Box::new(root), ExtractOptions::default());
        let mut seen = Vec::new();
        for extracted in extractor.by_ref() {
            if let Extracted::Candidate(c) = extracted {
                seen.push(c.subject);
            }
        }

        assert_eq!(seen, vec!["before", "after"]);
        let stats = extractor.stats();
        assert_eq!(stats.skipped, 3);
        assert_eq!(stats.scanned, 2);
    }

    #[test]
    fn test_non_mail_and_teams_filtered() {
        let root = TestFolder::new("Root")
            .other()
            .mail("Microsoft Teams <noreply@email.teams.microsoft.com>", "You have been mentioned")
            .mail("a@x.com", "keep");

        let options = ExtractOptions {
            exclude_teams_messages: true,
            ..Default::default()
        };
        let mut extractor = Extractor::new(Box::new(root), options);
        let items: Vec<_> = extractor.by_ref().collect();

        assert_eq!(items.len(), 1);
        assert_eq!(extractor.stats().filtered, 2);
    }

    #[test]
    fn test_unparsable_sender_is_yielded_not_dropped() {
        let root = TestFolder::new("Root").mail("/O=EXCHANGELABS/CN=RECIPIENTS", "internal");
        let mut extractor = Extractor::new(Box::new(root), ExtractOptions::default());
        let items: Vec<_> = extractor.by_ref().collect();

        assert!(matches!(items[0], Extracted::UnparsableSender { .. }));
        assert_eq!(extractor.stats().unparsable_sender, 1);
    }

    #[test]
    fn test_effective_time_falls_back_to_received() {
        let received = Utc.with_ymd_and_hms(2025, 4, 2, 9, 30, 0).unwrap();
        let root = TestFolder::new("Root")
            .raw(RawMessage {
                sender: "\"RingCentral\" <service@ringcentral.com>".to_string(),
                subject: "Voicemail".to_string(),
                body: "hello".to_string(),
                sent_at: None,
                received_at: Some(received),
                folder_path: "Root".to_string(),
                item_ref: Some("42".to_string()),
            })
            .raw(RawMessage {
                sender: "a@x.com".to_string(),
                subject: "no dates".to_string(),
                body: "hello".to_string(),
                sent_at: None,
                received_at: None,
                folder_path: "Root".to_string(),
                item_ref: None,
            });

        let mut extractor = Extractor::new(Box::new(root), ExtractOptions::default());
        let items: Vec<_> = extractor.by_ref().collect();

        assert_eq!(items.len(), 1);
        match &items[0] {
            Extracted::Candidate(c) => {
                assert_eq!(c.effective_time, received);
                assert_eq!(c.sender_address, "service@ringcentral.com");
                assert_eq!(c.source_path, "Root/42");
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(extractor.stats().undated, 1);
    }

    #[test]
    fn test_excluded_folder_subtree_not_traversed() {
        let root = TestFolder::new("Root")
            .child(
                TestFolder::new("Root/Deleted Items")
                    .mail("a@x.com", "trash")
                    .child(TestFolder::new("Root/Deleted Items/Old").mail("a@x.com", "old")),
            )
            .child(TestFolder::new("Root/Inbox").mail("a@x.com", "keep"));

        let options = ExtractOptions {
            exclude_folders: vec![Pattern::new("*/Deleted Items").unwrap()],
            ..Default::default()
        };
        assert_eq!(subjects(Extractor::new(Box::new(root), options)), vec!["keep"]);
    }

    #[test]
    fn test_min_body_length() {
        let root = TestFolder::new("Root").mail("a@x.com", "short body");
        let options = ExtractOptions {
            min_body_length: 50,
            ..Default::default()
        };
        let mut extractor = Extractor::new(Box::new(root), options);
        assert_eq!(extractor.by_ref().count(), 0);
        assert_eq!(extractor.stats().filtered, 1);
    }
}
