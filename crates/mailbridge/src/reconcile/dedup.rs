//! Duplicate detection between mailbox candidates and existing timeline entries.
//!
//! Two records are the same message when their subjects are equal (exact,
//! case-sensitive) and their times differ by strictly less than the window.
//! Distinct messages sharing a subject inside the window are therefore
//! treated as duplicates; this is a known limitation of the heuristic.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};

use crate::destination::ExistingTimelineEntry;

/// The duplicate predicate.
pub fn is_duplicate(
    candidate_subject: &str,
    candidate_time: DateTime<Utc>,
    existing_subject: &str,
    existing_time: DateTime<Utc>,
    window: Duration,
) -> bool {
    candidate_subject == existing_subject && (candidate_time - existing_time).abs() < window
}

/// What a candidate matched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DuplicateSource {
    /// An entry already on the destination timeline.
    Destination { external_id: String },
    /// An earlier candidate of the same contact queue.
    Batch,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DedupVerdict {
    New,
    Duplicate(DuplicateSource),
}

impl DedupVerdict {
    pub fn is_duplicate(&self) -> bool {
        matches!(self, DedupVerdict::Duplicate(_))
    }
}

/// Per-contact detector over an immutable timeline snapshot.
///
/// Entries are bucketed by subject so a check only scans same-subject
/// entries. Candidates accepted through [`DuplicateDetector::record`] go into
/// a separate batch index; the snapshot itself never changes.
#[derive(Debug)]
pub struct DuplicateDetector {
    window: Duration,
    snapshot: HashMap<String, Vec<(DateTime<Utc>, String)>>,
    batch: Option<HashMap<String, Vec<DateTime<Utc>>>>,
}

impl DuplicateDetector {
    pub fn new(entries: &[ExistingTimelineEntry], window: Duration, within_batch: bool) -> Self {
        let mut snapshot: HashMap<String, Vec<(DateTime<Utc>, String)>> = HashMap::new();
        for entry in entries {
            snapshot
                .entry(entry.subject.clone())
                .or_default()
                .push((entry.sent_time, entry.external_id.clone()));
        }

        Self {
            window,
            snapshot,
            batch: within_batch.then(HashMap::new),
        }
    }

    pub fn check(&self, subject: &str, time: DateTime<Utc>) -> DedupVerdict {
        if let Some(bucket) = self.snapshot.get(subject) {
            let hit = bucket.iter().find(|(existing_time, _)| {
                is_duplicate(subject, time, subject, *existing_time, self.window)
            });
            if let Some((_, external_id)) = hit {
                return DedupVerdict::Duplicate(DuplicateSource::Destination {
                    external_id: external_id.clone(),
                });
            }
        }

        if let Some(bucket) = self.batch.as_ref().and_then(|batch| batch.get(subject)) {
            if bucket
                .iter()
                .any(|earlier| is_duplicate(subject, time, subject, *earlier, self.window))
            {
                return DedupVerdict::Duplicate(DuplicateSource::Batch);
            }
        }

        DedupVerdict::New
    }

    /// Remembers a candidate that was (or in a dry run would be) written.
    /// No-op unless within-batch detection is enabled.
    pub fn record(&mut self, subject: &str, time: DateTime<Utc>) {
        if let Some(batch) = self.batch.as_mut() {
            batch.entry(subject.to_string()).or_default().push(time);
        }
    }

    pub fn snapshot_len(&self) -> usize {
        self.snapshot.values().map(Vec::len).sum()
    }
}
