use serde::Serialize;

use crate::import::{ImportOutcome, ImportResult, UnresolvedReason, Verification};
use crate::mailbox::ExtractStats;

/// Aggregate counters of one session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionMetrics {
    pub scanned: u64,
    pub skipped: u64,
    pub filtered: u64,
    pub undated: u64,
    pub filtered_out: u64,
    pub deferred: u64,
    pub resolved: u64,
    pub unresolved: u64,
    pub duplicate: u64,
    pub planned: u64,
    pub imported: u64,
    pub partially_written: u64,
    pub failed: u64,
    pub verified_mismatch: u64,
    pub cancelled: u64,
}

impl SessionMetrics {
    pub fn absorb_extraction(&mut self, stats: &ExtractStats) {
        self.scanned += stats.scanned;
        self.skipped += stats.skipped;
        self.filtered += stats.filtered;
        self.undated += stats.undated;
    }

    /// Counts the terminal outcome of one candidate. `resolved` is counted
    /// separately when the candidate is queued.
    pub fn record(&mut self, result: &ImportResult) {
        match result.outcome {
            ImportOutcome::Imported => self.imported += 1,
            ImportOutcome::Duplicate => self.duplicate += 1,
            ImportOutcome::Unresolved(UnresolvedReason::UnparsableSender)
            | ImportOutcome::Unresolved(UnresolvedReason::NoContact) => self.unresolved += 1,
            ImportOutcome::Failed(_) => self.failed += 1,
            ImportOutcome::PartiallyWritten => self.partially_written += 1,
            ImportOutcome::Planned => self.planned += 1,
        }
        if matches!(
            result.verification,
            Some(Verification::Mismatch { .. }) | Some(Verification::Unreadable { .. })
        ) {
            self.verified_mismatch += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mailbox::ImportCandidate;
    use chrono::Utc;

    fn result(outcome: ImportOutcome) -> ImportResult {
        let candidate = ImportCandidate {
            sender_address: "a@x.com".to_string(),
            subject: "Hi".to_string(),
            body: String::new(),
            effective_time: Utc::now(),
            source_path: "Inbox/1".to_string(),
        };
        ImportResult::new(&candidate, Some("c-1"), outcome)
    }

    #[test]
    fn test_record_counts_outcomes() {
        let mut metrics = SessionMetrics::default();
        metrics.record(&result(ImportOutcome::Imported));
        metrics.record(&result(ImportOutcome::PartiallyWritten));
        metrics.record(&result(ImportOutcome::Unresolved(UnresolvedReason::NoContact)));

        let mut mismatched = result(ImportOutcome::Imported);
        mismatched.verification = Some(Verification::Unreadable {
            error: "404".to_string(),
        });
        metrics.record(&mismatched);

        assert_eq!(metrics.imported, 2);
        assert_eq!(metrics.partially_written, 1);
        assert_eq!(metrics.unresolved, 1);
        assert_eq!(metrics.verified_mismatch, 1);
        assert_eq!(metrics.failed, 0);
    }

    #[test]
    fn test_absorb_extraction() {
        let mut metrics = SessionMetrics::default();
        metrics.absorb_extraction(&ExtractStats {
            scanned: 10,
            skipped: 2,
            filtered: 3,
            undated: 1,
            unparsable_sender: 1,
            folders: 4,
            folder_faults: 0,
        });
        assert_eq!(
            (metrics.scanned, metrics.skipped, metrics.filtered, metrics.undated),
            (10, 2, 3, 1)
        );
    }
}
