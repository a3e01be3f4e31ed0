//! End-of-run summary.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::metrics::SessionMetrics;
use crate::import::{ImportOutcome, ImportResult, Verification};

/// A record a human needs to look at.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Issue {
    pub outcome: ImportOutcome,
    pub subject: String,
    pub effective_time: DateTime<Utc>,
    pub sender_address: String,
    pub contact_id: Option<String>,
    pub external_id: Option<String>,
    pub source_path: String,
    pub detail: String,
}

impl Issue {
    /// Failed, partially written and mismatching records; `None` otherwise.
    pub fn from_result(result: &ImportResult) -> Option<Self> {
        let detail = match (&result.outcome, &result.verification) {
            (outcome, _) if outcome.needs_attention() => {
                result.error.clone().unwrap_or_else(|| "no detail".to_string())
            }
            (_, Some(Verification::Mismatch { fields })) => {
                format!("verification mismatch: {}", fields.join(", "))
            }
            (_, Some(Verification::Unreadable { error })) => {
                format!("verification failed: {}", error)
            }
            _ => return None,
        };

        Some(Self {
            outcome: result.outcome,
            subject: result.subject.clone(),
            effective_time: result.effective_time,
            sender_address: result.sender_address.clone(),
            contact_id: result.contact_id.clone(),
            external_id: result.external_id.clone(),
            source_path: result.source_path.clone(),
            detail,
        })
    }
}

/// A sender that matched no contact, with its message count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnresolvedSender {
    pub sender: String,
    pub messages: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub session_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub dry_run: bool,
    pub cancelled: bool,
    pub metrics: SessionMetrics,
    pub issues: Vec<Issue>,
    pub unresolved_senders: Vec<UnresolvedSender>,
    /// Every per-candidate result, in processing order per contact.
    #[serde(skip)]
    pub results: Vec<ImportResult>,
}

impl SessionSummary {
    pub fn has_issues(&self) -> bool {
        !self.issues.is_empty()
    }

    /// Results with the given outcome.
    pub fn results_with(&self, outcome: ImportOutcome) -> impl Iterator<Item = &ImportResult> {
        self.results.iter().filter(move |r| r.outcome == outcome)
    }
}

/// Most frequent first, ties by sender.
pub(crate) fn rank_unresolved(counts: HashMap<String, u64>) -> Vec<UnresolvedSender> {
    let mut senders: Vec<UnresolvedSender> = counts
        .into_iter()
        .map(|(sender, messages)| UnresolvedSender { sender, messages })
        .collect();
    senders.sort_by(|a, b| b.messages.cmp(&a.messages).then_with(|| a.sender.cmp(&b.sender)));
    senders
}

impl fmt::Display for SessionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = &self.metrics;
        let elapsed = self.ended_at - self.started_at;

        writeln!(f, "Session {}{}", self.session_id, if self.dry_run { " (dry run)" } else { "" })?;
        writeln!(f, "  duration           {}s", elapsed.num_seconds())?;
        if self.cancelled {
            writeln!(f, "  cancelled before completion")?;
        }
        for (label, value) in [
            ("scanned", m.scanned),
            ("skipped", m.skipped),
            ("filtered", m.filtered),
            ("undated", m.undated),
            ("filtered_out", m.filtered_out),
            ("deferred", m.deferred),
            ("resolved", m.resolved),
            ("unresolved", m.unresolved),
            ("duplicate", m.duplicate),
            ("planned", m.planned),
            ("imported", m.imported),
            ("partially_written", m.partially_written),
            ("failed", m.failed),
            ("verified_mismatch", m.verified_mismatch),
            ("cancelled", m.cancelled),
        ] {
            writeln!(f, "  {:<18} {}", label, value)?;
        }

        if !self.issues.is_empty() {
            writeln!(f, "\nNeeds attention:")?;
            for issue in &self.issues {
                writeln!(
                    f,
                    "  [{}] {} | {} | contact {} | id {} | {}",
                    outcome_label(&issue.outcome),
                    issue.effective_time.format("%Y-%m-%d %H:%M:%S"),
                    issue.subject,
                    issue.contact_id.as_deref().unwrap_or("-"),
                    issue.external_id.as_deref().unwrap_or("-"),
                    issue.detail
                )?;
            }
        }

        if !self.unresolved_senders.is_empty() {
            writeln!(f, "\nUnresolved senders:")?;
            for sender in &self.unresolved_senders {
                writeln!(f, "  {:>5}  {}", sender.messages, sender.sender)?;
            }
        }
        Ok(())
    }
}

fn outcome_label(outcome: &ImportOutcome) -> &'static str {
    match outcome {
        ImportOutcome::Imported => "imported",
        ImportOutcome::Duplicate => "duplicate",
        ImportOutcome::Unresolved(_) => "unresolved",
        ImportOutcome::Failed(_) => "failed",
        ImportOutcome::PartiallyWritten => "partially written",
        ImportOutcome::Planned => "planned",
    }
}
