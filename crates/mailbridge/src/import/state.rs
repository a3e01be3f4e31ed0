//! Per-candidate states and outcomes.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::mailbox::ImportCandidate;

/// Write progress of one candidate.
///
/// `Pending -> Created -> Finalized -> Verified`; `Failed` is absorbing and
/// reachable from `Pending` or `Created`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportState {
    Pending,
    Created,
    Finalized,
    Verified,
    Failed,
}

impl ImportState {
    pub fn can_advance_to(self, next: ImportState) -> bool {
        matches!(
            (self, next),
            (ImportState::Pending, ImportState::Created)
                | (ImportState::Created, ImportState::Finalized)
                | (ImportState::Finalized, ImportState::Verified)
                | (ImportState::Pending, ImportState::Failed)
                | (ImportState::Created, ImportState::Failed)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnresolvedReason {
    UnparsableSender,
    NoContact,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The destination refused the payload.
    Rejected,
    /// Transient failures outlasted the retry budget.
    RetriesExhausted,
    /// The record was created but its identifier could not be recovered.
    /// It exists on the destination, orphaned from this session.
    IdentifierUnresolved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum ImportOutcome {
    Imported,
    Duplicate,
    Unresolved(UnresolvedReason),
    Failed(FailureKind),
    /// Created but never finalized. Needs manual reconciliation.
    PartiallyWritten,
    /// Dry run: would have been written.
    Planned,
}

impl ImportOutcome {
    /// Outcomes a human has to follow up on.
    pub fn needs_attention(&self) -> bool {
        matches!(
            self,
            ImportOutcome::Failed(_) | ImportOutcome::PartiallyWritten
        )
    }
}

/// Read-back comparison of a written record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum Verification {
    Match,
    Mismatch { fields: Vec<String> },
    Unreadable { error: String },
}

impl Verification {
    pub fn is_match(&self) -> bool {
        matches!(self, Verification::Match)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportResult {
    pub outcome: ImportOutcome,
    pub state: ImportState,
    pub sender_address: String,
    pub contact_id: Option<String>,
    pub subject: String,
    pub effective_time: DateTime<Utc>,
    pub source_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification: Option<Verification>,
}

impl ImportResult {
    pub fn new(
        candidate: &ImportCandidate,
        contact_id: Option<&str>,
        outcome: ImportOutcome,
    ) -> Self {
        Self {
            outcome,
            state: ImportState::Pending,
            sender_address: candidate.sender_address.clone(),
            contact_id: contact_id.map(str::to_string),
            subject: candidate.subject.clone(),
            effective_time: candidate.effective_time,
            source_path: candidate.source_path.clone(),
            external_id: None,
            error: None,
            verification: None,
        }
    }
}
