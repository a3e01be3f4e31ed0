//! Read-back verification of finalized records. Reports, never repairs.

use std::sync::Arc;

use tracing::{debug, warn};

use super::retry::{with_retry, RetryPolicy};
use super::state::Verification;
use crate::destination::{ActivityDraft, ActivityRecord, Destination, DestinationError, Lifecycle};
use crate::reconcile::{party::count_links, PartyRole};

pub struct Verifier {
    destination: Arc<dyn Destination>,
    retry: RetryPolicy,
}

impl Verifier {
    pub fn new(destination: Arc<dyn Destination>, retry: RetryPolicy) -> Self {
        Self { destination, retry }
    }

    /// Re-reads `activity_id` and compares it to what was written.
    /// Only fatal destination errors are returned as `Err`.
    pub async fn verify(
        &self,
        activity_id: &str,
        draft: &ActivityDraft,
    ) -> Result<Verification, DestinationError> {
        let destination = &self.destination;
        let read = with_retry(&self.retry, None, "verify", || {
            destination.get_activity(activity_id)
        })
        .await;

        match read {
            Ok(record) => {
                let verification = compare(&record, draft);
                if let Verification::Mismatch { fields } = &verification {
                    warn!(
                        "Activity {} differs from what was written: {}",
                        activity_id,
                        fields.join(", ")
                    );
                } else {
                    debug!("Activity {} verified", activity_id);
                }
                Ok(verification)
            }
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                warn!("Could not read back activity {}: {}", activity_id, e);
                Ok(Verification::Unreadable {
                    error: e.to_string(),
                })
            }
        }
    }
}

/// Checks sender link, lifecycle state and body markup.
pub fn compare(record: &ActivityRecord, draft: &ActivityDraft) -> Verification {
    let mut fields = Vec::new();

    let senders = record
        .parties
        .iter()
        .filter(|link| link.role == PartyRole::Sender)
        .count();
    if senders != 1 || count_links(&record.parties, PartyRole::Sender, &draft.contact_id) != 1 {
        fields.push("sender".to_string());
    }
    if record.lifecycle != Lifecycle::FINALIZED {
        fields.push(format!("lifecycle ({})", record.lifecycle));
    }
    if record.description != draft.description {
        fields.push("body".to_string());
    }

    if fields.is_empty() {
        Verification::Match
    } else {
        Verification::Mismatch { fields }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::{build_party_links, PartyLink, PartyRef};
    use chrono::{TimeZone, Utc};

    fn draft() -> ActivityDraft {
        ActivityDraft {
            contact_id: "c-1".to_string(),
            subject: "Hi".to_string(),
            description: "a<br>b".to_string(),
            sent_time: Utc.with_ymd_and_hms(2025, 4, 1, 10, 0, 0).unwrap(),
            parties: build_party_links("c-1", "owner").to_vec(),
        }
    }

    fn record() -> ActivityRecord {
        ActivityRecord {
            activity_id: "a-1".to_string(),
            subject: "Hi".to_string(),
            description: "a<br>b".to_string(),
            lifecycle: Lifecycle::FINALIZED,
            parties: build_party_links("c-1", "owner").to_vec(),
        }
    }

    #[test]
    fn test_match() {
        assert_eq!(compare(&record(), &draft()), Verification::Match);
    }

    #[test]
    fn test_missing_sender_link() {
        let mut record = record();
        record.parties.retain(|l| l.role != PartyRole::Sender);
        assert_eq!(
            compare(&record, &draft()),
            Verification::Mismatch {
                fields: vec!["sender".to_string()]
            }
        );
    }

    #[test]
    fn test_second_sender_is_a_mismatch() {
        let mut record = record();
        record.parties.push(PartyLink {
            activity_id: None,
            party: PartyRef::SystemUser("owner".to_string()),
            role: PartyRole::Sender,
        });
        assert!(!compare(&record, &draft()).is_match());
    }

    #[test]
    fn test_open_record_and_body_drift() {
        let mut record = record();
        record.lifecycle = Lifecycle::OPEN;
        record.description = "a\nb".to_string();
        assert_eq!(
            compare(&record, &draft()),
            Verification::Mismatch {
                fields: vec!["lifecycle (0/1)".to_string(), "body".to_string()]
            }
        );
    }
}
