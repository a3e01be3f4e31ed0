//! Two-phase write of a single candidate: create open, then finalize.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use super::rate::RateLimiter;
use super::retry::{with_retry, RetryPolicy};
use super::state::{FailureKind, ImportOutcome, ImportState};
use crate::destination::{ActivityDraft, CreateOutcome, Destination, DestinationError};
use crate::mailbox::ImportCandidate;
use crate::reconcile::{build_party_links, to_markup};
use crate::session::CancellationFlag;

/// Where a write ended.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteReport {
    pub state: ImportState,
    pub outcome: ImportOutcome,
    pub external_id: Option<String>,
    pub error: Option<String>,
}

impl WriteReport {
    fn failed(kind: FailureKind, external_id: Option<String>, error: &DestinationError) -> Self {
        Self {
            state: ImportState::Failed,
            outcome: ImportOutcome::Failed(kind),
            external_id,
            error: Some(error.to_string()),
        }
    }

    fn partially_written(external_id: String, reason: String) -> Self {
        Self {
            state: ImportState::Created,
            outcome: ImportOutcome::PartiallyWritten,
            external_id: Some(external_id),
            error: Some(reason),
        }
    }
}

pub struct Importer {
    destination: Arc<dyn Destination>,
    owner_id: String,
    retry: RetryPolicy,
    recovery: RetryPolicy,
    limiter: Arc<RateLimiter>,
    cancel: CancellationFlag,
}

impl Importer {
    pub fn new(
        destination: Arc<dyn Destination>,
        owner_id: impl Into<String>,
        retry: RetryPolicy,
        recovery: RetryPolicy,
        limiter: Arc<RateLimiter>,
        cancel: CancellationFlag,
    ) -> Self {
        Self {
            destination,
            owner_id: owner_id.into(),
            retry,
            recovery,
            limiter,
            cancel,
        }
    }

    /// The create request for `candidate`, sender link included.
    pub fn draft(&self, contact_id: &str, candidate: &ImportCandidate) -> ActivityDraft {
        ActivityDraft {
            contact_id: contact_id.to_string(),
            subject: candidate.subject.clone(),
            description: to_markup(&candidate.body),
            sent_time: candidate.effective_time,
            parties: build_party_links(contact_id, &self.owner_id).to_vec(),
        }
    }

    /// Drives a draft from `Pending` to `Finalized`.
    ///
    /// Per-candidate failures end up in the report. Only fatal destination
    /// errors (credential refused, endpoint gone) are returned as `Err`.
    ///
    /// A transient create failure is retried as a fresh create. If the
    /// destination committed the record but the response was lost (timeout,
    /// 5xx after commit), the retry writes it a second time. The next
    /// session's duplicate check does not repair this, since both copies are
    /// already on the timeline.
    pub async fn write(&self, draft: &ActivityDraft) -> Result<WriteReport, DestinationError> {
        let destination = &self.destination;

        let created = with_retry(&self.retry, Some(self.limiter.as_ref()), "create", || {
            destination.create_activity(draft)
        })
        .await;

        let activity_id = match created {
            Ok(CreateOutcome::Created(id)) => id,
            Ok(CreateOutcome::Accepted) => {
                debug!("Create returned no identifier, querying latest activity");
                match self.recover_id(draft).await {
                    Ok(id) => id,
                    Err(e) if e.is_fatal() => return Err(e),
                    Err(e) => {
                        error!(
                            "Created activity '{}' but could not resolve its identifier: {}",
                            draft.subject, e
                        );
                        return Ok(WriteReport::failed(FailureKind::IdentifierUnresolved, None, &e));
                    }
                }
            }
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                let kind = if e.is_retryable() {
                    FailureKind::RetriesExhausted
                } else {
                    FailureKind::Rejected
                };
                warn!("Create failed for '{}': {}", draft.subject, e);
                return Ok(WriteReport::failed(kind, None, &e));
            }
        };

        debug!("Created activity {}", activity_id);

        if self.cancel.is_cancelled() {
            warn!("Cancelled before finalizing activity {}", activity_id);
            return Ok(WriteReport::partially_written(
                activity_id,
                "cancelled before finalize".to_string(),
            ));
        }

        let finalized = with_retry(&self.retry, Some(self.limiter.as_ref()), "finalize", || {
            destination.finalize(&activity_id)
        })
        .await;

        match finalized {
            Ok(()) => {
                info!("Imported '{}' as {}", draft.subject, activity_id);
                Ok(WriteReport {
                    state: ImportState::Finalized,
                    outcome: ImportOutcome::Imported,
                    external_id: Some(activity_id),
                    error: None,
                })
            }
            Err(e) if e.is_fatal() => {
                error!("Activity {} left unfinalized by a fatal error", activity_id);
                Err(e)
            }
            Err(e) => {
                warn!("Finalize failed for activity {}: {}", activity_id, e);
                Ok(WriteReport::partially_written(activity_id, e.to_string()))
            }
        }
    }

    /// Finds the identifier of a record created without one. The newest
    /// activity of the contact only counts when its subject matches.
    async fn recover_id(&self, draft: &ActivityDraft) -> Result<String, DestinationError> {
        let destination = &self.destination;
        with_retry(&self.recovery, None, "identifier recovery", || async move {
            match destination.latest_activity(&draft.contact_id).await? {
                Some(latest) if latest.subject == draft.subject => Ok(latest.activity_id),
                Some(_) => Err(DestinationError::transient(
                    "latest activity does not match the created record",
                )),
                None => Err(DestinationError::transient("no activity found for contact")),
            }
        })
        .await
    }
}
