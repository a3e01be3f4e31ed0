//! Drives a session: contacts, extraction, per-contact queues, summary.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use futures_util::stream::{self, StreamExt};
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use super::cancel::CancellationFlag;
use super::metrics::SessionMetrics;
use super::summary::{rank_unresolved, Issue, SessionSummary};
use super::SessionError;
use crate::config::SyncConfig;
use crate::destination::{Destination, DestinationError};
use crate::import::{
    with_retry, FailureKind, ImportOutcome, ImportResult, ImportState, Importer, RateLimiter,
    RetryPolicy, UnresolvedReason, Verification, Verifier,
};
use crate::mailbox::{
    parse_sender_address, ExtractOptions, ExtractStats, Extracted, Extractor, ImportCandidate,
    MailFolder,
};
use crate::reconcile::{ContactResolver, DuplicateDetector};
use crate::sanitize::mask_address;

/// Result of one contact queue.
#[derive(Debug, Default)]
struct QueueReport {
    results: Vec<ImportResult>,
    cancelled: u64,
}

/// Shared state every queue worker reads.
struct QueueContext<'a> {
    importer: &'a Importer,
    verifier: &'a Verifier,
    retry: RetryPolicy,
    written: &'a AtomicU64,
    cancel: &'a CancellationFlag,
}

/// Output of the resolution pass.
#[derive(Debug, Default)]
struct Partition {
    queues: BTreeMap<String, Vec<ImportCandidate>>,
    settled: Vec<ImportResult>,
    unresolved: HashMap<String, u64>,
    resolved: u64,
    filtered_out: u64,
    deferred: u64,
}

pub struct SessionCoordinator {
    config: SyncConfig,
    destination: Arc<dyn Destination>,
}

impl SessionCoordinator {
    pub fn new(config: SyncConfig, destination: Arc<dyn Destination>) -> Self {
        Self {
            config,
            destination,
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Runs one session over the folder tree under `root`.
    ///
    /// Per-candidate failures never end the run; they are listed in the
    /// summary. Only failing to load contacts or a fatal destination error
    /// (credential refused, endpoint unreachable) returns `Err`.
    pub async fn run(
        &self,
        root: Box<dyn MailFolder>,
        cancel: CancellationFlag,
    ) -> Result<SessionSummary, SessionError> {
        let session_id = Uuid::new_v4();
        let span = info_span!("session", session_id = %session_id, dry_run = self.config.dry_run);
        self.run_session(session_id, root, cancel)
            .instrument(span)
            .await
    }

    async fn run_session(
        &self,
        session_id: Uuid,
        root: Box<dyn MailFolder>,
        cancel: CancellationFlag,
    ) -> Result<SessionSummary, SessionError> {
        let started_at = Utc::now();
        let retry = self.config.import.retry_policy();

        info!("Loading destination contacts");
        let destination = &self.destination;
        let contacts = with_retry(&retry, None, "contact load", || destination.list_contacts())
            .await
            .map_err(SessionError::ContactLoad)?;
        let resolver = ContactResolver::new(&contacts);
        info!("Loaded {} contacts ({} distinct addresses)", contacts.len(), resolver.len());

        let (extracted, stats) = self.extract(root).await?;
        info!(
            "Extracted {} candidates from {} folders \
             ({} scanned, {} skipped, {} filtered, {} undated)",
            extracted.len(),
            stats.folders,
            stats.scanned,
            stats.skipped,
            stats.filtered,
            stats.undated
        );

        let partition = self.partition(extracted, &resolver);

        let mut metrics = SessionMetrics::default();
        metrics.absorb_extraction(&stats);
        metrics.resolved = partition.resolved;
        metrics.filtered_out = partition.filtered_out;
        metrics.deferred = partition.deferred;

        let mut results = partition.settled;
        let limiter = Arc::new(RateLimiter::new(self.config.import.request_delay()));
        let importer = Importer::new(
            Arc::clone(&self.destination),
            self.config.destination.owner_id.clone(),
            retry,
            self.config.import.recovery_policy(),
            limiter,
            cancel.clone(),
        );
        let verifier = Verifier::new(Arc::clone(&self.destination), retry);
        let written = AtomicU64::new(0);
        let ctx = QueueContext {
            importer: &importer,
            verifier: &verifier,
            retry,
            written: &written,
            cancel: &cancel,
        };

        info!(
            "Processing {} contact queues with {} workers",
            partition.queues.len(),
            self.config.import.worker_count
        );

        let workers = self.config.import.worker_count.max(1);
        let mut queues = stream::iter(partition.queues.into_iter().map(|(contact_id, queue)| {
            let span = info_span!("contact_queue", contact = %contact_id, candidates = queue.len());
            self.run_queue(contact_id, queue, &ctx).instrument(span)
        }))
        .buffer_unordered(workers);

        let mut fatal: Option<DestinationError> = None;
        while let Some(report) = queues.next().await {
            match report {
                Ok(report) => {
                    metrics.cancelled += report.cancelled;
                    results.extend(report.results);
                }
                Err(e) => {
                    error!("Fatal destination error, stopping: {}", e);
                    cancel.cancel();
                    fatal.get_or_insert(e);
                }
            }
        }
        drop(queues);

        if let Some(e) = fatal {
            return Err(SessionError::Aborted(e));
        }

        for result in &results {
            metrics.record(result);
        }
        let issues = results.iter().filter_map(Issue::from_result).collect();

        let summary = SessionSummary {
            session_id,
            started_at,
            ended_at: Utc::now(),
            dry_run: self.config.dry_run,
            cancelled: cancel.is_cancelled(),
            metrics,
            issues,
            unresolved_senders: rank_unresolved(partition.unresolved),
            results,
        };

        info!(
            "Session finished: {} imported, {} duplicate, {} unresolved, {} failed, \
             {} partially written",
            metrics.imported,
            metrics.duplicate,
            metrics.unresolved,
            metrics.failed,
            metrics.partially_written
        );
        Ok(summary)
    }

    /// Walks the mailbox on the blocking pool.
    async fn extract(
        &self,
        root: Box<dyn MailFolder>,
    ) -> Result<(Vec<Extracted>, ExtractStats), SessionError> {
        let options = ExtractOptions::from_config(&self.config.mailbox);
        tokio::task::spawn_blocking(move || {
            let mut extractor = Extractor::new(root, options);
            let extracted: Vec<Extracted> = extractor.by_ref().collect();
            (extracted, extractor.stats())
        })
        .await
        .map_err(|e| SessionError::Extraction(e.to_string()))
    }

    /// Applies the sender filter and candidate cap, resolves contacts and
    /// groups the survivors into oldest-first queues per contact.
    fn partition(&self, extracted: Vec<Extracted>, resolver: &ContactResolver) -> Partition {
        let sender_filter = self
            .config
            .sender_filter
            .as_deref()
            .and_then(parse_sender_address);
        let cap = self.config.import.max_candidates;

        let mut partition = Partition::default();
        let mut considered = 0usize;

        for item in extracted {
            if let Some(filter) = &sender_filter {
                let matches =
                    matches!(&item, Extracted::Candidate(c) if &c.sender_address == filter);
                if !matches {
                    partition.filtered_out += 1;
                    continue;
                }
            }

            if cap.is_some_and(|cap| considered >= cap) {
                partition.deferred += 1;
                continue;
            }
            considered += 1;

            match item {
                Extracted::UnparsableSender {
                    raw_sender,
                    subject,
                    effective_time,
                    source_path,
                } => {
                    debug!("Unparsable sender in '{}'", source_path);
                    let candidate = ImportCandidate {
                        sender_address: String::new(),
                        subject,
                        body: String::new(),
                        effective_time,
                        source_path,
                    };
                    partition.settled.push(ImportResult::new(
                        &candidate,
                        None,
                        ImportOutcome::Unresolved(UnresolvedReason::UnparsableSender),
                    ));
                    *partition.unresolved.entry(raw_sender).or_default() += 1;
                }
                Extracted::Candidate(candidate) => {
                    match resolver.resolve(&candidate.sender_address) {
                        Some(contact_id) => {
                            partition.resolved += 1;
                            partition
                                .queues
                                .entry(contact_id.to_string())
                                .or_default()
                                .push(candidate);
                        }
                        None => {
                            debug!("No contact for {}", mask_address(&candidate.sender_address));
                            partition.settled.push(ImportResult::new(
                                &candidate,
                                None,
                                ImportOutcome::Unresolved(UnresolvedReason::NoContact),
                            ));
                            *partition
                                .unresolved
                                .entry(candidate.sender_address)
                                .or_default() += 1;
                        }
                    }
                }
            }
        }

        for queue in partition.queues.values_mut() {
            queue.sort_by_key(|c| c.effective_time);
        }
        partition
    }

    /// Processes one contact's candidates strictly in order against a
    /// timeline snapshot taken at queue start.
    async fn run_queue(
        &self,
        contact_id: String,
        queue: Vec<ImportCandidate>,
        ctx: &QueueContext<'_>,
    ) -> Result<QueueReport, DestinationError> {
        let QueueContext {
            importer,
            verifier,
            retry,
            written,
            cancel,
        } = ctx;
        let mut report = QueueReport::default();
        if cancel.is_cancelled() {
            report.cancelled = queue.len() as u64;
            return Ok(report);
        }

        let destination = &self.destination;
        let snapshot = match with_retry(retry, None, "timeline load", || {
            destination.list_timeline(&contact_id)
        })
        .await
        {
            Ok(entries) => entries,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                warn!("Timeline unavailable, failing {} candidates: {}", queue.len(), e);
                let kind = if e.is_retryable() {
                    FailureKind::RetriesExhausted
                } else {
                    FailureKind::Rejected
                };
                for candidate in &queue {
                    let mut result = ImportResult::new(
                        candidate,
                        Some(contact_id.as_str()),
                        ImportOutcome::Failed(kind),
                    );
                    result.state = ImportState::Failed;
                    result.error = Some(format!("timeline unavailable: {}", e));
                    report.results.push(result);
                }
                return Ok(report);
            }
        };

        let mut detector = DuplicateDetector::new(
            &snapshot,
            self.config.dedup.window(),
            self.config.dedup.within_batch,
        );
        debug!("Timeline snapshot has {} entries", detector.snapshot_len());

        let verify_every = u64::from(self.config.import.verify_every);
        let total = queue.len();

        for (index, candidate) in queue.into_iter().enumerate() {
            if cancel.is_cancelled() {
                report.cancelled += (total - index) as u64;
                info!("Cancelled with {} candidates left in queue", total - index);
                break;
            }

            if detector.check(&candidate.subject, candidate.effective_time).is_duplicate() {
                debug!("Duplicate: '{}' at {}", candidate.subject, candidate.effective_time);
                report.results.push(ImportResult::new(
                    &candidate,
                    Some(contact_id.as_str()),
                    ImportOutcome::Duplicate,
                ));
                continue;
            }

            if self.config.dry_run {
                detector.record(&candidate.subject, candidate.effective_time);
                report.results.push(ImportResult::new(
                    &candidate,
                    Some(contact_id.as_str()),
                    ImportOutcome::Planned,
                ));
                continue;
            }

            let draft = importer.draft(&contact_id, &candidate);
            let write = importer.write(&draft).await?;

            let mut result =
                ImportResult::new(&candidate, Some(contact_id.as_str()), write.outcome);
            result.state = write.state;
            result.external_id = write.external_id;
            result.error = write.error;

            // Anything that may now exist on the destination counts for within-batch matching.
            if write.state != ImportState::Failed
                || write.outcome == ImportOutcome::Failed(FailureKind::IdentifierUnresolved)
            {
                detector.record(&candidate.subject, candidate.effective_time);
            }

            if result.state == ImportState::Finalized && verify_every > 0 {
                let n = written.fetch_add(1, Ordering::SeqCst) + 1;
                if n % verify_every == 0 {
                    if let Some(id) = result.external_id.as_deref() {
                        let verification = verifier.verify(id, &draft).await?;
                        if verification == Verification::Match {
                            result.state = ImportState::Verified;
                        }
                        result.verification = Some(verification);
                    }
                }
            }

            report.results.push(result);
        }

        Ok(report)
    }
}
