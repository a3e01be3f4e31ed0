//! In-memory destination and mailbox used by the session tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use mailbridge::config::SyncConfig;
use mailbridge::destination::{
    ActivityDraft, ActivityRecord, CreateOutcome, Destination, DestinationContact,
    DestinationError, ExistingTimelineEntry, Lifecycle, RecentActivity,
};
use mailbridge::mailbox::{MailFolder, MailItem, MailItems, MailboxError};
use mailbridge::reconcile::{PartyLink, PartyRole};
use mailbridge::{CancellationFlag, SessionCoordinator, SessionError, SessionSummary};

/// Destination operations, for scripting and counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    ListContacts,
    ListTimeline,
    Create,
    Latest,
    Finalize,
    Get,
}

/// An activity held by `MemoryDestination`.
#[derive(Debug, Clone)]
pub struct StoredActivity {
    pub activity_id: String,
    pub contact_id: String,
    pub subject: String,
    pub description: String,
    pub sent_time: DateTime<Utc>,
    pub lifecycle: Lifecycle,
    pub parties: Vec<PartyLink>,
}

impl StoredActivity {
    pub fn sender_links(&self) -> usize {
        self.parties
            .iter()
            .filter(|l| l.role == PartyRole::Sender)
            .count()
    }
}

#[derive(Default)]
struct State {
    contacts: Vec<DestinationContact>,
    activities: Vec<StoredActivity>,
    next_id: u64,
    calls: HashMap<Op, usize>,
    scripted: HashMap<Op, VecDeque<DestinationError>>,
    always_fail: HashMap<Op, DestinationError>,
    accept_without_id: bool,
    hide_from_recovery: bool,
    cancel_after_creates: Option<(usize, CancellationFlag)>,
    corrupt_description: bool,
    lose_create_responses: usize,
}

/// In-memory CRM with scriptable failures.
#[derive(Default)]
pub struct MemoryDestination {
    state: Mutex<State>,
}

impl MemoryDestination {
    pub fn new(contacts: Vec<DestinationContact>) -> Self {
        let dest = Self::default();
        dest.state.lock().unwrap().contacts = contacts;
        dest
    }

    /// Adds an already finalized activity to a contact's timeline.
    pub fn seed_activity(&self, contact_id: &str, subject: &str, sent_time: DateTime<Utc>) {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let activity_id = format!("seed-{}", state.next_id);
        state.activities.push(StoredActivity {
            activity_id,
            contact_id: contact_id.to_string(),
            subject: subject.to_string(),
            description: String::new(),
            sent_time,
            lifecycle: Lifecycle::FINALIZED,
            parties: Vec::new(),
        });
    }

    /// The next call to `op` fails with `error`. Calls queue up.
    pub fn fail_next(&self, op: Op, error: DestinationError) {
        self.state
            .lock()
            .unwrap()
            .scripted
            .entry(op)
            .or_default()
            .push_back(error);
    }

    /// Every call to `op` fails with `error`.
    pub fn fail_always(&self, op: Op, error: DestinationError) {
        self.state.lock().unwrap().always_fail.insert(op, error);
    }

    /// Creates succeed but report no identifier.
    pub fn accept_without_id(&self) {
        self.state.lock().unwrap().accept_without_id = true;
    }

    /// The latest-activity query never finds anything.
    pub fn hide_from_recovery(&self) {
        self.state.lock().unwrap().hide_from_recovery = true;
    }

    /// Trips `flag` once `creates` records have been created.
    pub fn cancel_after_creates(&self, creates: usize, flag: CancellationFlag) {
        self.state.lock().unwrap().cancel_after_creates = Some((creates, flag));
    }

    /// The next `count` creates are stored, then reported as timed out.
    pub fn lose_create_responses(&self, count: usize) {
        self.state.lock().unwrap().lose_create_responses = count;
    }

    /// Stores descriptions with raw line breaks instead of what was sent.
    pub fn corrupt_descriptions(&self) {
        self.state.lock().unwrap().corrupt_description = true;
    }

    pub fn calls(&self, op: Op) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .get(&op)
            .copied()
            .unwrap_or(0)
    }

    pub fn activities(&self) -> Vec<StoredActivity> {
        self.state.lock().unwrap().activities.clone()
    }

    pub fn created(&self) -> Vec<StoredActivity> {
        self.activities()
            .into_iter()
            .filter(|a| !a.activity_id.starts_with("seed-"))
            .collect()
    }

    fn enter(&self, op: Op) -> Result<std::sync::MutexGuard<'_, State>, DestinationError> {
        let mut state = self.state.lock().unwrap();
        *state.calls.entry(op).or_default() += 1;
        if let Some(error) = state.scripted.get_mut(&op).and_then(VecDeque::pop_front) {
            return Err(error);
        }
        if let Some(error) = state.always_fail.get(&op) {
            return Err(error.clone());
        }
        Ok(state)
    }
}

#[async_trait]
impl Destination for MemoryDestination {
    async fn list_contacts(&self) -> Result<Vec<DestinationContact>, DestinationError> {
        let state = self.enter(Op::ListContacts)?;
        Ok(state.contacts.clone())
    }

    async fn list_timeline(
        &self,
        contact_id: &str,
    ) -> Result<Vec<ExistingTimelineEntry>, DestinationError> {
        let state = self.enter(Op::ListTimeline)?;
        Ok(state
            .activities
            .iter()
            .filter(|a| a.contact_id == contact_id)
            .map(|a| ExistingTimelineEntry {
                subject: a.subject.clone(),
                sent_time: a.sent_time,
                external_id: a.activity_id.clone(),
            })
            .collect())
    }

    async fn create_activity(
        &self,
        draft: &ActivityDraft,
    ) -> Result<CreateOutcome, DestinationError> {
        let mut state = self.enter(Op::Create)?;
        state.next_id += 1;
        let activity_id = format!("act-{}", state.next_id);
        let description = if state.corrupt_description {
            draft.description.replace("<br>", "\n")
        } else {
            draft.description.clone()
        };
        let parties = draft
            .parties
            .iter()
            .cloned()
            .map(|mut link| {
                link.activity_id = Some(activity_id.clone());
                link
            })
            .collect();
        state.activities.push(StoredActivity {
            activity_id: activity_id.clone(),
            contact_id: draft.contact_id.clone(),
            subject: draft.subject.clone(),
            description,
            sent_time: draft.sent_time,
            lifecycle: Lifecycle::OPEN,
            parties,
        });

        let created = state.activities.iter().filter(|a| a.activity_id.starts_with("act-")).count();
        if let Some((after, flag)) = &state.cancel_after_creates {
            if created >= *after {
                flag.cancel();
            }
        }

        if state.lose_create_responses > 0 {
            state.lose_create_responses -= 1;
            return Err(DestinationError::transient("request timed out"));
        }

        if state.accept_without_id {
            Ok(CreateOutcome::Accepted)
        } else {
            Ok(CreateOutcome::Created(activity_id))
        }
    }

    async fn latest_activity(
        &self,
        contact_id: &str,
    ) -> Result<Option<RecentActivity>, DestinationError> {
        let state = self.enter(Op::Latest)?;
        if state.hide_from_recovery {
            return Ok(None);
        }
        Ok(state
            .activities
            .iter()
            .rev()
            .find(|a| a.contact_id == contact_id)
            .map(|a| RecentActivity {
                activity_id: a.activity_id.clone(),
                subject: a.subject.clone(),
            }))
    }

    async fn finalize(&self, activity_id: &str) -> Result<(), DestinationError> {
        let mut state = self.enter(Op::Finalize)?;
        let activity = state
            .activities
            .iter_mut()
            .find(|a| a.activity_id == activity_id)
            .ok_or(DestinationError::Rejected {
                status: 404,
                detail: "no such activity".to_string(),
            })?;
        activity.lifecycle = Lifecycle::FINALIZED;
        Ok(())
    }

    async fn get_activity(&self, activity_id: &str) -> Result<ActivityRecord, DestinationError> {
        let state = self.enter(Op::Get)?;
        state
            .activities
            .iter()
            .find(|a| a.activity_id == activity_id)
            .map(|a| ActivityRecord {
                activity_id: a.activity_id.clone(),
                subject: a.subject.clone(),
                description: a.description.clone(),
                lifecycle: a.lifecycle,
                parties: a.parties.clone(),
            })
            .ok_or(DestinationError::Rejected {
                status: 404,
                detail: "no such activity".to_string(),
            })
    }
}

/// In-memory mailbox folder.
#[derive(Clone)]
pub struct MemoryFolder {
    pub path: String,
    pub items: Vec<Result<MailItem, String>>,
    pub children: Vec<MemoryFolder>,
}

impl MailFolder for MemoryFolder {
    fn path(&self) -> &str {
        &self.path
    }

    fn items(&self) -> Result<MailItems, MailboxError> {
        let items: Vec<Result<MailItem, MailboxError>> = self
            .items
            .iter()
            .map(|item| item.clone().map_err(MailboxError::Store))
            .collect();
        Ok(Box::new(items.into_iter()))
    }

    fn subfolders(&self) -> Result<Vec<Box<dyn MailFolder>>, MailboxError> {
        Ok(self
            .children
            .iter()
            .cloned()
            .map(|c| Box::new(c) as Box<dyn MailFolder>)
            .collect())
    }
}

/// Runs sessions against a shared `MemoryDestination`.
pub struct TestHarness {
    pub destination: Arc<MemoryDestination>,
    pub config: SyncConfig,
}

impl TestHarness {
    pub fn new(config: SyncConfig, contacts: Vec<DestinationContact>) -> Self {
        Self {
            destination: Arc::new(MemoryDestination::new(contacts)),
            config,
        }
    }

    pub async fn run(&self, mailbox: &MemoryFolder) -> Result<SessionSummary, SessionError> {
        self.run_with_cancel(mailbox, CancellationFlag::new()).await
    }

    pub async fn run_with_cancel(
        &self,
        mailbox: &MemoryFolder,
        cancel: CancellationFlag,
    ) -> Result<SessionSummary, SessionError> {
        let destination: Arc<dyn Destination> = self.destination.clone();
        let coordinator = SessionCoordinator::new(self.config.clone(), destination);
        coordinator.run(Box::new(mailbox.clone()), cancel).await
    }
}
