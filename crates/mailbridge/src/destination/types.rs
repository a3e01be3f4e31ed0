use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::reconcile::PartyLink;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestinationContact {
    pub contact_id: String,
    pub primary_address: String,
}

/// Snapshot row of a contact's timeline, used only for duplicate comparison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExistingTimelineEntry {
    pub subject: String,
    pub sent_time: DateTime<Utc>,
    pub external_id: String,
}

/// Everything a create request carries. Lifecycle fields are deliberately
/// absent: records are created open and finalized in a second write.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivityDraft {
    /// The contact the activity regards.
    pub contact_id: String,
    pub subject: String,
    /// Body already translated to markup.
    pub description: String,
    pub sent_time: DateTime<Utc>,
    pub parties: Vec<PartyLink>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateOutcome {
    Created(String),
    /// The write succeeded but the response carried no identifier.
    Accepted,
}

/// Identifier and subject of a contact's newest activity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecentActivity {
    pub activity_id: String,
    pub subject: String,
}

/// Lifecycle state and status reason codes of an activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lifecycle {
    pub state: i64,
    pub status: i64,
}

impl Lifecycle {
    pub const OPEN: Lifecycle = Lifecycle { state: 0, status: 1 };
    /// Completed / received.
    pub const FINALIZED: Lifecycle = Lifecycle { state: 1, status: 4 };
}

impl std::fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.state, self.status)
    }
}

/// An activity as read back from the destination.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityRecord {
    pub activity_id: String,
    pub subject: String,
    pub description: String,
    pub lifecycle: Lifecycle,
    pub parties: Vec<PartyLink>,
}
