//! The CRM destination: contacts, activity timelines and activity writes.
//!
//! The session only talks to the [`Destination`] trait. [`HttpDestination`]
//! implements it against an OData Web API; tests substitute an in-memory
//! implementation.

pub mod error;
pub mod http;
pub mod types;

use async_trait::async_trait;

pub use error::DestinationError;
pub use http::HttpDestination;
pub use types::{
    ActivityDraft, ActivityRecord, CreateOutcome, DestinationContact, ExistingTimelineEntry,
    Lifecycle, RecentActivity,
};

#[async_trait]
pub trait Destination: Send + Sync {
    /// All contacts that have a primary address.
    async fn list_contacts(&self) -> Result<Vec<DestinationContact>, DestinationError>;

    /// Activities already regarding `contact_id`.
    async fn list_timeline(
        &self,
        contact_id: &str,
    ) -> Result<Vec<ExistingTimelineEntry>, DestinationError>;

    /// Creates an activity in its default (open) lifecycle state, party links included.
    async fn create_activity(&self, draft: &ActivityDraft)
        -> Result<CreateOutcome, DestinationError>;

    /// The most recently created activity regarding `contact_id`.
    async fn latest_activity(
        &self,
        contact_id: &str,
    ) -> Result<Option<RecentActivity>, DestinationError>;

    /// Moves an activity to [`Lifecycle::FINALIZED`].
    async fn finalize(&self, activity_id: &str) -> Result<(), DestinationError>;

    /// Reads an activity back with its party links.
    async fn get_activity(&self, activity_id: &str) -> Result<ActivityRecord, DestinationError>;
}
