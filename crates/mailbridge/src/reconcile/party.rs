//! Participant links that carry sender identity on a created activity.
//!
//! The destination has no settable "from" field. Who sent a record is only
//! expressed by its party links, so both links travel with the create
//! request and are never added afterwards.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartyRole {
    Sender,
    Recipient,
    Cc,
    Bcc,
}

impl PartyRole {
    /// Participation type code used by the destination API.
    pub fn code(self) -> i64 {
        match self {
            PartyRole::Sender => 1,
            PartyRole::Recipient => 2,
            PartyRole::Cc => 3,
            PartyRole::Bcc => 4,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(PartyRole::Sender),
            2 => Some(PartyRole::Recipient),
            3 => Some(PartyRole::Cc),
            4 => Some(PartyRole::Bcc),
            _ => None,
        }
    }
}

/// The record a party link points at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "camelCase")]
pub enum PartyRef {
    Contact(String),
    /// An internal account, such as the mailbox owner.
    SystemUser(String),
}

impl PartyRef {
    pub fn id(&self) -> &str {
        match self {
            PartyRef::Contact(id) | PartyRef::SystemUser(id) => id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyLink {
    /// Assigned once the activity exists.
    pub activity_id: Option<String>,
    pub party: PartyRef,
    pub role: PartyRole,
}

/// Sender link to the contact plus recipient link to the mailbox owner.
pub fn build_party_links(contact_id: &str, recipient_id: &str) -> [PartyLink; 2] {
    [
        PartyLink {
            activity_id: None,
            party: PartyRef::Contact(contact_id.to_string()),
            role: PartyRole::Sender,
        },
        PartyLink {
            activity_id: None,
            party: PartyRef::SystemUser(recipient_id.to_string()),
            role: PartyRole::Recipient,
        },
    ]
}

/// Number of links with `role` pointing at `party_id`.
pub fn count_links(links: &[PartyLink], role: PartyRole, party_id: &str) -> usize {
    links
        .iter()
        .filter(|link| link.role == role && link.party.id() == party_id)
        .count()
}
