use std::collections::HashMap;

use tracing::warn;

use crate::destination::DestinationContact;
use crate::sanitize::mask_address;

/// Case-insensitive exact lookup from sender address to destination contact.
#[derive(Debug, Clone, Default)]
pub struct ContactResolver {
    by_address: HashMap<String, String>,
}

impl ContactResolver {
    /// Builds the lookup table. When two contacts share an address the first
    /// one listed by the destination wins.
    pub fn new(contacts: &[DestinationContact]) -> Self {
        let mut by_address = HashMap::with_capacity(contacts.len());
        for contact in contacts {
            let address = contact.primary_address.trim().to_lowercase();
            if address.is_empty() {
                continue;
            }
            if by_address.contains_key(&address) {
                warn!(
                    "Address {} is shared by several contacts, keeping the first",
                    mask_address(&address)
                );
                continue;
            }
            by_address.insert(address, contact.contact_id.clone());
        }
        Self { by_address }
    }

    /// Returns the contact id for `sender_address`, if any.
    pub fn resolve(&self, sender_address: &str) -> Option<&str> {
        self.by_address
            .get(&sender_address.to_lowercase())
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.by_address.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_address.is_empty()
    }
}
