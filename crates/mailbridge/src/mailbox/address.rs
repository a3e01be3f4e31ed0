//! Sender address normalization.

use regex::Regex;
use std::sync::LazyLock;

static RE_WRAPPED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<\s*([^<>\s]+)\s*>\s*$").unwrap());
static RE_BARE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s<>]+@[^@\s<>]+$").unwrap());

/// Extracts the lowercased address from a raw sender field.
///
/// A trailing `<address>` wins when present; otherwise the whole string is
/// taken as the address if it looks like one. Returns `None` for anything
/// else (Exchange DNs, empty fields, display names without address).
///
/// ```
/// use mailbridge::mailbox::parse_sender_address;
///
/// assert_eq!(
///     parse_sender_address("\"RingCentral\" <service@ringcentral.com>").as_deref(),
///     Some("service@ringcentral.com")
/// );
/// ```
pub fn parse_sender_address(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    let candidate = match RE_WRAPPED.captures(raw) {
        Some(caps) => caps.get(1)?.as_str(),
        None => raw.trim_matches(|c| c == '"' || c == '\''),
    };

    if RE_BARE.is_match(candidate) {
        Some(candidate.to_lowercase())
    } else {
        None
    }
}
