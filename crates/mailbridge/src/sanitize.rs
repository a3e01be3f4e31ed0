//! Helpers for sanitizing data before it enters log lines and span fields.
//!
//! Summaries are meant to be shared for follow-up, so tokens and full
//! addresses stay out of traces.

use std::path::Path;

/// Returns only the last component of a path.
pub fn redact_path(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("<unknown>")
        .to_string()
}

/// Strips userinfo and query strings from a URL.
///
/// - `https://user:pw@org.example.com/api?x=1` → `https://****@org.example.com/api`
/// - `https://org.example.com/api` → unchanged
pub fn redact_url(url: &str) -> String {
    let without_query = url.split('?').next().unwrap_or(url);

    if let Some(scheme_end) = without_query.find("://") {
        let after_scheme = &without_query[scheme_end + 3..];
        let host_end = after_scheme.find('/').unwrap_or(after_scheme.len());
        if let Some(at_pos) = after_scheme[..host_end].rfind('@') {
            let scheme = &without_query[..scheme_end + 3];
            return format!("{}****@{}", scheme, &after_scheme[at_pos + 1..]);
        }
    }

    without_query.to_string()
}

/// Masks the local part of an address, keeping its first character and the domain.
///
/// `service@ringcentral.com` → `s***@ringcentral.com`
pub fn mask_address(address: &str) -> String {
    match address.split_once('@') {
        Some((local, domain)) => {
            let first = local.chars().next().map(String::from).unwrap_or_default();
            format!("{}***@{}", first, domain)
        }
        None => "***".to_string(),
    }
}
