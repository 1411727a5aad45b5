//! Registration expiry policy.
//!
//! Pure functions combining the `Expires` header, a contact's own
//! `expires=` parameter, and the configured upper bound.

use sip_model::{Contact, Headers};

/// Fallback registration interval when neither the header nor the contact
/// names one, RFC 3261 §10.2.8.
pub const DEFAULT_REGISTER_EXPIRY: u64 = 3600;

/// The `Expires` header value, when exactly one parseable value is present.
pub fn header_expires(headers: &Headers) -> Option<u64> {
    let mut values = headers.get_all("Expires");
    let first = values.next()?;
    if values.next().is_some() {
        return None;
    }
    first.trim().parse().ok()
}

/// A contact's own `expires=` parameter, when present and parseable.
pub fn contact_expires(contact: &Contact) -> Option<u64> {
    match contact.param("expires") {
        Some(Some(value)) => value.trim().parse().ok(),
        _ => None,
    }
}

/// The expiry the UA asked for: the contact parameter wins over the header.
///
/// `Some(0)` is the deregistration request and is handled by the updater
/// before any clamping applies.
pub fn requested_expiry(headers: &Headers, contact: &Contact) -> Option<u64> {
    contact_expires(contact).or_else(|| header_expires(headers))
}

/// Clamps a requested expiry to the configured maximum.
///
/// No lower bound is enforced; arbitrarily small nonzero intervals are
/// accepted as-is.
pub fn effective_expiry(requested: Option<u64>, max_register_time: u64) -> u64 {
    match requested {
        None => DEFAULT_REGISTER_EXPIRY,
        Some(seconds) => seconds.min(max_register_time),
    }
}
