//! Read-only lookups used by the surrounding proxy for outbound routing.
//!
//! These are non-transactional snapshots; good enough for routing
//! decisions, never for mutation.

use anyhow::Result;
use sip_model::SipUri;
use smol_str::SmolStr;

use crate::store::{Binding, BindingStore};

/// First AOR registered at the given contact URI, lexicographically
/// smallest when several users share it.
pub async fn get_user_with_contact<S>(store: &S, uri: &SipUri) -> Result<Option<SmolStr>>
where
    S: BindingStore + ?Sized,
{
    let aors = store.aors_for_contact(uri.canonical().as_str()).await?;
    Ok(aors.into_iter().next())
}

/// Every binding of every listed user, concatenated in input order.
pub async fn get_locations_for_users<S>(store: &S, users: &[SmolStr]) -> Result<Vec<Binding>>
where
    S: BindingStore + ?Sized,
{
    let mut locations = Vec::new();
    for user in users {
        locations.extend(store.bindings_for(user.as_str()).await?);
    }
    Ok(locations)
}

/// Keeps exactly the entries whose priority equals the minimum present.
///
/// Entries without a priority flag are ignored for the minimum and dropped
/// from the result, unless no entry carries a priority at all, in which
/// case the input passes through unchanged.
pub fn prioritize_locations(locations: Vec<Binding>) -> Vec<Binding> {
    let best = locations
        .iter()
        .filter_map(|binding| binding.flags.priority)
        .min();
    match best {
        None => locations,
        Some(best) => locations
            .into_iter()
            .filter(|binding| binding.flags.priority == Some(best))
            .collect(),
    }
}

/// The reachable URI stored with a binding.
pub fn to_url(binding: &Binding) -> &SipUri {
    &binding.contact
}
