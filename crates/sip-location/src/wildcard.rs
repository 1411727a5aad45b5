// moorage-rs - The Moorage SIP Location Service
// Copyright (C) 2025 James Ferris <ferrous.communications@gmail.com>
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Wildcard (`Contact: *`) deregistration, RFC 3261 §10.3 #6.

use anyhow::Result;
use sip_model::{Contact, Headers};
use smol_str::SmolStr;
use tracing::debug;

use crate::error::SipError;
use crate::store::{Binding, BindingClass, BindingStore};

/// True when the request asks for wildcard deregistration.
pub fn is_wildcard_register(contacts: &[Contact]) -> bool {
    contacts.iter().any(Contact::is_wildcard)
}

/// Validates a wildcard REGISTER; checks apply in order, first failure wins.
pub fn validate_wildcard(headers: &Headers, contacts: &[Contact]) -> Result<(), SipError> {
    let values: Vec<_> = headers.get_all("Expires").collect();
    if values.is_empty() {
        return Err(SipError::new(400, "Wildcard without Expires header"));
    }
    if values.len() > 1 {
        return Err(SipError::new(
            400,
            "Wildcard with more than one expires parameter",
        ));
    }
    // "01" parses to 1 and is rejected the same as any other nonzero value.
    match values[0].trim().parse::<u64>() {
        Ok(0) => {}
        _ => {
            return Err(SipError::new(
                400,
                "Wildcard with non-zero contact expires parameter",
            ))
        }
    }
    if contacts.len() > 1 {
        return Err(SipError::new(
            400,
            "Wildcard present but not alone, invalid (RFC3261 10.3 #6)",
        ));
    }
    Ok(())
}

/// Deletes every dynamic binding of the AOR that passes the removal gate.
///
/// A dynamic binding written by the same dialog with a CSeq at or above the
/// request's aborts the whole operation; static bindings are skipped.
pub async fn remove_all_bindings<S>(
    store: &S,
    aor: &str,
    call_id: &SmolStr,
    cseq: u32,
) -> Result<Result<(), SipError>>
where
    S: BindingStore + ?Sized,
{
    let call_id = call_id.clone();
    let txn = move |bindings: &mut Vec<Binding>| -> Result<(), SipError> {
        for binding in bindings.iter() {
            if binding.class == BindingClass::Static {
                debug!(contact = %binding.contact_key, "wildcard deregister skips static binding");
                continue;
            }
            let same = binding.call_id == call_id;
            if same && cseq <= binding.cseq {
                return Err(SipError::out_of_order());
            }
        }
        bindings.retain(|binding| binding.class == BindingClass::Static);
        Ok(())
    };
    store.transact(aor, &txn).await
}
