// moorage-rs - The Moorage SIP Location Service
// Copyright (C) 2025 James Ferris <ferrous.communications@gmail.com>
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-contact binding updates: the REGISTER state machine deciding, for
//! each contact, whether to insert, refresh, replace or remove a binding.

use anyhow::Result;
use sip_model::{Contact, Headers, InstanceId, SipUri};
use smol_str::SmolStr;
use tracing::{debug, warn};

use crate::config::LocationConfig;
use crate::error::SipError;
use crate::expiry;
use crate::gruu::GruuFactory;
use crate::path::PathVector;
use crate::store::{
    unix_now, Binding, BindingClass, BindingFlags, BindingStore, Expiry,
};

/// Priority assigned to contacts without a `q=` parameter.
pub const DEFAULT_CONTACT_PRIORITY: u32 = 100;

/// Maps a contact's `q=` parameter to a numeric priority; lower wins.
///
/// `q=1.0` maps to 0 and `q=0.0` to 1000, so preference order survives the
/// integer flag encoding. Invalid values fall back to the default.
fn contact_priority(contact: &Contact) -> u32 {
    match contact.param("q") {
        Some(Some(value)) => match value.trim().parse::<f32>() {
            Ok(q) if (0.0..=1.0).contains(&q) => ((1.0 - q) * 1000.0).round() as u32,
            _ => {
                debug!(q = %value, "ignoring invalid q value on contact");
                DEFAULT_CONTACT_PRIORITY
            }
        },
        _ => DEFAULT_CONTACT_PRIORITY,
    }
}

struct PlannedWrite {
    uri: SipUri,
    key: SmolStr,
    remove: bool,
    expires_at: u64,
    flags: BindingFlags,
}

/// Applies every non-wildcard contact of one REGISTER inside a single
/// transaction, in input order.
///
/// A CSeq regression on any contact aborts the whole transaction; no
/// partial changes persist.
pub async fn apply_contacts<S, G>(
    store: &S,
    gruu: &G,
    config: &LocationConfig,
    aor: &str,
    call_id: &SmolStr,
    cseq: u32,
    headers: &Headers,
    contacts: &[Contact],
    path: &PathVector,
) -> Result<Result<(), SipError>>
where
    S: BindingStore + ?Sized,
    G: GruuFactory + ?Sized,
{
    let now = unix_now();
    let mut plan = Vec::with_capacity(contacts.len());

    for contact in contacts {
        let Some(uri) = contact.uri() else {
            continue;
        };
        let requested = expiry::requested_expiry(headers, contact);
        let remove = requested == Some(0);
        let expires_at = now + expiry::effective_expiry(requested, config.max_register_time);

        let instance_id = match contact.instance_id() {
            Some(InstanceId::Quoted(raw)) => {
                if !remove {
                    // Idempotent and never reaped, so pre-creating outside
                    // the binding transaction is safe on abort.
                    gruu.create_if_not_exists(aor, raw.as_str()).await?;
                }
                Some(raw)
            }
            Some(InstanceId::Unquoted(value)) => {
                debug!(instance = %value, "ignoring unquoted +sip.instance value");
                None
            }
            None => None,
        };

        plan.push(PlannedWrite {
            key: uri.canonical(),
            uri: uri.clone(),
            remove,
            expires_at,
            flags: BindingFlags {
                priority: Some(contact_priority(contact)),
                registration_time: now,
                instance_id,
                path: path.stored.clone(),
            },
        });
    }

    let call_id = call_id.clone();
    let aor_key = SmolStr::new(aor);
    let txn = move |bindings: &mut Vec<Binding>| -> Result<(), SipError> {
        for write in &plan {
            match bindings.iter().position(|b| b.contact_key == write.key) {
                None => {
                    // Removing an unknown contact is a no-op, not an error.
                    if !write.remove {
                        bindings.push(Binding {
                            aor: aor_key.clone(),
                            contact: write.uri.clone(),
                            contact_key: write.key.clone(),
                            class: BindingClass::Dynamic,
                            expires: Expiry::At(write.expires_at),
                            call_id: call_id.clone(),
                            cseq,
                            flags: write.flags.clone(),
                        });
                    }
                }
                Some(pos) => {
                    if bindings[pos].class == BindingClass::Static {
                        warn!(aor = %aor_key, contact = %write.key,
                            "REGISTER names a static binding, leaving it untouched");
                        continue;
                    }
                    let same_call_id = bindings[pos].call_id == call_id;
                    if same_call_id && cseq <= bindings[pos].cseq {
                        return Err(SipError::out_of_order());
                    }
                    if write.remove {
                        bindings.remove(pos);
                    } else {
                        let row = &mut bindings[pos];
                        row.contact = write.uri.clone();
                        row.class = BindingClass::Dynamic;
                        row.expires = Expiry::At(write.expires_at);
                        row.call_id = call_id.clone();
                        row.cseq = cseq;
                        row.flags = write.flags.clone();
                    }
                }
            }
        }
        Ok(())
    };

    store.transact(aor, &txn).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gruu::{GruuFactory, MemoryGruuRegistry};
    use crate::store::MemoryBindingStore;

    const AOR: &str = "sip:alice@example.com";

    fn contacts(values: &[&str]) -> Vec<Contact> {
        values.iter().map(|v| Contact::parse(v).unwrap()).collect()
    }

    async fn apply(
        store: &MemoryBindingStore,
        gruu: &MemoryGruuRegistry,
        call_id: &str,
        cseq: u32,
        header_expires: Option<&str>,
        contact_values: &[&str],
    ) -> Result<(), SipError> {
        let mut headers = Headers::new();
        if let Some(value) = header_expires {
            headers.push("Expires", value);
        }
        apply_contacts(
            store,
            gruu,
            &LocationConfig::default(),
            AOR,
            &SmolStr::new(call_id),
            cseq,
            &headers,
            &contacts(contact_values),
            &PathVector::default(),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn first_register_inserts() {
        let store = MemoryBindingStore::new();
        let gruu = MemoryGruuRegistry::new();
        apply(&store, &gruu, "call-x", 101, None, &["<sip:u@1.2.3.4>;expires=20"])
            .await
            .unwrap();

        let bindings = store.bindings_for(AOR).await.unwrap();
        assert_eq!(bindings.len(), 1);
        assert_eq!(bindings[0].call_id.as_str(), "call-x");
        assert_eq!(bindings[0].cseq, 101);
        assert_eq!(bindings[0].flags.priority, Some(DEFAULT_CONTACT_PRIORITY));
        let remaining = bindings[0].expires.remaining(unix_now());
        assert!((15..=20).contains(&remaining), "remaining {}", remaining);
    }

    #[tokio::test]
    async fn same_dialog_refresh_needs_higher_cseq() {
        let store = MemoryBindingStore::new();
        let gruu = MemoryGruuRegistry::new();
        apply(&store, &gruu, "call-x", 101, None, &["<sip:u@1.2.3.4>;expires=20"])
            .await
            .unwrap();

        let err = apply(&store, &gruu, "call-x", 50, None, &["<sip:u@1.2.3.4>;expires=20"])
            .await
            .unwrap_err();
        assert_eq!(err.status, 403);

        // idempotent resend is rejected too, comparison is strict
        let err = apply(&store, &gruu, "call-x", 101, None, &["<sip:u@1.2.3.4>;expires=20"])
            .await
            .unwrap_err();
        assert_eq!(err.status, 403);

        apply(&store, &gruu, "call-x", 102, None, &["<sip:u@1.2.3.4>;expires=30"])
            .await
            .unwrap();
        let bindings = store.bindings_for(AOR).await.unwrap();
        assert_eq!(bindings[0].cseq, 102);
    }

    #[tokio::test]
    async fn different_dialog_replaces_unconditionally() {
        let store = MemoryBindingStore::new();
        let gruu = MemoryGruuRegistry::new();
        apply(&store, &gruu, "call-x", 101, None, &["<sip:u@1.2.3.4>;expires=20"])
            .await
            .unwrap();

        // UA restarted: new Call-ID, CSeq starts over
        apply(&store, &gruu, "call-y", 1, None, &["<sip:u@1.2.3.4>;expires=40"])
            .await
            .unwrap();
        let bindings = store.bindings_for(AOR).await.unwrap();
        assert_eq!(bindings.len(), 1);
        assert_eq!(bindings[0].call_id.as_str(), "call-y");
        assert_eq!(bindings[0].cseq, 1);
        let remaining = bindings[0].expires.remaining(unix_now());
        assert!((35..=40).contains(&remaining));
    }

    #[tokio::test]
    async fn zero_expires_removes() {
        let store = MemoryBindingStore::new();
        let gruu = MemoryGruuRegistry::new();
        apply(&store, &gruu, "call-x", 1, None, &["<sip:u@1.2.3.4>;expires=20"])
            .await
            .unwrap();
        apply(&store, &gruu, "call-x", 2, None, &["<sip:u@1.2.3.4>;expires=0"])
            .await
            .unwrap();
        assert!(store.bindings_for(AOR).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn out_of_order_contact_rolls_back_whole_request() {
        let store = MemoryBindingStore::new();
        let gruu = MemoryGruuRegistry::new();
        apply(&store, &gruu, "call-x", 10, None, &["<sip:b@2.2.2.2>;expires=60"])
            .await
            .unwrap();

        // first contact would insert, second regresses; nothing must land
        let err = apply(
            &store,
            &gruu,
            "call-x",
            5,
            None,
            &["<sip:a@1.1.1.1>;expires=60", "<sip:b@2.2.2.2>;expires=60"],
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, 403);

        let bindings = store.bindings_for(AOR).await.unwrap();
        assert_eq!(bindings.len(), 1);
        assert_eq!(bindings[0].contact_key.as_str(), "sip:b@2.2.2.2");
    }

    #[tokio::test]
    async fn header_expires_clamped_to_max() {
        let store = MemoryBindingStore::new();
        let gruu = MemoryGruuRegistry::new();
        apply(&store, &gruu, "call-x", 1, Some("100000"), &["<sip:u@1.2.3.4>"])
            .await
            .unwrap();
        let bindings = store.bindings_for(AOR).await.unwrap();
        let remaining = bindings[0].expires.remaining(unix_now());
        assert!(remaining <= LocationConfig::default().max_register_time);
        assert!(remaining >= LocationConfig::default().max_register_time - 5);
    }

    #[tokio::test]
    async fn quoted_instance_creates_gruu_entry() {
        let store = MemoryBindingStore::new();
        let gruu = MemoryGruuRegistry::new();
        apply(
            &store,
            &gruu,
            "call-x",
            1,
            None,
            &["<sip:u@1.2.3.4>;+sip.instance=\"<urn:uuid:id-1>\""],
        )
        .await
        .unwrap();

        let bindings = store.bindings_for(AOR).await.unwrap();
        assert_eq!(
            bindings[0].flags.instance_id.as_deref(),
            Some("<urn:uuid:id-1>")
        );
        assert!(gruu
            .fetch_or_none(AOR, "<urn:uuid:id-1>")
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn unquoted_instance_ignored() {
        let store = MemoryBindingStore::new();
        let gruu = MemoryGruuRegistry::new();
        apply(
            &store,
            &gruu,
            "call-x",
            1,
            None,
            &["<sip:u@1.2.3.4>;+sip.instance=urn:uuid:id-1"],
        )
        .await
        .unwrap();

        let bindings = store.bindings_for(AOR).await.unwrap();
        assert!(bindings[0].flags.instance_id.is_none());
        assert!(gruu.is_empty());
    }

    #[tokio::test]
    async fn q_value_maps_to_priority() {
        let store = MemoryBindingStore::new();
        let gruu = MemoryGruuRegistry::new();
        apply(
            &store,
            &gruu,
            "call-x",
            1,
            None,
            &["<sip:a@1.1.1.1>;q=1.0", "<sip:b@2.2.2.2>;q=0.5"],
        )
        .await
        .unwrap();

        let bindings = store.bindings_for(AOR).await.unwrap();
        let by_key = |key: &str| {
            bindings
                .iter()
                .find(|b| b.contact_key.as_str() == key)
                .unwrap()
                .flags
                .priority
        };
        assert_eq!(by_key("sip:a@1.1.1.1"), Some(0));
        assert_eq!(by_key("sip:b@2.2.2.2"), Some(500));
    }

    #[tokio::test]
    async fn static_binding_left_untouched() {
        let store = MemoryBindingStore::new();
        let gruu = MemoryGruuRegistry::new();
        store.seed_static(AOR, SipUri::parse("sip:pbx.example.com").unwrap());

        apply(&store, &gruu, "call-x", 1, None, &["<sip:pbx.example.com>;expires=60"])
            .await
            .unwrap();

        let bindings = store.bindings_for(AOR).await.unwrap();
        assert_eq!(bindings.len(), 1);
        assert_eq!(bindings[0].class, BindingClass::Static);
        assert!(bindings[0].expires.is_never());
    }
}
