// moorage-rs - The Moorage SIP Location Service
// Copyright (C) 2025 James Ferris <ferrous.communications@gmail.com>
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The binding database: AOR → registered contacts.
//!
//! All mutation driven by one REGISTER happens inside a single per-AOR
//! transaction with commit-or-rollback semantics; reads are
//! non-transactional snapshots suitable for routing decisions.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use sip_model::SipUri;
use smol_str::SmolStr;

use crate::error::SipError;

/// Seconds since the Unix epoch.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// Canonical AOR string for a SIP URI: scheme, user and lowercased host,
/// URI parameters stripped.
pub fn canonical_aor(uri: &SipUri) -> SmolStr {
    let mut bare = uri.clone();
    bare.params.clear();
    bare.canonical()
}

/// Provenance of a binding row.
///
/// Only dynamic bindings are created, refreshed or removed by REGISTER
/// processing; static rows are operator-provisioned and read-only here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingClass {
    Dynamic,
    Static,
}

/// Absolute expiry of a binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiry {
    /// Seconds since the Unix epoch.
    At(u64),
    /// Only valid for static bindings.
    Never,
}

impl Expiry {
    pub fn is_never(&self) -> bool {
        matches!(self, Expiry::Never)
    }

    /// Seconds left until expiry, zero once passed or for `Never`.
    pub fn remaining(&self, now: u64) -> u64 {
        match self {
            Expiry::At(at) => at.saturating_sub(now),
            Expiry::Never => 0,
        }
    }
}

/// Typed attributes attached to a binding.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BindingFlags {
    pub priority: Option<u32>,
    pub registration_time: u64,
    /// Raw string between the quotes of a `+sip.instance` parameter.
    pub instance_id: Option<SmolStr>,
    /// Path vector, ingress to egress order.
    pub path: Vec<SmolStr>,
}

/// One row of the binding database: a reachable contact of one AOR.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub aor: SmolStr,
    pub contact: SipUri,
    /// Canonical serialization of `contact`; the stable equality key within
    /// an AOR and the reverse lookup key.
    pub contact_key: SmolStr,
    pub class: BindingClass,
    pub expires: Expiry,
    /// Call-ID of the REGISTER that last wrote this row.
    pub call_id: SmolStr,
    /// CSeq of that REGISTER.
    pub cseq: u32,
    pub flags: BindingFlags,
}

impl Binding {
    /// False once a dynamic binding's expiry has passed.
    pub fn is_active(&self, now: u64) -> bool {
        match (&self.class, &self.expires) {
            (BindingClass::Dynamic, Expiry::At(at)) => *at > now,
            _ => true,
        }
    }
}

/// Transaction body run over one AOR's bindings.
///
/// Returning `Err` signals rollback: the store discards every change the
/// closure made and surfaces the error unchanged.
pub type TxnFn<'a> = &'a (dyn Fn(&mut Vec<Binding>) -> Result<(), SipError> + Send + Sync);

/// Persistent, transactional storage for registration bindings.
#[async_trait]
pub trait BindingStore: Send + Sync {
    /// Non-transactional snapshot of the active bindings for one AOR.
    async fn bindings_for(&self, aor: &str) -> Result<Vec<Binding>>;

    /// AORs whose bindings include the given canonical contact URI, in
    /// lexicographic order.
    async fn aors_for_contact(&self, contact_key: &str) -> Result<Vec<SmolStr>>;

    /// Runs `txn` over the AOR's bindings, serialized against every other
    /// transaction on the same AOR.
    ///
    /// The outer error is a storage failure; the inner one is the rollback
    /// signal raised by the transaction body, after which no partial
    /// changes persist.
    async fn transact(&self, aor: &str, txn: TxnFn<'_>) -> Result<Result<(), SipError>>;

    /// Removes dynamic bindings whose expiry has passed; returns the count.
    async fn prune_expired(&self) -> Result<usize>;
}

/// In-memory binding store with a per-AOR writer lock and a contact-URI
/// reverse index.
#[derive(Debug, Default, Clone)]
pub struct MemoryBindingStore {
    inner: Arc<DashMap<SmolStr, Vec<Binding>>>,
    by_contact: Arc<DashMap<SmolStr, BTreeSet<SmolStr>>>,
}

impl MemoryBindingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Provisions a read-only static binding, replacing any row with the
    /// same contact.
    pub fn seed_static(&self, aor: &str, contact: SipUri) {
        let key = SmolStr::new(aor);
        let contact_key = contact.canonical();
        let binding = Binding {
            aor: key.clone(),
            contact_key: contact_key.clone(),
            contact,
            class: BindingClass::Static,
            expires: Expiry::Never,
            call_id: SmolStr::default(),
            cseq: 0,
            flags: BindingFlags {
                registration_time: unix_now(),
                ..BindingFlags::default()
            },
        };
        let mut slot = self.inner.entry(key.clone()).or_default();
        slot.retain(|b| b.contact_key != contact_key);
        slot.push(binding);
        drop(slot);
        self.by_contact
            .entry(contact_key)
            .or_default()
            .insert(key);
    }

    fn unindex(&self, contact_key: &SmolStr, aor: &SmolStr) {
        if let Some(mut set) = self.by_contact.get_mut(contact_key) {
            set.remove(aor);
            let empty = set.is_empty();
            drop(set);
            if empty {
                self.by_contact.remove_if(contact_key, |_, set| set.is_empty());
            }
        }
    }

    fn prune_slot(&self, aor: &SmolStr, slot: &mut Vec<Binding>, now: u64) -> usize {
        let mut removed = Vec::new();
        slot.retain(|b| {
            let keep = b.is_active(now);
            if !keep {
                removed.push(b.contact_key.clone());
            }
            keep
        });
        for contact_key in &removed {
            self.unindex(contact_key, aor);
        }
        removed.len()
    }
}

#[async_trait]
impl BindingStore for MemoryBindingStore {
    async fn bindings_for(&self, aor: &str) -> Result<Vec<Binding>> {
        let key = SmolStr::new(aor);
        let now = unix_now();
        let Some(mut slot) = self.inner.get_mut(&key) else {
            return Ok(Vec::new());
        };
        self.prune_slot(&key, slot.value_mut(), now);
        let bindings = slot.clone();
        drop(slot);
        if bindings.is_empty() {
            self.inner.remove_if(&key, |_, slot| slot.is_empty());
        }
        Ok(bindings)
    }

    async fn aors_for_contact(&self, contact_key: &str) -> Result<Vec<SmolStr>> {
        Ok(self
            .by_contact
            .get(contact_key)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn transact(&self, aor: &str, txn: TxnFn<'_>) -> Result<Result<(), SipError>> {
        let key = SmolStr::new(aor);
        let mut slot = self.inner.entry(key.clone()).or_default();

        // Work on a copy; the entry guard is the serialization point and
        // the copy is the rollback mechanism.
        let mut working = slot.clone();
        match txn(&mut working) {
            Ok(()) => {
                let before: BTreeSet<SmolStr> =
                    slot.iter().map(|b| b.contact_key.clone()).collect();
                let after: BTreeSet<SmolStr> =
                    working.iter().map(|b| b.contact_key.clone()).collect();
                for contact_key in before.difference(&after) {
                    self.unindex(contact_key, &key);
                }
                for contact_key in after.difference(&before) {
                    self.by_contact
                        .entry(contact_key.clone())
                        .or_default()
                        .insert(key.clone());
                }
                let now_empty = working.is_empty();
                *slot = working;
                drop(slot);
                if now_empty {
                    self.inner.remove_if(&key, |_, slot| slot.is_empty());
                }
                Ok(Ok(()))
            }
            Err(err) => Ok(Err(err)),
        }
    }

    async fn prune_expired(&self) -> Result<usize> {
        let now = unix_now();
        let mut removed = 0;
        for mut entry in self.inner.iter_mut() {
            let aor = entry.key().clone();
            removed += self.prune_slot(&aor, entry.value_mut(), now);
        }
        self.inner.retain(|_, slot| !slot.is_empty());
        Ok(removed)
    }
}
