// moorage-rs - The Moorage SIP Location Service
// Copyright (C) 2025 James Ferris <ferrous.communications@gmail.com>
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Property tests for the binding database invariants.

use std::collections::{HashMap, HashSet};
use std::future::Future;

use proptest::prelude::*;
use sip_location::{
    apply_contacts, effective_expiry, remove_all_bindings, unix_now, BindingStore,
    LocationConfig, MemoryBindingStore, MemoryGruuRegistry, PathVector, DEFAULT_REGISTER_EXPIRY,
};
use sip_model::{Contact, Headers};
use smol_str::SmolStr;

const AOR: &str = "sip:prop@example.com";

fn run<F: Future>(fut: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("runtime")
        .block_on(fut)
}

/// One synthetic REGISTER touching a single contact.
#[derive(Debug, Clone)]
struct RegisterOp {
    call: u8,
    cseq: u32,
    contact: u8,
    expires: u64,
}

fn register_op() -> impl Strategy<Value = RegisterOp> {
    (
        0..3u8,
        1..40u32,
        0..3u8,
        prop_oneof![Just(0u64), Just(15), Just(60), Just(90_000)],
    )
        .prop_map(|(call, cseq, contact, expires)| RegisterOp {
            call,
            cseq,
            contact,
            expires,
        })
}

fn call_id(op: &RegisterOp) -> SmolStr {
    SmolStr::new(format!("call-{}", op.call))
}

fn contact_key(op: &RegisterOp) -> String {
    format!("sip:c{}@10.0.0.{}", op.contact, op.contact + 1)
}

fn contact_value(op: &RegisterOp) -> Vec<Contact> {
    vec![Contact::parse(&format!("<{}>;expires={}", contact_key(op), op.expires)).unwrap()]
}

async fn apply_op(
    store: &MemoryBindingStore,
    gruu: &MemoryGruuRegistry,
    op: &RegisterOp,
) -> Result<(), u16> {
    apply_contacts(
        store,
        gruu,
        &LocationConfig::default(),
        AOR,
        &call_id(op),
        op.cseq,
        &Headers::new(),
        &contact_value(op),
        &PathVector::default(),
    )
    .await
    .unwrap()
    .map_err(|e| e.status)
}

/// Reference model of the per-contact state machine.
#[derive(Debug, Default)]
struct Model {
    rows: HashMap<String, (SmolStr, u32, u64)>,
}

impl Model {
    fn apply(&mut self, op: &RegisterOp) -> Result<(), u16> {
        let key = contact_key(op);
        let call = call_id(op);
        if let Some((stored_call, stored_cseq, _)) = self.rows.get(&key) {
            if *stored_call == call && op.cseq <= *stored_cseq {
                return Err(403);
            }
        }
        if op.expires == 0 {
            self.rows.remove(&key);
        } else {
            self.rows.insert(key, (call, op.cseq, op.expires));
        }
        Ok(())
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Uniqueness and same-dialog monotonicity against a reference model.
    #[test]
    fn store_matches_state_machine_model(ops in prop::collection::vec(register_op(), 1..25)) {
        run(async {
            let store = MemoryBindingStore::new();
            let gruu = MemoryGruuRegistry::new();
            let mut model = Model::default();

            for op in &ops {
                let got = apply_op(&store, &gruu, op).await;
                let want = model.apply(op);
                prop_assert_eq!(got, want, "op {:?}", op);

                // uniqueness of (aor, contact) after every step
                let bindings = store.bindings_for(AOR).await.unwrap();
                let keys: HashSet<_> = bindings.iter().map(|b| b.contact_key.clone()).collect();
                prop_assert_eq!(keys.len(), bindings.len());
            }

            // final store state matches the model row for row
            let bindings = store.bindings_for(AOR).await.unwrap();
            prop_assert_eq!(bindings.len(), model.rows.len());
            for binding in &bindings {
                let (call, cseq, _) = &model.rows[binding.contact_key.as_str()];
                prop_assert_eq!(&binding.call_id, call);
                prop_assert_eq!(binding.cseq, *cseq);
            }
            Ok(())
        })?;
    }

    /// Re-sending a successful REGISTER unchanged is rejected with 403;
    /// the CSeq comparison is strict.
    #[test]
    fn identical_resend_is_rejected(op in register_op()) {
        run(async {
            let store = MemoryBindingStore::new();
            let gruu = MemoryGruuRegistry::new();

            prop_assume!(op.expires != 0);
            apply_op(&store, &gruu, &op).await.unwrap();
            prop_assert_eq!(apply_op(&store, &gruu, &op).await, Err(403));
            Ok(())
        })?;
    }

    /// After a successful wildcard at CSeq C in dialog L, no dynamic binding
    /// with prior state (callId != L or cseq < C) survives; a binding at or
    /// above C in the same dialog aborts everything.
    #[test]
    fn wildcard_totality(ops in prop::collection::vec(register_op(), 1..15),
                         wipe_call in 0..4u8, wipe_cseq in 1..50u32) {
        run(async {
            let store = MemoryBindingStore::new();
            let gruu = MemoryGruuRegistry::new();
            let mut model = Model::default();
            for op in &ops {
                let _ = apply_op(&store, &gruu, op).await;
                let _ = model.apply(op);
            }

            let before = store.bindings_for(AOR).await.unwrap();
            let wipe_call = SmolStr::new(format!("call-{}", wipe_call));
            let blocked = before
                .iter()
                .any(|b| b.call_id == wipe_call && b.cseq >= wipe_cseq);

            let result = remove_all_bindings(&store, AOR, &wipe_call, wipe_cseq)
                .await
                .unwrap();
            let after = store.bindings_for(AOR).await.unwrap();

            if blocked {
                prop_assert_eq!(result.unwrap_err().status, 403);
                prop_assert_eq!(after.len(), before.len());
            } else {
                prop_assert!(result.is_ok());
                prop_assert!(after.is_empty());
            }
            Ok(())
        })?;
    }

    /// Stored expiry for a contact without its own expires= parameter is
    /// now + min(max_register_time, header value or 3600).
    #[test]
    fn header_expires_clamping(header in prop::option::of(1..200_000u64)) {
        run(async {
            let store = MemoryBindingStore::new();
            let gruu = MemoryGruuRegistry::new();
            let config = LocationConfig::default();

            let mut headers = Headers::new();
            if let Some(value) = header {
                headers.push("Expires", value.to_string());
            }
            let contacts = vec![Contact::parse("<sip:c@10.0.0.1>").unwrap()];
            let before = unix_now();
            apply_contacts(
                &store,
                &gruu,
                &config,
                AOR,
                &SmolStr::new("call-0"),
                1,
                &headers,
                &contacts,
                &PathVector::default(),
            )
            .await
            .unwrap()
            .unwrap();

            let expected = before + effective_expiry(header, config.max_register_time);
            let bindings = store.bindings_for(AOR).await.unwrap();
            let remaining = bindings[0].expires.remaining(0);
            prop_assert!(remaining >= expected && remaining <= expected + 2,
                "stored {} expected {}", remaining, expected);
            Ok(())
        })?;
    }

    /// The pure clamp: default 3600 with no request, min against the cap
    /// otherwise, no lower bound.
    #[test]
    fn effective_expiry_bounds(requested in prop::option::of(0..500_000u64),
                               max in 1..100_000u64) {
        let effective = effective_expiry(requested, max);
        match requested {
            None => prop_assert_eq!(effective, DEFAULT_REGISTER_EXPIRY),
            Some(n) => {
                prop_assert!(effective <= max);
                prop_assert!(effective <= n);
                prop_assert_eq!(effective, n.min(max));
            }
        }
    }
}
