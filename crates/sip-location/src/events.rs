// moorage-rs - The Moorage SIP Location Service
// Copyright (C) 2025 James Ferris <ferrous.communications@gmail.com>
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Structured registration events for the surrounding proxy's event plane.

use once_cell::sync::OnceCell;
use smol_str::SmolStr;
use std::sync::Arc;

/// Event sink notified about registration outcomes.
///
/// Implementations should treat `user` and `address` as already-authenticated
/// identifiers; contact URIs may be attacker-influenced and belong in
/// structured fields, not free-form log text.
pub trait RegistrarEvents: Send + Sync + 'static {
    fn on_register_ok(&self, user: &str, contacts: &[SmolStr]);
    fn on_register_forbidden(&self, user: &str, address: &str);
    fn on_register_invalid_address(&self, user: &str, address: &str);
}

static REGISTRAR_EVENTS: OnceCell<Arc<dyn RegistrarEvents>> = OnceCell::new();
static TRACING_EVENTS: TracingRegistrarEvents = TracingRegistrarEvents;

/// Installs the global registration event sink.
///
/// Returns `true` if the sink was installed, or `false` if one was already
/// configured.
pub fn set_registrar_events(events: Arc<dyn RegistrarEvents>) -> bool {
    REGISTRAR_EVENTS.set(events).is_ok()
}

/// Returns the configured event sink, defaulting to tracing-backed events.
pub fn registrar_events() -> &'static dyn RegistrarEvents {
    REGISTRAR_EVENTS
        .get()
        .map(|arc| arc.as_ref())
        .unwrap_or(&TRACING_EVENTS)
}

/// Event sink that emits registration events via `tracing`.
#[derive(Debug, Default)]
pub struct TracingRegistrarEvents;

impl RegistrarEvents for TracingRegistrarEvents {
    fn on_register_ok(&self, user: &str, contacts: &[SmolStr]) {
        tracing::info!(user, ?contacts, "register ok");
    }

    fn on_register_forbidden(&self, user: &str, address: &str) {
        tracing::info!(user, address, "register forbidden");
    }

    fn on_register_invalid_address(&self, user: &str, address: &str) {
        tracing::info!(user, address, "register invalid address");
    }
}
