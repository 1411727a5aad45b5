// moorage-rs - The Moorage SIP Location Service
// Copyright (C) 2025 James Ferris <ferrous.communications@gmail.com>
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Location service core of a SIP registrar.
//!
//! Interprets REGISTER requests per RFC 3261 §10, mutates the binding
//! database mapping each address-of-record to its registered contacts, and
//! composes the registrar response. Handles wildcard deregistration,
//! CSeq/Call-ID ordering, Path vectors (RFC 3327) and GRUU issuance
//! (draft-ietf-sip-gruu).
//!
//! The transport/transaction layer, authentication, the user database and
//! the homedomain oracle are external collaborators reached through the
//! traits in [`service`]. All mutation driven by one REGISTER happens
//! inside a single serializable per-AOR transaction.
//!
//! # Example
//! ```no_run
//! use std::sync::Arc;
//! use sip_location::{
//!     LocationConfig, LocationService, MemoryBindingStore, MemoryGruuRegistry,
//!     RegisterRole,
//! };
//! # use sip_location::{HomedomainOracle, RegisterAuth, ResponseSink};
//! # async fn example(
//! #     auth: Arc<dyn RegisterAuth>,
//! #     homedomain: Arc<dyn HomedomainOracle>,
//! #     request: sip_model::Request,
//! #     sink: &dyn ResponseSink,
//! # ) -> anyhow::Result<()> {
//! let service = LocationService::new(
//!     Arc::new(MemoryBindingStore::new()),
//!     Arc::new(MemoryGruuRegistry::new()),
//!     auth,
//!     homedomain,
//!     LocationConfig::default(),
//! );
//! service
//!     .process_register(&request, sink, "core", "registrar", RegisterRole::IncomingProxy)
//!     .await?;
//! # Ok(())
//! # }
//! ```

mod compose;
mod config;
mod error;
mod events;
mod expiry;
mod gruu;
mod path;
mod query;
mod service;
mod store;
mod update;
mod wildcard;

pub use compose::{compose_ok, ComposedOk};
pub use config::LocationConfig;
pub use error::{ExtraHeaders, SipError};
pub use events::{
    registrar_events, set_registrar_events, RegistrarEvents, TracingRegistrarEvents,
};
pub use expiry::{
    contact_expires, effective_expiry, header_expires, requested_expiry,
    DEFAULT_REGISTER_EXPIRY,
};
pub use gruu::{GruuEntry, GruuFactory, MemoryGruuRegistry};
pub use path::{build_path_vector, local_record_route, path_header_values, PathVector};
pub use query::{
    get_locations_for_users, get_user_with_contact, prioritize_locations, to_url,
};
pub use service::{
    AuthDecision, ChallengeKind, HomedomainOracle, LocationService, RegisterAuth,
    RegisterOutcome, RegisterRole, ResponseSink,
};
pub use store::{
    canonical_aor, unix_now, Binding, BindingClass, BindingFlags, BindingStore, Expiry,
    MemoryBindingStore, TxnFn,
};
pub use update::{apply_contacts, DEFAULT_CONTACT_PRIORITY};
pub use wildcard::{is_wildcard_register, remove_all_bindings, validate_wildcard};
