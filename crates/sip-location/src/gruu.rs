// moorage-rs - The Moorage SIP Location Service
// Copyright (C) 2025 James Ferris <ferrous.communications@gmail.com>
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! GRUU registry: (AOR, instance-id) → opaque token.
//!
//! Entries are created lazily at the first registration of a new instance
//! and never deleted here; reaping is an external janitor's job.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use rand::{distributions::Alphanumeric, thread_rng, Rng};
use sip_model::SipUri;
use smol_str::SmolStr;

/// One GRUU registry row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GruuEntry {
    pub instance_id: SmolStr,
    pub token: SmolStr,
}

/// GRUU issuance and URL construction.
#[async_trait]
pub trait GruuFactory: Send + Sync {
    /// Looks up the entry for (aor, instance-id), if one exists.
    async fn fetch_or_none(&self, aor: &str, instance_id: &str) -> Result<Option<GruuEntry>>;

    /// Returns the existing entry or creates one with a fresh token.
    async fn create_if_not_exists(&self, aor: &str, instance_id: &str) -> Result<GruuEntry>;

    /// Builds the globally routable URI advertised for this instance.
    fn make_url(
        &self,
        aor: &str,
        instance_id: &str,
        token: &str,
        to_uri: &SipUri,
    ) -> Option<SipUri>;
}

/// In-memory GRUU registry issuing random alphanumeric tokens.
#[derive(Debug, Default, Clone)]
pub struct MemoryGruuRegistry {
    entries: Arc<DashMap<(SmolStr, SmolStr), GruuEntry>>,
}

impl MemoryGruuRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn fresh_token() -> SmolStr {
        let token: String = thread_rng()
            .sample_iter(&Alphanumeric)
            .take(16)
            .map(char::from)
            .collect();
        SmolStr::new(token)
    }
}

#[async_trait]
impl GruuFactory for MemoryGruuRegistry {
    async fn fetch_or_none(&self, aor: &str, instance_id: &str) -> Result<Option<GruuEntry>> {
        let key = (SmolStr::new(aor), SmolStr::new(instance_id));
        Ok(self.entries.get(&key).map(|entry| entry.clone()))
    }

    async fn create_if_not_exists(&self, aor: &str, instance_id: &str) -> Result<GruuEntry> {
        let key = (SmolStr::new(aor), SmolStr::new(instance_id));
        let entry = self
            .entries
            .entry(key)
            .or_insert_with(|| GruuEntry {
                instance_id: SmolStr::new(instance_id),
                token: Self::fresh_token(),
            })
            .clone();
        Ok(entry)
    }

    /// GRUUs are the AOR URI carrying a `gr` parameter, draft-ietf-sip-gruu.
    fn make_url(
        &self,
        _aor: &str,
        _instance_id: &str,
        token: &str,
        to_uri: &SipUri,
    ) -> Option<SipUri> {
        let mut url = to_uri.clone();
        url.params.clear();
        url.set_param("gr", Some(SmolStr::new(token)));
        Some(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_is_idempotent() {
        let registry = MemoryGruuRegistry::new();
        let first = registry
            .create_if_not_exists("sip:alice@example.com", "<urn:uuid:1>")
            .await
            .unwrap();
        let second = registry
            .create_if_not_exists("sip:alice@example.com", "<urn:uuid:1>")
            .await
            .unwrap();
        assert_eq!(first.token, second.token);
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn distinct_instances_get_distinct_tokens() {
        let registry = MemoryGruuRegistry::new();
        let a = registry
            .create_if_not_exists("sip:alice@example.com", "<urn:uuid:1>")
            .await
            .unwrap();
        let b = registry
            .create_if_not_exists("sip:alice@example.com", "<urn:uuid:2>")
            .await
            .unwrap();
        assert_ne!(a.token, b.token);
        assert_eq!(registry.len(), 2);
    }

    #[tokio::test]
    async fn fetch_or_none_misses_cleanly() {
        let registry = MemoryGruuRegistry::new();
        assert!(registry
            .fetch_or_none("sip:alice@example.com", "<urn:uuid:1>")
            .await
            .unwrap()
            .is_none());
    }

    #[test]
    fn make_url_carries_gr_param() {
        let registry = MemoryGruuRegistry::new();
        let to_uri = SipUri::parse("sip:alice@example.com;transport=tcp").unwrap();
        let url = registry
            .make_url("sip:alice@example.com", "<urn:uuid:1>", "tok123", &to_uri)
            .unwrap();
        assert_eq!(url.to_string(), "sip:alice@example.com;gr=tok123");
    }
}
