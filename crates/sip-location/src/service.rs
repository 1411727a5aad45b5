// moorage-rs - The Moorage SIP Location Service
// Copyright (C) 2025 James Ferris <ferrous.communications@gmail.com>
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! REGISTER orchestration: domain check, extension negotiation,
//! authentication delegation, update application and response emission.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use sip_model::{
    contact_values, parse_name_addr, token_list_from_headers, Headers, Request, SipUri,
};
use smol_str::SmolStr;
use tracing::{debug, error, info, warn};

use crate::compose::compose_ok;
use crate::config::LocationConfig;
use crate::error::{ExtraHeaders, SipError};
use crate::events::registrar_events;
use crate::gruu::GruuFactory;
use crate::path::build_path_vector;
use crate::store::{canonical_aor, BindingStore};
use crate::update::apply_contacts;
use crate::wildcard;

/// Where this node sits relative to the registering UA.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterRole {
    IncomingProxy,
    OutgoingProxy,
}

/// Result of [`LocationService::process_register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterOutcome {
    /// A response or challenge was emitted through the sink.
    Processed,
    /// The request URI is not ours; the proxy core should forward it.
    /// No response was emitted.
    NotHomedomain,
}

/// Realm of an authentication challenge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeKind {
    Www,
    Proxy,
}

/// Outcome of the authorization collaborator's REGISTER decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthDecision {
    /// Authenticated and allowed to register the address.
    Ok { user: SmolStr },
    /// Credentials were valid once; a fresh challenge is needed.
    Stale,
    /// Authenticated but not allowed to register this address.
    Forbidden { user: SmolStr },
    /// Authenticated but the address is unknown.
    NoMatch { user: SmolStr },
    /// No usable credentials; challenge the UA.
    Unauthenticated,
}

/// Answers whether a host is one this registrar is authoritative for.
pub trait HomedomainOracle: Send + Sync {
    fn is_homedomain(&self, host: &str) -> bool;
}

/// Authentication/authorization collaborator.
///
/// The challenge/response computation itself lives behind this seam; the
/// location service only routes its verdicts.
#[async_trait]
pub trait RegisterAuth: Send + Sync {
    async fn can_register(&self, headers: &Headers, to_uri: &SipUri) -> Result<AuthDecision>;
}

/// Handle into the transaction layer for emitting the reply.
#[async_trait]
pub trait ResponseSink: Send + Sync {
    async fn send_response(
        &self,
        status: u16,
        reason: &str,
        extra_headers: ExtraHeaders,
    ) -> Result<()>;

    async fn send_challenge(
        &self,
        kind: ChallengeKind,
        stale: bool,
        retry_after: Option<u32>,
    ) -> Result<()>;
}

/// The location service core: interprets REGISTER requests and mutates the
/// binding database.
pub struct LocationService<S, G> {
    store: Arc<S>,
    gruu: Arc<G>,
    auth: Arc<dyn RegisterAuth>,
    homedomain: Arc<dyn HomedomainOracle>,
    config: LocationConfig,
}

impl<S, G> LocationService<S, G>
where
    S: BindingStore,
    G: GruuFactory,
{
    pub fn new(
        store: Arc<S>,
        gruu: Arc<G>,
        auth: Arc<dyn RegisterAuth>,
        homedomain: Arc<dyn HomedomainOracle>,
        config: LocationConfig,
    ) -> Self {
        Self {
            store,
            gruu,
            auth,
            homedomain,
            config,
        }
    }

    /// The binding store, for the proxy's routing lookups.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn config(&self) -> &LocationConfig {
        &self.config
    }

    /// Processes one REGISTER request end to end.
    ///
    /// Emits at most one response or challenge through `sink`. Returns
    /// [`RegisterOutcome::NotHomedomain`] without emitting anything when
    /// the request URI belongs to someone else.
    pub async fn process_register(
        &self,
        request: &Request,
        sink: &dyn ResponseSink,
        log_tag: &str,
        log_description: &str,
        role: RegisterRole,
    ) -> Result<RegisterOutcome> {
        let host = request.uri().host.clone();
        if !self.homedomain.is_homedomain(host.as_str()) {
            debug!(tag = log_tag, host = %host, "REGISTER not for a homedomain, forwarding");
            return Ok(RegisterOutcome::NotHomedomain);
        }

        let require = token_list_from_headers(request.headers(), "Require");
        let rejected: Vec<SmolStr> = require
            .tokens()
            .iter()
            .filter(|token| !self.extension_supported(token))
            .cloned()
            .collect();
        if !rejected.is_empty() {
            info!(tag = log_tag, ?rejected, "REGISTER requires unsupported extensions");
            sink.send_response(
                420,
                "Bad Extension",
                vec![(SmolStr::new("Unsupported"), rejected)],
            )
            .await?;
            return Ok(RegisterOutcome::Processed);
        }

        // RFC 3261 §10.3: ignore any Record-Route from here on
        let mut headers = request.headers().clone();
        headers.delete("Record-Route");

        let Some(to_addr) = headers.get("To").and_then(|value| parse_name_addr(value)) else {
            warn!(tag = log_tag, "REGISTER with missing or invalid To header");
            sink.send_response(400, "Invalid To header", Vec::new()).await?;
            return Ok(RegisterOutcome::Processed);
        };
        let to_uri = to_addr.uri.clone();

        let Some(call_id) = headers.get("Call-ID").cloned() else {
            warn!(tag = log_tag, "REGISTER without Call-ID");
            sink.send_response(400, "Missing Call-ID header", Vec::new()).await?;
            return Ok(RegisterOutcome::Processed);
        };
        let Some(cseq) = headers.get("CSeq").and_then(|value| parse_cseq(value)) else {
            warn!(tag = log_tag, "REGISTER with missing or invalid CSeq");
            sink.send_response(400, "Invalid CSeq header", Vec::new()).await?;
            return Ok(RegisterOutcome::Processed);
        };

        let user = match self.auth.can_register(&headers, &to_uri).await {
            Err(cause) => {
                error!(tag = log_tag, desc = log_description, %cause, "authorization check failed");
                sink.send_response(500, "Server Internal Error", Vec::new()).await?;
                return Ok(RegisterOutcome::Processed);
            }
            Ok(AuthDecision::Ok { user }) => user,
            Ok(AuthDecision::Stale) => {
                info!(tag = log_tag, "REGISTER with stale credentials, re-challenging");
                sink.send_challenge(ChallengeKind::Www, true, None).await?;
                return Ok(RegisterOutcome::Processed);
            }
            Ok(AuthDecision::Forbidden { user }) => {
                let address = canonical_aor(&to_uri);
                info!(tag = log_tag, user = %user, address = %address, "REGISTER forbidden");
                sink.send_response(403, "Forbidden", Vec::new()).await?;
                registrar_events().on_register_forbidden(user.as_str(), address.as_str());
                return Ok(RegisterOutcome::Processed);
            }
            Ok(AuthDecision::NoMatch { user }) => {
                let address = canonical_aor(&to_uri);
                info!(tag = log_tag, user = %user, address = %address, "REGISTER for unknown address");
                sink.send_response(404, "Not Found", Vec::new()).await?;
                registrar_events().on_register_invalid_address(user.as_str(), address.as_str());
                return Ok(RegisterOutcome::Processed);
            }
            Ok(AuthDecision::Unauthenticated) => {
                if headers.contains("Authorization") {
                    info!(tag = log_tag, "REGISTER authentication failed, challenging");
                } else {
                    debug!(tag = log_tag, "REGISTER without credentials, challenging");
                }
                sink.send_challenge(ChallengeKind::Www, false, None).await?;
                return Ok(RegisterOutcome::Processed);
            }
        };

        let sips = request.uri().sips;
        match self
            .apply_update(&headers, sips, role, user.as_str(), &call_id, cseq)
            .await
        {
            Ok(Ok(path_echo)) => {
                match compose_ok(
                    self.store.as_ref(),
                    self.gruu.as_ref(),
                    &self.config,
                    user.as_str(),
                    &headers,
                    &to_uri,
                    &path_echo,
                )
                .await
                {
                    Ok(composed) => {
                        sink.send_response(200, "OK", composed.extra_headers).await?;
                        info!(tag = log_tag, user = %user, contacts = ?composed.contacts, "REGISTER ok");
                        registrar_events().on_register_ok(user.as_str(), &composed.contacts);
                    }
                    Err(cause) => {
                        error!(tag = log_tag, desc = log_description, %cause, "response composition failed");
                        sink.send_response(500, "Server Internal Error", Vec::new()).await?;
                    }
                }
            }
            Ok(Err(sip_error)) => {
                info!(tag = log_tag, user = %user, error = %sip_error, "REGISTER rejected");
                sink.send_response(
                    sip_error.status,
                    sip_error.reason.as_str(),
                    sip_error.extra_headers,
                )
                .await?;
            }
            Err(cause) => {
                error!(tag = log_tag, desc = log_description, %cause, "REGISTER processing failed");
                sink.send_response(500, "Server Internal Error", Vec::new()).await?;
            }
        }

        Ok(RegisterOutcome::Processed)
    }

    /// An extension named in `Require` we can honour.
    fn extension_supported(&self, token: &str) -> bool {
        token.eq_ignore_ascii_case("path")
            || (token.eq_ignore_ascii_case("gruu") && self.config.experimental_gruu_enable)
    }

    /// Runs the wildcard handler or the per-contact updater, returning the
    /// Path echo for the response on success.
    async fn apply_update(
        &self,
        headers: &Headers,
        sips: bool,
        role: RegisterRole,
        aor: &str,
        call_id: &SmolStr,
        cseq: u32,
    ) -> Result<Result<Vec<SmolStr>, SipError>> {
        let contacts = match contact_values(headers) {
            Ok(contacts) => contacts,
            Err(raw) => {
                warn!(contact = %raw, "REGISTER with unparseable contact");
                return Ok(Err(SipError::new(400, "Invalid Contact header")));
            }
        };

        let path = match build_path_vector(headers, sips, role, &self.config) {
            Ok(path) => path,
            Err(sip_error) => return Ok(Err(sip_error)),
        };

        if wildcard::is_wildcard_register(&contacts) {
            if let Err(sip_error) = wildcard::validate_wildcard(headers, &contacts) {
                return Ok(Err(sip_error));
            }
            match wildcard::remove_all_bindings(self.store.as_ref(), aor, call_id, cseq).await? {
                Ok(()) => Ok(Ok(path.echo)),
                Err(sip_error) => Ok(Err(sip_error)),
            }
        } else {
            match apply_contacts(
                self.store.as_ref(),
                self.gruu.as_ref(),
                &self.config,
                aor,
                call_id,
                cseq,
                headers,
                &contacts,
                &path,
            )
            .await?
            {
                Ok(()) => Ok(Ok(path.echo)),
                Err(sip_error) => Ok(Err(sip_error)),
            }
        }
    }
}

fn parse_cseq(value: &str) -> Option<u32> {
    let mut parts = value.split_whitespace();
    let number = parts.next()?.parse().ok()?;
    let method = parts.next().unwrap_or("");
    method.eq_ignore_ascii_case("REGISTER").then_some(number)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cseq_requires_register_method() {
        assert_eq!(parse_cseq("101 REGISTER"), Some(101));
        assert_eq!(parse_cseq("101 register"), Some(101));
        assert_eq!(parse_cseq("101 INVITE"), None);
        assert_eq!(parse_cseq("101"), None);
        assert_eq!(parse_cseq("abc REGISTER"), None);
    }
}
