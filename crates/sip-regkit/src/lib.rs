// moorage-rs - The Moorage SIP Location Service
// Copyright (C) 2025 James Ferris <ferrous.communications@gmail.com>
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Test harness for REGISTER processing.
//!
//! Provides ready-made REGISTER requests and scripted stand-ins for the
//! transaction layer, the authorization module and the homedomain oracle.
//!
//! # Example
//! ```
//! use sip_regkit::build_register;
//! let req = build_register("sip:alice@example.com", "<sip:u@1.2.3.4>", "call-1", 1);
//! assert_eq!(req.method().as_str(), "REGISTER");
//! ```

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use sip_location::{
    canonical_aor, AuthDecision, ChallengeKind, ExtraHeaders, HomedomainOracle,
    RegisterAuth, ResponseSink,
};
use sip_model::{Headers, Method, Request, RequestLine, SipUri};
use smol_str::SmolStr;

/// Constructs a REGISTER for the given AOR with one Contact value.
///
/// The request URI is the AOR's domain; callers add further headers
/// (Expires, Path, Supported, extra Contacts) through `headers_mut()`.
pub fn build_register(aor: &str, contact: &str, call_id: &str, cseq: u32) -> Request {
    let aor_uri = SipUri::parse(aor).unwrap();
    let domain = format!("sip:{}", aor_uri.host);

    let mut headers = Headers::new();
    headers.push(
        "Via",
        "SIP/2.0/UDP client.example.com:5060;branch=z9hG4bKreg123",
    );
    headers.push("From", format!("<{}>;tag=reg1", aor));
    headers.push("To", format!("<{}>", aor));
    headers.push("Call-ID", call_id.to_owned());
    headers.push("CSeq", format!("{} REGISTER", cseq));
    headers.push("Max-Forwards", "70");
    headers.push("Contact", contact.to_owned());
    headers.push("Content-Length", "0");

    Request::new(
        RequestLine::new(Method::Register, SipUri::parse(&domain).unwrap()),
        headers,
        Bytes::new(),
    )
    .unwrap()
}

/// Constructs a wildcard deregistration REGISTER.
///
/// `expires` is the raw Expires header value; pass `None` to omit the
/// header entirely.
pub fn build_wildcard_register(
    aor: &str,
    call_id: &str,
    cseq: u32,
    expires: Option<&str>,
) -> Request {
    let mut request = build_register(aor, "*", call_id, cseq);
    if let Some(value) = expires {
        request.headers_mut().push("Expires", value.to_owned());
    }
    request
}

/// One message captured by [`RecordingSink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SentMessage {
    Response {
        status: u16,
        reason: SmolStr,
        extra_headers: ExtraHeaders,
    },
    Challenge {
        kind: ChallengeKind,
        stale: bool,
        retry_after: Option<u32>,
    },
}

/// Transaction-layer stand-in that records every emitted message.
#[derive(Debug, Default)]
pub struct RecordingSink {
    sent: Mutex<Vec<SentMessage>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything emitted so far, in order.
    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().clone()
    }

    /// The single message a well-behaved REGISTER flow emits.
    ///
    /// Panics when zero or more than one message was sent.
    pub fn only(&self) -> SentMessage {
        let sent = self.sent.lock();
        assert_eq!(sent.len(), 1, "expected exactly one message, got {:?}", *sent);
        sent[0].clone()
    }

    /// Value of the given header in the recorded response, if any.
    pub fn response_header(&self, name: &str) -> Option<Vec<SmolStr>> {
        match self.only() {
            SentMessage::Response { extra_headers, .. } => extra_headers
                .into_iter()
                .find(|(header, _)| header.as_str() == name)
                .map(|(_, values)| values),
            SentMessage::Challenge { .. } => None,
        }
    }
}

#[async_trait]
impl ResponseSink for RecordingSink {
    async fn send_response(
        &self,
        status: u16,
        reason: &str,
        extra_headers: ExtraHeaders,
    ) -> Result<()> {
        self.sent.lock().push(SentMessage::Response {
            status,
            reason: SmolStr::new(reason),
            extra_headers,
        });
        Ok(())
    }

    async fn send_challenge(
        &self,
        kind: ChallengeKind,
        stale: bool,
        retry_after: Option<u32>,
    ) -> Result<()> {
        self.sent.lock().push(SentMessage::Challenge {
            kind,
            stale,
            retry_after,
        });
        Ok(())
    }
}

/// Homedomain oracle over a fixed host list.
#[derive(Debug, Default)]
pub struct StaticHomedomains {
    hosts: Vec<SmolStr>,
}

impl StaticHomedomains {
    pub fn new(hosts: &[&str]) -> Self {
        Self {
            hosts: hosts.iter().map(|h| SmolStr::new(*h)).collect(),
        }
    }
}

impl HomedomainOracle for StaticHomedomains {
    fn is_homedomain(&self, host: &str) -> bool {
        self.hosts.iter().any(|h| h.eq_ignore_ascii_case(host))
    }
}

/// Authorization stand-in that admits everyone as their canonical To-URI.
#[derive(Debug, Default)]
pub struct AcceptAllAuth;

#[async_trait]
impl RegisterAuth for AcceptAllAuth {
    async fn can_register(&self, _headers: &Headers, to_uri: &SipUri) -> Result<AuthDecision> {
        Ok(AuthDecision::Ok {
            user: canonical_aor(to_uri),
        })
    }
}

/// Authorization stand-in that always returns a fixed decision.
#[derive(Debug)]
pub struct ScriptedAuth {
    decision: AuthDecision,
}

impl ScriptedAuth {
    pub fn new(decision: AuthDecision) -> Self {
        Self { decision }
    }
}

#[async_trait]
impl RegisterAuth for ScriptedAuth {
    async fn can_register(&self, _headers: &Headers, _to_uri: &SipUri) -> Result<AuthDecision> {
        Ok(self.decision.clone())
    }
}
