// moorage-rs - The Moorage SIP Location Service
// Copyright (C) 2025 James Ferris <ferrous.communications@gmail.com>
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! RFC 3327 Path vector handling for stored bindings.

use sip_model::{split_quoted_commas, token_list_from_headers, Headers};
use smol_str::SmolStr;
use tracing::debug;

use crate::{config::LocationConfig, error::SipError, service::RegisterRole};

/// The Path list attached to every binding a REGISTER writes, plus the
/// request's own Path values for the response echo.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathVector {
    /// Stored with the binding, ingress to egress order. When acting as an
    /// outgoing edge proxy this starts with our own Record-Route URI.
    pub stored: Vec<SmolStr>,
    /// The request's Path values verbatim; echoed on the 200 per
    /// RFC 3327 §5.3. Empty when the request carried no Path.
    pub echo: Vec<SmolStr>,
}

impl PathVector {
    pub fn is_empty(&self) -> bool {
        self.stored.is_empty()
    }
}

/// Collects every Path value from the headers in arrival order.
pub fn path_header_values(headers: &Headers) -> Vec<SmolStr> {
    let mut values = Vec::new();
    for value in headers.get_all("Path") {
        for part in split_quoted_commas(value.as_str()) {
            values.push(SmolStr::new(part));
        }
    }
    values
}

/// This node's Record-Route URI for the request scheme, as a Path value.
pub fn local_record_route(config: &LocationConfig, sips: bool) -> SmolStr {
    if sips {
        SmolStr::new(format!(
            "<sips:{}:{};lr>",
            config.record_route_host, config.record_route_tls_port
        ))
    } else {
        SmolStr::new(format!(
            "<sip:{}:{};lr>",
            config.record_route_host, config.record_route_port
        ))
    }
}

/// Builds the Path vector for one REGISTER.
///
/// A UA-supplied Path is only accepted when the UA announced
/// `Supported: path`, or when the operator explicitly allows
/// proxy-inserted Path vectors.
pub fn build_path_vector(
    headers: &Headers,
    sips: bool,
    role: RegisterRole,
    config: &LocationConfig,
) -> Result<PathVector, SipError> {
    let supplied = path_header_values(headers);

    if supplied.is_empty() {
        let stored = match role {
            RegisterRole::OutgoingProxy => vec![local_record_route(config, sips)],
            RegisterRole::IncomingProxy => Vec::new(),
        };
        return Ok(PathVector {
            stored,
            echo: Vec::new(),
        });
    }

    let ua_supports_path = token_list_from_headers(headers, "Supported").contains("path");
    if !ua_supports_path {
        if !config.allow_proxy_inserted_path {
            return Err(SipError::new(421, "Extension Required")
                .with_header("Require", vec![SmolStr::new("path")]));
        }
        debug!("accepting Path from UA without Supported: path, operator override");
    }

    let mut stored = Vec::with_capacity(supplied.len() + 1);
    if matches!(role, RegisterRole::OutgoingProxy) {
        stored.push(local_record_route(config, sips));
    }
    stored.extend(supplied.iter().cloned());

    Ok(PathVector {
        stored,
        echo: supplied,
    })
}
