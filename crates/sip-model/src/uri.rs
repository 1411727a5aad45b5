// moorage-rs - The Moorage SIP Location Service
// Copyright (C) 2025 James Ferris <ferrous.communications@gmail.com>
// SPDX-License-Identifier: Apache-2.0 OR MIT

use std::collections::BTreeMap;
use std::fmt;

use smol_str::SmolStr;

/// Parsed representation of a SIP or SIPS URI (RFC 3261 §19).
///
/// The registrar keys the binding database on the canonical serialization,
/// so hosts are lowercased at parse time and URI parameters are kept in a
/// sorted map to make the printed form stable regardless of input order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SipUri {
    pub raw: SmolStr,
    pub sips: bool,
    pub user: Option<SmolStr>,
    pub host: SmolStr,
    pub port: Option<u16>,
    pub params: BTreeMap<SmolStr, Option<SmolStr>>,
}

impl SipUri {
    /// Constructs a `sip:` URI with the given host and default settings.
    pub fn new(host: impl Into<SmolStr>) -> Self {
        let host = host.into();
        Self {
            raw: host.clone(),
            sips: false,
            user: None,
            host,
            port: None,
            params: BTreeMap::new(),
        }
    }

    /// Attempts to parse a SIP or SIPS URI from the provided string.
    pub fn parse(input: &str) -> Option<Self> {
        let raw = SmolStr::new(input);
        let (scheme, rest) = input.split_once(':')?;
        let sips = scheme.eq_ignore_ascii_case("sips");
        if !sips && !scheme.eq_ignore_ascii_case("sip") {
            return None;
        }

        // URI headers (?name=value) are not meaningful for binding keys.
        let addr_part = match rest.split_once('?') {
            Some((addr, _headers)) => addr,
            None => rest,
        };

        let mut params = BTreeMap::new();
        let mut addr_iter = addr_part.split(';');
        let base = addr_iter.next()?.trim();
        for param in addr_iter {
            let param = param.trim();
            if param.is_empty() {
                continue;
            }
            if let Some((k, v)) = param.split_once('=') {
                params.insert(
                    SmolStr::new(k.trim().to_ascii_lowercase()),
                    Some(SmolStr::new(v.trim())),
                );
            } else {
                params.insert(SmolStr::new(param.to_ascii_lowercase()), None);
            }
        }

        let (user, host_port) = match base.split_once('@') {
            Some((user, host)) => {
                let user = user.trim();
                if user.is_empty() {
                    return None;
                }
                (Some(SmolStr::new(user)), host.trim())
            }
            None => (None, base.trim()),
        };

        if host_port.is_empty() {
            return None;
        }

        let (host, port) = split_host_port(host_port)?;

        Some(Self {
            raw,
            sips,
            user,
            host: SmolStr::new(host.to_ascii_lowercase()),
            port,
            params,
        })
    }

    /// Returns the scheme token, `sip` or `sips`.
    pub fn scheme(&self) -> &'static str {
        if self.sips {
            "sips"
        } else {
            "sip"
        }
    }

    /// Returns the original textual representation of the URI.
    pub fn as_str(&self) -> &str {
        self.raw.as_str()
    }

    /// Returns the value of a URI parameter, `None` when absent.
    pub fn param(&self, name: &str) -> Option<&Option<SmolStr>> {
        self.params.get(&SmolStr::new(name.to_ascii_lowercase()))
    }

    /// Adds or replaces a URI parameter.
    pub fn set_param(&mut self, name: impl Into<SmolStr>, value: Option<SmolStr>) {
        self.params.insert(name.into(), value);
    }

    /// Canonical serialization used as the stable equality key for bindings.
    ///
    /// Scheme and host are lowercased and parameters appear in sorted order,
    /// so two spellings of the same URI print identically.
    pub fn canonical(&self) -> SmolStr {
        SmolStr::new(self.to_string())
    }
}

impl fmt::Display for SipUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.scheme())?;
        if let Some(user) = &self.user {
            write!(f, "{}@", user)?;
        }
        write!(f, "{}", self.host)?;
        if let Some(port) = self.port {
            write!(f, ":{}", port)?;
        }
        for (name, value) in &self.params {
            match value {
                Some(value) => write!(f, ";{}={}", name, value)?,
                None => write!(f, ";{}", name)?,
            }
        }
        Ok(())
    }
}

fn split_host_port(input: &str) -> Option<(&str, Option<u16>)> {
    // IPv6 reference: [::1]:5060
    if let Some(rest) = input.strip_prefix('[') {
        let (host, after) = rest.split_once(']')?;
        let port = match after.strip_prefix(':') {
            Some(port) => Some(port.parse().ok()?),
            None if after.is_empty() => None,
            None => return None,
        };
        return Some((host, port));
    }
    match input.split_once(':') {
        Some((host, port)) => {
            if host.is_empty() {
                return None;
            }
            Some((host, Some(port.parse().ok()?)))
        }
        None => Some((input, None)),
    }
}
