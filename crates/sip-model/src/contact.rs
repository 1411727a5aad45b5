// moorage-rs - The Moorage SIP Location Service
// Copyright (C) 2025 James Ferris <ferrous.communications@gmail.com>
// SPDX-License-Identifier: Apache-2.0 OR MIT

use smol_str::SmolStr;

use crate::{split_quoted_commas, Headers, NameAddr};

/// One Contact header field value: either the wildcard `*` or an address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Contact {
    Wildcard,
    Addr(NameAddr),
}

/// A `+sip.instance` contact parameter value.
///
/// RFC 5626 requires the value to be quoted; registrars treat unquoted
/// values as absent. Both forms are surfaced so callers can log the
/// distinction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstanceId {
    /// The raw string that appeared between the double quotes.
    Quoted(SmolStr),
    /// A value that was present but not quoted.
    Unquoted(SmolStr),
}

impl Contact {
    /// Parses a single Contact field value.
    pub fn parse(value: &str) -> Option<Self> {
        let trimmed = value.trim();
        if trimmed == "*" {
            return Some(Contact::Wildcard);
        }
        crate::parse_name_addr(trimmed).map(Contact::Addr)
    }

    pub fn is_wildcard(&self) -> bool {
        matches!(self, Contact::Wildcard)
    }

    pub fn addr(&self) -> Option<&NameAddr> {
        match self {
            Contact::Wildcard => None,
            Contact::Addr(addr) => Some(addr),
        }
    }

    pub fn uri(&self) -> Option<&crate::SipUri> {
        self.addr().map(NameAddr::uri)
    }

    /// Returns a contact parameter by name; always `None` for the wildcard.
    pub fn param(&self, name: &str) -> Option<&Option<SmolStr>> {
        self.addr().and_then(|addr| addr.get_param(name))
    }

    /// Classifies the `+sip.instance` parameter when present.
    pub fn instance_id(&self) -> Option<InstanceId> {
        let value = self.param("+sip.instance")?.as_ref()?;
        let raw = value.as_str();
        if raw.len() >= 2 && raw.starts_with('"') && raw.ends_with('"') {
            Some(InstanceId::Quoted(SmolStr::new(&raw[1..raw.len() - 1])))
        } else {
            Some(InstanceId::Unquoted(value.clone()))
        }
    }
}

/// Collects every Contact value from the headers in arrival order.
///
/// Folded multi-value lines are split on unquoted commas. Returns the raw
/// offending value when one cannot be parsed.
pub fn contact_values(headers: &Headers) -> Result<Vec<Contact>, SmolStr> {
    let mut contacts = Vec::new();
    for value in headers.get_all("Contact") {
        for part in split_quoted_commas(value.as_str()) {
            match Contact::parse(&part) {
                Some(contact) => contacts.push(contact),
                None => return Err(SmolStr::new(part)),
            }
        }
    }
    Ok(contacts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_wildcard() {
        assert!(Contact::parse("*").unwrap().is_wildcard());
        assert!(Contact::parse(" * ").unwrap().is_wildcard());
    }

    #[test]
    fn parses_addr_with_expires() {
        let contact = Contact::parse("<sip:u@1.2.3.4>;expires=20").unwrap();
        assert!(!contact.is_wildcard());
        assert_eq!(
            contact.param("expires").unwrap().as_ref().unwrap().as_str(),
            "20"
        );
    }

    #[test]
    fn quoted_instance_id_unwrapped() {
        let contact =
            Contact::parse("<sip:u@host>;+sip.instance=\"<urn:uuid:abc>\"").unwrap();
        match contact.instance_id().unwrap() {
            InstanceId::Quoted(raw) => assert_eq!(raw.as_str(), "<urn:uuid:abc>"),
            other => panic!("expected quoted instance, got {:?}", other),
        }
    }

    #[test]
    fn unquoted_instance_id_flagged() {
        let contact = Contact::parse("<sip:u@host>;+sip.instance=urn:uuid:abc").unwrap();
        assert!(matches!(
            contact.instance_id(),
            Some(InstanceId::Unquoted(_))
        ));
    }

    #[test]
    fn collects_across_headers_and_commas() {
        let mut headers = Headers::new();
        headers.push("Contact", "<sip:a@example.com>, <sip:b@example.com>");
        headers.push("Contact", "<sip:c@example.com>");
        let contacts = contact_values(&headers).unwrap();
        assert_eq!(contacts.len(), 3);
    }

    #[test]
    fn surfaces_malformed_value() {
        let mut headers = Headers::new();
        headers.push("Contact", "<sip:ok@example.com>, garbage<<");
        assert!(contact_values(&headers).is_err());
    }
}
