// moorage-rs - The Moorage SIP Location Service
// Copyright (C) 2025 James Ferris <ferrous.communications@gmail.com>
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! In-memory SIP message model for registrar-side processing.
//!
//! Provides the header container, URI and contact values, and the request
//! representation that the location service operates on. Wire-format
//! parsing and serialization live with the transport layer; this crate only
//! interprets header field values that have already been delivered as text.

mod contact;
mod date;
mod headers;
mod method;
mod msg;
mod name_addr;
mod token_list;
mod uri;

pub use contact::{contact_values, Contact, InstanceId};
pub use date::rfc1123_date;
pub use headers::{Header, Headers};
pub use method::Method;
pub use msg::{MessageError, Request, RequestLine};
pub use name_addr::{parse_name_addr, NameAddr};
pub use token_list::{parse_token_list, token_list_from_headers, TokenList};
pub use uri::SipUri;

/// Splits a combined header line on commas, honouring quoted strings.
///
/// Multiple Contact or Path values may arrive folded into one header line;
/// display names may legally contain commas inside quotes.
pub fn split_quoted_commas(input: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut escape_next = false;

    for ch in input.chars() {
        if escape_next {
            current.push(ch);
            escape_next = false;
            continue;
        }
        match ch {
            '\\' if in_quotes => {
                current.push(ch);
                escape_next = true;
            }
            '"' => {
                in_quotes = !in_quotes;
                current.push(ch);
            }
            ',' if !in_quotes => {
                if !current.trim().is_empty() {
                    parts.push(current.trim().to_owned());
                }
                current.clear();
            }
            _ => current.push(ch),
        }
    }
    if !current.trim().is_empty() {
        parts.push(current.trim().to_owned());
    }
    parts
}
