// moorage-rs - The Moorage SIP Location Service
// Copyright (C) 2025 James Ferris <ferrous.communications@gmail.com>
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Builds the 200 OK payload after a successful mutation, from post-state.

use std::time::SystemTime;

use anyhow::Result;
use sip_model::{rfc1123_date, token_list_from_headers, Headers, SipUri};
use smol_str::SmolStr;

use crate::config::LocationConfig;
use crate::error::ExtraHeaders;
use crate::gruu::GruuFactory;
use crate::store::{unix_now, BindingClass, BindingStore};

/// The composed 200 OK: response headers plus the contact values emitted,
/// the latter reused for event reporting.
#[derive(Debug, Clone)]
pub struct ComposedOk {
    pub extra_headers: ExtraHeaders,
    pub contacts: Vec<SmolStr>,
}

/// Reads back the AOR's bindings and assembles the registrar response.
///
/// Emits `Date` always, echoes an accepted Path, lists current dynamic
/// bindings with their remaining lifetime, and decorates instances with
/// GRUU parameters when the UA asked for them.
pub async fn compose_ok<S, G>(
    store: &S,
    gruu: &G,
    config: &LocationConfig,
    aor: &str,
    request_headers: &Headers,
    to_uri: &SipUri,
    path_echo: &[SmolStr],
) -> Result<ComposedOk>
where
    S: BindingStore + ?Sized,
    G: GruuFactory + ?Sized,
{
    let mut extra_headers: ExtraHeaders = Vec::new();
    extra_headers.push((
        SmolStr::new("Date"),
        vec![rfc1123_date(SystemTime::now())],
    ));
    if !path_echo.is_empty() {
        extra_headers.push((SmolStr::new("Path"), path_echo.to_vec()));
    }

    let now = unix_now();
    let mut bindings: Vec<_> = store
        .bindings_for(aor)
        .await?
        .into_iter()
        .filter(|b| b.class == BindingClass::Dynamic && !b.expires.is_never())
        .collect();
    bindings.sort_by(|a, b| {
        let pa = a.flags.priority.unwrap_or(u32::MAX);
        let pb = b.flags.priority.unwrap_or(u32::MAX);
        (pa, &a.contact_key).cmp(&(pb, &b.contact_key))
    });

    let ua_supports_gruu =
        token_list_from_headers(request_headers, "Supported").contains("gruu");

    let mut contacts = Vec::with_capacity(bindings.len());
    let mut any_gruu = false;
    for binding in &bindings {
        let mut value = format!(
            "<{}>;expires={}",
            binding.contact,
            binding.expires.remaining(now)
        );
        if ua_supports_gruu && config.experimental_gruu_enable {
            if let Some(instance_id) = &binding.flags.instance_id {
                if let Some(entry) = gruu.fetch_or_none(aor, instance_id).await? {
                    if let Some(url) =
                        gruu.make_url(aor, instance_id, entry.token.as_str(), to_uri)
                    {
                        value.push_str(&format!(
                            ";gruu=\"{}\";+sip.instance=\"{}\"",
                            url, instance_id
                        ));
                        any_gruu = true;
                    }
                }
            }
        }
        contacts.push(SmolStr::new(value));
    }

    if !contacts.is_empty() {
        extra_headers.push((SmolStr::new("Contact"), contacts.clone()));
    }
    if any_gruu && config.gruu_require_in_response {
        extra_headers.push((SmolStr::new("Require"), vec![SmolStr::new("gruu")]));
    }

    Ok(ComposedOk {
        extra_headers,
        contacts,
    })
}
