use std::collections::BTreeMap;

use smol_str::SmolStr;

use crate::SipUri;

/// Generic SIP name-addr structure used by address headers (From/To/Contact/Path).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameAddr {
    pub display_name: Option<SmolStr>,
    pub uri: SipUri,
    pub params: BTreeMap<SmolStr, Option<SmolStr>>,
}

impl NameAddr {
    pub fn uri(&self) -> &SipUri {
        &self.uri
    }

    pub fn params(&self) -> impl Iterator<Item = (&SmolStr, &Option<SmolStr>)> {
        self.params.iter()
    }

    /// Returns a header parameter by name, matching ignoring ASCII case.
    pub fn get_param(&self, name: &str) -> Option<&Option<SmolStr>> {
        self.params.get(&SmolStr::new(name.to_ascii_lowercase()))
    }
}

/// Parses a name-addr or addr-spec header value.
///
/// Accepts both the `"Display" <sip:uri>;param` and the bare `sip:uri;param`
/// forms. For the bare form every `;param` belongs to the header, not the
/// URI, per RFC 3261 §20.10.
pub fn parse_name_addr(value: &str) -> Option<NameAddr> {
    let trimmed = value.trim();

    if let Some(open) = trimmed.find('<') {
        let close = trimmed[open + 1..].find('>')?;
        let uri_str = trimmed[open + 1..open + 1 + close].trim();
        let uri = SipUri::parse(uri_str)?;

        let display = trimmed[..open].trim();
        let display_name = if display.is_empty() {
            None
        } else {
            Some(SmolStr::new(display.trim_matches('"')))
        };

        let after = &trimmed[open + 1 + close + 1..];
        let params = parse_header_params(after);

        return Some(NameAddr {
            display_name,
            uri,
            params,
        });
    }

    // addr-spec form: split header params off before URI parsing
    let (uri_str, params_str) = match trimmed.split_once(';') {
        Some((uri, params)) => (uri, params),
        None => (trimmed, ""),
    };
    let uri = SipUri::parse(uri_str.trim())?;
    let params = parse_header_params(params_str);

    Some(NameAddr {
        display_name: None,
        uri,
        params,
    })
}

fn parse_header_params(input: &str) -> BTreeMap<SmolStr, Option<SmolStr>> {
    let mut params = BTreeMap::new();
    for param in input.split(';') {
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
    params
}
