use smol_str::SmolStr;

use crate::Headers;

/// Comma-separated token header values (Require/Supported/Unsupported).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenList(pub Vec<SmolStr>);

impl TokenList {
    pub fn tokens(&self) -> &[SmolStr] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Tests token membership ignoring ASCII case.
    pub fn contains(&self, token: &str) -> bool {
        self.0.iter().any(|t| t.eq_ignore_ascii_case(token))
    }
}

/// Parses one header line of comma-separated tokens, preserving order.
pub fn parse_token_list(value: &str) -> TokenList {
    TokenList(
        value
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(SmolStr::new)
            .collect(),
    )
}

/// Collects the tokens of every header line with the given name, in order.
pub fn token_list_from_headers(headers: &Headers, name: &str) -> TokenList {
    let mut tokens = Vec::new();
    for value in headers.get_all(name) {
        tokens.extend(parse_token_list(value.as_str()).0);
    }
    TokenList(tokens)
}
