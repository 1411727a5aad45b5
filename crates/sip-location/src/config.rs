use serde::Deserialize;

/// Process-global location service configuration.
///
/// Read-only at request time; changes apply to subsequently received
/// requests.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LocationConfig {
    /// Honour `Require: gruu` and emit GRUU contact parameters.
    pub experimental_gruu_enable: bool,
    /// Accept a Path header from UAs that do not announce `Supported: path`.
    pub allow_proxy_inserted_path: bool,
    /// Upper bound in seconds for any registration, RFC 3261 §10.3 #7.
    pub max_register_time: u64,
    /// Emit `Require: gruu` on responses that carry gruu contact params.
    /// Draft -07 dropped the requirement; draft -06 UAs still expect it.
    pub gruu_require_in_response: bool,
    /// Hostname placed in this node's Record-Route URI for Path insertion.
    pub record_route_host: String,
    /// Port of the Record-Route URI for `sip:` requests.
    pub record_route_port: u16,
    /// Port of the Record-Route URI for `sips:` requests.
    pub record_route_tls_port: u16,
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            experimental_gruu_enable: false,
            allow_proxy_inserted_path: false,
            max_register_time: 43_200,
            gruu_require_in_response: true,
            record_route_host: "localhost".to_owned(),
            record_route_port: 5060,
            record_route_tls_port: 5061,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_conservative() {
        let config = LocationConfig::default();
        assert!(!config.experimental_gruu_enable);
        assert!(!config.allow_proxy_inserted_path);
        assert_eq!(config.max_register_time, 43_200);
        assert!(config.gruu_require_in_response);
    }
}
