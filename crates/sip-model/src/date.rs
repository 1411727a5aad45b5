use std::time::SystemTime;

use smol_str::SmolStr;

/// Formats the current instant as an RFC 1123 `Date` header value.
///
/// Example output: `Sun, 06 Nov 1994 08:49:37 GMT`.
pub fn rfc1123_date(now: SystemTime) -> SmolStr {
    SmolStr::new(httpdate::fmt_http_date(now))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, UNIX_EPOCH};

    #[test]
    fn formats_epoch() {
        let date = rfc1123_date(UNIX_EPOCH);
        assert_eq!(date.as_str(), "Thu, 01 Jan 1970 00:00:00 GMT");
    }

    #[test]
    fn always_gmt_suffixed() {
        let date = rfc1123_date(UNIX_EPOCH + Duration::from_secs(784111777));
        assert!(date.as_str().ends_with(" GMT"));
    }
}
