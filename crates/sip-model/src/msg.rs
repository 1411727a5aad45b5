// moorage-rs - The Moorage SIP Location Service
// Copyright (C) 2025 James Ferris <ferrous.communications@gmail.com>
// SPDX-License-Identifier: Apache-2.0 OR MIT

use bytes::Bytes;

use crate::{headers::Headers, method::Method, uri::SipUri};

const MAX_BODY_SIZE: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageError {
    BodyTooLarge { max: usize, actual: usize },
}

impl std::fmt::Display for MessageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BodyTooLarge { max, actual } => {
                write!(f, "body too large (max {}, got {})", max, actual)
            }
        }
    }
}

impl std::error::Error for MessageError {}

/// First line of a SIP request: `Method SP Request-URI SP SIP-Version CRLF`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestLine {
    method: Method,
    uri: SipUri,
}

impl RequestLine {
    /// Creates a request line for the given method and target URI.
    pub fn new(method: Method, uri: SipUri) -> Self {
        Self { method, uri }
    }

    /// Returns the request method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Returns the request URI.
    pub fn uri(&self) -> &SipUri {
        &self.uri
    }
}

/// Immutable in-memory representation of a SIP request message.
///
/// The transport layer delivers these already parsed; the registrar core
/// never sees wire bytes.
///
/// # Examples
///
/// ```
/// use sip_model::{Request, RequestLine, Method, SipUri, Headers};
/// use bytes::Bytes;
///
/// let uri = SipUri::parse("sip:example.com").unwrap();
/// let request = Request::new(
///     RequestLine::new(Method::Register, uri),
///     Headers::new(),
///     Bytes::new(),
/// )
/// .unwrap();
/// assert_eq!(request.method().as_str(), "REGISTER");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    start: RequestLine,
    headers: Headers,
    body: Bytes,
}

impl Request {
    /// Builds a request from its components.
    ///
    /// # Errors
    ///
    /// Returns an error if the body exceeds the size limit.
    pub fn new(start: RequestLine, headers: Headers, body: Bytes) -> Result<Self, MessageError> {
        if body.len() > MAX_BODY_SIZE {
            return Err(MessageError::BodyTooLarge {
                max: MAX_BODY_SIZE,
                actual: body.len(),
            });
        }
        Ok(Self {
            start,
            headers,
            body,
        })
    }

    /// Returns the request line.
    pub fn start_line(&self) -> &RequestLine {
        &self.start
    }

    /// Returns the request method.
    pub fn method(&self) -> &Method {
        self.start.method()
    }

    /// Returns the request URI.
    pub fn uri(&self) -> &SipUri {
        self.start.uri()
    }

    /// Returns the headers.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Returns a mutable reference to the headers.
    pub fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    /// Returns the message body.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Consumes self and returns the components.
    pub fn into_parts(self) -> (RequestLine, Headers, Bytes) {
        (self.start, self.headers, self.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mock_uri() -> SipUri {
        SipUri::parse("sip:example.com").expect("failed to parse URI")
    }

    #[test]
    fn create_request() {
        let request = Request::new(
            RequestLine::new(Method::Register, mock_uri()),
            Headers::new(),
            Bytes::new(),
        )
        .unwrap();
        assert_eq!(request.method(), &Method::Register);
        assert_eq!(request.uri().host.as_str(), "example.com");
    }

    #[test]
    fn reject_oversized_body() {
        let huge = Bytes::from(vec![0u8; MAX_BODY_SIZE + 1]);
        let result = Request::new(
            RequestLine::new(Method::Register, mock_uri()),
            Headers::new(),
            huge,
        );
        assert!(result.is_err());
    }
}
