use smol_str::SmolStr;

/// Ordered extra headers attached to a response tuple:
/// `(header name, field values)` pairs.
pub type ExtraHeaders = Vec<(SmolStr, Vec<SmolStr>)>;

/// A SIP-level failure raised during REGISTER processing.
///
/// Raised from anywhere inside the binding transaction and translated into
/// exactly one response by the orchestrator. Carrying the status here keeps
/// the deep layers free of response plumbing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SipError {
    pub status: u16,
    pub reason: SmolStr,
    pub extra_headers: ExtraHeaders,
}

impl SipError {
    pub fn new(status: u16, reason: impl Into<SmolStr>) -> Self {
        Self {
            status,
            reason: reason.into(),
            extra_headers: Vec::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<SmolStr>, values: Vec<SmolStr>) -> Self {
        self.extra_headers.push((name.into(), values));
        self
    }

    /// The CSeq regression rejection shared by the wildcard handler and the
    /// per-contact updater.
    pub fn out_of_order() -> Self {
        Self::new(403, "Request out of order, contained old CSeq number")
    }
}

impl std::fmt::Display for SipError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.status, self.reason)
    }
}

impl std::error::Error for SipError {}
