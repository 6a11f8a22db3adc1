//! Error types for the HTTP transport layer.

/// A header could not be built from protocol values.
#[derive(Debug, thiserror::Error)]
pub enum HeaderError {
    /// The header name is not a valid HTTP token.
    #[error("invalid header name: {0}")]
    Name(#[from] http::header::InvalidHeaderName),

    /// The header value contains bytes HTTP does not allow.
    #[error("invalid value for header {0}")]
    Value(&'static str),
}

/// The underlying network I/O failed: connect, DNS, TLS or timeout.
///
/// This is the only error a request returns. Protocol-level failures (an
/// unreadable challenge, a failed payment) come back as the unpaid 402
/// response instead.
#[cfg(feature = "client")]
#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct TransportError(#[from] pub reqwest_middleware::Error);

#[cfg(feature = "client")]
impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        Self(reqwest_middleware::Error::Reqwest(err))
    }
}

#[cfg(feature = "client")]
impl TransportError {
    /// Returns `true` if the failure was a timeout.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(&self.0, reqwest_middleware::Error::Reqwest(err) if err.is_timeout())
    }

    /// Returns `true` if the connection could not be established.
    #[must_use]
    pub fn is_connect(&self) -> bool {
        matches!(&self.0, reqwest_middleware::Error::Reqwest(err) if err.is_connect())
    }
}
