//! Error types for the x402 payment cycle.
//!
//! None of these escape a request: a 402 whose challenge cannot be parsed, or
//! whose payment cannot be made, is handed back to the caller unchanged. The
//! types exist so the failure can be reported through hooks, tracing and the
//! response's payment outcome.

use crate::rail::RailError;

/// Why a 402 response did not yield a usable [`Challenge`](crate::Challenge).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChallengeError {
    /// Neither a `WWW-Authenticate: x402` nor a `PAYMENT-REQUIRED` header was present.
    #[error("no x402 challenge header in 402 response")]
    NoChallengeHeader,

    /// The legacy header was not valid base64.
    #[error("challenge is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    /// The decoded legacy header was not valid UTF-8.
    #[error("challenge is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    /// The decoded legacy header was not the expected JSON object.
    #[error("challenge is not valid JSON: {0}")]
    Json(String),

    /// A mandatory field was absent.
    #[error("challenge is missing `{0}`")]
    MissingField(&'static str),

    /// The amount was not a non-negative integer.
    #[error("challenge amount is not an integer: {0}")]
    InvalidAmount(String),

    /// The `WWW-Authenticate` header does not use the `x402` scheme.
    #[error("WWW-Authenticate does not carry an x402 challenge")]
    UnknownScheme,

    /// The header value was not visible ASCII.
    #[error("challenge header is not a valid header string")]
    InvalidHeaderValue,

    /// The session token cannot be carried in an HTTP header.
    #[error("challenge token is not a valid header value")]
    InvalidToken,
}

impl ChallengeError {
    /// Returns `true` for every failure where a challenge header was present
    /// but could not be decoded.
    #[must_use]
    pub const fn is_malformed(&self) -> bool {
        !matches!(self, Self::NoChallengeHeader)
    }
}

impl From<serde_json::Error> for ChallengeError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

/// Why a payment cycle stopped after a challenge was parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PaymentFailure {
    /// The engine has no payment rail bound.
    #[error("no wallet configured")]
    NoWalletConfigured,

    /// The payment rail failed or returned no transaction id.
    #[error("payment failed: {0}")]
    Rail(#[from] RailError),

    /// The payment rail did not answer within the configured timeout.
    #[error("payment timed out")]
    TimedOut,

    /// A payment policy refused the challenge.
    #[error("payment rejected by policy: {0}")]
    Rejected(String),

    /// A lifecycle hook aborted the payment.
    #[error("payment aborted: {0}")]
    Aborted(String),

    /// The request body is a stream and cannot be sent a second time.
    #[error("request is not cloneable (streaming body?)")]
    RequestNotCloneable,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_header_is_not_malformed() {
        assert!(!ChallengeError::NoChallengeHeader.is_malformed());
        assert!(ChallengeError::MissingField("amount").is_malformed());
        assert!(ChallengeError::UnknownScheme.is_malformed());
    }

    #[test]
    fn test_rail_error_converts() {
        let failure: PaymentFailure = RailError::EmptyTransactionId.into();
        assert_eq!(failure, PaymentFailure::Rail(RailError::EmptyTransactionId));
        assert_eq!(
            failure.to_string(),
            "payment failed: payment rail returned no transaction id"
        );
    }
}
