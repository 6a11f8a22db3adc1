//! HTTP-specific constants for the x402 protocol.

pub use cash402::discovery::WELL_KNOWN_PATH;
pub use cash402::proto::{
    AUTH_SCHEME, AUTHORIZATION_HEADER, PAYMENT_REQUIRED_HEADER, PAYMENT_SIGNATURE_HEADER,
    SESSION_TOKEN_HEADER, WWW_AUTHENTICATE_HEADER, X_PAYMENT_HEADER, X_PAYMENT_RESPONSE_HEADER,
};

/// HTTP 402 Payment Required status code.
pub const HTTP_STATUS_PAYMENT_REQUIRED: u16 = 402;
