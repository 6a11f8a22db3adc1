//! Wire encodings for x402 challenges and proofs of payment.
//!
//! Two incompatible encodings are in use:
//!
//! - [`authenticate`] - `WWW-Authenticate: x402 key="value", ...` challenges,
//!   answered with `Authorization: x402 <token>:<txid>`
//! - [`legacy`] - base64 JSON in a `PAYMENT-REQUIRED` header, answered with
//!   `X-PAYMENT` / `PAYMENT-SIGNATURE` / `X-CashApi-Token`
//!
//! Each encoding is a [`WireFormat`]. Decoders are pure functions from a
//! header value to a [`Challenge`]; the engine tries them in
//! [`WireFormat::PRIORITY`] order and stops at the first whose header is
//! present. Supporting a third encoding means adding a variant here, not
//! touching the retry state machine.

pub mod authenticate;
pub mod legacy;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::challenge::Challenge;
use crate::error::ChallengeError;
use crate::rail::PaymentProof;

/// Legacy challenge header (server → client).
pub const PAYMENT_REQUIRED_HEADER: &str = "PAYMENT-REQUIRED";

/// Structured challenge header (server → client).
pub const WWW_AUTHENTICATE_HEADER: &str = "WWW-Authenticate";

/// Structured proof header (client → server).
pub const AUTHORIZATION_HEADER: &str = "Authorization";

/// Legacy proof header carrying the transaction id (client → server).
pub const X_PAYMENT_HEADER: &str = "X-PAYMENT";

/// Older proof header still read by some servers; carries the same transaction id.
pub const PAYMENT_SIGNATURE_HEADER: &str = "PAYMENT-SIGNATURE";

/// Legacy session token header (client → server).
pub const SESSION_TOKEN_HEADER: &str = "X-CashApi-Token";

/// Header a server sets on an unlocked response, echoing the session token.
pub const X_PAYMENT_RESPONSE_HEADER: &str = "X-PAYMENT-RESPONSE";

/// Authentication scheme name used by the structured encoding.
pub const AUTH_SCHEME: &str = "x402";

/// A challenge encoding together with its proof header convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireFormat {
    /// `WWW-Authenticate: x402 ...` / `Authorization: x402 ...`.
    Authenticate,
    /// `PAYMENT-REQUIRED: <base64 json>` / `X-PAYMENT`.
    Legacy,
}

impl WireFormat {
    /// Order in which encodings are looked for on a 402 response.
    pub const PRIORITY: [Self; 2] = [Self::Authenticate, Self::Legacy];

    /// Name of the response header that carries this encoding's challenge.
    #[must_use]
    pub const fn challenge_header(self) -> &'static str {
        match self {
            Self::Authenticate => WWW_AUTHENTICATE_HEADER,
            Self::Legacy => PAYMENT_REQUIRED_HEADER,
        }
    }

    /// Decodes a challenge header value.
    ///
    /// # Errors
    ///
    /// Returns [`ChallengeError`] if the value is not a well-formed challenge
    /// in this encoding or lacks `amount` / `address`.
    pub fn decode(self, value: &str) -> Result<Challenge, ChallengeError> {
        let challenge = match self {
            Self::Authenticate => authenticate::decode(value)?,
            Self::Legacy => legacy::decode(value)?,
        };
        // The token is echoed in request headers after paying; reject it now.
        if challenge.token.as_deref().is_some_and(|t| !is_header_safe(t)) {
            return Err(ChallengeError::InvalidToken);
        }
        Ok(challenge)
    }

    /// Headers attached to the retry after paying.
    #[must_use]
    pub fn proof_headers(
        self,
        proof: &PaymentProof,
        token: Option<&str>,
    ) -> Vec<(&'static str, String)> {
        match self {
            Self::Authenticate => {
                let credential = match token {
                    Some(token) => format!("{AUTH_SCHEME} {token}:{proof}"),
                    None => format!("{AUTH_SCHEME} {proof}"),
                };
                vec![(AUTHORIZATION_HEADER, credential)]
            }
            Self::Legacy => {
                let mut headers = vec![
                    (X_PAYMENT_HEADER, proof.to_string()),
                    (PAYMENT_SIGNATURE_HEADER, proof.to_string()),
                ];
                if let Some(token) = token {
                    headers.push((SESSION_TOKEN_HEADER, token.to_owned()));
                }
                headers
            }
        }
    }

    /// Headers presenting a cached session token before any payment.
    #[must_use]
    pub fn session_headers(self, token: &str) -> Vec<(&'static str, String)> {
        match self {
            Self::Authenticate => vec![(AUTHORIZATION_HEADER, format!("{AUTH_SCHEME} {token}"))],
            Self::Legacy => vec![(SESSION_TOKEN_HEADER, token.to_owned())],
        }
    }
}

impl fmt::Display for WireFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Authenticate => f.write_str("authenticate"),
            Self::Legacy => f.write_str("legacy"),
        }
    }
}

/// Returns `true` if `value` can be sent verbatim as an HTTP header value:
/// visible ASCII, spaces and tabs only.
#[must_use]
pub fn is_header_safe(value: &str) -> bool {
    value
        .bytes()
        .all(|b| b == b'\t' || (b' '..=b'~').contains(&b))
}

/// Returns `value` as an owned string unless it is missing or empty.
fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// Parses a decimal amount in the smallest currency unit.
fn parse_amount(raw: &str) -> Result<u64, ChallengeError> {
    raw.trim()
        .parse::<u64>()
        .map_err(|_| ChallengeError::InvalidAmount(raw.to_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn proof() -> PaymentProof {
        PaymentProof::new("txid123").unwrap()
    }

    #[test]
    fn test_priority_prefers_authenticate() {
        assert_eq!(
            WireFormat::PRIORITY,
            [WireFormat::Authenticate, WireFormat::Legacy]
        );
    }

    #[test]
    fn test_legacy_proof_headers() {
        let headers = WireFormat::Legacy.proof_headers(&proof(), Some("jwtX"));
        assert_eq!(
            headers,
            vec![
                ("X-PAYMENT", "txid123".to_owned()),
                ("PAYMENT-SIGNATURE", "txid123".to_owned()),
                ("X-CashApi-Token", "jwtX".to_owned()),
            ]
        );
        assert_eq!(WireFormat::Legacy.proof_headers(&proof(), None).len(), 2);
    }

    #[test]
    fn test_authenticate_proof_headers() {
        assert_eq!(
            WireFormat::Authenticate.proof_headers(&proof(), Some("tok123")),
            vec![("Authorization", "x402 tok123:txid123".to_owned())]
        );
        assert_eq!(
            WireFormat::Authenticate.proof_headers(&proof(), None),
            vec![("Authorization", "x402 txid123".to_owned())]
        );
    }

    #[test]
    fn test_token_must_fit_in_a_header() {
        let encoded = legacy::encode(&Challenge::new(546, "addr1").with_token("jw\ntX")).unwrap();
        assert_eq!(
            WireFormat::Legacy.decode(&encoded),
            Err(ChallengeError::InvalidToken)
        );
        let encoded = legacy::encode(&Challenge::new(546, "addr1").with_token("jwtX")).unwrap();
        assert!(WireFormat::Legacy.decode(&encoded).is_ok());
        assert!(is_header_safe("x402 tok:tx\t"));
        assert!(!is_header_safe("caf\u{e9}"));
        assert!(!is_header_safe("a\u{7f}"));
    }

    #[test]
    fn test_session_headers() {
        assert_eq!(
            WireFormat::Authenticate.session_headers("tok123"),
            vec![("Authorization", "x402 tok123".to_owned())]
        );
        assert_eq!(
            WireFormat::Legacy.session_headers("jwtX"),
            vec![("X-CashApi-Token", "jwtX".to_owned())]
        );
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("546"), Ok(546));
        assert_eq!(
            parse_amount("-1"),
            Err(ChallengeError::InvalidAmount("-1".to_owned()))
        );
        assert!(parse_amount("1.5").is_err());
    }
}
