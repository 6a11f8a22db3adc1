//! Legacy `PAYMENT-REQUIRED` encoding.
//!
//! The challenge is base64 of UTF-8 JSON:
//!
//! ```json
//! {"amount": 546, "address": "bitcoincash:qp...", "paymentId": "a1b2",
//!  "network": "mainnet", "token": "<jwt>"}
//! ```
//!
//! Decoding is base64 → UTF-8 → JSON; failure at any stage, or a missing
//! `amount` / `address`, is a malformed challenge.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as b64;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{non_empty, parse_amount};
use crate::challenge::{Challenge, DEFAULT_NETWORK};
use crate::error::ChallengeError;

/// JSON body of a legacy challenge, before validation.
///
/// `amount` is kept as raw JSON so that servers sending it as a string are
/// accepted and non-integers are reported as [`ChallengeError::InvalidAmount`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyChallenge {
    /// Amount in the smallest unit, as a JSON number or decimal string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<Value>,
    /// Destination address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    /// Server-side payment identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_id: Option<String>,
    /// Network name; `mainnet` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
    /// Session token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Currency label, e.g. `"sats"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
}

impl LegacyChallenge {
    /// Validates the decoded body into a [`Challenge`].
    ///
    /// # Errors
    ///
    /// Returns [`ChallengeError::MissingField`] if `amount` or `address` is
    /// absent and [`ChallengeError::InvalidAmount`] if `amount` is not a
    /// non-negative integer.
    pub fn into_challenge(self) -> Result<Challenge, ChallengeError> {
        let amount = match self.amount {
            None | Some(Value::Null) => return Err(ChallengeError::MissingField("amount")),
            Some(Value::Number(n)) => n
                .as_u64()
                .ok_or_else(|| ChallengeError::InvalidAmount(n.to_string()))?,
            Some(Value::String(s)) => parse_amount(&s)?,
            Some(other) => return Err(ChallengeError::InvalidAmount(other.to_string())),
        };
        let address = non_empty(self.address).ok_or(ChallengeError::MissingField("address"))?;
        Ok(Challenge {
            amount,
            address,
            network: non_empty(self.network).unwrap_or_else(|| DEFAULT_NETWORK.to_owned()),
            token: non_empty(self.token),
            asset: non_empty(self.currency),
            payment_id: non_empty(self.payment_id),
        })
    }
}

impl From<&Challenge> for LegacyChallenge {
    fn from(challenge: &Challenge) -> Self {
        Self {
            amount: Some(Value::from(challenge.amount)),
            address: Some(challenge.address.clone()),
            payment_id: challenge.payment_id.clone(),
            network: Some(challenge.network.clone()),
            token: challenge.token.clone(),
            currency: challenge.asset.clone(),
        }
    }
}

/// Decodes a `PAYMENT-REQUIRED` header value.
///
/// # Errors
///
/// Returns [`ChallengeError`] on base64, UTF-8 or JSON failure, or when a
/// mandatory field is missing.
pub fn decode(header_value: &str) -> Result<Challenge, ChallengeError> {
    let bytes = b64.decode(header_value.trim())?;
    let json = String::from_utf8(bytes)?;
    let body: LegacyChallenge = serde_json::from_str(&json)?;
    body.into_challenge()
}

/// Encodes a challenge as a `PAYMENT-REQUIRED` header value.
///
/// # Errors
///
/// Returns [`ChallengeError::Json`] if serialization fails.
pub fn encode(challenge: &Challenge) -> Result<String, ChallengeError> {
    let json = serde_json::to_vec(&LegacyChallenge::from(challenge))?;
    Ok(b64.encode(json))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn b64_json(value: &Value) -> String {
        b64.encode(serde_json::to_vec(value).unwrap())
    }

    #[test]
    fn test_decode_recovers_fields() {
        let header = b64_json(&json!({
            "amount": 546,
            "address": "bitcoincash:qpm2qavt7wjq73p8u0tmsv55p57m9au48pgshqv6a2",
            "paymentId": "sim_id_789",
            "network": "mainnet",
            "token": "sim_jwt_token_header"
        }));
        let challenge = decode(&header).unwrap();
        assert_eq!(challenge.amount, 546);
        assert_eq!(
            challenge.address,
            "bitcoincash:qpm2qavt7wjq73p8u0tmsv55p57m9au48pgshqv6a2"
        );
        assert_eq!(challenge.token.as_deref(), Some("sim_jwt_token_header"));
        assert_eq!(challenge.payment_id.as_deref(), Some("sim_id_789"));
        assert_eq!(challenge.network, "mainnet");
    }

    #[test]
    fn test_decode_defaults_network() {
        let header = b64_json(&json!({"amount": 546, "address": "addr1", "token": "jwtX"}));
        let challenge = decode(&header).unwrap();
        assert_eq!(challenge.network, "mainnet");
        assert_eq!(challenge.asset, None);
    }

    #[test]
    fn test_decode_accepts_string_amount_and_currency() {
        let header = b64_json(&json!({"amount": "1000", "address": "addr1", "currency": "sats"}));
        let challenge = decode(&header).unwrap();
        assert_eq!(challenge.amount, 1000);
        assert_eq!(challenge.asset.as_deref(), Some("sats"));
    }

    #[test]
    fn test_decode_invalid_base64() {
        assert!(matches!(
            decode("%%% not base64 %%%"),
            Err(ChallengeError::Base64(_))
        ));
    }

    #[test]
    fn test_decode_invalid_utf8() {
        let header = b64.encode([0xff, 0xfe, 0xfd]);
        assert!(matches!(decode(&header), Err(ChallengeError::Utf8(_))));
    }

    #[test]
    fn test_decode_invalid_json() {
        let header = b64.encode("not json");
        assert!(matches!(decode(&header), Err(ChallengeError::Json(_))));
    }

    #[test]
    fn test_decode_missing_fields() {
        let no_amount = b64_json(&json!({"address": "addr1"}));
        assert_eq!(
            decode(&no_amount),
            Err(ChallengeError::MissingField("amount"))
        );
        let no_address = b64_json(&json!({"amount": 546}));
        assert_eq!(
            decode(&no_address),
            Err(ChallengeError::MissingField("address"))
        );
        let blank_address = b64_json(&json!({"amount": 546, "address": ""}));
        assert_eq!(
            decode(&blank_address),
            Err(ChallengeError::MissingField("address"))
        );
    }

    #[test]
    fn test_decode_rejects_non_integer_amount() {
        let header = b64_json(&json!({"amount": 5.46, "address": "addr1"}));
        assert!(matches!(
            decode(&header),
            Err(ChallengeError::InvalidAmount(_))
        ));
        let header = b64_json(&json!({"amount": -1, "address": "addr1"}));
        assert!(matches!(
            decode(&header),
            Err(ChallengeError::InvalidAmount(_))
        ));
    }

    #[test]
    fn test_encode_then_decode() {
        let challenge = Challenge::new(546, "addr1")
            .with_token("jwtX")
            .with_payment_id("p1");
        let header = encode(&challenge).unwrap();
        assert_eq!(decode(&header).unwrap(), challenge);
    }
}
