//! Structured `WWW-Authenticate: x402` encoding.
//!
//! ```text
//! WWW-Authenticate: x402 network="chipnet", address="bchtest:qq...", amount="546", asset="bch", token="<jwt>"
//! ```
//!
//! The value must start with the literal `x402 ` (case-sensitive, trailing
//! space included). Parameters are picked out by scanning for `key="value"`
//! anywhere after the scheme: order does not matter and a repeated key keeps
//! its last value.

use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use super::{AUTH_SCHEME, non_empty, parse_amount};
use crate::challenge::{Challenge, DEFAULT_NETWORK};
use crate::error::ChallengeError;

static PARAM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(\w+)="([^"]*)""#).expect("valid challenge parameter regex"));

/// Decodes a `WWW-Authenticate` header value.
///
/// # Errors
///
/// Returns [`ChallengeError::UnknownScheme`] if the value does not start with
/// `x402 `, and [`ChallengeError::MissingField`] / [`ChallengeError::InvalidAmount`]
/// if `amount` or `address` is absent or unusable.
pub fn decode(header_value: &str) -> Result<Challenge, ChallengeError> {
    let params = header_value
        .strip_prefix(AUTH_SCHEME)
        .and_then(|rest| rest.strip_prefix(' '))
        .ok_or(ChallengeError::UnknownScheme)?;

    let mut found: HashMap<&str, &str> = HashMap::new();
    for caps in PARAM.captures_iter(params) {
        if let (Some(key), Some(value)) = (caps.get(1), caps.get(2)) {
            found.insert(key.as_str(), value.as_str());
        }
    }
    let mut take = |key: &str| non_empty(found.remove(key).map(str::to_owned));

    let amount = take("amount").ok_or(ChallengeError::MissingField("amount"))?;
    let amount = parse_amount(&amount)?;
    let address = take("address").ok_or(ChallengeError::MissingField("address"))?;
    Ok(Challenge {
        amount,
        address,
        network: take("network").unwrap_or_else(|| DEFAULT_NETWORK.to_owned()),
        token: take("token"),
        asset: take("asset"),
        payment_id: None,
    })
}

/// Renders a challenge as a `WWW-Authenticate` header value.
#[derive(Debug, Clone, Copy)]
pub struct AuthenticateChallenge<'a>(pub &'a Challenge);

impl fmt::Display for AuthenticateChallenge<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let challenge = self.0;
        write!(
            f,
            r#"{AUTH_SCHEME} network="{}", address="{}", amount="{}""#,
            challenge.network, challenge.address, challenge.amount
        )?;
        if let Some(asset) = &challenge.asset {
            write!(f, r#", asset="{asset}""#)?;
        }
        if let Some(token) = &challenge.token {
            write!(f, r#", token="{token}""#)?;
        }
        Ok(())
    }
}
