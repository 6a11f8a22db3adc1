//! The decoded payment demand carried by a `402 Payment Required` response.
//!
//! Both wire encodings in [`crate::proto`] decode into the same [`Challenge`].
//! `amount` and `address` are mandatory: a challenge without them is a parse
//! failure, never a zero value.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Network assumed when a challenge does not name one.
pub const DEFAULT_NETWORK: &str = "mainnet";

/// A payment demand extracted from a 402 response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Challenge {
    /// Amount to pay, in the smallest currency unit (satoshis for BCH).
    pub amount: u64,
    /// Destination identifier, e.g. `bitcoincash:qpm2...`. Opaque to the engine.
    pub address: String,
    /// Network the payment must be made on.
    pub network: String,
    /// Session credential issued alongside the challenge.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Asset or currency label (`"bch"`, `"sats"`). Informational.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset: Option<String>,
    /// Server-side payment identifier. Informational.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_id: Option<String>,
}

impl Challenge {
    /// Creates a challenge on the default network with no optional fields.
    pub fn new(amount: u64, address: impl Into<String>) -> Self {
        Self {
            amount,
            address: address.into(),
            network: DEFAULT_NETWORK.to_owned(),
            token: None,
            asset: None,
            payment_id: None,
        }
    }

    /// Sets the network.
    #[must_use]
    pub fn with_network(mut self, network: impl Into<String>) -> Self {
        self.network = network.into();
        self
    }

    /// Sets the session token.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Sets the asset label.
    #[must_use]
    pub fn with_asset(mut self, asset: impl Into<String>) -> Self {
        self.asset = Some(asset.into());
        self
    }

    /// Sets the payment identifier.
    #[must_use]
    pub fn with_payment_id(mut self, payment_id: impl Into<String>) -> Self {
        self.payment_id = Some(payment_id.into());
        self
    }
}

impl fmt::Display for Challenge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ", self.amount)?;
        match &self.asset {
            Some(asset) => write!(f, "{asset}")?,
            None => f.write_str("units")?,
        }
        write!(f, " to {} on {}", self.address, self.network)
    }
}
