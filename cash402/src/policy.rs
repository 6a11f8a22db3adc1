//! Payment policies.
//!
//! Policies run after a challenge is parsed and before the payment rail is
//! called. The first policy that refuses a challenge stops the cycle; the
//! caller gets the unpaid 402 back and nothing is spent.

use std::fmt::Debug;

use crate::challenge::Challenge;

/// Reason a policy refused to pay a challenge.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct PolicyViolation(pub String);

/// A restriction on which challenges may be paid.
pub trait PaymentPolicy: Debug + Send + Sync {
    /// Checks whether `challenge` may be paid.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyViolation`] describing why the challenge is refused.
    fn check(&self, challenge: &Challenge) -> Result<(), PolicyViolation>;
}

/// Refuses challenges above a maximum amount.
///
/// Useful for limiting spending or implementing budget controls.
#[derive(Debug, Clone, Copy)]
pub struct MaxAmount(pub u64);

impl PaymentPolicy for MaxAmount {
    fn check(&self, challenge: &Challenge) -> Result<(), PolicyViolation> {
        if challenge.amount > self.0 {
            return Err(PolicyViolation(format!(
                "amount {} exceeds limit {}",
                challenge.amount, self.0
            )));
        }
        Ok(())
    }
}

/// Refuses challenges on networks outside an allow-list.
#[derive(Debug, Clone)]
pub struct AllowNetworks(pub Vec<String>);

impl AllowNetworks {
    /// Creates an allow-list from network names.
    pub fn new<I, S>(networks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(networks.into_iter().map(Into::into).collect())
    }
}

impl PaymentPolicy for AllowNetworks {
    fn check(&self, challenge: &Challenge) -> Result<(), PolicyViolation> {
        if self.0.iter().any(|n| n == &challenge.network) {
            Ok(())
        } else {
            Err(PolicyViolation(format!(
                "network {} is not allowed",
                challenge.network
            )))
        }
    }
}
