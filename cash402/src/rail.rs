//! The payment rail capability.
//!
//! A payment rail turns `(address, amount)` into a broadcast transaction id.
//! Signing, coin selection, funding and broadcast all live behind it; the
//! engine only needs the id to present as proof of payment. Implementations
//! are injected into the engine at construction, so a test double is just
//! another [`PaymentRail`].

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::proto::is_header_safe;

/// Boxed future returned by [`PaymentRail::pay`].
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A backend that can pay a challenge.
///
/// This trait is dyn-compatible; the engine holds rails as
/// `Arc<dyn PaymentRail>`.
pub trait PaymentRail: Send + Sync {
    /// Pays `amount` (smallest currency unit) to `address` and returns the
    /// broadcast transaction id.
    ///
    /// # Errors
    ///
    /// Returns [`RailError`] if signing, funding, or broadcast fails.
    fn pay<'a>(&'a self, address: &'a str, amount: u64)
    -> BoxFuture<'a, Result<PaymentProof, RailError>>;
}

impl<T: PaymentRail + ?Sized> PaymentRail for Arc<T> {
    fn pay<'a>(
        &'a self,
        address: &'a str,
        amount: u64,
    ) -> BoxFuture<'a, Result<PaymentProof, RailError>> {
        (**self).pay(address, amount)
    }
}

impl<T: PaymentRail + ?Sized> PaymentRail for Box<T> {
    fn pay<'a>(
        &'a self,
        address: &'a str,
        amount: u64,
    ) -> BoxFuture<'a, Result<PaymentProof, RailError>> {
        (**self).pay(address, amount)
    }
}

/// Proof of payment: the transaction id returned by a rail.
///
/// Never empty. It is embedded into the retry headers and not persisted.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PaymentProof(String);

impl PaymentProof {
    /// Wraps a transaction id.
    ///
    /// # Errors
    ///
    /// Returns [`RailError::EmptyTransactionId`] if the id is empty or blank,
    /// and [`RailError::InvalidTransactionId`] if it cannot be sent in an HTTP
    /// header.
    pub fn new(transaction_id: impl Into<String>) -> Result<Self, RailError> {
        let transaction_id = transaction_id.into();
        if transaction_id.trim().is_empty() {
            return Err(RailError::EmptyTransactionId);
        }
        if !is_header_safe(&transaction_id) {
            return Err(RailError::InvalidTransactionId(transaction_id));
        }
        Ok(Self(transaction_id))
    }

    /// Returns the transaction id.
    #[must_use]
    pub fn transaction_id(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PaymentProof {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for PaymentProof {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Failure variant of [`PaymentRail::pay`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RailError {
    /// The wallet or its user declined to pay.
    #[error("payment declined: {0}")]
    Declined(String),

    /// The rail reported success without a transaction id.
    #[error("payment rail returned no transaction id")]
    EmptyTransactionId,

    /// The rail returned a transaction id that cannot be sent as proof.
    #[error("payment rail returned an unusable transaction id: {0:?}")]
    InvalidTransactionId(String),

    /// Signing, funding, or broadcast failed.
    #[error("payment backend error: {0}")]
    Backend(String),
}
