//! Lifecycle hooks around a payment cycle.
//!
//! Hooks observe, and may veto, the payment the engine is about to make:
//!
//! - **Before**: Inspect the challenge and abort the payment
//! - **After**: Observe the proof of a successful payment
//! - **On Failure**: Observe why a payment did not happen
//! - **On Challenge Error**: Observe a 402 whose challenge could not be read
//!
//! All methods have default no-op implementations. Hooks never change the
//! response handed back to the caller; they are the reporting channel for
//! the conditions the engine deliberately does not raise.

use std::future::Future;
use std::pin::Pin;

use crate::challenge::Challenge;
use crate::error::{ChallengeError, PaymentFailure};
use crate::proto::WireFormat;
use crate::rail::PaymentProof;

type BoxFut<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Decision returned by [`PaymentHooks::before_payment`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookDecision {
    /// Let the payment proceed.
    Continue,
    /// Skip the payment and return the unpaid response.
    Abort {
        /// Human-readable reason for aborting.
        reason: String,
    },
}

/// Everything known about a payment cycle once its challenge is parsed.
#[derive(Debug, Clone)]
pub struct PaymentContext {
    /// Target the request was sent to (the session cache key).
    pub target: String,
    /// Encoding the challenge arrived in.
    pub format: WireFormat,
    /// The decoded challenge.
    pub challenge: Challenge,
}

/// Lifecycle hooks for the payment cycle.
///
/// This trait is dyn-compatible for use in heterogeneous hook lists.
/// Multiple hooks run in registration order; the first abort wins.
pub trait PaymentHooks: Send + Sync {
    /// Called before the payment rail is invoked.
    fn before_payment<'a>(&'a self, _ctx: &'a PaymentContext) -> BoxFut<'a, HookDecision> {
        Box::pin(async { HookDecision::Continue })
    }

    /// Called after the rail returned a transaction id, before the retry.
    fn after_payment<'a>(
        &'a self,
        _ctx: &'a PaymentContext,
        _proof: &'a PaymentProof,
    ) -> BoxFut<'a, ()> {
        Box::pin(async {})
    }

    /// Called when the cycle stops without paying, or the payment failed.
    fn on_payment_failure<'a>(
        &'a self,
        _ctx: &'a PaymentContext,
        _failure: &'a PaymentFailure,
    ) -> BoxFut<'a, ()> {
        Box::pin(async {})
    }

    /// Called when a 402 carried no usable challenge.
    fn on_challenge_error<'a>(
        &'a self,
        _target: &'a str,
        _error: &'a ChallengeError,
    ) -> BoxFut<'a, ()> {
        Box::pin(async {})
    }
}

impl<T: PaymentHooks + ?Sized> PaymentHooks for std::sync::Arc<T> {
    fn before_payment<'a>(&'a self, ctx: &'a PaymentContext) -> BoxFut<'a, HookDecision> {
        (**self).before_payment(ctx)
    }

    fn after_payment<'a>(
        &'a self,
        ctx: &'a PaymentContext,
        proof: &'a PaymentProof,
    ) -> BoxFut<'a, ()> {
        (**self).after_payment(ctx, proof)
    }

    fn on_payment_failure<'a>(
        &'a self,
        ctx: &'a PaymentContext,
        failure: &'a PaymentFailure,
    ) -> BoxFut<'a, ()> {
        (**self).on_payment_failure(ctx, failure)
    }

    fn on_challenge_error<'a>(
        &'a self,
        target: &'a str,
        error: &'a ChallengeError,
    ) -> BoxFut<'a, ()> {
        (**self).on_challenge_error(target, error)
    }
}
