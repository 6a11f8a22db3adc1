#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Core types for the x402 challenge/pay/retry protocol.
//!
//! A server that wants to be paid answers `402 Payment Required` with a
//! machine-readable challenge. The client settles the challenge through a
//! payment rail, then retries the original request carrying the transaction
//! id as proof of payment. This crate holds everything about that exchange
//! that does not depend on a particular HTTP client.
//!
//! # Modules
//!
//! - [`challenge`] - The decoded payment demand
//! - [`proto`] - The two wire encodings (legacy `PAYMENT-REQUIRED` and
//!   `WWW-Authenticate: x402`) and their proof header conventions
//! - [`rail`] - The payment rail capability the engine pays through
//! - [`session`] - Per-target session token cache
//! - [`policy`] - Spending and network restrictions applied before paying
//! - [`hooks`] - Lifecycle hooks around a payment cycle
//! - [`config`] - Client configuration
//! - [`discovery`] - The `/.well-known/402.json` manifest model
//! - [`error`] - Challenge and payment failure types
//!
//! # Feature Flags
//!
//! - `telemetry` - Enables tracing instrumentation for debugging and monitoring

pub mod challenge;
pub mod config;
pub mod discovery;
pub mod error;
pub mod hooks;
pub mod policy;
pub mod proto;
pub mod rail;
pub mod session;

pub use challenge::Challenge;
pub use config::ClientConfig;
pub use error::{ChallengeError, PaymentFailure};
pub use proto::WireFormat;
pub use rail::{PaymentProof, PaymentRail, RailError};
pub use session::{SessionCache, SessionToken};
