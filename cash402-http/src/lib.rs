#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! HTTP transport for the x402 challenge/pay/retry engine.
//!
//! Provides header-level challenge selection and proof attachment, and
//! (feature-gated) a reqwest middleware and client that pay `402 Payment
//! Required` responses automatically.
//!
//! # Modules
//!
//! - [`constants`] - HTTP header names and well-known paths
//! - [`headers`] - Challenge selection and proof headers on [`http::HeaderMap`]
//! - [`error`] - HTTP transport error types
//! - [`client`] - Payment middleware and request surface (feature: `client`)
//! - [`discovery`] - `/.well-known/402.json` fetch (feature: `client`)

pub mod constants;
pub mod error;
pub mod headers;

#[cfg(feature = "client")]
pub mod client;
#[cfg(feature = "client")]
pub mod discovery;
