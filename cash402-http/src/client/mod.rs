//! Reqwest middleware and request surface for automatic x402 payments.
//!
//! [`X402Payments`] is a `reqwest` middleware: when a request receives a
//! `402 Payment Required` response, it decodes the challenge, pays it through
//! the configured [`PaymentRail`](cash402::PaymentRail), and retries the
//! request once with proof of payment.
//!
//! [`X402HttpClient`] wraps the middleware in the plain request surface
//! (`get`/`post`/`put`/`delete`/`send`) and keys the session cache by the
//! literal target string the caller passed. To put the middleware on an
//! existing client instead, use [`ReqwestWithPayments`].
//!
//! ## Outcomes
//!
//! A call only fails when the transport does. An unreadable challenge, a
//! refused or failed payment, or a missing rail all hand back the original
//! 402; a paid cycle hands back whatever the single retry returned. Either
//! way the response carries a [`PaymentOutcome`] in its extensions.

mod middleware;

pub use middleware::*;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use cash402::discovery::DiscoveryManifest;
use cash402::{SessionCache, SessionToken};
use http::Method;
use reqwest::{Client, ClientBuilder, Response};
use reqwest_middleware as rqm;
use serde::Serialize;

use crate::discovery::{DiscoveryError, fetch_manifest};
use crate::error::TransportError;

/// Per-request options for [`X402HttpClient::send`].
#[derive(Debug, Default)]
pub struct RequestOptions {
    /// Extra request headers. Names are case-insensitive.
    pub headers: HashMap<String, String>,
    /// Request body.
    pub body: Option<reqwest::Body>,
    /// Bound on each network operation of the call, and on the payment when
    /// no payment timeout is configured.
    pub timeout: Option<Duration>,
}

impl RequestOptions {
    /// Creates empty options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a request header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Sets the request body.
    #[must_use]
    pub fn body(mut self, body: impl Into<reqwest::Body>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Sets a JSON body and the matching `Content-Type`.
    ///
    /// # Errors
    ///
    /// Returns [`serde_json::Error`] if `value` cannot be serialized.
    pub fn json<T: Serialize + ?Sized>(mut self, value: &T) -> Result<Self, serde_json::Error> {
        let bytes = serde_json::to_vec(value)?;
        self.headers
            .insert("Content-Type".to_owned(), "application/json".to_owned());
        self.body = Some(bytes.into());
        Ok(self)
    }

    /// Sets the request timeout.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// HTTP client that pays `402 Payment Required` responses.
///
/// Cloning is cheap; clones share the connection pool and session cache.
#[derive(Clone)]
#[allow(missing_debug_implementations)] // middleware stack does not implement Debug
pub struct X402HttpClient {
    http: Client,
    inner: rqm::ClientWithMiddleware,
    sessions: Arc<SessionCache>,
}

impl X402HttpClient {
    /// Creates a client with default `reqwest` settings.
    #[must_use]
    pub fn new(payments: X402Payments) -> Self {
        Self::with_client(Client::new(), payments)
    }

    /// Creates a client on top of a configured `reqwest` client.
    #[must_use]
    pub fn with_client(client: Client, payments: X402Payments) -> Self {
        let sessions = payments.shared_sessions();
        let inner = rqm::ClientBuilder::new(client.clone()).with(payments).build();
        Self {
            http: client,
            inner,
            sessions,
        }
    }

    /// Sends a `GET` request.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] if the network I/O fails.
    pub async fn get(
        &self,
        url: &str,
        options: RequestOptions,
    ) -> Result<Response, TransportError> {
        self.send(Method::GET, url, options).await
    }

    /// Sends a `POST` request.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] if the network I/O fails.
    pub async fn post(
        &self,
        url: &str,
        options: RequestOptions,
    ) -> Result<Response, TransportError> {
        self.send(Method::POST, url, options).await
    }

    /// Sends a `PUT` request.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] if the network I/O fails.
    pub async fn put(
        &self,
        url: &str,
        options: RequestOptions,
    ) -> Result<Response, TransportError> {
        self.send(Method::PUT, url, options).await
    }

    /// Sends a `DELETE` request.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] if the network I/O fails.
    pub async fn delete(
        &self,
        url: &str,
        options: RequestOptions,
    ) -> Result<Response, TransportError> {
        self.send(Method::DELETE, url, options).await
    }

    /// Sends a request, paying for it if the server answers 402.
    ///
    /// `url` is also the session cache key, exactly as given.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] if the URL or a header is invalid, or if the
    /// network I/O of the request or its retry fails. Payment-cycle failures
    /// are not errors; they return the unpaid 402.
    #[cfg_attr(
        feature = "telemetry",
        tracing::instrument(name = "x402.send", skip(self, options), err)
    )]
    pub async fn send(
        &self,
        method: Method,
        url: &str,
        options: RequestOptions,
    ) -> Result<Response, TransportError> {
        let mut request = self
            .inner
            .request(method, url)
            .with_extension(RequestTarget(url.to_owned()));
        for (name, value) in &options.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        if let Some(body) = options.body {
            request = request.body(body);
        }
        if let Some(timeout) = options.timeout {
            request = request.timeout(timeout);
        }
        Ok(request.send().await?)
    }

    /// The session tokens cached by this client.
    #[must_use]
    pub fn sessions(&self) -> &SessionCache {
        &self.sessions
    }

    /// Drops the session token cached for `url`.
    pub fn forget(&self, url: &str) -> Option<SessionToken> {
        self.sessions.remove(url)
    }

    /// Fetches the `/.well-known/402.json` manifest for the origin of `base`.
    ///
    /// The request bypasses the payment middleware.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError`] if the manifest cannot be fetched or decoded.
    pub async fn discover(&self, base: &str) -> Result<DiscoveryManifest, DiscoveryError> {
        fetch_manifest(&self.http, base).await
    }
}

/// Trait for adding x402 payment handling to reqwest clients.
///
/// This trait is implemented on [`Client`] and [`ClientBuilder`]. Requests
/// sent through the resulting client key their session tokens by request URL.
pub trait ReqwestWithPayments<A> {
    /// Adds x402 payment middleware to the client or builder.
    fn with_payments(self, payments: X402Payments) -> ReqwestWithPaymentsBuilder<A>;
}

impl ReqwestWithPayments<Self> for Client {
    fn with_payments(self, payments: X402Payments) -> ReqwestWithPaymentsBuilder<Self> {
        ReqwestWithPaymentsBuilder {
            inner: self,
            payments,
        }
    }
}

impl ReqwestWithPayments<Self> for ClientBuilder {
    fn with_payments(self, payments: X402Payments) -> ReqwestWithPaymentsBuilder<Self> {
        ReqwestWithPaymentsBuilder {
            inner: self,
            payments,
        }
    }
}

/// Builder for creating a reqwest client with x402 middleware.
#[allow(missing_debug_implementations)] // generic A may not implement Debug
pub struct ReqwestWithPaymentsBuilder<A> {
    inner: A,
    payments: X402Payments,
}

/// Trait for building the final client from a [`ReqwestWithPaymentsBuilder`].
pub trait ReqwestWithPaymentsBuild {
    /// The type returned by [`build`](Self::build)
    type BuildResult;
    /// The type returned by [`builder`](Self::builder)
    type BuilderResult;

    /// Builds the client, consuming the builder.
    fn build(self) -> Self::BuildResult;

    /// Returns the underlying reqwest client builder with middleware added.
    fn builder(self) -> Self::BuilderResult;
}

impl ReqwestWithPaymentsBuild for ReqwestWithPaymentsBuilder<Client> {
    type BuildResult = rqm::ClientWithMiddleware;
    type BuilderResult = rqm::ClientBuilder;

    fn build(self) -> Self::BuildResult {
        self.builder().build()
    }

    fn builder(self) -> Self::BuilderResult {
        rqm::ClientBuilder::new(self.inner).with(self.payments)
    }
}

impl ReqwestWithPaymentsBuild for ReqwestWithPaymentsBuilder<ClientBuilder> {
    type BuildResult = Result<rqm::ClientWithMiddleware, reqwest::Error>;
    type BuilderResult = Result<rqm::ClientBuilder, reqwest::Error>;

    fn build(self) -> Self::BuildResult {
        let builder = self.builder()?;
        Ok(builder.build())
    }

    fn builder(self) -> Self::BuilderResult {
        let client = self.inner.build()?;
        Ok(rqm::ClientBuilder::new(client).with(self.payments))
    }
}
