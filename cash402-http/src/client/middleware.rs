//! Client-side x402 payment handling for reqwest.
//!
//! This module provides [`X402Payments`], a `reqwest` middleware that runs
//! the challenge/pay/retry cycle for every request passing through it.

use std::sync::Arc;
use std::time::Duration;

use cash402::hooks::{HookDecision, PaymentContext, PaymentHooks};
use cash402::policy::{MaxAmount, PaymentPolicy};
use cash402::{
    Challenge, ChallengeError, ClientConfig, PaymentFailure, PaymentProof, PaymentRail,
    SessionCache, SessionToken, WireFormat,
};
use http::Extensions;
use reqwest::{Request, Response};
use reqwest_middleware as rqm;
#[cfg(feature = "telemetry")]
use tracing::{debug, info, instrument, trace, warn};

use crate::constants::{HTTP_STATUS_PAYMENT_REQUIRED, X_PAYMENT_RESPONSE_HEADER};
use crate::headers::{find_challenge, insert_all};

/// The literal target a request was issued for, used as the session cache key.
///
/// [`X402HttpClient`](super::X402HttpClient) attaches this to every request.
/// Requests without it are keyed by their serialized URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestTarget(pub String);

/// What happened to the payment cycle of a request.
///
/// Inserted into the extensions of every response that went through a 402.
/// Callers decide on status alone; this is detail for messaging.
#[derive(Debug, Clone)]
pub enum PaymentOutcome {
    /// A payment was made and the request retried. Attached to the retry's response.
    Paid(PaymentReceipt),
    /// No payment was made. Attached to the original 402.
    Unpaid(UnpaidReason),
}

/// Record of a payment made on behalf of a request.
#[derive(Debug, Clone)]
pub struct PaymentReceipt {
    /// The challenge that was paid.
    pub challenge: Challenge,
    /// Encoding the challenge arrived in, and the proof was sent in.
    pub format: WireFormat,
    /// Transaction id returned by the rail.
    pub proof: PaymentProof,
}

/// Why a 402 was handed back unpaid.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UnpaidReason {
    /// The response carried no usable challenge.
    #[error(transparent)]
    Challenge(#[from] ChallengeError),
    /// The challenge was valid but the payment did not happen.
    #[error(transparent)]
    Payment(#[from] PaymentFailure),
}

/// `reqwest` middleware that pays `402 Payment Required` responses.
///
/// For each request it:
/// 1. Presents any session token cached for the request's target
/// 2. Sends the request; anything but a 402 is returned as-is
/// 3. Decodes the challenge, checks policies and hooks, and pays through the rail
/// 4. Retries a copy of the original request once, carrying the proof
///
/// At most one payment and one retry happen per request, whatever the retry
/// returns. Only transport failures are errors; every protocol failure hands
/// back the unpaid 402.
#[allow(missing_debug_implementations)] // dyn trait objects do not implement Debug
pub struct X402Payments {
    rail: Option<Arc<dyn PaymentRail>>,
    sessions: Arc<SessionCache>,
    policies: Vec<Arc<dyn PaymentPolicy>>,
    hooks: Arc<[Arc<dyn PaymentHooks>]>,
    config: ClientConfig,
}

impl Default for X402Payments {
    fn default() -> Self {
        Self {
            rail: None,
            sessions: Arc::new(SessionCache::new()),
            policies: Vec::new(),
            hooks: Arc::from([]),
            config: ClientConfig::default(),
        }
    }
}

impl X402Payments {
    /// Creates a middleware that pays through `rail`.
    #[must_use]
    pub fn new(rail: impl PaymentRail + 'static) -> Self {
        Self::default().with_rail(rail)
    }

    /// Creates a middleware with no payment rail.
    ///
    /// Every 402 is handed back unpaid with
    /// [`PaymentFailure::NoWalletConfigured`]; cached session tokens are still
    /// presented.
    #[must_use]
    pub fn without_rail() -> Self {
        Self::default()
    }

    /// Binds the payment rail.
    #[must_use]
    pub fn with_rail(mut self, rail: impl PaymentRail + 'static) -> Self {
        self.rail = Some(Arc::new(rail));
        self
    }

    /// Applies a configuration, replacing any earlier one.
    ///
    /// A `max_amount` is enforced as a [`MaxAmount`] policy ahead of the
    /// registered ones.
    #[must_use]
    pub fn with_config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Adds a payment policy.
    ///
    /// Policies are checked in registration order; the first refusal stops
    /// the payment.
    #[must_use]
    pub fn with_policy<P: PaymentPolicy + 'static>(mut self, policy: P) -> Self {
        self.policies.push(Arc::new(policy));
        self
    }

    /// Adds a lifecycle hook. Hooks run in registration order.
    #[must_use]
    pub fn with_hook(mut self, hook: impl PaymentHooks + 'static) -> Self {
        let mut hooks = (*self.hooks).to_vec();
        hooks.push(Arc::new(hook));
        self.hooks = Arc::from(hooks);
        self
    }

    /// The session token cache.
    #[must_use]
    pub fn sessions(&self) -> &SessionCache {
        &self.sessions
    }

    pub(crate) fn shared_sessions(&self) -> Arc<SessionCache> {
        Arc::clone(&self.sessions)
    }

    /// The active configuration.
    #[must_use]
    pub const fn config(&self) -> &ClientConfig {
        &self.config
    }
}

/// States of one request's payment cycle.
///
/// `Retrying` can only move to `Done`, so a request is paid for at most once.
/// `Proving` has no failure edge: every check that could stop a cycle runs
/// before the rail is called.
enum Phase {
    Initial(Request),
    Responded {
        response: Response,
        retry: Option<Request>,
    },
    Challenged {
        response: Response,
        retry: Option<Request>,
    },
    Paying {
        response: Response,
        retry: Option<Request>,
        ctx: PaymentContext,
    },
    Proving {
        retry: Request,
        ctx: PaymentContext,
        proof: PaymentProof,
    },
    Retrying {
        request: Request,
        receipt: PaymentReceipt,
    },
    Done(Response),
}

/// Runs the next middleware or HTTP client with optional telemetry instrumentation.
#[cfg_attr(
    feature = "telemetry",
    instrument(name = "x402.reqwest.next", skip_all)
)]
async fn run_next(
    next: rqm::Next<'_>,
    req: Request,
    extensions: &mut Extensions,
) -> rqm::Result<Response> {
    next.run(req, extensions).await
}

fn with_outcome(mut response: Response, outcome: PaymentOutcome) -> Response {
    response.extensions_mut().insert(outcome);
    response
}

impl X402Payments {
    /// Hands back the unpaid 402 after reporting why the challenge was unusable.
    async fn reject_challenge(
        &self,
        target: &str,
        error: ChallengeError,
        response: Response,
    ) -> Phase {
        #[cfg(feature = "telemetry")]
        warn!(url = %target, error = %error, "402 without a usable x402 challenge");
        for hook in self.hooks.iter() {
            hook.on_challenge_error(target, &error).await;
        }
        Phase::Done(with_outcome(
            response,
            PaymentOutcome::Unpaid(error.into()),
        ))
    }

    /// Hands back the unpaid 402 after reporting why the payment did not happen.
    async fn abandon(
        &self,
        ctx: &PaymentContext,
        failure: PaymentFailure,
        response: Response,
    ) -> Phase {
        #[cfg(feature = "telemetry")]
        warn!(url = %ctx.target, challenge = %ctx.challenge, error = %failure, "x402 payment not made");
        for hook in self.hooks.iter() {
            hook.on_payment_failure(ctx, &failure).await;
        }
        Phase::Done(with_outcome(
            response,
            PaymentOutcome::Unpaid(failure.into()),
        ))
    }

    /// Checks everything that must hold before money moves.
    async fn authorize(&self, ctx: &PaymentContext) -> Result<(), PaymentFailure> {
        let cap = self.config.max_amount.map(MaxAmount);
        let configured = cap.iter().map(|cap| -> &dyn PaymentPolicy { cap });
        let registered = self.policies.iter().map(|policy| &**policy);
        for policy in configured.chain(registered) {
            policy
                .check(&ctx.challenge)
                .map_err(|violation| PaymentFailure::Rejected(violation.0))?;
        }
        for hook in self.hooks.iter() {
            if let HookDecision::Abort { reason } = hook.before_payment(ctx).await {
                return Err(PaymentFailure::Aborted(reason));
            }
        }
        Ok(())
    }

    /// Authorizes and makes the payment, returning the retry envelope and proof.
    async fn settle(
        &self,
        rail: &dyn PaymentRail,
        ctx: &PaymentContext,
        retry: Option<Request>,
    ) -> Result<(Request, PaymentProof), PaymentFailure> {
        self.authorize(ctx).await?;
        let retry = retry.ok_or(PaymentFailure::RequestNotCloneable)?;
        let timeout = self
            .config
            .payment_timeout
            .or_else(|| retry.timeout().copied());
        let proof = self.pay(rail, &ctx.challenge, timeout).await?;
        Ok((retry, proof))
    }

    /// Calls the rail, bounded by the payment timeout.
    async fn pay(
        &self,
        rail: &dyn PaymentRail,
        challenge: &Challenge,
        timeout: Option<Duration>,
    ) -> Result<PaymentProof, PaymentFailure> {
        #[cfg(feature = "telemetry")]
        info!(challenge = %challenge, "Paying x402 challenge");
        let payment = rail.pay(&challenge.address, challenge.amount);
        match timeout {
            Some(limit) => match tokio::time::timeout(limit, payment).await {
                Ok(result) => result.map_err(PaymentFailure::from),
                Err(_) => Err(PaymentFailure::TimedOut),
            },
            None => payment.await.map_err(PaymentFailure::from),
        }
    }

    /// Caches the token a server echoes in `X-PAYMENT-RESPONSE` on an unlocked response.
    fn refresh_session(&self, target: &str, format: WireFormat, response: &Response) {
        let echoed = response
            .headers()
            .get(X_PAYMENT_RESPONSE_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|token| !token.is_empty());
        if let Some(token) = echoed {
            self.sessions
                .insert(target.to_owned(), SessionToken::new(token, format));
        }
    }

    /// Drives one request through the payment cycle.
    async fn run(
        &self,
        req: Request,
        extensions: &mut Extensions,
        next: rqm::Next<'_>,
    ) -> rqm::Result<Response> {
        let target = extensions
            .get::<RequestTarget>()
            .map_or_else(|| req.url().as_str().to_owned(), |t| t.0.clone());

        // Session token sent on the first attempt, if any.
        let mut presented: Option<SessionToken> = None;
        let mut phase = Phase::Initial(req);
        loop {
            phase = match phase {
                Phase::Initial(mut request) => {
                    // The caller's envelope, before any cached credential is added.
                    let retry = request.try_clone();
                    if self.config.session_reuse {
                        if let Some(session) = self.sessions.get(&target) {
                            #[cfg(feature = "telemetry")]
                            debug!(url = %target, format = %session.format, "Presenting cached session token");
                            match insert_all(request.headers_mut(), session.headers()) {
                                Ok(()) => presented = Some(session),
                                Err(_err) => {
                                    #[cfg(feature = "telemetry")]
                                    warn!(url = %target, error = %_err, "Cached session token is not a valid header");
                                }
                            }
                        }
                    }
                    let response = run_next(next.clone(), request, extensions).await?;
                    Phase::Responded { response, retry }
                }
                Phase::Responded { response, retry } => {
                    if response.status().as_u16() == HTTP_STATUS_PAYMENT_REQUIRED {
                        Phase::Challenged { response, retry }
                    } else {
                        #[cfg(feature = "telemetry")]
                        trace!(status = ?response.status(), "No payment required, returning response");
                        Phase::Done(response)
                    }
                }
                Phase::Challenged { response, retry } => {
                    #[cfg(feature = "telemetry")]
                    info!(url = %target, "Received 402 Payment Required");
                    match find_challenge(response.headers()) {
                        Ok((format, challenge)) => Phase::Paying {
                            response,
                            retry,
                            ctx: PaymentContext {
                                target: target.clone(),
                                format,
                                challenge,
                            },
                        },
                        Err(error) => self.reject_challenge(&target, error, response).await,
                    }
                }
                Phase::Paying {
                    response,
                    retry,
                    ctx,
                } => {
                    let paid = match self.rail.as_deref() {
                        Some(rail) => self.settle(rail, &ctx, retry).await,
                        None => Err(PaymentFailure::NoWalletConfigured),
                    };
                    match paid {
                        Ok((retry, proof)) => Phase::Proving {
                            retry,
                            ctx,
                            proof,
                        },
                        Err(failure) => self.abandon(&ctx, failure, response).await,
                    }
                }
                Phase::Proving {
                    mut retry,
                    ctx,
                    proof,
                } => {
                    // Token and proof are header-safe by construction; once paid,
                    // the only way out is the retry.
                    let issued = ctx.challenge.token.clone();
                    let credential = issued.clone().or_else(|| {
                        presented
                            .take()
                            .filter(|session| session.format == ctx.format)
                            .map(|session| session.token)
                    });
                    let proof_headers = ctx.format.proof_headers(&proof, credential.as_deref());
                    if let Err(_err) = insert_all(retry.headers_mut(), proof_headers) {
                        #[cfg(feature = "telemetry")]
                        warn!(transaction = %proof, error = %_err, "Proof header rejected");
                    }
                    if let Some(token) = issued {
                        self.sessions
                            .insert(ctx.target.clone(), SessionToken::new(token, ctx.format));
                    }
                    #[cfg(feature = "telemetry")]
                    info!(transaction = %proof, format = %ctx.format, "x402 payment broadcast");
                    for hook in self.hooks.iter() {
                        hook.after_payment(&ctx, &proof).await;
                    }
                    if !self.config.retry_delay.is_zero() {
                        tokio::time::sleep(self.config.retry_delay).await;
                    }
                    Phase::Retrying {
                        request: retry,
                        receipt: PaymentReceipt {
                            challenge: ctx.challenge,
                            format: ctx.format,
                            proof,
                        },
                    }
                }
                Phase::Retrying { request, receipt } => {
                    #[cfg(feature = "telemetry")]
                    trace!(url = ?request.url(), "Retrying request with payment proof");
                    let response = run_next(next.clone(), request, extensions).await?;
                    if response.status().is_success() {
                        self.refresh_session(&target, receipt.format, &response);
                    }
                    Phase::Done(with_outcome(response, PaymentOutcome::Paid(receipt)))
                }
                Phase::Done(response) => return Ok(response),
            };
        }
    }
}

#[async_trait::async_trait]
impl rqm::Middleware for X402Payments {
    /// Handles a request, paying for it if the server answers 402.
    #[cfg_attr(
        feature = "telemetry",
        instrument(name = "x402.reqwest.handle", skip_all, err)
    )]
    async fn handle(
        &self,
        req: Request,
        extensions: &mut Extensions,
        next: rqm::Next<'_>,
    ) -> rqm::Result<Response> {
        self.run(req, extensions, next).await
    }
}
