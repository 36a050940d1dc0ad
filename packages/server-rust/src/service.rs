//! Subscribe service: the `tower::Service` the subscription engine calls to
//! start a subscription, plus a tracing layer around it.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

use futures_util::future::{self, FutureExt, TryFutureExt};
use subfield_core::{FieldError, RequestContext, SubscriptionStream};
use tower::{Layer, Service, ServiceBuilder};
use tracing::{info_span, Instrument, Span};

use crate::registry::SubscriptionSchema;

type SubscribeFuture =
    Pin<Box<dyn Future<Output = Result<SubscriptionStream, SubscribeError>> + Send>>;

/// A request to start one subscription.
#[derive(Debug, Clone)]
pub struct SubscribeRequest {
    pub field: String,
    pub ctx: RequestContext,
}

impl SubscribeRequest {
    pub fn new(field: impl Into<String>, ctx: RequestContext) -> Self {
        Self {
            field: field.into(),
            ctx,
        }
    }
}

/// Errors returned when starting a subscription.
#[derive(Debug, thiserror::Error)]
pub enum SubscribeError {
    #[error("unknown subscription field: {field}")]
    UnknownField { field: String },
    #[error(transparent)]
    Field(#[from] FieldError),
}

// ---------------------------------------------------------------------------
// SubscribeService
// ---------------------------------------------------------------------------

/// Routes a `SubscribeRequest` to the field's resolver in a frozen schema.
///
/// The response is the canonical element stream; the caller owns iterating it.
#[derive(Debug, Clone)]
pub struct SubscribeService {
    schema: Arc<SubscriptionSchema>,
}

impl SubscribeService {
    #[must_use]
    pub fn new(schema: Arc<SubscriptionSchema>) -> Self {
        Self { schema }
    }
}

impl Service<SubscribeRequest> for SubscribeService {
    type Response = SubscriptionStream;
    type Error = SubscribeError;
    type Future = SubscribeFuture;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    /// The resolver runs here, synchronously. Records the field's shape on the
    /// current span when one is entered.
    fn call(&mut self, req: SubscribeRequest) -> Self::Future {
        match self.schema.resolver(&req.field) {
            Some(resolver) => {
                Span::current().record("shape", resolver.descriptor().shape().label());
                resolver.subscribe(&req.ctx).map_err(SubscribeError::from).boxed()
            }
            None => future::ready(Err(SubscribeError::UnknownField { field: req.field })).boxed(),
        }
    }
}

// ---------------------------------------------------------------------------
// TracingLayer
// ---------------------------------------------------------------------------

/// Tower layer that wraps subscribe calls in a `tracing` span recording
/// shape, duration and outcome.
#[derive(Debug, Clone)]
pub struct TracingLayer;

impl<S> Layer<S> for TracingLayer {
    type Service = TracingService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TracingService { inner }
    }
}

/// Service wrapper that records subscribe duration and outcome in a span.
///
/// Errors pass through untouched, and dropping the returned future drops the
/// inner one.
#[derive(Debug, Clone)]
pub struct TracingService<S> {
    inner: S,
}

impl<S> Service<SubscribeRequest> for TracingService<S>
where
    S: Service<SubscribeRequest, Response = SubscriptionStream, Error = SubscribeError> + Send,
    S::Future: Send + 'static,
{
    type Response = SubscriptionStream;
    type Error = SubscribeError;
    type Future = SubscribeFuture;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: SubscribeRequest) -> Self::Future {
        let span = info_span!(
            "subscribe",
            field = %req.field,
            trace_id = %req.ctx.trace_id,
            shape = tracing::field::Empty,
            duration_ms = tracing::field::Empty,
            outcome = tracing::field::Empty,
        );

        let start = Instant::now();
        let fut = span.in_scope(|| self.inner.call(req));

        Box::pin(
            async move {
                let result = fut.await;
                let duration_ms = start.elapsed().as_millis();

                let outcome = match &result {
                    Ok(_) => "ok",
                    Err(SubscribeError::UnknownField { .. }) => "unknown_field",
                    Err(SubscribeError::Field(_)) => "error",
                };

                #[allow(clippy::cast_possible_truncation)]
                let duration_u64 = duration_ms as u64;
                Span::current().record("duration_ms", duration_u64);
                Span::current().record("outcome", outcome);

                tracing::debug!(duration_ms = duration_u64, outcome, "subscription started");

                result
            }
            .instrument(span),
        )
    }
}

/// Builds the subscribe service stack for a frozen schema.
#[must_use]
pub fn build_subscribe_service(schema: Arc<SubscriptionSchema>) -> TracingService<SubscribeService> {
    ServiceBuilder::new()
        .layer(TracingLayer)
        .service(SubscribeService::new(schema))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
