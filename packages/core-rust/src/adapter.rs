//! Adapter compilation: one reusable converter per classified shape.
//!
//! Each strategy is a generic function instantiated for the concrete element
//! type of the operation's declared return type, so the converter takes the
//! operation's result by value. Nothing on the request path inspects types;
//! request-time invocation only calls the pre-built converter.

use std::fmt;
use std::sync::Arc;

use futures_util::future::{self, FutureExt};
use futures_util::stream::StreamExt;

use crate::shape::{CanonicalShape, ConfigError};
use crate::typeref::Declared;
use crate::types::{AsyncStream, EventStream, SourceValue, SubscriptionFuture};

type Convert<R> = dyn Fn(R) -> SubscriptionFuture + Send + Sync;

/// Which strategy a compiled adapter applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterKind {
    /// The operation already returns a `SubscriptionFuture`; pass it through.
    Identity,
    /// Suspend on the operation's handle, then upcast the resulting stream.
    AwaitThenUpcast,
    /// Upcast an already-available stream and hand it back as a completed handle.
    WrapAsCompleted,
}

impl AdapterKind {
    /// The strategy a classified shape calls for.
    #[must_use]
    pub fn for_shape(shape: &CanonicalShape) -> Self {
        match shape {
            CanonicalShape::DirectCanonical => Self::Identity,
            CanonicalShape::AsyncGeneric(_) => Self::AwaitThenUpcast,
            CanonicalShape::SyncGeneric(_) => Self::WrapAsCompleted,
        }
    }
}

// ---------------------------------------------------------------------------
// CompiledAdapter
// ---------------------------------------------------------------------------

/// Converter from an operation's result `R` into the canonical contract.
///
/// Built once per operation descriptor. Holds no per-call state, so a single
/// instance serves any number of concurrent invocations.
pub struct CompiledAdapter<R> {
    kind: AdapterKind,
    convert: Arc<Convert<R>>,
}

impl<R: Declared> CompiledAdapter<R> {
    /// Builds the adapter for `R`, classified as `shape`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::UnrecognizedShape` if `R` has no strategy for
    /// `shape`.
    pub fn compile(shape: &CanonicalShape) -> Result<Self, ConfigError> {
        let expected = AdapterKind::for_shape(shape);
        match R::return_adapter() {
            Some(adapter) if adapter.kind == expected => Ok(adapter),
            _ => Err(ConfigError::UnrecognizedShape {
                declared: R::declared_type().to_string(),
            }),
        }
    }
}

impl<R> CompiledAdapter<R> {
    #[must_use]
    pub fn kind(&self) -> AdapterKind {
        self.kind
    }

    /// Adapts one invocation result.
    #[must_use]
    pub fn adapt(&self, value: R) -> SubscriptionFuture {
        (self.convert)(value)
    }
}

impl<R> Clone for CompiledAdapter<R> {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            convert: Arc::clone(&self.convert),
        }
    }
}

impl<R> fmt::Debug for CompiledAdapter<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CompiledAdapter").field(&self.kind).finish()
    }
}

// ---------------------------------------------------------------------------
// Strategies
// ---------------------------------------------------------------------------

pub(crate) fn identity() -> CompiledAdapter<SubscriptionFuture> {
    CompiledAdapter {
        kind: AdapterKind::Identity,
        convert: Arc::new(|handle: SubscriptionFuture| handle),
    }
}

pub(crate) fn await_then_upcast<T: Send + 'static>(
    upcast: fn(T) -> SourceValue,
) -> CompiledAdapter<AsyncStream<T>> {
    CompiledAdapter {
        kind: AdapterKind::AwaitThenUpcast,
        convert: Arc::new(move |handle: AsyncStream<T>| -> SubscriptionFuture {
            handle
                .map(move |result| result.map(move |stream| upcast_stream(stream, upcast)))
                .boxed()
        }),
    }
}

pub(crate) fn wrap_as_completed<T: Send + 'static>(
    upcast: fn(T) -> SourceValue,
) -> CompiledAdapter<EventStream<T>> {
    CompiledAdapter {
        kind: AdapterKind::WrapAsCompleted,
        convert: Arc::new(move |stream: EventStream<T>| -> SubscriptionFuture {
            future::ready(Ok(upcast_stream(stream, upcast))).boxed()
        }),
    }
}

fn upcast_stream<T: Send + 'static>(
    stream: EventStream<T>,
    upcast: fn(T) -> SourceValue,
) -> EventStream<SourceValue> {
    stream.map(move |item| item.map(upcast)).boxed()
}
