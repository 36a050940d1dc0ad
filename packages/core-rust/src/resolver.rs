//! Per-request entry points for a subscription field.

use std::sync::Arc;

use futures_util::future::{self, FutureExt};

use crate::context::RequestContext;
use crate::descriptor::OperationDescriptor;
use crate::types::{SourceValue, SubscriptionFuture};

/// Resolver for one subscription field, backed by a shared descriptor.
///
/// Cloning is cheap; every clone uses the same compiled adapter.
#[derive(Debug, Clone)]
pub struct SubscriptionResolver {
    descriptor: Arc<OperationDescriptor>,
}

impl SubscriptionResolver {
    #[must_use]
    pub fn new(descriptor: Arc<OperationDescriptor>) -> Self {
        Self { descriptor }
    }

    #[must_use]
    pub fn descriptor(&self) -> &Arc<OperationDescriptor> {
        &self.descriptor
    }

    /// Returns the context's current source value unchanged.
    ///
    /// Called for each delivered event, after the engine has installed the
    /// event payload as the source.
    #[must_use]
    pub fn resolve_value(&self, ctx: &RequestContext) -> SourceValue {
        ctx.source().clone()
    }

    /// Binds the call against `ctx`, invokes the operation and adapts its result.
    ///
    /// The operation runs before this returns. Suspension only happens when
    /// the returned handle is awaited, and only if the operation itself
    /// returned an asynchronous handle. Binding failures resolve the handle
    /// with the binder's error.
    #[must_use]
    pub fn subscribe(&self, ctx: &RequestContext) -> SubscriptionFuture {
        self.descriptor
            .invoke(ctx)
            .unwrap_or_else(|err| future::ready(Err(err)).boxed())
    }
}

impl From<OperationDescriptor> for SubscriptionResolver {
    fn from(descriptor: OperationDescriptor) -> Self {
        Self::new(Arc::new(descriptor))
    }
}
