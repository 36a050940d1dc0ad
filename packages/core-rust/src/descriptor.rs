//! Operation descriptors: a bound callable plus its classified shape and compiled adapter.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::adapter::{AdapterKind, CompiledAdapter};
use crate::context::RequestContext;
use crate::shape::{classify, CanonicalShape, ConfigError};
use crate::typeref::{Declared, TypeRef};
use crate::types::{FieldError, SourceValue, SubscriptionFuture};

/// Expression producing the call receiver from a request context.
pub trait ReceiverAccess: Send + Sync {
    /// Evaluates the receiver.
    ///
    /// # Errors
    ///
    /// Returns `FieldError` if the receiver cannot be produced for this request.
    fn receiver(&self, ctx: &RequestContext) -> Result<SourceValue, FieldError>;
}

/// Expression producing one positional argument from a request context.
pub trait ArgumentAccess: Send + Sync {
    /// Evaluates the argument.
    ///
    /// # Errors
    ///
    /// Returns `FieldError` if the argument cannot be produced for this request.
    fn argument(&self, ctx: &RequestContext) -> Result<SourceValue, FieldError>;
}

impl<F> ReceiverAccess for F
where
    F: Fn(&RequestContext) -> Result<SourceValue, FieldError> + Send + Sync,
{
    fn receiver(&self, ctx: &RequestContext) -> Result<SourceValue, FieldError> {
        self(ctx)
    }
}

impl<F> ArgumentAccess for F
where
    F: Fn(&RequestContext) -> Result<SourceValue, FieldError> + Send + Sync,
{
    fn argument(&self, ctx: &RequestContext) -> Result<SourceValue, FieldError> {
        self(ctx)
    }
}

type Invoke = dyn Fn(SourceValue, Vec<SourceValue>) -> SubscriptionFuture + Send + Sync;

/// Immutable registration-time record of a subscription operation.
///
/// Construction classifies the declared return type, compiles the adapter and
/// composes it with the operation; all three are fixed for the lifetime of the
/// descriptor.
pub struct OperationDescriptor {
    name: String,
    declared: TypeRef,
    shape: CanonicalShape,
    adapter: AdapterKind,
    receiver: Arc<dyn ReceiverAccess>,
    arguments: Vec<Arc<dyn ArgumentAccess>>,
    invoke: Box<Invoke>,
}

impl OperationDescriptor {
    /// Builds a descriptor for `operation`, whose declared return type is `R`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if `R` is not one of the recognized subscription
    /// shapes. The operation is never invoked in that case.
    pub fn new<R, F>(
        name: impl Into<String>,
        receiver: Arc<dyn ReceiverAccess>,
        arguments: Vec<Arc<dyn ArgumentAccess>>,
        operation: F,
    ) -> Result<Self, ConfigError>
    where
        R: Declared,
        F: Fn(SourceValue, Vec<SourceValue>) -> R + Send + Sync + 'static,
    {
        let name = name.into();
        let declared = R::declared_type();
        let shape = classify(&declared)?;
        let adapter = CompiledAdapter::<R>::compile(&shape)?;
        let kind = adapter.kind();
        debug!(operation = %name, %declared, %shape, adapter = ?kind, "compiled subscription adapter");

        Ok(Self {
            name,
            declared,
            shape,
            adapter: kind,
            receiver,
            arguments,
            invoke: Box::new(
                move |receiver: SourceValue, arguments: Vec<SourceValue>| -> SubscriptionFuture {
                    adapter.adapt(operation(receiver, arguments))
                },
            ),
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn declared_type(&self) -> &TypeRef {
        &self.declared
    }

    #[must_use]
    pub fn shape(&self) -> &CanonicalShape {
        &self.shape
    }

    /// The strategy the compiled adapter applies.
    #[must_use]
    pub fn adapter(&self) -> AdapterKind {
        self.adapter
    }

    #[must_use]
    pub fn arity(&self) -> usize {
        self.arguments.len()
    }

    /// Evaluates the receiver and arguments against `ctx`, then invokes the
    /// operation through the compiled adapter.
    pub(crate) fn invoke(&self, ctx: &RequestContext) -> Result<SubscriptionFuture, FieldError> {
        let receiver = self.receiver.receiver(ctx)?;
        let arguments = self
            .arguments
            .iter()
            .map(|argument| argument.argument(ctx))
            .collect::<Result<Vec<_>, _>>()?;
        Ok((self.invoke)(receiver, arguments))
    }
}

impl fmt::Debug for OperationDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationDescriptor")
            .field("name", &self.name)
            .field("declared", &self.declared.to_string())
            .field("shape", &self.shape)
            .field("adapter", &self.adapter)
            .field("arity", &self.arguments.len())
            .finish_non_exhaustive()
    }
}
