//! Ready-made receiver and argument expressions.

use subfield_core::{ArgumentAccess, FieldError, Object, ReceiverAccess, RequestContext, SourceValue};

/// A required argument was not supplied with the request.
#[derive(Debug, thiserror::Error)]
#[error("missing required argument `{name}`")]
pub struct MissingArgument {
    pub name: String,
}

/// Receiver read from the context's current source value.
#[derive(Debug, Clone, Copy, Default)]
pub struct SourceReceiver;

impl ReceiverAccess for SourceReceiver {
    fn receiver(&self, ctx: &RequestContext) -> Result<SourceValue, FieldError> {
        Ok(ctx.source().clone())
    }
}

/// Receiver fixed at registration time, e.g. a service instance.
#[derive(Debug, Clone, Default)]
pub struct StaticReceiver(SourceValue);

impl StaticReceiver {
    pub fn new(receiver: impl Into<Option<Object>>) -> Self {
        Self(receiver.into())
    }
}

impl ReceiverAccess for StaticReceiver {
    fn receiver(&self, _ctx: &RequestContext) -> Result<SourceValue, FieldError> {
        Ok(self.0.clone())
    }
}

/// Argument looked up by name in the request context.
#[derive(Debug, Clone)]
pub struct NamedArgument {
    name: String,
    required: bool,
}

impl NamedArgument {
    /// An argument that must be present; absence fails the call with [`MissingArgument`].
    pub fn required(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            required: true,
        }
    }

    /// An argument that binds to `None` when absent.
    pub fn optional(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            required: false,
        }
    }
}

impl ArgumentAccess for NamedArgument {
    fn argument(&self, ctx: &RequestContext) -> Result<SourceValue, FieldError> {
        match ctx.argument(&self.name) {
            Some(value) => Ok(value.clone()),
            None if self.required => Err(FieldError::new(MissingArgument {
                name: self.name.clone(),
            })),
            None => Ok(None),
        }
    }
}

/// Argument with a value fixed at registration time.
#[derive(Debug, Clone, Default)]
pub struct ConstantArgument(SourceValue);

impl ConstantArgument {
    pub fn new(value: impl Into<Option<Object>>) -> Self {
        Self(value.into())
    }
}

impl ArgumentAccess for ConstantArgument {
    fn argument(&self, _ctx: &RequestContext) -> Result<SourceValue, FieldError> {
        Ok(self.0.clone())
    }
}
