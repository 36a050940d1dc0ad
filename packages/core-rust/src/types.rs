//! Canonical subscription contract types.
//!
//! Every subscription field, whatever its declared return shape, is normalized
//! into a [`SubscriptionFuture`]: an asynchronous handle resolving to a stream
//! of optional, type-erased [`Object`] payloads.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use futures_util::stream::BoxStream;

/// Type-erased shared payload.
///
/// Wraps an `Arc`, so converting a concrete `Arc<T>` into an `Object` keeps
/// the same allocation: no copy is made and identity survives the upcast.
#[derive(Clone)]
pub struct Object(Arc<dyn Any + Send + Sync>);

impl Object {
    /// Moves `value` into a fresh shared allocation.
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self(Arc::new(value))
    }

    /// Re-exposes an existing shared value as an `Object` without copying it.
    #[must_use]
    pub fn from_arc<T: Any + Send + Sync>(value: Arc<T>) -> Self {
        Self(value)
    }

    /// Returns `true` if the payload is a `T`.
    #[must_use]
    pub fn is<T: Any>(&self) -> bool {
        self.0.is::<T>()
    }

    /// Borrows the payload as a `T`, if it is one.
    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }

    /// Recovers the concrete shared pointer.
    ///
    /// # Errors
    ///
    /// Returns the original `Object` unchanged if the payload is not a `T`.
    pub fn downcast<T: Any + Send + Sync>(self) -> Result<Arc<T>, Self> {
        self.0.downcast::<T>().map_err(Self)
    }

    /// Returns `true` if both objects point at the same allocation.
    #[must_use]
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.0, &b.0)
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Object")
            .field(&Arc::as_ptr(&self.0).cast::<()>())
            .finish()
    }
}

/// The optional object carried as a context source and as a stream element.
pub type SourceValue = Option<Object>;

/// A stream of `T`. Failures raised while producing elements travel in-band.
pub type EventStream<T> = BoxStream<'static, Result<T, FieldError>>;

/// An asynchronous handle to a stream of `T`.
pub type AsyncStream<T> = BoxFuture<'static, Result<EventStream<T>, FieldError>>;

/// Canonical element stream handed to the subscription engine.
pub type SubscriptionStream = EventStream<SourceValue>;

/// Canonical asynchronous stream handle every subscription field is adapted into.
pub type SubscriptionFuture = AsyncStream<SourceValue>;

/// Request-time failure raised by a wrapped operation or its bindings.
///
/// The original error is carried unchanged; [`FieldError::downcast_ref`]
/// recovers it so the engine can surface the fault with its identity intact.
#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct FieldError(#[from] anyhow::Error);

impl FieldError {
    /// Wraps a concrete error.
    pub fn new<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self(anyhow::Error::new(error))
    }

    /// Creates an error from a plain message.
    pub fn msg<M>(message: M) -> Self
    where
        M: fmt::Display + fmt::Debug + Send + Sync + 'static,
    {
        Self(anyhow::Error::msg(message))
    }

    /// Borrows the original error if it is an `E`.
    #[must_use]
    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: fmt::Display + fmt::Debug + Send + Sync + 'static,
    {
        self.0.downcast_ref::<E>()
    }

    /// Unwraps into the underlying `anyhow::Error`.
    #[must_use]
    pub fn into_inner(self) -> anyhow::Error {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Payload(u32);

    #[derive(Debug, thiserror::Error)]
    #[error("upstream went away")]
    struct UpstreamGone;

    #[test]
    fn from_arc_keeps_allocation() {
        let shared = Arc::new(Payload(7));
        let object = Object::from_arc(Arc::clone(&shared));

        let back = object.downcast::<Payload>().unwrap();
        assert!(Arc::ptr_eq(&shared, &back));
    }

    #[test]
    fn downcast_to_wrong_type_returns_object() {
        let object = Object::new(Payload(1));
        let copy = object.clone();

        let err = object.downcast::<String>().unwrap_err();
        assert!(Object::ptr_eq(&err, &copy));
        assert_eq!(err.downcast_ref::<Payload>(), Some(&Payload(1)));
    }

    #[test]
    fn is_reports_payload_type() {
        let object = Object::new(String::from("a"));
        assert!(object.is::<String>());
        assert!(!object.is::<Payload>());
    }

    #[test]
    fn field_error_preserves_original() {
        let err = FieldError::new(UpstreamGone);
        assert!(err.downcast_ref::<UpstreamGone>().is_some());
        assert_eq!(err.to_string(), "upstream went away");
    }

    #[test]
    fn field_error_from_anyhow() {
        let err: FieldError = anyhow::anyhow!("boom").into();
        assert_eq!(err.to_string(), "boom");
        assert_eq!(err.into_inner().to_string(), "boom");
    }
}
