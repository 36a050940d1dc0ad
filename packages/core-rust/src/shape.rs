//! Shape classification of declared return types.
//!
//! Three shapes are recognized:
//!
//! | Declared type | Shape |
//! |---|---|
//! | `AsyncStream<SourceValue>` | [`CanonicalShape::DirectCanonical`] |
//! | `AsyncStream<Option<Arc<E>>>` | [`CanonicalShape::AsyncGeneric`] |
//! | `EventStream<Option<Arc<E>>>` | [`CanonicalShape::SyncGeneric`] |
//!
//! Anything else is a [`ConfigError`]: a stream whose element is an owned
//! value type is reported as such, every other type as unrecognized.

use std::any::TypeId;
use std::fmt;

use crate::typeref::{NamedType, TypeKind, TypeRef};

/// The reference element type of a generic stream shape.
#[derive(Debug, Clone, Copy)]
pub struct ElementType {
    named: NamedType,
}

impl ElementType {
    #[must_use]
    pub fn type_id(&self) -> TypeId {
        self.named.type_id()
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.named.name()
    }
}

impl PartialEq for ElementType {
    fn eq(&self, other: &Self) -> bool {
        self.named == other.named
    }
}

impl Eq for ElementType {}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.named.fmt(f)
    }
}

/// The recognized return shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CanonicalShape {
    /// Already the canonical `SubscriptionFuture`.
    DirectCanonical,
    /// An asynchronous handle to a stream of `Option<Arc<E>>`.
    AsyncGeneric(ElementType),
    /// An already-available stream of `Option<Arc<E>>`.
    SyncGeneric(ElementType),
}

impl CanonicalShape {
    /// The element type carried by a non-canonical shape.
    #[must_use]
    pub fn element(&self) -> Option<&ElementType> {
        match self {
            Self::DirectCanonical => None,
            Self::AsyncGeneric(element) | Self::SyncGeneric(element) => Some(element),
        }
    }

    /// Short label used in logs and spans.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::DirectCanonical => "direct",
            Self::AsyncGeneric(_) => "async",
            Self::SyncGeneric(_) => "sync",
        }
    }
}

impl fmt::Display for CanonicalShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DirectCanonical => f.write_str("direct"),
            Self::AsyncGeneric(element) => write!(f, "async<{element}>"),
            Self::SyncGeneric(element) => write!(f, "sync<{element}>"),
        }
    }
}

/// Registration-time failure: the declared return type cannot back a subscription.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error(
        "unsupported subscription return type `{declared}`: expected \
         AsyncStream<SourceValue>, AsyncStream<Option<Arc<T>>> or EventStream<Option<Arc<T>>>"
    )]
    UnrecognizedShape { declared: String },
    #[error(
        "unsupported subscription return type `{declared}`: element `{element}` \
         is a value type, stream elements must be Option<Arc<T>>"
    )]
    ValueTypeElement { declared: String, element: String },
}

/// Classifies a declared return type.
///
/// The canonical shape is matched before any element check, so its element is
/// never validated here.
///
/// # Errors
///
/// - `ConfigError::UnrecognizedShape` if the type is not a stream or an
///   asynchronous handle to a stream of named elements
/// - `ConfigError::ValueTypeElement` if the stream element is not a reference type
pub fn classify(declared: &TypeRef) -> Result<CanonicalShape, ConfigError> {
    match declared {
        TypeRef::Async(inner) => match inner.as_ref() {
            TypeRef::Stream(element) if matches!(element.as_ref(), TypeRef::Object) => {
                Ok(CanonicalShape::DirectCanonical)
            }
            TypeRef::Stream(element) => {
                reference_element(declared, element).map(CanonicalShape::AsyncGeneric)
            }
            _ => Err(unrecognized(declared)),
        },
        TypeRef::Stream(element) => {
            reference_element(declared, element).map(CanonicalShape::SyncGeneric)
        }
        _ => Err(unrecognized(declared)),
    }
}

fn reference_element(declared: &TypeRef, element: &TypeRef) -> Result<ElementType, ConfigError> {
    let named = match element {
        TypeRef::Object => NamedType::object(),
        TypeRef::Named(named) => *named,
        TypeRef::List(_) | TypeRef::Stream(_) | TypeRef::Async(_) => {
            return Err(unrecognized(declared))
        }
    };
    match named.kind() {
        TypeKind::Reference => Ok(ElementType { named }),
        TypeKind::Value => Err(ConfigError::ValueTypeElement {
            declared: declared.to_string(),
            element: element.to_string(),
        }),
    }
}

fn unrecognized(declared: &TypeRef) -> ConfigError {
    ConfigError::UnrecognizedShape {
        declared: declared.to_string(),
    }
}
