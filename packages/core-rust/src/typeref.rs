//! Declared return type model.
//!
//! A [`TypeRef`] is the registration-time description of what an operation
//! returns. It is derived from the operation's Rust return type through the
//! [`Declared`] trait and inspected exactly once, by the shape classifier.
//!
//! The same impls also provide the typed adapter for each accepted shape, so
//! a description and the value it describes cannot disagree.

use std::any::{type_name, Any, TypeId};
use std::fmt;
use std::sync::Arc;

use futures_util::future::BoxFuture;

use crate::adapter::{await_then_upcast, identity, wrap_as_completed, CompiledAdapter};
use crate::types::{AsyncStream, EventStream, FieldError, Object, SourceValue};

/// Structural description of a declared return type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeRef {
    /// The erased optional object, `SourceValue`.
    Object,
    /// A concrete named type.
    Named(NamedType),
    /// An owned sequence, `Vec<T>`.
    List(Box<TypeRef>),
    /// A stream of elements, `EventStream<T>`.
    Stream(Box<TypeRef>),
    /// An asynchronous handle resolving to the inner type.
    Async(Box<TypeRef>),
}

impl TypeRef {
    /// The canonical contract: an asynchronous handle to a stream of optional objects.
    #[must_use]
    pub fn canonical() -> Self {
        Self::Async(Box::new(Self::Stream(Box::new(Self::Object))))
    }

    /// Shorthand for `TypeRef::of::<R>()` over any [`Declared`] type.
    #[must_use]
    pub fn of<R: Declared>() -> Self {
        R::declared_type()
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Object => f.write_str("SourceValue"),
            Self::Named(named) => named.fmt(f),
            Self::List(inner) => write!(f, "Vec<{inner}>"),
            Self::Stream(inner) => write!(f, "EventStream<{inner}>"),
            Self::Async(inner) => match inner.as_ref() {
                Self::Stream(element) => write!(f, "AsyncStream<{element}>"),
                other => write!(f, "BoxFuture<{other}>"),
            },
        }
    }
}

/// Whether a named type is shared by reference or owned by value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    /// Nullable shared pointer, `Option<Arc<T>>`. Upcasts without copying.
    Reference,
    /// Owned value. Cannot be upcast to an `Object` without a copy.
    Value,
}

/// A concrete named type, identified by its `TypeId`.
#[derive(Debug, Clone, Copy)]
pub struct NamedType {
    name: &'static str,
    type_id: TypeId,
    kind: TypeKind,
}

impl NamedType {
    /// Describes `Option<Arc<E>>`.
    #[must_use]
    pub fn reference<E: Any + Send + Sync>() -> Self {
        Self {
            name: type_name::<E>(),
            type_id: TypeId::of::<E>(),
            kind: TypeKind::Reference,
        }
    }

    /// Describes an owned value type `T`.
    #[must_use]
    pub fn value<T: Any>() -> Self {
        Self {
            name: type_name::<T>(),
            type_id: TypeId::of::<T>(),
            kind: TypeKind::Value,
        }
    }

    /// The erased object itself, used when a stream already yields `SourceValue`.
    pub(crate) fn object() -> Self {
        Self {
            name: type_name::<Object>(),
            type_id: TypeId::of::<Object>(),
            kind: TypeKind::Reference,
        }
    }

    /// Fully qualified Rust type name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[must_use]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    #[must_use]
    pub fn kind(&self) -> TypeKind {
        self.kind
    }

    #[must_use]
    pub fn is_reference(&self) -> bool {
        self.kind == TypeKind::Reference
    }
}

impl PartialEq for NamedType {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for NamedType {}

impl fmt::Display for NamedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.type_id == TypeId::of::<Object>() {
            return f.write_str("SourceValue");
        }
        match self.kind {
            TypeKind::Reference => {
                f.write_str("Option<Arc<")?;
                write_short_name(f, self.name)?;
                f.write_str(">>")
            }
            TypeKind::Value => write_short_name(f, self.name),
        }
    }
}

/// Writes a type name with every path prefix dropped:
/// `alloc::vec::Vec<my_app::Event>` becomes `Vec<Event>`.
fn write_short_name(f: &mut fmt::Formatter<'_>, full: &str) -> fmt::Result {
    let mut segment_start = 0;
    for (idx, ch) in full.char_indices() {
        if matches!(ch, '<' | '>' | ',' | ' ' | '(' | ')' | '[' | ']' | ';' | '&' | '*') {
            write_last_segment(f, &full[segment_start..idx])?;
            write!(f, "{ch}")?;
            segment_start = idx + ch.len_utf8();
        }
    }
    write_last_segment(f, &full[segment_start..])
}

fn write_last_segment(f: &mut fmt::Formatter<'_>, path: &str) -> fmt::Result {
    f.write_str(path.rsplit("::").next().unwrap_or(path))
}

// ---------------------------------------------------------------------------
// Declared
// ---------------------------------------------------------------------------

mod sealed {
    pub trait Sealed {}
}

/// Rust types that can describe themselves as a [`TypeRef`].
///
/// Implemented for the erased `SourceValue`, nullable shared pointers
/// `Option<Arc<E>>`, scalars, `String`, `Vec<T>`, `EventStream<T>` and
/// `BoxFuture<'static, Result<T, FieldError>>`. Stream elements must be
/// references: a nullable string stream is `EventStream<Option<Arc<String>>>`,
/// while `EventStream<String>` is rejected at registration.
///
/// The trait is sealed, so a description always matches the type:
///
/// ```compile_fail
/// use std::sync::Arc;
/// use subfield_core::{Declared, EventStream, TypeRef};
///
/// struct Tick;
/// struct TickFeed(EventStream<Option<Arc<Tick>>>);
///
/// impl Declared for TickFeed {
///     fn declared_type() -> TypeRef {
///         TypeRef::of::<EventStream<Option<Arc<Tick>>>>()
///     }
/// }
/// ```
pub trait Declared: sealed::Sealed + Sized + Send + 'static {
    /// The structural description of `Self`.
    fn declared_type() -> TypeRef;

    /// Adapter for `Self` as an operation's whole return type.
    #[doc(hidden)]
    fn return_adapter() -> Option<CompiledAdapter<Self>> {
        None
    }

    /// Adapter for `BoxFuture<'static, Result<Self, FieldError>>`.
    #[doc(hidden)]
    fn future_adapter() -> Option<CompiledAdapter<BoxFuture<'static, Result<Self, FieldError>>>> {
        None
    }

    /// Adapter for `EventStream<Self>`, with `Self` as the element.
    #[doc(hidden)]
    fn stream_adapter() -> Option<CompiledAdapter<EventStream<Self>>> {
        None
    }

    /// Adapter for `AsyncStream<Self>`, with `Self` as the element.
    #[doc(hidden)]
    fn async_stream_adapter() -> Option<CompiledAdapter<AsyncStream<Self>>> {
        None
    }
}

impl sealed::Sealed for SourceValue {}

impl Declared for SourceValue {
    fn declared_type() -> TypeRef {
        TypeRef::Object
    }

    fn stream_adapter() -> Option<CompiledAdapter<EventStream<Self>>> {
        Some(wrap_as_completed(|item: SourceValue| item))
    }

    fn async_stream_adapter() -> Option<CompiledAdapter<AsyncStream<Self>>> {
        Some(identity())
    }
}

impl<E: Any + Send + Sync> sealed::Sealed for Option<Arc<E>> {}

impl<E: Any + Send + Sync> Declared for Option<Arc<E>> {
    fn declared_type() -> TypeRef {
        TypeRef::Named(NamedType::reference::<E>())
    }

    fn stream_adapter() -> Option<CompiledAdapter<EventStream<Self>>> {
        Some(wrap_as_completed(|item: Option<Arc<E>>| item.map(Object::from_arc)))
    }

    fn async_stream_adapter() -> Option<CompiledAdapter<AsyncStream<Self>>> {
        Some(await_then_upcast(|item: Option<Arc<E>>| item.map(Object::from_arc)))
    }
}

macro_rules! declare_value_types {
    ($($ty:ty),* $(,)?) => {
        $(
            impl sealed::Sealed for $ty {}

            impl Declared for $ty {
                fn declared_type() -> TypeRef {
                    TypeRef::Named(NamedType::value::<$ty>())
                }
            }
        )*
    };
}

declare_value_types!(
    bool, char, i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64, String,
);

impl<T: Declared> sealed::Sealed for Vec<T> {}

impl<T: Declared> Declared for Vec<T> {
    fn declared_type() -> TypeRef {
        TypeRef::List(Box::new(T::declared_type()))
    }
}

impl<T: Declared> sealed::Sealed for EventStream<T> {}

impl<T: Declared> Declared for EventStream<T> {
    fn declared_type() -> TypeRef {
        TypeRef::Stream(Box::new(T::declared_type()))
    }

    fn return_adapter() -> Option<CompiledAdapter<Self>> {
        T::stream_adapter()
    }

    fn future_adapter() -> Option<CompiledAdapter<BoxFuture<'static, Result<Self, FieldError>>>> {
        T::async_stream_adapter()
    }
}

impl<T: Declared> sealed::Sealed for BoxFuture<'static, Result<T, FieldError>> {}

impl<T: Declared> Declared for BoxFuture<'static, Result<T, FieldError>> {
    fn declared_type() -> TypeRef {
        TypeRef::Async(Box::new(T::declared_type()))
    }

    fn return_adapter() -> Option<CompiledAdapter<Self>> {
        T::future_adapter()
    }
}
