//! Subscription field registry and the frozen schema snapshot it publishes.
//!
//! Fields are registered during a registration phase, typically single-threaded
//! at startup. Descriptor construction (shape classification and adapter
//! compilation) happens here, so configuration errors surface before any
//! request is served. [`SubscriptionRegistry::freeze`] ends the phase and
//! publishes an immutable [`SubscriptionSchema`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::RwLock;
use subfield_core::{
    ArgumentAccess, ConfigError, Declared, OperationDescriptor, ReceiverAccess, SourceValue,
    SubscriptionResolver,
};
use tracing::{debug, info, warn};

use crate::config::RegistryConfig;

/// Errors raised while registering subscription fields.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("subscription field `{field}` is misconfigured: {source}")]
    Config {
        field: String,
        #[source]
        source: ConfigError,
    },
    #[error("subscription field `{field}` is already registered")]
    Duplicate { field: String },
    #[error("registration phase is closed")]
    Frozen,
}

// ---------------------------------------------------------------------------
// SubscriptionRegistry
// ---------------------------------------------------------------------------

/// Registry of subscription field descriptors.
///
/// Each field is published at most once. When two registrations of the same
/// field race, both descriptors are fully built before either is published and
/// the first to be inserted wins; readers never observe a partial descriptor.
pub struct SubscriptionRegistry {
    config: RegistryConfig,
    /// Field name -> descriptor.
    by_name: DashMap<String, Arc<OperationDescriptor>>,
    /// Registration order for deterministic listing and schema layout.
    order: RwLock<Vec<String>>,
    frozen: AtomicBool,
    schema: ArcSwapOption<SubscriptionSchema>,
}

impl SubscriptionRegistry {
    #[must_use]
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            config,
            by_name: DashMap::new(),
            order: RwLock::new(Vec::new()),
            frozen: AtomicBool::new(false),
            schema: ArcSwapOption::empty(),
        }
    }

    /// Builds and registers a descriptor for `operation`.
    ///
    /// # Errors
    ///
    /// - `RegistryError::Config` if the operation's return type is not a
    ///   supported subscription shape
    /// - `RegistryError::Duplicate` if the field exists and duplicates are rejected
    /// - `RegistryError::Frozen` after [`freeze`](Self::freeze)
    pub fn register<R, F>(
        &self,
        field: &str,
        receiver: Arc<dyn ReceiverAccess>,
        arguments: Vec<Arc<dyn ArgumentAccess>>,
        operation: F,
    ) -> Result<Arc<OperationDescriptor>, RegistryError>
    where
        R: Declared,
        F: Fn(SourceValue, Vec<SourceValue>) -> R + Send + Sync + 'static,
    {
        if self.is_frozen() {
            return Err(RegistryError::Frozen);
        }
        let descriptor = OperationDescriptor::new(field, receiver, arguments, operation)
            .map_err(|source| {
                warn!(field, error = %source, "rejected subscription field");
                RegistryError::Config {
                    field: field.to_string(),
                    source,
                }
            })?;
        self.insert(descriptor)
    }

    /// Publishes an already-built descriptor under its own name.
    ///
    /// # Errors
    ///
    /// - `RegistryError::Duplicate` if the field exists and duplicates are rejected
    /// - `RegistryError::Frozen` after [`freeze`](Self::freeze)
    pub fn insert(
        &self,
        descriptor: OperationDescriptor,
    ) -> Result<Arc<OperationDescriptor>, RegistryError> {
        let mut order = self.order.write();
        if self.is_frozen() {
            return Err(RegistryError::Frozen);
        }

        let field = descriptor.name().to_string();
        match self.by_name.entry(field.clone()) {
            Entry::Occupied(existing) => {
                if self.config.reject_duplicates {
                    warn!(field = %field, "duplicate subscription field rejected");
                    return Err(RegistryError::Duplicate { field });
                }
                debug!(field = %field, "duplicate subscription field discarded");
                Ok(Arc::clone(existing.get()))
            }
            Entry::Vacant(slot) => {
                let descriptor = Arc::new(descriptor);
                slot.insert(Arc::clone(&descriptor));
                info!(
                    field = %field,
                    shape = descriptor.shape().label(),
                    declared = %descriptor.declared_type(),
                    "subscription field registered"
                );
                order.push(field);
                Ok(descriptor)
            }
        }
    }

    /// Retrieve a registered descriptor by field name.
    pub fn get(&self, field: &str) -> Option<Arc<OperationDescriptor>> {
        self.by_name.get(field).map(|entry| Arc::clone(entry.value()))
    }

    /// Field names in registration order.
    pub fn fields(&self) -> Vec<String> {
        self.order.read().clone()
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen.load(Ordering::Acquire)
    }

    /// Closes the registration phase and publishes the schema snapshot.
    ///
    /// Idempotent: later calls return the snapshot published by the first.
    pub fn freeze(&self) -> Arc<SubscriptionSchema> {
        let order = self.order.write();
        if let Some(schema) = self.schema.load_full() {
            return schema;
        }

        let resolvers = order
            .iter()
            .filter_map(|field| {
                self.get(field)
                    .map(|descriptor| (field.clone(), SubscriptionResolver::new(descriptor)))
            })
            .collect::<Vec<_>>();
        let schema = Arc::new(SubscriptionSchema::new(resolvers));
        self.schema.store(Some(Arc::clone(&schema)));
        self.frozen.store(true, Ordering::Release);
        info!(fields = schema.len(), "subscription schema frozen");
        schema
    }

    /// The published schema, once [`freeze`](Self::freeze) has run.
    pub fn schema(&self) -> Option<Arc<SubscriptionSchema>> {
        self.schema.load_full()
    }
}

impl Default for SubscriptionRegistry {
    fn default() -> Self {
        Self::new(RegistryConfig::default())
    }
}

// ---------------------------------------------------------------------------
// SubscriptionSchema
// ---------------------------------------------------------------------------

/// Immutable, read-only view of the registered subscription fields.
#[derive(Debug)]
pub struct SubscriptionSchema {
    resolvers: Vec<(String, SubscriptionResolver)>,
    index: HashMap<String, usize>,
}

impl SubscriptionSchema {
    fn new(resolvers: Vec<(String, SubscriptionResolver)>) -> Self {
        let index = resolvers
            .iter()
            .enumerate()
            .map(|(position, (field, _))| (field.clone(), position))
            .collect();
        Self { resolvers, index }
    }

    /// Resolver for `field`, if registered.
    pub fn resolver(&self, field: &str) -> Option<&SubscriptionResolver> {
        self.index.get(field).map(|&position| &self.resolvers[position].1)
    }

    /// Field names in registration order.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.resolvers.iter().map(|(field, _)| field.as_str())
    }

    pub fn len(&self) -> usize {
        self.resolvers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolvers.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicU32;

    use futures_util::future::{self, FutureExt};
    use futures_util::stream::{self, StreamExt};
    use subfield_core::{AsyncStream, CanonicalShape, EventStream, SubscriptionFuture};

    use super::*;
    use crate::binding::SourceReceiver;

    struct Trade;

    fn register_trades(
        registry: &SubscriptionRegistry,
        field: &str,
    ) -> Result<Arc<OperationDescriptor>, RegistryError> {
        registry.register(
            field,
            Arc::new(SourceReceiver),
            Vec::new(),
            |_, _| -> EventStream<Option<Arc<Trade>>> { stream::empty().boxed() },
        )
    }

    #[test]
    fn register_and_get_by_name() {
        let registry = SubscriptionRegistry::default();
        register_trades(&registry, "trades").unwrap();

        let descriptor = registry.get("trades").unwrap();
        assert_eq!(descriptor.name(), "trades");
        assert!(matches!(descriptor.shape(), CanonicalShape::SyncGeneric(_)));
    }

    #[test]
    fn get_unregistered_returns_none() {
        let registry = SubscriptionRegistry::default();
        assert!(registry.get("nonexistent").is_none());
    }

    #[test]
    fn misconfigured_field_is_not_registered() {
        let registry = SubscriptionRegistry::default();
        let err = registry
            .register(
                "counts",
                Arc::new(SourceReceiver),
                Vec::new(),
                |_, _| -> AsyncStream<u64> { future::pending().boxed() },
            )
            .unwrap_err();

        assert!(matches!(
            &err,
            RegistryError::Config { field, source: ConfigError::ValueTypeElement { .. } } if field == "counts"
        ));
        assert!(err.to_string().contains("AsyncStream<u64>"));
        assert!(registry.get("counts").is_none());
        assert!(registry.fields().is_empty());
    }

    #[test]
    fn duplicate_keeps_first_descriptor() {
        let registry = SubscriptionRegistry::default();
        let first = register_trades(&registry, "trades").unwrap();
        let second = register_trades(&registry, "trades").unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.fields(), vec!["trades"]);
    }

    #[test]
    fn duplicate_rejected_when_configured() {
        let registry = SubscriptionRegistry::new(RegistryConfig {
            reject_duplicates: true,
        });
        register_trades(&registry, "trades").unwrap();
        let err = register_trades(&registry, "trades").unwrap_err();
        assert!(matches!(err, RegistryError::Duplicate { field } if field == "trades"));
    }

    #[test]
    fn fields_follow_registration_order() {
        let registry = SubscriptionRegistry::default();
        for field in ["c", "a", "b"] {
            register_trades(&registry, field).unwrap();
        }
        assert_eq!(registry.fields(), vec!["c", "a", "b"]);

        let schema = registry.freeze();
        assert_eq!(schema.fields().collect::<Vec<_>>(), vec!["c", "a", "b"]);
    }

    #[test]
    fn freeze_closes_registration() {
        let registry = SubscriptionRegistry::default();
        register_trades(&registry, "trades").unwrap();
        assert!(registry.schema().is_none());

        let schema = registry.freeze();
        assert!(registry.is_frozen());
        assert_eq!(schema.len(), 1);
        assert!(schema.resolver("trades").is_some());
        assert!(schema.resolver("quotes").is_none());

        let err = register_trades(&registry, "quotes").unwrap_err();
        assert!(matches!(err, RegistryError::Frozen));
        assert!(registry.get("quotes").is_none());
    }

    #[test]
    fn freeze_is_idempotent() {
        let registry = SubscriptionRegistry::default();
        let first = registry.freeze();
        let second = registry.freeze();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(first.is_empty());
        assert!(Arc::ptr_eq(&registry.schema().unwrap(), &first));
    }

    #[test]
    fn insert_prebuilt_descriptor() {
        let registry = SubscriptionRegistry::default();
        let descriptor = OperationDescriptor::new(
            "raw",
            Arc::new(SourceReceiver),
            Vec::new(),
            |_, _| -> SubscriptionFuture { future::pending().boxed() },
        )
        .unwrap();
        let published = registry.insert(descriptor).unwrap();
        assert_eq!(published.shape(), &CanonicalShape::DirectCanonical);
    }

    #[test]
    fn concurrent_registration_publishes_one_descriptor() {
        let registry = Arc::new(SubscriptionRegistry::default());
        let built = Arc::new(AtomicU32::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                let built = Arc::clone(&built);
                std::thread::spawn(move || {
                    built.fetch_add(1, Ordering::SeqCst);
                    register_trades(&registry, "trades").unwrap()
                })
            })
            .collect();
        let published: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(built.load(Ordering::SeqCst), 8);
        assert!(published.iter().all(|d| Arc::ptr_eq(d, &published[0])));
        assert_eq!(registry.fields(), vec!["trades"]);
    }
}
