//! `Subfield` Server: subscription field registration, the tower subscribe
//! service, and the consumer-side event driver.
//!
//! 1. **Registration** (`registry`): descriptors are built and published once,
//!    then frozen into a read-only schema
//! 2. **Subscribe** (`service`): `tower::Service` resolving a field to its
//!    canonical stream, wrapped in a tracing layer
//! 3. **Delivery** (`driver`): per-event `resolve_value` and hand-off to a sink

pub mod binding;
pub mod config;
pub mod driver;
pub mod registry;
pub mod service;
pub mod telemetry;

pub use binding::{ConstantArgument, MissingArgument, NamedArgument, SourceReceiver, StaticReceiver};
pub use config::{RegistryConfig, TelemetryConfig};
pub use driver::{drive, DriveOutcome, EventSink};
pub use registry::{RegistryError, SubscriptionRegistry, SubscriptionSchema};
pub use service::{
    build_subscribe_service, SubscribeError, SubscribeRequest, SubscribeService, TracingLayer,
    TracingService,
};
pub use telemetry::init_tracing;
