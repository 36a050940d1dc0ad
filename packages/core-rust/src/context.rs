use std::collections::BTreeMap;

use crate::types::{Object, SourceValue};

/// Per-invocation state handed to the resolver by the execution engine.
///
/// The resolver only reads and writes the current source value; receiver and
/// argument expressions may read anything else the engine put here.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// Distributed trace identifier for observability.
    pub trace_id: String,
    /// Tenant scope for multi-tenant isolation. `None` for single-tenant deployments.
    pub tenant_id: Option<String>,
    source: SourceValue,
    arguments: BTreeMap<String, SourceValue>,
}

impl RequestContext {
    #[must_use]
    pub fn new(trace_id: impl Into<String>) -> Self {
        Self {
            trace_id: trace_id.into(),
            ..Self::default()
        }
    }

    /// The current source value.
    #[must_use]
    pub fn source(&self) -> &SourceValue {
        &self.source
    }

    pub fn set_source(&mut self, source: SourceValue) {
        self.source = source;
    }

    #[must_use]
    pub fn with_source(mut self, source: impl Into<Option<Object>>) -> Self {
        self.source = source.into();
        self
    }

    /// A named argument value, if the engine supplied one.
    #[must_use]
    pub fn argument(&self, name: &str) -> Option<&SourceValue> {
        self.arguments.get(name)
    }

    #[must_use]
    pub fn with_argument(mut self, name: impl Into<String>, value: SourceValue) -> Self {
        self.arguments.insert(name.into(), value);
        self
    }

    /// Derives the context for one delivered event: identical except that the
    /// source is replaced by the event payload.
    #[must_use]
    pub fn for_event(&self, payload: SourceValue) -> Self {
        Self {
            trace_id: self.trace_id.clone(),
            tenant_id: self.tenant_id.clone(),
            source: payload,
            arguments: self.arguments.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_context_has_no_source() {
        let ctx = RequestContext::new("trace-1");
        assert_eq!(ctx.trace_id, "trace-1");
        assert!(ctx.source().is_none());
        assert!(ctx.argument("room").is_none());
    }

    #[test]
    fn set_source_replaces_value() {
        let first = Object::new(1_u32);
        let second = Object::new(2_u32);
        let mut ctx = RequestContext::new("t").with_source(first);
        ctx.set_source(Some(second.clone()));
        assert!(Object::ptr_eq(ctx.source().as_ref().unwrap(), &second));
    }

    #[test]
    fn for_event_keeps_identity_and_arguments() {
        let mut ctx = RequestContext::new("trace-9")
            .with_source(Object::new("root"))
            .with_argument("room", Some(Object::new(String::from("lobby"))));
        ctx.tenant_id = Some("acme".to_string());

        let payload = Object::new(5_i64);
        let event_ctx = ctx.for_event(Some(payload.clone()));

        assert_eq!(event_ctx.trace_id, "trace-9");
        assert_eq!(event_ctx.tenant_id.as_deref(), Some("acme"));
        assert!(Object::ptr_eq(event_ctx.source().as_ref().unwrap(), &payload));
        let room = event_ctx.argument("room").unwrap().as_ref().unwrap();
        assert_eq!(room.downcast_ref::<String>().map(String::as_str), Some("lobby"));
    }
}
