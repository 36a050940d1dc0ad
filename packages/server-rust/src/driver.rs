//! Event driver: pumps a subscription stream into a sink.
//!
//! For each delivered element the driver derives a per-event context whose
//! source is the element, resolves the payload through the field's resolver
//! and publishes it. It never retries; dropping the drive future drops the
//! stream and with it whatever the wrapped operation was doing.

use async_trait::async_trait;
use futures_util::stream::StreamExt;
use subfield_core::{FieldError, RequestContext, SourceValue, SubscriptionResolver, SubscriptionStream};
use tracing::{debug, warn};

/// Downstream consumer of resolved subscription payloads.
#[async_trait]
pub trait EventSink: Send {
    /// Publish one resolved payload.
    ///
    /// # Errors
    ///
    /// An error means the sink is gone; the driver stops and drops the stream.
    async fn publish(&mut self, payload: SourceValue) -> anyhow::Result<()>;

    /// Called once with the error that ended the stream.
    async fn on_error(&mut self, error: FieldError);
}

/// How a drive ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriveOutcome {
    /// The stream ran to completion.
    Completed { delivered: u64 },
    /// The stream yielded an error, which was forwarded to the sink.
    Failed { delivered: u64 },
    /// The sink refused a payload.
    SinkClosed { delivered: u64 },
}

/// Drives `stream` to completion, publishing every resolved payload to `sink`.
pub async fn drive<S>(
    resolver: &SubscriptionResolver,
    ctx: &RequestContext,
    mut stream: SubscriptionStream,
    sink: &mut S,
) -> DriveOutcome
where
    S: EventSink + ?Sized,
{
    let field = resolver.descriptor().name();
    let mut delivered = 0_u64;

    while let Some(event) = stream.next().await {
        match event {
            Ok(payload) => {
                let event_ctx = ctx.for_event(payload);
                let value = resolver.resolve_value(&event_ctx);
                if let Err(err) = sink.publish(value).await {
                    debug!(field, delivered, error = %err, "event sink closed");
                    return DriveOutcome::SinkClosed { delivered };
                }
                delivered += 1;
            }
            Err(err) => {
                warn!(field, delivered, error = %err, "subscription stream failed");
                sink.on_error(err).await;
                return DriveOutcome::Failed { delivered };
            }
        }
    }

    debug!(field, delivered, "subscription stream completed");
    DriveOutcome::Completed { delivered }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use futures_util::stream;
    use subfield_core::{EventStream, Object, OperationDescriptor};

    use super::*;
    use crate::binding::SourceReceiver;

    #[derive(Default)]
    struct CollectingSink {
        payloads: Vec<SourceValue>,
        errors: Vec<FieldError>,
        capacity: Option<usize>,
    }

    #[async_trait]
    impl EventSink for CollectingSink {
        async fn publish(&mut self, payload: SourceValue) -> anyhow::Result<()> {
            if self.capacity == Some(self.payloads.len()) {
                anyhow::bail!("sink full");
            }
            self.payloads.push(payload);
            Ok(())
        }

        async fn on_error(&mut self, error: FieldError) {
            self.errors.push(error);
        }
    }

    fn resolver() -> SubscriptionResolver {
        OperationDescriptor::new(
            "letters",
            Arc::new(SourceReceiver),
            Vec::new(),
            |_, _| -> EventStream<Option<Arc<String>>> { stream::empty().boxed() },
        )
        .unwrap()
        .into()
    }

    fn letters(items: Vec<Result<SourceValue, FieldError>>) -> SubscriptionStream {
        stream::iter(items).boxed()
    }

    #[tokio::test]
    async fn publishes_every_payload_in_order() {
        let a = Object::new("a");
        let b = Object::new("b");
        let mut sink = CollectingSink::default();

        let outcome = drive(
            &resolver(),
            &RequestContext::new("t"),
            letters(vec![Ok(Some(a.clone())), Ok(None), Ok(Some(b.clone()))]),
            &mut sink,
        )
        .await;

        assert_eq!(outcome, DriveOutcome::Completed { delivered: 3 });
        assert!(Object::ptr_eq(sink.payloads[0].as_ref().unwrap(), &a));
        assert!(sink.payloads[1].is_none());
        assert!(Object::ptr_eq(sink.payloads[2].as_ref().unwrap(), &b));
    }

    #[tokio::test]
    async fn stream_error_is_forwarded_and_ends_drive() {
        #[derive(Debug, thiserror::Error)]
        #[error("upstream reset")]
        struct UpstreamReset;

        let mut sink = CollectingSink::default();
        let outcome = drive(
            &resolver(),
            &RequestContext::new("t"),
            letters(vec![
                Ok(Some(Object::new("a"))),
                Err(FieldError::new(UpstreamReset)),
                Ok(Some(Object::new("never"))),
            ]),
            &mut sink,
        )
        .await;

        assert_eq!(outcome, DriveOutcome::Failed { delivered: 1 });
        assert_eq!(sink.payloads.len(), 1);
        assert!(sink.errors[0].downcast_ref::<UpstreamReset>().is_some());
    }

    #[tokio::test]
    async fn closed_sink_stops_drive() {
        let mut sink = CollectingSink {
            capacity: Some(1),
            ..CollectingSink::default()
        };
        let outcome = drive(
            &resolver(),
            &RequestContext::new("t"),
            letters(vec![Ok(Some(Object::new("a"))), Ok(Some(Object::new("b")))]),
            &mut sink,
        )
        .await;

        assert_eq!(outcome, DriveOutcome::SinkClosed { delivered: 1 });
        assert!(sink.errors.is_empty());
    }

    #[tokio::test]
    async fn works_through_trait_object() {
        let mut sink = CollectingSink::default();
        let dyn_sink: &mut dyn EventSink = &mut sink;
        let outcome = drive(&resolver(), &RequestContext::new("t"), letters(Vec::new()), dyn_sink).await;
        assert_eq!(outcome, DriveOutcome::Completed { delivered: 0 });
    }
}
