//! Event dispatcher
//!
//! Turns an envelope into a typed [`KeptnEvent`] and hands it to the one
//! handler the dispatcher was built with. Unknown types are refused, never
//! dropped. Handler failures come back to the caller as they are; whether to
//! redeliver is the transport's decision.

use super::envelope::Envelope;
use super::error::DispatchError;
use super::types::KeptnEvent;
use async_trait::async_trait;
use futures::future::try_join_all;
use std::sync::Arc;

/// Consumer of dispatched events
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Handle one event. `keptn_context` is the workflow correlation id,
    /// `event_id` the CloudEvent id.
    async fn handle(&self, event: KeptnEvent, keptn_context: &str, event_id: &str) -> anyhow::Result<()>;
}

#[async_trait]
impl<H: EventHandler + ?Sized> EventHandler for Arc<H> {
    async fn handle(&self, event: KeptnEvent, keptn_context: &str, event_id: &str) -> anyhow::Result<()> {
        (**self).handle(event, keptn_context, event_id).await
    }
}

/// Forwards every event to several handlers
///
/// Handlers run concurrently; the first failure is returned.
#[derive(Default, Clone)]
pub struct FanOut {
    handlers: Vec<Arc<dyn EventHandler>>,
}

impl FanOut {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, handler: impl EventHandler + 'static) -> Self {
        self.handlers.push(Arc::new(handler));
        self
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

#[async_trait]
impl EventHandler for FanOut {
    async fn handle(&self, event: KeptnEvent, keptn_context: &str, event_id: &str) -> anyhow::Result<()> {
        try_join_all(
            self.handlers
                .iter()
                .map(|handler| handler.handle(event.clone(), keptn_context, event_id)),
        )
        .await?;
        Ok(())
    }
}

/// Routes envelopes to a single handler
#[derive(Clone)]
pub struct Dispatcher {
    handler: Arc<dyn EventHandler>,
}

impl Dispatcher {
    pub fn new(handler: impl EventHandler + 'static) -> Self {
        Self {
            handler: Arc::new(handler),
        }
    }

    /// Decode the envelope and invoke the handler exactly once
    pub async fn dispatch(&self, envelope: &Envelope) -> Result<(), DispatchError> {
        let keptn_context = envelope.keptn_context();
        let event = match KeptnEvent::from_envelope(envelope) {
            Ok(event) => event,
            Err(err) => {
                tracing::warn!("rejecting event {}: {}", envelope.id, err);
                return Err(err);
            }
        };

        tracing::info!(
            "dispatching {} event {} (context {})",
            envelope.event_type,
            envelope.id,
            keptn_context
        );

        self.handler
            .handle(event, keptn_context, &envelope.id)
            .await
            .map_err(|err| DispatchError::Handler {
                event_type: envelope.event_type.clone(),
                event_id: envelope.id.clone(),
                source: err.into(),
            })
    }
}
