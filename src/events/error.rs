//! Dispatch error types

use thiserror::Error;

/// Why an envelope was not delivered, or what the handler reported
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("malformed event envelope: {0}")]
    MalformedEnvelope(#[source] serde_json::Error),

    #[error("received unexpected keptn event type: {0}")]
    UnrecognizedEventType(String),

    #[error("invalid {event_type} payload: {source}")]
    Payload {
        event_type: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("handler failed for {event_type} event {event_id}: {source}")]
    Handler {
        event_type: String,
        event_id: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl DispatchError {
    /// True when the envelope itself was refused and the handler never ran
    pub fn is_rejected(&self) -> bool {
        !matches!(self, Self::Handler { .. })
    }
}
