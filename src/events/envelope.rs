//! CloudEvent envelope
//!
//! The self-describing wrapper keptn events arrive in. Only `type`, `id`,
//! the `shkeptncontext` extension and `data` matter for dispatch; the other
//! CloudEvents attributes are carried along.

use super::error::DispatchError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Extension attribute carrying the keptn context
pub const KEPTN_CONTEXT_EXTENSION: &str = "shkeptncontext";

/// A received CloudEvent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specversion: Option<String>,
    #[serde(rename = "type")]
    pub event_type: String,
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datacontenttype: Option<String>,
    /// Keptn context as a top-level extension attribute (structured mode)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shkeptncontext: Option<String>,
    /// Extension attributes nested in their own object
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extensions: Map<String, Value>,
    #[serde(default)]
    pub data: Value,
}

impl Envelope {
    pub fn new(event_type: &str, id: &str, data: Value) -> Self {
        Self {
            specversion: Some("0.2".to_string()),
            event_type: event_type.to_string(),
            id: id.to_string(),
            source: None,
            time: None,
            datacontenttype: Some("application/json".to_string()),
            shkeptncontext: None,
            extensions: Map::new(),
            data,
        }
    }

    pub fn with_keptn_context(mut self, keptn_context: &str) -> Self {
        self.shkeptncontext = Some(keptn_context.to_string());
        self
    }

    /// Parse a structured-mode CloudEvent
    pub fn from_json(body: &[u8]) -> Result<Self, DispatchError> {
        serde_json::from_slice(body).map_err(DispatchError::MalformedEnvelope)
    }

    /// Correlation id shared by every event of a keptn workflow
    ///
    /// Empty when the extension is absent.
    pub fn keptn_context(&self) -> &str {
        self.shkeptncontext
            .as_deref()
            .or_else(|| {
                self.extensions
                    .get(KEPTN_CONTEXT_EXTENSION)
                    .and_then(|v| v.as_str())
            })
            .unwrap_or("")
    }
}
