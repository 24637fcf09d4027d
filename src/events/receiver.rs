//! HTTP event receiver
//!
//! Accepts keptn CloudEvents over HTTP and feeds them to a [`Dispatcher`].
//! Both CloudEvents HTTP content modes are understood:
//!
//! - structured: the whole envelope is the JSON body
//! - binary: attributes travel as `ce-*` headers, the body is the data
//!
//! Responses: `200` once the handler succeeded, `400` when the envelope was
//! refused, `500` when the handler failed.

use super::dispatcher::Dispatcher;
use super::envelope::Envelope;
use super::error::DispatchError;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

/// Default port to listen on
pub const DEFAULT_PORT: u16 = 8080;

/// Default path to listen on
pub const DEFAULT_PATH: &str = "/";

/// Where the receiver listens
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiverConfig {
    pub port: u16,
    pub path: String,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            path: DEFAULT_PATH.to_string(),
        }
    }
}

/// Build an axum `Router` that dispatches events posted to `path`
pub fn router(dispatcher: Dispatcher, path: &str) -> Router {
    let path = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    };
    Router::new()
        .route(&path, post(receive))
        .with_state(dispatcher)
}

/// Listen on `0.0.0.0:{port}` until `shutdown` is cancelled
pub async fn serve(
    config: &ReceiverConfig,
    dispatcher: Dispatcher,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    let listener = TcpListener::bind(("0.0.0.0", config.port)).await?;
    serve_on(listener, &config.path, dispatcher, shutdown).await
}

/// Serve on an already bound listener until `shutdown` is cancelled
pub async fn serve_on(
    listener: TcpListener,
    path: &str,
    dispatcher: Dispatcher,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    tracing::info!("listening for keptn events on {}{}", listener.local_addr()?, path);
    axum::serve(listener, router(dispatcher, path))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    tracing::info!("event receiver stopped");
    Ok(())
}

async fn receive(State(dispatcher): State<Dispatcher>, headers: HeaderMap, body: Bytes) -> Response {
    let envelope = match envelope_from_request(&headers, &body) {
        Ok(envelope) => envelope,
        Err(err) => return reject(StatusCode::BAD_REQUEST, &err),
    };

    match dispatcher.dispatch(&envelope).await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(err) if err.is_rejected() => reject(StatusCode::BAD_REQUEST, &err),
        Err(err) => reject(StatusCode::INTERNAL_SERVER_ERROR, &err),
    }
}

fn reject(status: StatusCode, err: &DispatchError) -> Response {
    tracing::warn!("event not processed ({}): {}", status, err);
    (status, Json(json!({ "error": err.to_string() }))).into_response()
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Read an envelope in binary mode when `ce-type` is present, structured
/// mode otherwise
fn envelope_from_request(headers: &HeaderMap, body: &[u8]) -> Result<Envelope, DispatchError> {
    let Some(event_type) = header_str(headers, "ce-type") else {
        return Envelope::from_json(body);
    };
    let Some(id) = header_str(headers, "ce-id") else {
        return Err(DispatchError::MalformedEnvelope(serde::de::Error::missing_field("id")));
    };

    let data = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(body).map_err(DispatchError::MalformedEnvelope)?
    };

    let mut envelope = Envelope::new(event_type, id, data);
    envelope.specversion = header_str(headers, "ce-specversion").map(str::to_string);
    envelope.source = header_str(headers, "ce-source").map(str::to_string);
    envelope.time = header_str(headers, "ce-time")
        .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
        .map(|t| t.with_timezone(&Utc));
    envelope.datacontenttype = header_str(headers, header::CONTENT_TYPE.as_str()).map(str::to_string);
    envelope.shkeptncontext = header_str(headers, "ce-shkeptncontext").map(str::to_string);
    Ok(envelope)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_binary_mode_envelope() {
        let mut headers = HeaderMap::new();
        headers.insert("ce-type", HeaderValue::from_static("sh.keptn.events.problem"));
        headers.insert("ce-id", HeaderValue::from_static("42"));
        headers.insert("ce-shkeptncontext", HeaderValue::from_static("ctx"));
        headers.insert("ce-time", HeaderValue::from_static("2019-06-07T07:02:15Z"));

        let envelope = envelope_from_request(&headers, br#"{"state":"OPEN"}"#).unwrap();

        assert_eq!(envelope.event_type, "sh.keptn.events.problem");
        assert_eq!(envelope.id, "42");
        assert_eq!(envelope.keptn_context(), "ctx");
        assert!(envelope.time.is_some());
        assert_eq!(envelope.data["state"], "OPEN");
    }

    #[test]
    fn test_structured_mode_envelope() {
        let envelope = envelope_from_request(
            &HeaderMap::new(),
            br#"{"type":"sh.keptn.events.problem","id":"7","data":{}}"#,
        )
        .unwrap();
        assert_eq!(envelope.id, "7");
    }

    #[test]
    fn test_binary_mode_rejects_non_json_body() {
        let mut headers = HeaderMap::new();
        headers.insert("ce-type", HeaderValue::from_static("sh.keptn.events.problem"));
        headers.insert("ce-id", HeaderValue::from_static("42"));
        let err = envelope_from_request(&headers, b"not json").unwrap_err();
        assert!(matches!(err, DispatchError::MalformedEnvelope(_)));
    }

    #[test]
    fn test_binary_mode_requires_id() {
        let mut headers = HeaderMap::new();
        headers.insert("ce-type", HeaderValue::from_static("sh.keptn.events.problem"));
        let err = envelope_from_request(&headers, br#"{"state":"OPEN"}"#).unwrap_err();
        assert!(matches!(err, DispatchError::MalformedEnvelope(_)));
        assert!(err.to_string().contains("id"));
        assert!(err.is_rejected());
    }

    #[test]
    fn test_default_config() {
        let config = ReceiverConfig::default();
        assert_eq!(config.port, 8080);
        assert_eq!(config.path, "/");
    }
}
