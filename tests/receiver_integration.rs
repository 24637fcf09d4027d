//! Integration tests for the HTTP event receiver
//!
//! A receiver is started on a loopback port and fed CloudEvents in both
//! content modes.

use async_trait::async_trait;
use keptn_utils::events::{receiver, Dispatcher, EventHandler, KeptnEvent};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[derive(Default)]
struct Recorder {
    calls: Mutex<Vec<(KeptnEvent, String, String)>>,
}

impl Recorder {
    fn count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl EventHandler for Recorder {
    async fn handle(&self, event: KeptnEvent, keptn_context: &str, event_id: &str) -> anyhow::Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push((event, keptn_context.to_string(), event_id.to_string()));
        Ok(())
    }
}

struct Failing;

#[async_trait]
impl EventHandler for Failing {
    async fn handle(&self, _: KeptnEvent, _: &str, _: &str) -> anyhow::Result<()> {
        anyhow::bail!("helm upgrade failed")
    }
}

struct Running {
    addr: SocketAddr,
    shutdown: CancellationToken,
    handle: JoinHandle<std::io::Result<()>>,
}

impl Running {
    fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    async fn stop(self) {
        self.shutdown.cancel();
        self.handle
            .await
            .expect("receiver task should join")
            .expect("receiver should stop cleanly");
    }
}

async fn start(dispatcher: Dispatcher, path: &str) -> Running {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind loopback");
    let addr = listener.local_addr().expect("local addr");
    let shutdown = CancellationToken::new();
    let path = path.to_string();
    let token = shutdown.clone();
    let handle = tokio::spawn(async move { receiver::serve_on(listener, &path, dispatcher, token).await });
    Running {
        addr,
        shutdown,
        handle,
    }
}

fn configuration_change() -> Value {
    json!({
        "specversion": "0.2",
        "type": "sh.keptn.event.configuration.change",
        "id": "4b3e7b3e-1",
        "source": "https://github.com/keptn/keptn/cli",
        "shkeptncontext": "ctx-42",
        "data": {"project": "sockshop", "stage": "dev", "service": "carts"}
    })
}

#[tokio::test]
async fn test_structured_event_is_dispatched() {
    let recorder = Arc::new(Recorder::default());
    let running = start(Dispatcher::new(recorder.clone()), "/").await;

    let response = reqwest::Client::new()
        .post(running.url("/"))
        .header("content-type", "application/cloudevents+json")
        .body(configuration_change().to_string())
        .send()
        .await
        .expect("request should complete");

    assert_eq!(response.status(), 200);
    {
        let calls = recorder.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        let (event, context, id) = &calls[0];
        assert!(matches!(event, KeptnEvent::ConfigurationChange(c) if c.project == "sockshop"));
        assert_eq!(context, "ctx-42");
        assert_eq!(id, "4b3e7b3e-1");
    }

    running.stop().await;
}

#[tokio::test]
async fn test_binary_event_is_dispatched() {
    let recorder = Arc::new(Recorder::default());
    let running = start(Dispatcher::new(recorder.clone()), "/events").await;

    let response = reqwest::Client::new()
        .post(running.url("/events"))
        .header("ce-specversion", "0.2")
        .header("ce-type", "sh.keptn.events.tests-finished")
        .header("ce-id", "evt-7")
        .header("ce-shkeptncontext", "ctx-7")
        .header("content-type", "application/json")
        .body(json!({"project": "sockshop", "teststrategy": "performance"}).to_string())
        .send()
        .await
        .expect("request should complete");

    assert_eq!(response.status(), 200);
    {
        let calls = recorder.calls.lock().unwrap();
        let (event, context, id) = &calls[0];
        assert!(matches!(event, KeptnEvent::TestsFinished(t) if t.test_strategy == "performance"));
        assert_eq!(context, "ctx-7");
        assert_eq!(id, "evt-7");
    }

    running.stop().await;
}

#[tokio::test]
async fn test_unknown_type_is_refused() {
    let recorder = Arc::new(Recorder::default());
    let running = start(Dispatcher::new(recorder.clone()), "/").await;

    let mut event = configuration_change();
    event["type"] = json!("sh.keptn.events.unheard-of");

    let response = reqwest::Client::new()
        .post(running.url("/"))
        .body(event.to_string())
        .send()
        .await
        .expect("request should complete");

    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.expect("error body");
    assert!(body["error"].as_str().unwrap().contains("sh.keptn.events.unheard-of"));
    assert_eq!(recorder.count(), 0);

    running.stop().await;
}

#[tokio::test]
async fn test_malformed_body_is_refused() {
    let recorder = Arc::new(Recorder::default());
    let running = start(Dispatcher::new(recorder.clone()), "/").await;

    let response = reqwest::Client::new()
        .post(running.url("/"))
        .body("{ nope")
        .send()
        .await
        .expect("request should complete");

    assert_eq!(response.status(), 400);
    assert_eq!(recorder.count(), 0);

    running.stop().await;
}

#[tokio::test]
async fn test_handler_failure_is_server_error() {
    let running = start(Dispatcher::new(Failing), "/").await;

    let response = reqwest::Client::new()
        .post(running.url("/"))
        .body(configuration_change().to_string())
        .send()
        .await
        .expect("request should complete");

    assert_eq!(response.status(), 500);

    running.stop().await;
}
