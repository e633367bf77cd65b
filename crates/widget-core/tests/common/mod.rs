//! Stub storefront backend for integration tests
//!
//! Serves `/api/token`, `/api/start-agent` and `/api/products` with scripted
//! responses and records every request it receives.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::time::Instant;

use voicewidget_core::WidgetConfig;

/// Scripted responses, as `(status, body)`
#[derive(Clone)]
pub struct Script {
    pub token: (StatusCode, Value),
    pub start_agent: (StatusCode, Value),
    pub products: (StatusCode, Value),
}

impl Default for Script {
    fn default() -> Self {
        Self {
            token: (
                StatusCode::OK,
                json!({"token": "stub-token", "url": "wss://rtc.stub.test", "room_name": "shop-confirmed"}),
            ),
            start_agent: (StatusCode::OK, json!({"status": "ready", "room_name": "shop-confirmed"})),
            products: (
                StatusCode::OK,
                json!({"products": {"Kurtas": [{"name": "Lawn Kurta", "description": "Printed", "price": 4500}]}}),
            ),
        }
    }
}

/// A request the stub received
#[derive(Debug, Clone, PartialEq)]
pub struct Recorded {
    pub path: &'static str,
    pub body: Value,
}

#[derive(Clone)]
struct StubState {
    script: Arc<Script>,
    requests: Arc<Mutex<Vec<Recorded>>>,
}

/// Running stub backend
pub struct StubBackend {
    pub url: String,
    requests: Arc<Mutex<Vec<Recorded>>>,
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl StubBackend {
    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().clone()
    }

    pub fn paths(&self) -> Vec<&'static str> {
        self.requests.lock().iter().map(|r| r.path).collect()
    }

    /// Widget configuration pointing at this stub, with a short readiness deadline
    pub fn config(&self) -> WidgetConfig {
        WidgetConfig::new(self.url.clone())
            .with_readiness_deadline(Duration::from_millis(300))
            .with_poll_interval(Duration::from_millis(20))
            .with_http_timeout(Duration::from_secs(5))
    }
}

impl Drop for StubBackend {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

async fn token(State(state): State<StubState>, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    record(&state, "/api/token", body);
    let (status, body) = state.script.token.clone();
    (status, Json(body))
}

async fn start_agent(State(state): State<StubState>, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    record(&state, "/api/start-agent", body);
    let (status, body) = state.script.start_agent.clone();
    (status, Json(body))
}

async fn products(State(state): State<StubState>) -> (StatusCode, Json<Value>) {
    record(&state, "/api/products", Value::Null);
    let (status, body) = state.script.products.clone();
    (status, Json(body))
}

fn record(state: &StubState, path: &'static str, body: Value) {
    state.requests.lock().push(Recorded { path, body });
}

/// Start a stub backend on an ephemeral port
pub async fn start_stub(script: Script) -> anyhow::Result<StubBackend> {
    let _ = tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter("voicewidget_core=debug")
        .with_test_writer()
        .try_init();

    let requests = Arc::new(Mutex::new(Vec::new()));
    let state = StubState {
        script: Arc::new(script),
        requests: requests.clone(),
    };

    let app = Router::new()
        .route("/api/token", post(token))
        .route("/api/start-agent", post(start_agent))
        .route("/api/products", get(products))
        .with_state(state);

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let url = format!("http://{}", listener.local_addr()?);

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    tokio::spawn(async move {
        let server = axum::serve(listener, app).with_graceful_shutdown(async move {
            let _ = shutdown_rx.await;
        });
        if let Err(e) = server.await {
            tracing::error!("Stub server error: {}", e);
        }
    });

    Ok(StubBackend {
        url,
        requests,
        shutdown_tx: Some(shutdown_tx),
    })
}

/// Poll `done` until it holds or five seconds pass
pub async fn wait_until(done: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !done() {
        assert!(Instant::now() < deadline, "condition not reached in time");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
