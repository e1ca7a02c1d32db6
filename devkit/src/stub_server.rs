/*!
Stub HTTP server for tests without external services

Serves a health endpoint with a switchable status and records every SMS
posted to a MessageBird-compatible `/messages` route, so tests can assert
on outbound alerts without touching the real gateway.
*/

use anyhow::{Context, Result};
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Form fields of a MessageBird "create message" call
#[derive(Debug, Clone, Deserialize)]
struct MessageForm {
    recipients: String,
    originator: String,
    body: String,
}

/// One SMS received by the stub gateway, with the headers that matter
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordedMessage {
    pub recipients: String,
    pub originator: String,
    pub body: String,
    pub authorization: Option<String>,
    pub accept: Option<String>,
    pub content_type: Option<String>,
}

#[derive(Debug)]
struct StubState {
    messages: Mutex<Vec<RecordedMessage>>,
    health_status: Mutex<StatusCode>,
    gateway_status: Mutex<StatusCode>,
}

/// Running stub server, stopped when dropped
pub struct StubServer {
    addr: SocketAddr,
    state: Arc<StubState>,
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
}

impl StubServer {
    /// Start on an ephemeral localhost port
    pub async fn start() -> Result<Self> {
        let state = Arc::new(StubState {
            messages: Mutex::new(Vec::new()),
            health_status: Mutex::new(StatusCode::OK),
            gateway_status: Mutex::new(StatusCode::CREATED),
        });

        let app = Router::new()
            .route("/health", get(health))
            .route("/status/{code}", get(fixed_status))
            .route("/messages", post(create_message))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .context("Failed to bind stub server")?;
        let addr = listener.local_addr()?;

        let (shutdown, shutdown_rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            let server = axum::serve(listener, app).with_graceful_shutdown(async {
                shutdown_rx.await.ok();
            });
            if let Err(e) = server.await {
                tracing::error!("stub server error: {}", e);
            }
        });

        tracing::info!("stub server listening on http://{}", addr);
        Ok(Self {
            addr,
            state,
            shutdown: Some(shutdown),
            handle,
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn health_url(&self) -> String {
        self.url("/health")
    }

    pub fn messages_url(&self) -> String {
        self.url("/messages")
    }

    /// Status returned by `/health` from now on
    pub fn set_health_status(&self, status: StatusCode) {
        *self.state.health_status.lock() = status;
    }

    /// Status returned by `/messages` from now on
    pub fn set_gateway_status(&self, status: StatusCode) {
        *self.state.gateway_status.lock() = status;
    }

    /// All SMS received so far
    pub fn messages(&self) -> Vec<RecordedMessage> {
        self.state.messages.lock().clone()
    }

    pub fn message_count(&self) -> usize {
        self.state.messages.lock().len()
    }

    /// SMS whose body mentions `needle`
    pub fn messages_mentioning(&self, needle: &str) -> Vec<RecordedMessage> {
        self.state
            .messages
            .lock()
            .iter()
            .filter(|m| m.body.contains(needle))
            .cloned()
            .collect()
    }

    pub fn clear(&self) {
        self.state.messages.lock().clear();
    }
}

impl Drop for StubServer {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        self.handle.abort();
    }
}

async fn health(State(state): State<Arc<StubState>>) -> StatusCode {
    *state.health_status.lock()
}

async fn fixed_status(Path(code): Path<u16>) -> StatusCode {
    StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

async fn create_message(
    State(state): State<Arc<StubState>>,
    headers: HeaderMap,
    Form(form): Form<MessageForm>,
) -> (StatusCode, Json<serde_json::Value>) {
    let header_value = |name: header::HeaderName| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };

    let message = RecordedMessage {
        recipients: form.recipients,
        originator: form.originator,
        body: form.body,
        authorization: header_value(header::AUTHORIZATION),
        accept: header_value(header::ACCEPT),
        content_type: header_value(header::CONTENT_TYPE),
    };

    let status = *state.gateway_status.lock();
    let id = {
        let mut messages = state.messages.lock();
        messages.push(message);
        messages.len()
    };

    (
        status,
        Json(serde_json::json!({ "id": id.to_string(), "direction": "mt" })),
    )
}
