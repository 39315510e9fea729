//! The fake backend behind a real HTTP listener.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use serde_json::{Value, json};
use tokio::task::JoinHandle;
use tracing::debug;

use pit_api::transport::Method;

use crate::FakeBackend;

/// Refresh token the server accepts at `/auth/token/refresh`.
pub const REFRESH_TOKEN: &str = "refresh-secret";

#[derive(Clone)]
struct ServerState {
    backend: FakeBackend,
    accepted: Arc<Mutex<String>>,
    refreshes: Arc<AtomicUsize>,
}

/// Handle to a running HTTP server. The server stops when this is dropped.
pub struct TestServer {
    pub addr: SocketAddr,
    pub backend: FakeBackend,
    accepted: Arc<Mutex<String>>,
    refreshes: Arc<AtomicUsize>,
    handle: JoinHandle<()>,
}

impl TestServer {
    /// API root to point an `ApiConfig` at.
    pub fn base_url(&self) -> String {
        format!("http://{}/api", self.addr)
    }

    /// Make the server accept only `token` from now on, so clients holding
    /// the old one see a 401.
    pub fn rotate_token(&self, token: &str) {
        *self.accepted.lock().expect("token lock poisoned") = token.to_owned();
    }

    /// Number of successful calls to the refresh endpoint.
    pub fn refresh_count(&self) -> usize {
        self.refreshes.load(Ordering::SeqCst)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Serve `backend` on a loopback port, accepting bearer `token`.
pub async fn serve(backend: FakeBackend, token: &str) -> TestServer {
    let accepted = Arc::new(Mutex::new(token.to_owned()));
    let refreshes = Arc::new(AtomicUsize::new(0));
    let state = ServerState {
        backend: backend.clone(),
        accepted: accepted.clone(),
        refreshes: refreshes.clone(),
    };

    let app = Router::new().fallback(dispatch).with_state(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind test listener");
    let addr = listener.local_addr().expect("listener has no address");
    let handle = tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    TestServer {
        addr,
        backend,
        accepted,
        refreshes,
        handle,
    }
}

async fn dispatch(
    State(state): State<ServerState>,
    method: axum::http::Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let Some(path) = uri.path().strip_prefix("/api") else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let body: Option<Value> = if body.is_empty() {
        None
    } else {
        match serde_json::from_slice(&body) {
            Ok(v) => Some(v),
            Err(_) => return (StatusCode::BAD_REQUEST, "malformed JSON").into_response(),
        }
    };

    let accepted = state.accepted.lock().expect("token lock poisoned").clone();

    if path == "/auth/token/refresh" {
        let presented = body.as_ref().and_then(|b| b.get("refresh")).and_then(Value::as_str);
        if presented != Some(REFRESH_TOKEN) {
            return json_reply(401, json!({ "detail": "Token is invalid or expired" }));
        }
        state.refreshes.fetch_add(1, Ordering::SeqCst);
        return json_reply(200, json!({ "access": accepted }));
    }

    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));
    if bearer != Some(accepted.as_str()) {
        debug!(path, "rejecting stale bearer token");
        return json_reply(401, json!({ "detail": "Given token not valid for any token type" }));
    }

    let method = match method {
        axum::http::Method::GET => Method::Get,
        axum::http::Method::POST => Method::Post,
        axum::http::Method::PATCH => Method::Patch,
        axum::http::Method::DELETE => Method::Delete,
        _ => return StatusCode::METHOD_NOT_ALLOWED.into_response(),
    };
    let full_path = match uri.query() {
        Some(q) => format!("{path}?{q}"),
        None => path.to_owned(),
    };

    match state.backend.handle(method, &full_path, body).await {
        Ok(Value::Null) => StatusCode::NO_CONTENT.into_response(),
        Ok(value) => json_reply(200, value),
        Err((status, value)) => json_reply(status, value),
    }
}

fn json_reply(status: u16, value: Value) -> Response {
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, axum::Json(value)).into_response()
}
