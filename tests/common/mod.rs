//! Shared fixtures for integration tests
//!
//! - `MockKv`: in-process axum server speaking the KV contract
//! - `fake_service`: a shell script standing in for the service binary
//! - `harness_config`: config pointing the controller at both

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::{Path as UrlPath, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::task::JoinHandle;

use faultline::client::KvClient;
use faultline::config::HarnessConfig;

/// Requests per extra reported worker thread when a pool is simulated
const REQUESTS_PER_THREAD: u64 = 100;

/// Mutable state behind the mock service
#[derive(Default)]
pub struct MockState {
    store: Mutex<HashMap<String, Bytes>>,
    healthy: AtomicBool,
    requests: AtomicU64,
    in_flight: AtomicU64,
    /// Fixed thread count reported when no pool is simulated
    thread_count: AtomicU64,
    /// `(min, max)` pool whose reported size grows with served requests
    pool: Mutex<Option<(u64, u64)>>,
}

impl MockState {
    fn reported_threads(&self) -> u64 {
        match *self.pool.lock().unwrap() {
            Some((min, max)) => {
                let grown = min + self.requests.load(Ordering::Relaxed) / REQUESTS_PER_THREAD;
                grown.min(max)
            }
            None => self.thread_count.load(Ordering::Relaxed),
        }
    }
}

/// In-process KV service
pub struct MockKv {
    addr: SocketAddr,
    state: Arc<MockState>,
    server: JoinHandle<()>,
}

impl MockKv {
    /// Bind an ephemeral port and start serving
    pub async fn start() -> Self {
        let state = Arc::new(MockState {
            healthy: AtomicBool::new(true),
            thread_count: AtomicU64::new(4),
            ..MockState::default()
        });

        let app = Router::new()
            .route(
                "/kv/:key",
                get(get_key).put(put_key).delete(delete_key).post(patch_key),
            )
            .route("/metrics", get(metrics))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr,
            state,
            server,
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn client(&self) -> KvClient {
        KvClient::new(&self.base_url(), Duration::from_millis(500)).unwrap()
    }

    pub fn insert(&self, key: &str, value: Value) {
        self.state
            .store
            .lock()
            .unwrap()
            .insert(key.to_string(), Bytes::from(value.to_string()));
    }

    pub fn insert_raw(&self, key: &str, body: &'static [u8]) {
        self.state
            .store
            .lock()
            .unwrap()
            .insert(key.to_string(), Bytes::from_static(body));
    }

    pub fn remove(&self, key: &str) {
        self.state.store.lock().unwrap().remove(key);
    }

    pub fn value(&self, key: &str) -> Option<Value> {
        self.state
            .store
            .lock()
            .unwrap()
            .get(key)
            .and_then(|b| serde_json::from_slice(b).ok())
    }

    pub fn len(&self) -> usize {
        self.state.store.lock().unwrap().len()
    }

    pub fn keys_with_prefix(&self, prefix: &str) -> usize {
        self.state
            .store
            .lock()
            .unwrap()
            .keys()
            .filter(|k| k.starts_with(prefix))
            .count()
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.state.healthy.store(healthy, Ordering::Relaxed);
    }

    pub fn set_thread_count(&self, threads: u64) {
        self.state.thread_count.store(threads, Ordering::Relaxed);
    }

    /// Report a thread count that grows from `min` to `max` with load
    pub fn simulate_pool(&self, min: u64, max: u64) {
        *self.state.pool.lock().unwrap() = Some((min, max));
    }

    pub fn requests(&self) -> u64 {
        self.state.requests.load(Ordering::Relaxed)
    }
}

impl Drop for MockKv {
    fn drop(&mut self) {
        self.server.abort();
    }
}

struct InFlight<'a>(&'a MockState);

impl<'a> InFlight<'a> {
    fn enter(state: &'a MockState) -> Self {
        state.requests.fetch_add(1, Ordering::Relaxed);
        state.in_flight.fetch_add(1, Ordering::Relaxed);
        Self(state)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::Relaxed);
    }
}

fn metrics_document(state: &MockState) -> Value {
    json!({
        "system": {
            "thread_count": state.reported_threads(),
            "active_connections": state.in_flight.load(Ordering::Relaxed),
        },
        "requests": state.requests.load(Ordering::Relaxed),
    })
}

async fn get_key(State(state): State<Arc<MockState>>, UrlPath(key): UrlPath<String>) -> Response {
    let _guard = InFlight::enter(&state);
    match key.as_str() {
        "health" if state.healthy.load(Ordering::Relaxed) => StatusCode::OK.into_response(),
        "health" => StatusCode::SERVICE_UNAVAILABLE.into_response(),
        "metrics" => Json(metrics_document(&state)).into_response(),
        _ => match state.store.lock().unwrap().get(&key) {
            Some(body) => (StatusCode::OK, body.clone()).into_response(),
            None => StatusCode::NOT_FOUND.into_response(),
        },
    }
}

async fn put_key(
    State(state): State<Arc<MockState>>,
    UrlPath(key): UrlPath<String>,
    body: Bytes,
) -> StatusCode {
    let _guard = InFlight::enter(&state);
    state.store.lock().unwrap().insert(key, body);
    StatusCode::OK
}

async fn delete_key(State(state): State<Arc<MockState>>, UrlPath(key): UrlPath<String>) -> StatusCode {
    let _guard = InFlight::enter(&state);
    state.store.lock().unwrap().remove(&key);
    StatusCode::OK
}

#[derive(Deserialize)]
struct PatchQuery {
    op: String,
    field: String,
    val: String,
}

async fn patch_key(
    State(state): State<Arc<MockState>>,
    UrlPath(key): UrlPath<String>,
    Query(patch): Query<PatchQuery>,
) -> StatusCode {
    let _guard = InFlight::enter(&state);
    let mut store = state.store.lock().unwrap();
    let Some(body) = store.get(&key) else {
        return StatusCode::NOT_FOUND;
    };
    let Ok(Value::Object(mut doc)) = serde_json::from_slice::<Value>(body) else {
        return StatusCode::BAD_REQUEST;
    };

    let value = match patch.op.as_str() {
        "set_int" => match patch.val.parse::<i64>() {
            Ok(n) => json!(n),
            Err(_) => return StatusCode::BAD_REQUEST,
        },
        "set_str" => json!(patch.val),
        "patch_str" => {
            let current = doc
                .get(&patch.field)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            json!(current + &patch.val)
        }
        _ => return StatusCode::BAD_REQUEST,
    };
    doc.insert(patch.field, value);
    store.insert(key, Bytes::from(Value::Object(doc).to_string()));
    StatusCode::OK
}

async fn metrics(State(state): State<Arc<MockState>>) -> Json<Value> {
    Json(metrics_document(&state))
}

/// Write an executable shell script that stands in for the service
#[cfg(unix)]
pub fn fake_service(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
    path
}

/// Config for a fake service binary whose KV contract is served by `mock`
pub fn harness_config(mock: &MockKv, binary: PathBuf, log_dir: &Path) -> HarnessConfig {
    HarnessConfig {
        service_binary: binary,
        base_url: mock.base_url(),
        log_dir: log_dir.to_path_buf(),
        request_timeout_ms: 500,
        startup_retries: 50,
        startup_poll_interval_ms: 20,
        graceful_stop_timeout_ms: 2000,
        ..HarnessConfig::default()
    }
}
