//! ---
//! alerter_section: "11-test-harness"
//! alerter_subsection: "02-drivers"
//! alerter_type: "source"
//! alerter_scope: "code"
//! alerter_description: "In-process chat webhook stand-in."
//! alerter_version: "v0.1.0"
//! alerter_owner: "tbd"
//! ---
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, Method, StatusCode, Uri};
use axum::Router;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::HarnessError;

/// One request seen by the stub.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub content_type: Option<String>,
    pub body: String,
}

impl RecordedRequest {
    /// Body parsed as JSON.
    pub fn json(&self) -> Result<serde_json::Value, HarnessError> {
        Ok(serde_json::from_str(&self.body)?)
    }
}

#[derive(Default)]
struct StubState {
    script: VecDeque<u16>,
    requests: Vec<RecordedRequest>,
}

/// HTTP server answering every request with a scripted status, 200 once the
/// script runs out. Stops when dropped.
pub struct WebhookStub {
    addr: SocketAddr,
    state: Arc<Mutex<StubState>>,
    join: JoinHandle<()>,
}

impl WebhookStub {
    /// Bind an ephemeral port on the loopback interface.
    pub async fn start() -> Result<Self, HarnessError> {
        Self::bind(SocketAddr::from(([127, 0, 0, 1], 0))).await
    }

    pub async fn bind(addr: SocketAddr) -> Result<Self, HarnessError> {
        let state = Arc::new(Mutex::new(StubState::default()));
        let app = Router::new()
            .fallback(record_request)
            .with_state(Arc::clone(&state));
        let listener = tokio::net::TcpListener::bind(addr).await?;
        let addr = listener.local_addr()?;
        let join = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        debug!(%addr, "webhook stub listening");
        Ok(Self { addr, state, join })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Absolute URL for `path` on this stub.
    pub fn url(&self, path: &str) -> String {
        format!("http://{}/{}", self.addr, path.trim_start_matches('/'))
    }

    /// Queue status codes for the next requests, in order.
    pub fn respond_with(&self, statuses: impl IntoIterator<Item = u16>) {
        self.state.lock().script.extend(statuses);
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.lock().requests.clone()
    }

    /// Poll until at least `count` requests arrived or `timeout` passes.
    pub async fn wait_for_requests(
        &self,
        count: usize,
        timeout: Duration,
    ) -> Result<Vec<RecordedRequest>, HarnessError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let requests = self.requests();
            if requests.len() >= count {
                return Ok(requests);
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(HarnessError::Timeout {
                    what: "webhook requests",
                    after: timeout,
                });
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
    }
}

impl Drop for WebhookStub {
    fn drop(&mut self) {
        self.join.abort();
    }
}

async fn record_request(
    State(state): State<Arc<Mutex<StubState>>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);
    let mut guard = state.lock();
    guard.requests.push(RecordedRequest {
        method: method.to_string(),
        path: uri.path().to_owned(),
        content_type,
        body: String::from_utf8_lossy(&body).into_owned(),
    });
    let status = guard.script.pop_front().unwrap_or(200);
    StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}
