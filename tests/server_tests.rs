//! ---
//! alerter_section: "15-testing-qa-runbook"
//! alerter_subsection: "integration-tests"
//! alerter_type: "source"
//! alerter_scope: "code"
//! alerter_description: "End-to-end checks of the alerter daemon against a webhook stub."
//! alerter_version: "v0.1.0"
//! alerter_owner: "tbd"
//! ---
use std::net::SocketAddr;
use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;

use alerter_common::{AlertRequest, Level, Message};
use alerter_testharness::{
    AlertInvocation, HarnessConfiguration, MessageAsserter, ServerProcess, WebhookStub,
};
use chrono::Utc;
use tempfile::tempdir;
use tokio::sync::{Mutex, MutexGuard};

/// Port the webhook in `tests/resources/config.yml` points at.
const WEBHOOK_PORT: u16 = 17553;
const READY_TIMEOUT: Duration = Duration::from_secs(5);

fn config() -> &'static HarnessConfiguration {
    HarnessConfiguration::require()
}

/// Suites in this file share the fixed webhook port.
async fn exclusive_port() -> MutexGuard<'static, ()> {
    static PORT: OnceLock<Mutex<()>> = OnceLock::new();
    PORT.get_or_init(|| Mutex::new(())).lock().await
}

async fn webhook() -> WebhookStub {
    let addr = SocketAddr::from(([127, 0, 0, 1], WEBHOOK_PORT));
    let mut attempts = 0;
    loop {
        match WebhookStub::bind(addr).await {
            Ok(stub) => return stub,
            // the previous test's runtime may still be releasing the port
            Err(_) if attempts < 40 => {
                attempts += 1;
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
            Err(err) => panic!("webhook port {WEBHOOK_PORT} unavailable: {err}"),
        }
    }
}

async fn server(dir: &Path) -> ServerProcess {
    let mut server = ServerProcess::spawn(config(), dir).unwrap();
    server.wait_until_ready(READY_TIMEOUT).await.unwrap();
    server
}

fn message(text: &str) -> Message {
    AlertRequest {
        title: "server test".into(),
        text: text.into(),
        level: Level::Warn,
        ..AlertRequest::default()
    }
    .compose(Some("system-test".into()), "alert v0.1.0", Utc::now())
}

#[tokio::test]
async fn message_reaches_webhook() {
    let _port = exclusive_port().await;
    let stub = webhook().await;
    let dir = tempdir().unwrap();
    let server = server(dir.path()).await;

    server.send(&message("forwarded")).await.unwrap();

    let requests = stub.wait_for_requests(1, Duration::from_secs(5)).await.unwrap();
    assert_eq!(requests[0].method, "POST");
    assert_eq!(requests[0].path, "/slack");
    assert_eq!(requests[0].content_type.as_deref(), Some("application/json"));
    MessageAsserter::from_value(requests[0].json().unwrap())
        .text("forwarded")
        .title("server test")
        .username("system-test")
        .color(Level::Warn.color());

    server.kill().await.unwrap();
}

#[tokio::test]
async fn failed_deliveries_are_retried() {
    let _port = exclusive_port().await;
    let stub = webhook().await;
    stub.respond_with([500, 500]);
    let dir = tempdir().unwrap();
    let server = server(dir.path()).await;

    server.send(&message("eventually")).await.unwrap();

    let requests = stub.wait_for_requests(3, Duration::from_secs(10)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(stub.requests().len(), 3);
    assert!(requests.iter().all(|request| request.path == "/slack"));
    assert_eq!(server.spooled().unwrap(), 0);

    server.kill().await.unwrap();
}

#[tokio::test]
async fn illegal_message_is_dropped() {
    let _port = exclusive_port().await;
    let stub = webhook().await;
    let dir = tempdir().unwrap();
    let server = server(dir.path()).await;

    server.send_raw(b"illegal message").await.unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;

    assert!(stub.requests().is_empty());
    assert_eq!(server.spooled().unwrap(), 0);

    server.kill().await.unwrap();
}

#[tokio::test]
async fn terminated_server_removes_socket_and_keeps_spool() {
    let _port = exclusive_port().await;
    let stub = webhook().await;
    stub.respond_with([500; 32]);
    let dir = tempdir().unwrap();
    let server = server(dir.path()).await;
    let socket = server.socket_path().to_path_buf();
    let spool = server.spool_path().to_path_buf();

    server.send(&message("parked")).await.unwrap();
    stub.wait_for_requests(1, Duration::from_secs(5)).await.unwrap();
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while server.spooled().unwrap() == 0 && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(25)).await;
    }

    let status = server.terminate(Duration::from_secs(10)).await.unwrap();
    assert!(status.success(), "{status}");
    assert!(!socket.exists());
    let stored = std::fs::read_to_string(&spool).unwrap();
    assert_eq!(stored.lines().filter(|line| !line.trim().is_empty()).count(), 1);
    MessageAsserter::from_slice(stored.lines().next().unwrap().as_bytes())
        .unwrap()
        .text("parked");
}

#[tokio::test]
async fn client_to_webhook() {
    let _port = exclusive_port().await;
    let stub = webhook().await;
    let dir = tempdir().unwrap();
    let server = server(dir.path()).await;

    let output = AlertInvocation::new(config(), "end to end", "through both binaries")
        .level("ERROR")
        .field("stage", "deploy")
        .current_dir(dir.path())
        .run()
        .await
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let requests = stub.wait_for_requests(1, Duration::from_secs(5)).await.unwrap();
    MessageAsserter::from_value(requests[0].json().unwrap())
        .title("end to end")
        .text("through both binaries")
        .color(Level::Error.color())
        .field("stage", "deploy");

    server.kill().await.unwrap();
}
