//! ---
//! alerter_section: "05-daemon-runtime"
//! alerter_subsection: "module"
//! alerter_type: "source"
//! alerter_scope: "code"
//! alerter_description: "Daemon lifecycle against scripted notifiers."
//! alerter_version: "v0.1.0"
//! alerter_owner: "tbd"
//! ---
use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use alerter_common::{AlertRequest, Level, Message};
use alerter_core::{Daemon, DeliveryError, Notifier, SlackNotifier};
use alerter_spool::Spooler;
use alerter_testharness::WebhookStub;
use chrono::Utc;
use parking_lot::Mutex;
use tempfile::tempdir;
use tokio::io::AsyncWriteExt;
use tokio::net::UnixStream;

/// Answers each delivery with the next scripted outcome; afterwards succeeds unless `fallback_fails`.
#[derive(Default)]
struct ScriptedNotifier {
    script: Mutex<VecDeque<bool>>,
    fallback_fails: bool,
    latency: Duration,
    attempts: Mutex<Vec<Message>>,
}

impl ScriptedNotifier {
    fn failing(times: usize) -> Arc<Self> {
        let notifier = Self::default();
        notifier.script.lock().extend(std::iter::repeat(false).take(times));
        Arc::new(notifier)
    }

    fn unreachable() -> Arc<Self> {
        Arc::new(Self {
            fallback_fails: true,
            ..Self::default()
        })
    }

    /// Fails every delivery, each only after `latency`.
    fn slow_unreachable(latency: Duration) -> Arc<Self> {
        Arc::new(Self {
            fallback_fails: true,
            latency,
            ..Self::default()
        })
    }

    fn attempts(&self) -> usize {
        self.attempts.lock().len()
    }
}

#[async_trait::async_trait]
impl Notifier for ScriptedNotifier {
    async fn deliver(&self, message: &Message) -> Result<(), DeliveryError> {
        self.attempts.lock().push(message.clone());
        let succeed = self.script.lock().pop_front().unwrap_or(!self.fallback_fails);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if succeed {
            Ok(())
        } else {
            Err(DeliveryError::Status(500))
        }
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

fn alert(text: &str) -> Message {
    AlertRequest {
        title: "integration".into(),
        text: text.into(),
        level: Level::Error,
        ..AlertRequest::default()
    }
    .compose(Some("test-host".into()), "alert v0.1.0", Utc::now())
}

async fn send(socket: &Path, payload: &[u8]) {
    let mut stream = UnixStream::connect(socket).await.unwrap();
    stream.write_all(payload).await.unwrap();
    stream.shutdown().await.unwrap();
}

async fn wait_for(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    condition()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn delivers_message_from_socket() {
    let dir = tempdir().unwrap();
    let notifier = ScriptedNotifier::failing(0);
    let daemon = Daemon::with_notifier(
        dir.path().join("alert.sock"),
        dir.path().join("queue"),
        notifier.clone(),
    );
    let handle = daemon.start().await.unwrap();

    let message = alert("delivered");
    send(handle.socket_path(), &serde_json::to_vec(&message).unwrap()).await;

    assert!(wait_for(Duration::from_secs(2), || notifier.attempts() == 1).await);
    assert_eq!(notifier.attempts.lock()[0], message);

    let socket = handle.socket_path().to_path_buf();
    handle.shutdown().await.unwrap();
    assert!(!socket.exists());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn failed_delivery_is_retried_until_success() {
    let dir = tempdir().unwrap();
    let spool = dir.path().join("queue");
    let notifier = ScriptedNotifier::failing(2);
    let handle = Daemon::with_notifier(dir.path().join("alert.sock"), &spool, notifier.clone())
        .start()
        .await
        .unwrap();

    send(handle.socket_path(), &serde_json::to_vec(&alert("retry")).unwrap()).await;

    // retries after 2 s and 4 s of backoff
    assert!(wait_for(Duration::from_secs(10), || notifier.attempts() == 3).await);
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(notifier.attempts(), 3);
    assert!(Spooler::open(&spool).unwrap().is_empty());

    handle.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn illegal_payload_is_ignored() {
    let dir = tempdir().unwrap();
    let spool = dir.path().join("queue");
    let notifier = ScriptedNotifier::failing(0);
    let handle = Daemon::with_notifier(dir.path().join("alert.sock"), &spool, notifier.clone())
        .start()
        .await
        .unwrap();

    send(handle.socket_path(), b"illegal message").await;
    tokio::time::sleep(Duration::from_millis(300)).await;

    assert_eq!(notifier.attempts(), 0);
    handle.shutdown().await.unwrap();
    assert!(Spooler::open(&spool).unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn spool_survives_restart() {
    let dir = tempdir().unwrap();
    let socket = dir.path().join("alert.sock");
    let spool = dir.path().join("queue");

    let down = ScriptedNotifier::unreachable();
    let handle = Daemon::with_notifier(&socket, &spool, down.clone())
        .start()
        .await
        .unwrap();
    send(&socket, &serde_json::to_vec(&alert("parked")).unwrap()).await;
    assert!(wait_for(Duration::from_secs(2), || {
        Spooler::open(&spool).map(|s| s.len() == 1).unwrap_or(false)
    })
    .await);
    handle.shutdown().await.unwrap();
    assert_eq!(Spooler::open(&spool).unwrap().len(), 1);

    let up = ScriptedNotifier::failing(0);
    let handle = Daemon::with_notifier(&socket, &spool, up.clone())
        .start()
        .await
        .unwrap();
    assert!(wait_for(Duration::from_secs(3), || up.attempts() == 1).await);
    assert_eq!(up.attempts.lock()[0].attachments[0].text, "parked");
    handle.shutdown().await.unwrap();
    assert!(Spooler::open(&spool).unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn shutdown_keeps_message_in_flight() {
    let dir = tempdir().unwrap();
    let spool = dir.path().join("queue");
    let mut spooler = Spooler::open(&spool).unwrap();
    spooler.queue(alert("in flight"));
    spooler.store().unwrap();

    let notifier = ScriptedNotifier::slow_unreachable(Duration::from_millis(800));
    let handle = Daemon::with_notifier(dir.path().join("alert.sock"), &spool, notifier.clone())
        .start()
        .await
        .unwrap();
    assert!(wait_for(Duration::from_secs(3), || notifier.attempts() == 1).await);
    handle.shutdown().await.unwrap();

    let mut stored = Spooler::open(&spool).unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored.pop().unwrap().attachments[0].text, "in flight");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn shutdown_spools_messages_waiting_for_delivery() {
    let dir = tempdir().unwrap();
    let spool = dir.path().join("queue");
    let notifier = ScriptedNotifier::slow_unreachable(Duration::from_millis(800));
    let handle = Daemon::with_notifier(dir.path().join("alert.sock"), &spool, notifier.clone())
        .start()
        .await
        .unwrap();

    for text in ["one", "two", "three"] {
        send(handle.socket_path(), &serde_json::to_vec(&alert(text)).unwrap()).await;
    }
    assert!(wait_for(Duration::from_secs(2), || notifier.attempts() == 1).await);
    // the rest are read off the socket while the first delivery is pending
    tokio::time::sleep(Duration::from_millis(200)).await;
    handle.shutdown().await.unwrap();

    assert_eq!(Spooler::open(&spool).unwrap().len(), 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn slack_notifier_posts_json_and_maps_status() {
    let stub = WebhookStub::start().await.unwrap();
    stub.respond_with([500]);
    let notifier = SlackNotifier::new(
        stub.url("/slack").parse().unwrap(),
        Duration::from_secs(2),
    )
    .unwrap();
    let message = alert("over http");

    let err = notifier.deliver(&message).await.unwrap_err();
    assert!(matches!(err, DeliveryError::Status(500)));
    notifier.deliver(&message).await.unwrap();

    let requests = stub.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1].method, "POST");
    assert_eq!(requests[1].path, "/slack");
    assert_eq!(requests[1].content_type.as_deref(), Some("application/json"));
    let body: Message = serde_json::from_str(&requests[1].body).unwrap();
    assert_eq!(body, message);
}
