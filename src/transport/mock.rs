//! Scripted in-memory sockets for tests.

// ============================================================================
// Imports
// ============================================================================

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{sink, stream};
use parking_lot::Mutex;
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::Level;
use tracing_subscriber::EnvFilter;
use url::Url;

use crate::diagnostics::Diagnostics;
use crate::error::{Error, Result};
use crate::options::ClientOptions;
use crate::protocol::FrameKind;
use crate::router::{Event, EventSink, MessageSet, Router};

use super::connection::WsClient;
use super::dialer::{DialRequest, Dialer, Socket, base_url};
use super::handler::{ProtocolHandler, Session};

// ============================================================================
// MockDialer
// ============================================================================

enum Script {
    Accept(Socket),
    Fail(String),
}

/// Dialer that replays a script of outcomes; fails once the script is empty.
#[derive(Default)]
pub(crate) struct MockDialer {
    script: Mutex<VecDeque<Script>>,
    attempts: AtomicUsize,
    last_request: Mutex<Option<DialRequest>>,
}

impl MockDialer {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Scripts a successful dial and returns the server side of it.
    pub(crate) fn accept(&self) -> MockPeer {
        let (tx, rx) = mpsc::unbounded_channel::<std::result::Result<Message, WsError>>();
        let written = Arc::new(Mutex::new(Vec::new()));

        let inbound = stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        });
        let outbound = sink::unfold(Arc::clone(&written), |written, message: Message| async move {
            written.lock().push(message);
            Ok::<_, WsError>(written)
        });

        self.script
            .lock()
            .push_back(Script::Accept(Socket::new(outbound, inbound)));

        MockPeer {
            tx: Mutex::new(Some(tx)),
            written,
        }
    }

    /// Scripts a failed dial.
    pub(crate) fn fail(&self, message: &str) {
        self.script
            .lock()
            .push_back(Script::Fail(message.to_string()));
    }

    pub(crate) fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub(crate) fn last_request(&self) -> Option<DialRequest> {
        self.last_request.lock().clone()
    }
}

#[async_trait]
impl Dialer for MockDialer {
    async fn dial(&self, request: &DialRequest) -> Result<Socket> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock() = Some(request.clone());

        match self.script.lock().pop_front() {
            Some(Script::Accept(socket)) => Ok(socket),
            Some(Script::Fail(message)) => Err(Error::connection(message)),
            None => Err(Error::connection("connection refused")),
        }
    }
}

// ============================================================================
// MockPeer
// ============================================================================

/// Server side of a scripted socket.
pub(crate) struct MockPeer {
    tx: Mutex<Option<mpsc::UnboundedSender<std::result::Result<Message, WsError>>>>,
    written: Arc<Mutex<Vec<Message>>>,
}

impl MockPeer {
    pub(crate) fn send(&self, message: Message) {
        if let Some(tx) = self.tx.lock().as_ref() {
            let _ = tx.send(Ok(message));
        }
    }

    pub(crate) fn send_text(&self, text: &str) {
        self.send(Message::Text(text.to_string().into()));
    }

    pub(crate) fn send_binary(&self, data: &'static [u8]) {
        self.send(Message::Binary(Bytes::from_static(data)));
    }

    pub(crate) fn close(&self, code: CloseCode, reason: &str) {
        self.send(Message::Close(Some(CloseFrame {
            code,
            reason: reason.to_string().into(),
        })));
    }

    pub(crate) fn fail(&self, err: WsError) {
        if let Some(tx) = self.tx.lock().as_ref() {
            let _ = tx.send(Err(err));
        }
    }

    /// Ends the inbound stream without a close frame.
    pub(crate) fn end(&self) {
        self.tx.lock().take();
    }

    pub(crate) fn written(&self) -> Vec<Message> {
        self.written.lock().clone()
    }

    pub(crate) fn written_texts(&self) -> Vec<String> {
        self.written
            .lock()
            .iter()
            .filter_map(|m| match m {
                Message::Text(text) => Some(text.as_str().to_string()),
                _ => None,
            })
            .collect()
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Options pointing at a plain-text local host with a short retry delay.
pub(crate) fn test_options() -> ClientOptions {
    init_tracing();
    ClientOptions {
        host: "http://localhost:8080".to_string(),
        retry_delay: Duration::from_millis(5),
        verbosity: Level::TRACE,
        ..ClientOptions::default()
    }
}

/// Routes test logs through the test harness; `RUST_LOG` picks the filter.
pub(crate) fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Polls `condition` for up to two seconds.
pub(crate) async fn wait_until(condition: impl Fn() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(condition(), "condition not met in time");
}

/// Polls `client` for up to two seconds until it has no live socket.
pub(crate) async fn wait_until_disconnected<H: ProtocolHandler>(client: &WsClient<H>) {
    for _ in 0..200 {
        if !client.is_connected().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("client never disconnected");
}

// ============================================================================
// TestHandler
// ============================================================================

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub(crate) struct Probe {
    pub(crate) seq: u32,
}

/// Single-message family used by transport tests.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ProbeMessage {
    Probe(Probe),
    /// Makes the recorder panic.
    Crash,
}

impl MessageSet for ProbeMessage {
    const FAMILY: &'static str = "probe";

    fn decode(kind: &str, data: &[u8]) -> Option<serde_json::Result<Self>> {
        match kind {
            "Probe" => Some(serde_json::from_slice(data).map(Self::Probe)),
            "Crash" => Some(Ok(Self::Crash)),
            _ => None,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::Probe(_) => "Probe",
            Self::Crash => "Crash",
        }
    }
}

/// Records one label per event. Panics on `Crash`.
#[derive(Default)]
pub(crate) struct Recorder {
    events: Mutex<Vec<String>>,
    last_error: Mutex<String>,
}

#[async_trait]
impl EventSink<ProbeMessage> for Recorder {
    async fn deliver(&self, event: Event<ProbeMessage>) -> Result<()> {
        let label = match event {
            Event::Open(_) => "open".to_string(),
            Event::Message(ProbeMessage::Probe(probe)) => format!("probe:{}", probe.seq),
            Event::Message(ProbeMessage::Crash) => panic!("recorder crashed"),
            Event::Binary(data) => format!("binary:{}", data.len()),
            Event::Close(_) => "close".to_string(),
            Event::Error(error) => {
                *self.last_error.lock() = error.description.clone();
                format!("error:{}", error.err_code)
            }
            Event::Unhandled(_) => "unhandled".to_string(),
        };
        self.events.lock().push(label);
        Ok(())
    }
}

pub(crate) struct TestHandler {
    router: Router<ProbeMessage>,
    recorder: Arc<Recorder>,
    started: AtomicUsize,
    finished: AtomicUsize,
}

impl TestHandler {
    pub(crate) fn new() -> Self {
        let recorder = Arc::new(Recorder::default());
        let router = Router::new(
            vec![Arc::clone(&recorder) as Arc<dyn EventSink<ProbeMessage>>],
            Diagnostics::new(Level::TRACE, ProbeMessage::FAMILY),
        );
        Self {
            router,
            recorder,
            started: AtomicUsize::new(0),
            finished: AtomicUsize::new(0),
        }
    }

    pub(crate) fn events(&self) -> Vec<String> {
        self.recorder.events.lock().clone()
    }

    pub(crate) fn last_error(&self) -> String {
        self.recorder.last_error.lock().clone()
    }

    pub(crate) fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    pub(crate) fn finished(&self) -> usize {
        self.finished.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProtocolHandler for TestHandler {
    type Message = ProbeMessage;

    fn url(&self, host: &str) -> Result<Url> {
        let mut url = base_url(host)?;
        url.set_path("/v1/test");
        Ok(url)
    }

    async fn start(&self, _session: &Session<Self>) -> Result<()> {
        self.started.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn process_message(&self, kind: FrameKind, data: Bytes) -> Result<()> {
        match kind {
            FrameKind::Text => self.router.message(&data).await,
            FrameKind::Binary => self.router.binary(data).await,
        }
    }

    fn close_message(&self) -> Option<String> {
        Some(r#"{"type":"Done"}"#.to_string())
    }

    async fn finish(&self) {
        self.finished.fetch_add(1, Ordering::SeqCst);
    }

    fn router(&self) -> &Router<ProbeMessage> {
        &self.router
    }
}
