//! Connection manager.
//!
//! [`WsClient`] owns the socket's write half, the dial/retry state machine
//! and the lifecycle (connect, reconnect, stop). The read half goes to one
//! listener task per established connection.
//!
//! # Locking
//!
//! A single async mutex guards the write half, the retry flag and the
//! connection generation. It is held for the full duration of a write, so
//! frames from concurrent writers never interleave. It is not held while
//! dialing or while sleeping between attempts.
//!
//! # Lifecycle
//!
//! ```text
//! connect ──► dial ──► install ──► start hook ──► Open ──► listener reads
//!                                                             │
//!         stop / peer close / read failure ◄──────────────────┘
//!                       │
//!              graceful: close notice, close frame, finish, Close
//!              fatal:    drop the socket
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use bytes::Bytes;
use futures_util::SinkExt;
use parking_lot::Mutex as SyncMutex;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::{Mutex, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use crate::diagnostics::{Diagnostics, diag};
use crate::error::{Error, Result};
use crate::options::ClientOptions;
use crate::protocol::frame::{close_frame, encode_binary, encode_control, encode_text};
use crate::protocol::{CloseResponse, ErrorResponse, OpenResponse};
use crate::router::{MessageSet, Router};

use super::dialer::{DialRequest, Dialer, FrameSink, Socket};
use super::handler::{ProtocolHandler, Session};
use super::listener;

// ============================================================================
// Constants
// ============================================================================

/// Dial attempts used when a connect call passes a limit of zero.
pub const DEFAULT_CONNECT_RETRY: u32 = 3;

/// Pause after each close notice so the peer can register it.
const TERMINATION_PAUSE: Duration = Duration::from_millis(100);

/// Upper bound on delivering the `Close` event and on closing the write half.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Chunk size used by [`WsClient::stream`].
pub const STREAM_CHUNK_SIZE: usize = 8192;

// ============================================================================
// Link
// ============================================================================

/// Mutable connection state, guarded by [`Link::state`].
struct LinkState {
    /// Write half of the live socket.
    sink: Option<FrameSink>,
    /// Whether dialing is allowed.
    retry: bool,
    /// Bumped on every installed socket.
    generation: u64,
    /// Cancelled when the current connection closes.
    token: CancellationToken,
}

/// Connection state shared by the client, its writers and its tasks.
struct Link {
    state: Mutex<LinkState>,
    /// Cancelled once, by `stop()`.
    root: CancellationToken,
    /// Background tasks joined by `stop()`.
    tasks: SyncMutex<Vec<JoinHandle<()>>>,
}

impl Link {
    fn new() -> Self {
        let root = CancellationToken::new();
        let token = root.child_token();
        Self {
            state: Mutex::new(LinkState {
                sink: None,
                retry: true,
                generation: 0,
                token,
            }),
            root,
            tasks: SyncMutex::new(Vec::new()),
        }
    }

    fn track(&self, handle: JoinHandle<()>) {
        let mut tasks = self.tasks.lock();
        tasks.retain(|task| !task.is_finished());
        tasks.push(handle);
    }

    /// Awaits every tracked task except the calling one.
    async fn join_tasks(&self, diag: &Diagnostics) {
        let current = tokio::task::try_id();
        let handles = std::mem::take(&mut *self.tasks.lock());

        for handle in handles {
            if current == Some(handle.id()) {
                continue;
            }
            if let Err(e) = handle.await
                && e.is_panic()
            {
                diag!(diag, ERROR, "background task panicked during shutdown");
            }
        }
    }
}

// ============================================================================
// Writer
// ============================================================================

/// Cloneable write handle.
///
/// Every write takes the connection mutex for the whole frame. Writes never
/// reconnect: with no live socket they fail with
/// [`Error::InvalidConnection`].
#[derive(Clone)]
pub struct Writer {
    link: Arc<Link>,
}

impl fmt::Debug for Writer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Writer").finish_non_exhaustive()
    }
}

impl Writer {
    /// Writes one binary frame.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidConnection`] if no socket is live
    /// - [`Error::WebSocket`] if the socket write fails
    pub async fn write_binary(&self, data: impl Into<Bytes>) -> Result<()> {
        self.send(encode_binary(data)).await
    }

    /// Serializes `value` and writes it as one text frame.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidConnection`] if no socket is live
    /// - [`Error::Json`] if serialization fails
    /// - [`Error::WebSocket`] if the socket write fails
    pub async fn write_control<T>(&self, value: &T) -> Result<()>
    where
        T: Serialize + Sync + ?Sized,
    {
        self.send(encode_control(value)?).await
    }

    /// Writes pre-serialized text as one text frame.
    ///
    /// # Errors
    ///
    /// Same as [`write_binary`](Self::write_binary).
    pub async fn write_text(&self, text: impl Into<String>) -> Result<()> {
        self.send(encode_text(text)).await
    }

    /// Writes a normal-closure handshake frame without tearing down state.
    ///
    /// # Errors
    ///
    /// Same as [`write_binary`](Self::write_binary).
    pub async fn write_close(&self) -> Result<()> {
        self.send(close_frame()).await
    }

    /// Returns `true` if a socket is installed.
    pub async fn is_connected(&self) -> bool {
        self.link.state.lock().await.sink.is_some()
    }

    async fn send(&self, frame: Message) -> Result<()> {
        let mut state = self.link.state.lock().await;
        let sink = state.sink.as_mut().ok_or(Error::InvalidConnection)?;
        sink.send(frame).await?;
        Ok(())
    }
}

// ============================================================================
// WsClient
// ============================================================================

struct Shared<H> {
    handler: Arc<H>,
    dialer: Arc<dyn Dialer>,
    options: Arc<ClientOptions>,
    link: Arc<Link>,
    diag: Diagnostics,
    /// Dial attempts made by the current explicit connect call.
    attempts: AtomicU32,
}

/// Generic WebSocket client driven by a [`ProtocolHandler`].
///
/// Cheap to clone; clones share one connection.
pub struct WsClient<H: ProtocolHandler> {
    shared: Arc<Shared<H>>,
}

impl<H: ProtocolHandler> Clone for WsClient<H> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<H: ProtocolHandler> fmt::Debug for WsClient<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WsClient")
            .field("family", &<H::Message as MessageSet>::FAMILY)
            .field("host", &self.shared.options.host)
            .finish_non_exhaustive()
    }
}

impl<H: ProtocolHandler> WsClient<H> {
    /// Creates a disconnected client.
    ///
    /// Diagnostics are taken from the handler's router so both log under
    /// the same client span.
    #[must_use]
    pub fn new(handler: Arc<H>, dialer: Arc<dyn Dialer>, options: Arc<ClientOptions>) -> Self {
        let diag = handler.router().diagnostics().clone();
        Self {
            shared: Arc::new(Shared {
                handler,
                dialer,
                options,
                link: Arc::new(Link::new()),
                diag,
                attempts: AtomicU32::new(0),
            }),
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Returns the protocol handler.
    #[inline]
    #[must_use]
    pub fn handler(&self) -> &H {
        &self.shared.handler
    }

    /// Returns the client options.
    #[inline]
    #[must_use]
    pub fn options(&self) -> &ClientOptions {
        &self.shared.options
    }

    /// Returns the client diagnostics.
    #[inline]
    #[must_use]
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.shared.diag
    }

    /// Returns a write handle.
    #[inline]
    #[must_use]
    pub fn writer(&self) -> Writer {
        Writer {
            link: Arc::clone(&self.shared.link),
        }
    }

    /// Dial attempts made by the last explicit connect call.
    #[inline]
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.shared.attempts.load(Ordering::SeqCst)
    }

    /// Returns `true` if a socket is installed.
    pub async fn is_connected(&self) -> bool {
        self.writer().is_connected().await
    }

    fn router(&self) -> &Router<H::Message> {
        self.shared.handler.router()
    }

    pub(crate) fn track(&self, handle: JoinHandle<()>) {
        self.shared.link.track(handle);
    }

    // ========================================================================
    // Connect
    // ========================================================================

    /// Dials up to `retry_limit` times (zero means
    /// [`DEFAULT_CONNECT_RETRY`]) with the configured fixed delay between
    /// attempts.
    ///
    /// Returns `Ok(true)` once a connection is live, `Ok(false)` if every
    /// attempt failed, retrying is disabled, or the client was stopped.
    /// Exhausting the attempts disables retrying until
    /// [`reconnect`](Self::reconnect).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the URL or headers cannot be built; no
    /// attempt is consumed.
    pub async fn connect(&self, retry_limit: u32) -> Result<bool> {
        let limit = if retry_limit == 0 {
            DEFAULT_CONNECT_RETRY
        } else {
            retry_limit
        };
        let link = &self.shared.link;
        let options = &self.shared.options;

        self.shared.attempts.store(0, Ordering::SeqCst);

        {
            let state = link.state.lock().await;
            if !state.retry || link.root.is_cancelled() {
                diag!(self.shared.diag, DEBUG, "connect skipped: retrying disabled");
                return Ok(false);
            }
            if state.sink.is_some() {
                return Ok(true);
            }
        }

        for attempt in 1..=limit {
            if attempt > 1 {
                tokio::select! {
                    biased;
                    () = link.root.cancelled() => return Ok(false),
                    () = sleep(options.retry_delay) => {}
                }
                if !link.state.lock().await.retry {
                    return Ok(false);
                }
            }

            let request = DialRequest {
                url: self.shared.handler.url(&options.host)?,
                headers: options.headers()?,
                skip_server_auth: options.skip_server_auth,
                timeout: options.connect_timeout,
                diag: self.shared.diag.clone(),
            };

            self.shared.attempts.fetch_add(1, Ordering::SeqCst);
            diag!(self.shared.diag, DEBUG, attempt, limit, url = %request.url, "dialing");

            match self.shared.dialer.dial(&request).await {
                Ok(socket) => return Ok(self.install(socket).await),
                Err(e) => {
                    diag!(self.shared.diag, WARN, attempt, limit, error = %e, "dial failed");
                }
            }
        }

        link.state.lock().await.retry = false;
        diag!(self.shared.diag, ERROR, attempts = limit, "giving up connecting");
        Ok(false)
    }

    /// Re-arms retrying, then behaves like [`connect`](Self::connect).
    ///
    /// A stopped client stays stopped.
    ///
    /// # Errors
    ///
    /// Same as [`connect`](Self::connect).
    pub async fn reconnect(&self, retry_limit: u32) -> Result<bool> {
        {
            let mut state = self.shared.link.state.lock().await;
            if self.shared.link.root.is_cancelled() {
                return Ok(false);
            }
            state.retry = true;
        }
        self.connect(retry_limit).await
    }

    /// Installs a dialed socket and runs the post-connect sequence.
    ///
    /// Returns `false` if the client was stopped while dialing.
    async fn install(&self, socket: Socket) -> bool {
        let Socket { sink, stream } = socket;
        let link = &self.shared.link;

        let (generation, token) = {
            let mut state = link.state.lock().await;
            if !state.retry || link.root.is_cancelled() {
                return false;
            }
            if state.sink.is_some() {
                diag!(self.shared.diag, DEBUG, "concurrent connect won, dropping socket");
                return true;
            }
            state.generation += 1;
            state.sink = Some(sink);
            state.token = link.root.child_token();
            (state.generation, state.token.clone())
        };

        let (ready_tx, ready_rx) = oneshot::channel();
        let handle = tokio::spawn(listener::run(
            self.clone(),
            stream,
            generation,
            token.clone(),
            ready_rx,
        ));
        link.track(handle);

        let session = Session::new(self.clone(), generation, token);
        if let Err(e) = self.shared.handler.start(&session).await {
            diag!(self.shared.diag, ERROR, error = %e, "start hook failed");
            self.report(&ErrorResponse::from_error(&e)).await;
        }

        self.emit("open", self.router().open(&OpenResponse::default())).await;

        diag!(self.shared.diag, INFO, generation, "connected");
        let _ = ready_tx.send(());
        true
    }

    // ========================================================================
    // Close
    // ========================================================================

    /// Returns `true` if `generation` is the installed connection.
    pub(crate) async fn is_live(&self, generation: u64) -> bool {
        let state = self.shared.link.state.lock().await;
        state.generation == generation && state.sink.is_some()
    }

    /// Emits an error event.
    pub(crate) async fn report(&self, error: &ErrorResponse) {
        self.emit("error", self.router().error(error)).await;
    }

    /// Runs a lifecycle dispatch, abandoning it once the client is stopped.
    async fn emit(&self, event: &'static str, dispatch: impl Future<Output = Result<()>>) {
        let result = tokio::select! {
            biased;
            () = self.shared.link.root.cancelled() => {
                diag!(self.shared.diag, DEBUG, event, "client stopped, event dropped");
                return;
            }
            result = dispatch => result,
        };
        if let Err(e) = result {
            diag!(self.shared.diag, WARN, event, error = %e, "lifecycle event rejected");
        }
    }

    /// Reports `err` and fatally closes `generation`.
    pub(crate) async fn fault(&self, err: &Error, generation: u64) {
        diag!(self.shared.diag, ERROR, error = %err, generation, "connection fault");
        self.report(&ErrorResponse::from_error(err)).await;
        self.close(true, Some(generation)).await;
    }

    /// Closes the live connection.
    ///
    /// With `generation` set, only that connection is closed. A graceful
    /// close sends the close notice and handshake, runs the finish hook and
    /// emits `Close`; a fatal close drops the socket.
    pub(crate) async fn close(&self, fatal: bool, generation: Option<u64>) {
        let mut sink = {
            let mut state = self.shared.link.state.lock().await;
            if generation.is_some_and(|g| g != state.generation) {
                return;
            }
            let Some(sink) = state.sink.take() else {
                return;
            };
            state.token.cancel();
            sink
        };

        if fatal {
            diag!(self.shared.diag, WARN, "connection dropped");
            drop(sink);
            return;
        }

        if let Some(notice) = self.shared.handler.close_message() {
            if let Err(e) = sink.send(encode_text(notice)).await {
                diag!(self.shared.diag, DEBUG, error = %e, "close notice not sent");
            }
            sleep(TERMINATION_PAUSE).await;
        }

        if let Err(e) = sink.send(close_frame()).await {
            diag!(self.shared.diag, DEBUG, error = %e, "close frame not sent");
        }
        sleep(TERMINATION_PAUSE).await;

        self.shared.handler.finish().await;

        let close_response = CloseResponse::default();
        let close = self.emit("close", self.router().close(&close_response));
        if timeout(CLOSE_TIMEOUT, close).await.is_err() {
            diag!(self.shared.diag, WARN, "close event not consumed in time");
        }

        let _ = timeout(CLOSE_TIMEOUT, sink.close()).await;
        diag!(self.shared.diag, INFO, "connection closed");
    }

    /// Disables retrying, closes gracefully, cancels every task and joins
    /// them.
    ///
    /// Idempotent. Safe to call from inside a callback.
    pub async fn stop(&self) {
        self.shared.link.state.lock().await.retry = false;
        self.close(false, None).await;
        self.shared.link.root.cancel();
        self.shared.link.join_tasks(&self.shared.diag).await;
    }

    // ========================================================================
    // Streaming
    // ========================================================================

    /// Pumps `reader` into binary frames of at most [`STREAM_CHUNK_SIZE`]
    /// bytes.
    ///
    /// Returns `Ok(())` at end of input or once the client is stopped.
    ///
    /// # Errors
    ///
    /// - [`Error::Io`] if reading fails
    /// - any error from [`Writer::write_binary`]
    pub async fn stream<R>(&self, mut reader: R) -> Result<()>
    where
        R: AsyncRead + Unpin + Send,
    {
        let writer = self.writer();
        let root = self.shared.link.root.clone();
        let mut buf = vec![0u8; STREAM_CHUNK_SIZE];

        loop {
            let read = tokio::select! {
                biased;
                () = root.cancelled() => return Ok(()),
                read = reader.read(&mut buf) => read?,
            };
            if read == 0 {
                return Ok(());
            }
            writer.write_binary(Bytes::copy_from_slice(&buf[..read])).await?;
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::io;

    use tokio_tungstenite::tungstenite::Error as WsError;
    use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;

    use crate::transport::mock::{
        MockDialer, TestHandler, test_options, wait_until, wait_until_disconnected,
    };

    fn client(dialer: &Arc<MockDialer>) -> (WsClient<TestHandler>, Arc<TestHandler>) {
        let handler = Arc::new(TestHandler::new());
        let client = WsClient::new(
            Arc::clone(&handler),
            Arc::clone(dialer) as Arc<dyn Dialer>,
            Arc::new(test_options()),
        );
        (client, handler)
    }

    #[tokio::test]
    async fn test_retry_bound() {
        let dialer = Arc::new(MockDialer::new());
        let (client, _) = client(&dialer);

        assert!(!client.connect(4).await.expect("connect"));
        assert_eq!(dialer.attempts(), 4);
        assert_eq!(client.attempts(), 4);
    }

    #[tokio::test]
    async fn test_zero_limit_uses_default() {
        let dialer = Arc::new(MockDialer::new());
        let (client, _) = client(&dialer);

        assert!(!client.connect(0).await.expect("connect"));
        assert_eq!(dialer.attempts(), DEFAULT_CONNECT_RETRY as usize);
    }

    #[tokio::test]
    async fn test_exhaustion_disables_connect_until_reconnect() {
        let dialer = Arc::new(MockDialer::new());
        let (client, _) = client(&dialer);

        assert!(!client.connect(2).await.expect("connect"));
        assert!(!client.connect(2).await.expect("connect"));
        assert_eq!(dialer.attempts(), 2);
        assert_eq!(client.attempts(), 0);

        dialer.fail("refused");
        let _peer = dialer.accept();
        assert!(!client.reconnect(1).await.expect("reconnect"));
        assert_eq!(client.attempts(), 1);

        assert!(client.reconnect(3).await.expect("reconnect"));
        assert_eq!(client.attempts(), 1);
        assert!(client.is_connected().await);
        client.stop().await;
    }

    #[tokio::test]
    async fn test_config_error_consumes_no_attempt() {
        let dialer = Arc::new(MockDialer::new());
        let handler = Arc::new(TestHandler::new());
        let options = ClientOptions {
            host: "ftp://files.example".to_string(),
            ..test_options()
        };
        let client = WsClient::new(handler, dialer.clone(), Arc::new(options));

        let err = client.connect(3).await.unwrap_err();
        assert!(err.is_config_error());
        assert_eq!(dialer.attempts(), 0);
        assert_eq!(client.attempts(), 0);
    }

    #[tokio::test]
    async fn test_connect_runs_start_then_open() {
        let dialer = Arc::new(MockDialer::new());
        let _peer = dialer.accept();
        let (client, handler) = client(&dialer);

        assert!(client.connect(1).await.expect("connect"));
        assert_eq!(handler.started(), 1);
        assert_eq!(handler.events(), vec!["open"]);

        let request = dialer.last_request().expect("dialed");
        assert_eq!(request.url.as_str(), "ws://localhost:8080/v1/test");
        assert!(request.headers.contains_key("user-agent"));
        assert_eq!(request.diag.level(), client.diagnostics().level());

        assert!(client.connect(1).await.expect("already connected"));
        assert_eq!(dialer.attempts(), 1);
        client.stop().await;
    }

    #[tokio::test]
    async fn test_write_without_connection() {
        let dialer = Arc::new(MockDialer::new());
        let (client, _) = client(&dialer);

        let err = client.writer().write_binary(vec![1u8]).await.unwrap_err();
        assert!(matches!(err, Error::InvalidConnection));

        let err = client
            .writer()
            .write_control(&serde_json::json!({"type": "KeepAlive"}))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidConnection));
    }

    #[tokio::test]
    async fn test_unserializable_control_writes_nothing() {
        let dialer = Arc::new(MockDialer::new());
        let peer = dialer.accept();
        let (client, _) = client(&dialer);
        assert!(client.connect(1).await.expect("connect"));

        let bad: std::collections::HashMap<(u8, u8), u8> = [((1, 2), 3)].into_iter().collect();
        let err = client.writer().write_control(&bad).await.unwrap_err();
        assert!(matches!(err, Error::Json(_)));
        assert!(peer.written().is_empty());
        client.stop().await;
    }

    #[tokio::test]
    async fn test_frames_dispatched_in_order() {
        let dialer = Arc::new(MockDialer::new());
        let peer = dialer.accept();
        let (client, handler) = client(&dialer);
        assert!(client.connect(1).await.expect("connect"));

        for seq in 0..50 {
            peer.send_text(&format!(r#"{{"type":"Probe","seq":{seq}}}"#));
        }
        wait_until(|| handler.events().len() == 51).await;

        let expected: Vec<String> = std::iter::once("open".to_string())
            .chain((0..50).map(|seq| format!("probe:{seq}")))
            .collect();
        assert_eq!(handler.events(), expected);
        client.stop().await;
    }

    #[tokio::test]
    async fn test_empty_and_control_frames_ignored() {
        let dialer = Arc::new(MockDialer::new());
        let peer = dialer.accept();
        let (client, handler) = client(&dialer);
        assert!(client.connect(1).await.expect("connect"));

        peer.send(Message::Ping(Bytes::new()));
        peer.send_text("");
        peer.send(Message::Binary(Bytes::new()));
        peer.send(Message::Binary(Bytes::from_static(b"pcm")));
        wait_until(|| handler.events().len() == 2).await;

        assert_eq!(handler.events(), vec!["open", "binary:3"]);
        client.stop().await;
    }

    #[tokio::test]
    async fn test_concurrent_writes_stay_whole() {
        let dialer = Arc::new(MockDialer::new());
        let peer = dialer.accept();
        let (client, _) = client(&dialer);
        assert!(client.connect(1).await.expect("connect"));

        let mut tasks = Vec::new();
        for worker in 0..8u8 {
            let writer = client.writer();
            tasks.push(tokio::spawn(async move {
                for i in 0..25u8 {
                    if i % 2 == 0 {
                        writer.write_binary(vec![worker; 512]).await.expect("binary");
                    } else {
                        let control = serde_json::json!({"type": "Tick", "worker": worker, "i": i});
                        writer.write_control(&control).await.expect("control");
                    }
                }
            }));
        }
        for task in tasks {
            task.await.expect("writer task");
        }

        let written = peer.written();
        assert_eq!(written.len(), 200);
        for frame in written {
            match frame {
                Message::Binary(data) => {
                    assert_eq!(data.len(), 512);
                    assert!(data.iter().all(|b| *b == data[0]));
                }
                Message::Text(text) => {
                    let value: serde_json::Value =
                        serde_json::from_str(text.as_str()).expect("whole JSON frame");
                    assert_eq!(value["type"], "Tick");
                }
                other => panic!("unexpected frame: {other:?}"),
            }
        }
        client.stop().await;
    }

    #[tokio::test]
    async fn test_stop_twice_sends_one_close_frame() {
        let dialer = Arc::new(MockDialer::new());
        let peer = dialer.accept();
        let (client, handler) = client(&dialer);
        assert!(client.connect(1).await.expect("connect"));

        client.stop().await;
        client.stop().await;

        let closes = peer
            .written()
            .into_iter()
            .filter(|m| matches!(m, Message::Close(_)))
            .count();
        assert_eq!(closes, 1);
        assert_eq!(peer.written_texts(), vec![r#"{"type":"Done"}"#]);
        assert_eq!(handler.events(), vec!["open", "close"]);
        assert_eq!(handler.finished(), 1);
        assert!(!client.is_connected().await);
        assert!(!client.reconnect(1).await.expect("stopped"));
    }

    #[tokio::test]
    async fn test_peer_normal_close_is_graceful() {
        let dialer = Arc::new(MockDialer::new());
        let peer = dialer.accept();
        let (client, handler) = client(&dialer);
        assert!(client.connect(1).await.expect("connect"));

        peer.close(CloseCode::Normal, "bye");
        wait_until(|| handler.events().last().is_some_and(|e| e == "close")).await;

        assert_eq!(handler.events(), vec!["open", "close"]);
        assert!(!client.is_connected().await);
        client.stop().await;
    }

    #[tokio::test]
    async fn test_server_close_reports_error_then_closes() {
        let dialer = Arc::new(MockDialer::new());
        let peer = dialer.accept();
        let (client, handler) = client(&dialer);
        assert!(client.connect(1).await.expect("connect"));

        peer.close(CloseCode::Error, "no audio received");
        wait_until(|| handler.events().last().is_some_and(|e| e == "close")).await;

        assert_eq!(handler.events(), vec!["open", "error:1011", "close"]);
        client.stop().await;
    }

    #[tokio::test]
    async fn test_end_of_stream_is_fatal() {
        let dialer = Arc::new(MockDialer::new());
        let peer = dialer.accept();
        let (client, handler) = client(&dialer);
        assert!(client.connect(1).await.expect("connect"));

        peer.end();
        wait_until(|| handler.events().len() == 2).await;
        wait_until_disconnected(&client).await;

        assert_eq!(handler.events(), vec!["open", "error:UNKNOWN"]);
        assert_eq!(handler.finished(), 0);
        assert!(peer.written().is_empty());
        client.stop().await;
    }

    #[tokio::test]
    async fn test_panicking_dispatch_is_recovered() {
        let dialer = Arc::new(MockDialer::new());
        let peer = dialer.accept();
        let (client, handler) = client(&dialer);
        assert!(client.connect(1).await.expect("connect"));

        peer.send_text(r#"{"type":"Crash"}"#);
        wait_until(|| handler.events().len() == 2).await;
        wait_until_disconnected(&client).await;

        let events = handler.events();
        assert_eq!(events[0], "open");
        assert!(events[1].starts_with("error:"));
        assert!(handler.last_error().contains("Fatal panic recovered"));
        client.stop().await;
    }

    #[tokio::test]
    async fn test_reconnect_after_drop() {
        let dialer = Arc::new(MockDialer::new());
        let first = dialer.accept();
        let second = dialer.accept();
        let (client, handler) = client(&dialer);
        assert!(client.connect(1).await.expect("connect"));

        first.end();
        wait_until_disconnected(&client).await;

        assert!(client.reconnect(1).await.expect("reconnect"));
        second.send_text(r#"{"type":"Probe","seq":1}"#);
        wait_until(|| handler.events().last().is_some_and(|e| e == "probe:1")).await;
        assert_eq!(handler.started(), 2);
        client.stop().await;
    }

    #[tokio::test]
    async fn test_stream_chunks_reader() {
        let dialer = Arc::new(MockDialer::new());
        let peer = dialer.accept();
        let (client, _) = client(&dialer);
        assert!(client.connect(1).await.expect("connect"));

        let audio = vec![7u8; 20_000];
        client.stream(&audio[..]).await.expect("stream");

        let sizes: Vec<usize> = peer
            .written()
            .into_iter()
            .filter_map(|m| match m {
                Message::Binary(data) => Some(data.len()),
                _ => None,
            })
            .collect();
        assert_eq!(sizes, vec![8192, 8192, 3616]);
        client.stop().await;
    }

    #[tokio::test]
    async fn test_stream_returns_after_stop() {
        let dialer = Arc::new(MockDialer::new());
        let _peer = dialer.accept();
        let (client, _) = client(&dialer);
        assert!(client.connect(1).await.expect("connect"));

        let (_tx, rx) = tokio::io::duplex(64);
        let streaming = tokio::spawn({
            let client = client.clone();
            async move { client.stream(rx).await }
        });

        client.stop().await;
        streaming
            .await
            .expect("stream task")
            .expect("clean return on stop");
    }

    #[tokio::test]
    async fn test_binary_frames_reach_router() {
        let dialer = Arc::new(MockDialer::new());
        let peer = dialer.accept();
        let (client, handler) = client(&dialer);
        assert!(client.connect(1).await.expect("connect"));

        peer.send_binary(b"abc");
        peer.send_text(r#"{"type":"Probe","seq":4}"#);
        wait_until(|| handler.events().len() == 3).await;

        assert_eq!(handler.events(), vec!["open", "binary:3", "probe:4"]);
        client.stop().await;
    }

    #[tokio::test]
    async fn test_address_fault_is_fatal() {
        let dialer = Arc::new(MockDialer::new());
        let peer = dialer.accept();
        let (client, handler) = client(&dialer);
        assert!(client.connect(1).await.expect("connect"));

        peer.fail(WsError::Io(io::Error::new(
            io::ErrorKind::AddrNotAvailable,
            "read: can't assign requested address",
        )));
        wait_until_disconnected(&client).await;

        let events = handler.events();
        assert_eq!(events.len(), 2);
        assert!(events[1].starts_with("error:"));
        assert!(handler.last_error().contains("can't assign requested address"));
        assert_eq!(handler.finished(), 0);
        assert!(peer.written().is_empty());
        client.stop().await;
    }

    #[tokio::test]
    async fn test_closed_socket_is_graceful_without_error() {
        let dialer = Arc::new(MockDialer::new());
        let peer = dialer.accept();
        let (client, handler) = client(&dialer);
        assert!(client.connect(1).await.expect("connect"));

        peer.fail(WsError::AlreadyClosed);
        wait_until(|| handler.events().last().is_some_and(|e| e == "close")).await;

        assert_eq!(handler.events(), vec!["open", "close"]);
        assert_eq!(handler.finished(), 1);
        assert_eq!(peer.written_texts(), vec![r#"{"type":"Done"}"#]);
        client.stop().await;
    }
}
