//! High-level live transcription client.
//!
//! # Example
//!
//! ```no_run
//! use voxstream::listen::{ListenClient, ListenOptions, LoggingListenCallback};
//! use voxstream::ClientOptions;
//!
//! # async fn example() -> voxstream::Result<()> {
//! let options = ClientOptions::builder().keep_alive(true).build()?;
//! let listen = ListenOptions::new().with_encoding("linear16", 16_000).with_interim_results();
//!
//! let client = ListenClient::with_callback(options, listen, LoggingListenCallback);
//! if client.connect().await? {
//!     let audio = tokio::fs::File::open("speech.raw").await?;
//!     client.stream(audio).await?;
//!     client.stop().await;
//! }
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use bytes::Bytes;
use tokio::io::AsyncRead;

use crate::diagnostics::Diagnostics;
use crate::error::Result;
use crate::options::ClientOptions;
use crate::protocol::ControlMessage;
use crate::router::{CallbackSink, EventSink, MessageSet};
use crate::transport::{DEFAULT_CONNECT_RETRY, Dialer, TungsteniteDialer, WsClient};

use super::callback::ListenCallback;
use super::channels::{ListenChannelSink, ListenChannels};
use super::handler::ListenHandler;
use super::messages::ListenMessage;
use super::options::ListenOptions;

// ============================================================================
// ListenClient
// ============================================================================

/// Live transcription client.
///
/// Cheap to clone; clones share one connection.
#[derive(Debug, Clone)]
pub struct ListenClient {
    inner: WsClient<ListenHandler>,
}

// ============================================================================
// Constructors
// ============================================================================

impl ListenClient {
    /// Creates a client delivering events to `callback`.
    #[must_use]
    pub fn with_callback<C: ListenCallback>(
        options: ClientOptions,
        listen: ListenOptions,
        callback: C,
    ) -> Self {
        Self::with_sinks(
            options,
            listen,
            vec![Arc::new(CallbackSink(callback))],
            Arc::new(TungsteniteDialer),
        )
    }

    /// Creates a client feeding the channels of every subscriber.
    #[must_use]
    pub fn with_channels(
        options: ClientOptions,
        listen: ListenOptions,
        subscribers: &[&dyn ListenChannels],
    ) -> Self {
        Self::with_sinks(
            options,
            listen,
            vec![Arc::new(ListenChannelSink::from_subscribers(subscribers))],
            Arc::new(TungsteniteDialer),
        )
    }

    /// Creates a client over explicit sinks and dialer.
    #[must_use]
    pub fn with_sinks(
        options: ClientOptions,
        listen: ListenOptions,
        sinks: Vec<Arc<dyn EventSink<ListenMessage>>>,
        dialer: Arc<dyn Dialer>,
    ) -> Self {
        let diag = Diagnostics::new(options.verbosity, ListenMessage::FAMILY);
        let handler = ListenHandler::new(listen, sinks, options.auto_flush_reply_delta, diag);

        Self {
            inner: WsClient::new(Arc::new(handler), dialer, Arc::new(options)),
        }
    }
}

// ============================================================================
// Lifecycle
// ============================================================================

impl ListenClient {
    /// Connects with the default number of attempts.
    ///
    /// # Errors
    ///
    /// See [`WsClient::connect`].
    pub async fn connect(&self) -> Result<bool> {
        self.inner.connect(DEFAULT_CONNECT_RETRY).await
    }

    /// Connects with up to `retry_limit` attempts.
    ///
    /// # Errors
    ///
    /// See [`WsClient::connect`].
    pub async fn connect_with_retry(&self, retry_limit: u32) -> Result<bool> {
        self.inner.connect(retry_limit).await
    }

    /// Re-arms retrying and connects.
    ///
    /// # Errors
    ///
    /// See [`WsClient::reconnect`].
    pub async fn reconnect(&self, retry_limit: u32) -> Result<bool> {
        self.inner.reconnect(retry_limit).await
    }

    /// Sends `CloseStream`, closes the socket and stops every task.
    pub async fn stop(&self) {
        self.inner.stop().await;
    }

    /// Returns `true` while a socket is live.
    pub async fn is_connected(&self) -> bool {
        self.inner.is_connected().await
    }

    /// Returns the underlying transport client.
    #[inline]
    #[must_use]
    pub fn transport(&self) -> &WsClient<ListenHandler> {
        &self.inner
    }
}

// ============================================================================
// Writes
// ============================================================================

impl ListenClient {
    /// Pumps raw audio from `reader` until end of input or `stop()`.
    ///
    /// # Errors
    ///
    /// See [`WsClient::stream`].
    pub async fn stream<R>(&self, reader: R) -> Result<()>
    where
        R: AsyncRead + Unpin + Send,
    {
        self.inner.stream(reader).await
    }

    /// Sends one chunk of raw audio.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConnection`](crate::Error::InvalidConnection)
    /// when not connected.
    pub async fn write_binary(&self, data: impl Into<Bytes>) -> Result<()> {
        self.inner.writer().write_binary(data).await
    }

    /// Sends a `KeepAlive` control message.
    ///
    /// # Errors
    ///
    /// Same as [`write_binary`](Self::write_binary).
    pub async fn keep_alive(&self) -> Result<()> {
        self.inner
            .writer()
            .write_control(&ControlMessage::KEEP_ALIVE)
            .await
    }

    /// Asks the server to finalize buffered audio.
    ///
    /// # Errors
    ///
    /// Same as [`write_binary`](Self::write_binary).
    pub async fn finalize(&self) -> Result<()> {
        self.inner
            .writer()
            .write_control(&ControlMessage::FINALIZE)
            .await
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use async_trait::async_trait;
    use parking_lot::Mutex;
    use tokio::sync::mpsc;
    use tokio::sync::mpsc::error::TryRecvError;
    use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;

    use crate::listen::channels::ListenChannelHub;
    use crate::listen::messages::{
        MetadataResponse, ResultsResponse, SpeechStartedResponse, UtteranceEndResponse,
    };
    use crate::protocol::{CloseResponse, ErrorResponse, OpenResponse};
    use crate::transport::mock::{MockDialer, test_options, wait_until, wait_until_disconnected};

    #[derive(Default)]
    struct Transcript {
        lines: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ListenCallback for Arc<Transcript> {
        async fn open(&self, _open: OpenResponse) -> Result<()> {
            self.lines.lock().push("open".into());
            Ok(())
        }

        async fn results(&self, results: ResultsResponse) -> Result<()> {
            self.lines
                .lock()
                .push(format!("results:{}", results.transcript()));
            Ok(())
        }

        async fn metadata(&self, metadata: MetadataResponse) -> Result<()> {
            self.lines
                .lock()
                .push(format!("metadata:{}", metadata.request_id));
            Ok(())
        }

        async fn speech_started(&self, _speech: SpeechStartedResponse) -> Result<()> {
            self.lines.lock().push("speech_started".into());
            Ok(())
        }

        async fn utterance_end(&self, _end: UtteranceEndResponse) -> Result<()> {
            self.lines.lock().push("utterance_end".into());
            Ok(())
        }

        async fn close(&self, _close: CloseResponse) -> Result<()> {
            self.lines.lock().push("close".into());
            Ok(())
        }

        async fn error(&self, error: ErrorResponse) -> Result<()> {
            self.lines.lock().push(format!("error:{}", error.err_code));
            Ok(())
        }

        async fn unhandled(&self, _raw: Bytes) -> Result<()> {
            self.lines.lock().push("unhandled".into());
            Ok(())
        }
    }

    fn results_frame(transcript: &str, is_final: bool) -> String {
        format!(
            r#"{{"type":"Results","is_final":{is_final},"channel":{{"alternatives":[{{"transcript":"{transcript}"}}]}}}}"#
        )
    }

    fn callback_client(
        options: ClientOptions,
        dialer: &Arc<MockDialer>,
    ) -> (ListenClient, Arc<Transcript>) {
        let transcript = Arc::new(Transcript::default());
        let client = ListenClient::with_sinks(
            options,
            ListenOptions::new().with_interim_results(),
            vec![Arc::new(CallbackSink(Arc::clone(&transcript)))],
            Arc::clone(dialer) as Arc<dyn Dialer>,
        );
        (client, transcript)
    }

    #[tokio::test]
    async fn test_callback_session() {
        let dialer = Arc::new(MockDialer::new());
        let peer = dialer.accept();
        let (client, transcript) = callback_client(test_options(), &dialer);

        assert!(client.connect().await.expect("connect"));
        let request = dialer.last_request().expect("dialed");
        assert_eq!(request.url.path(), "/v1/listen");
        assert_eq!(request.url.query(), Some("interim_results=true"));

        peer.send_text(r#"{"type":"SpeechStarted","channel":[0],"timestamp":0.2}"#);
        peer.send_text(&results_frame("hello", false));
        peer.send_text(&results_frame("hello world", true));
        peer.send_text(r#"{"type":"UtteranceEnd","last_word_end":1.1}"#);
        peer.send_text(r#"{"type":"Error","code":"NET-0001","description":"no audio"}"#);
        peer.send_text(r#"{"type":"Mystery"}"#);
        peer.send_text(r#"{"type":"Metadata","request_id":"req-9"}"#);
        wait_until(|| transcript.lines.lock().len() == 8).await;

        client.stop().await;
        assert_eq!(
            *transcript.lines.lock(),
            vec![
                "open",
                "speech_started",
                "results:hello",
                "results:hello world",
                "utterance_end",
                "error:NET-0001",
                "unhandled",
                "metadata:req-9",
                "close",
            ]
        );
        assert!(peer.written_texts().contains(&r#"{"type":"CloseStream"}"#.to_string()));
    }

    #[tokio::test]
    async fn test_writes_reach_socket() {
        let dialer = Arc::new(MockDialer::new());
        let peer = dialer.accept();
        let (client, _) = callback_client(test_options(), &dialer);

        assert!(matches!(
            client.finalize().await.unwrap_err(),
            crate::Error::InvalidConnection
        ));

        assert!(client.connect().await.expect("connect"));
        client.write_binary(vec![0u8; 320]).await.expect("audio");
        client.keep_alive().await.expect("keepalive");
        client.finalize().await.expect("finalize");

        assert_eq!(
            peer.written_texts(),
            vec![r#"{"type":"KeepAlive"}"#, r#"{"type":"Finalize"}"#]
        );
        assert_eq!(peer.written().len(), 3);
        client.stop().await;
    }

    #[tokio::test]
    async fn test_keepalive_timer_writes() {
        let dialer = Arc::new(MockDialer::new());
        let peer = dialer.accept();
        let options = ClientOptions {
            keep_alive: true,
            keep_alive_interval: Duration::from_millis(20),
            ..test_options()
        };
        let (client, _) = callback_client(options, &dialer);

        assert!(client.connect().await.expect("connect"));
        wait_until(|| peer.written_texts().len() >= 3).await;
        client.stop().await;

        let texts = peer.written_texts();
        let (close, keepalives) = texts.split_last().expect("writes");
        assert_eq!(close, r#"{"type":"CloseStream"}"#);
        assert!(keepalives.iter().all(|t| t == r#"{"type":"KeepAlive"}"#));

        let count = peer.written().len();
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(peer.written().len(), count);
    }

    #[tokio::test]
    async fn test_auto_flush_sends_finalize_after_quiet_interim() {
        let dialer = Arc::new(MockDialer::new());
        let peer = dialer.accept();
        let options = ClientOptions {
            auto_flush_reply_delta: Some(Duration::from_millis(50)),
            ..test_options()
        };
        let (client, transcript) = callback_client(options, &dialer);

        assert!(client.connect().await.expect("connect"));
        peer.send_text(&results_frame("partial", false));
        wait_until(|| peer.written_texts().len() == 1).await;
        assert_eq!(peer.written_texts(), vec![r#"{"type":"Finalize"}"#]);

        peer.send_text(&results_frame("partial words", true));
        wait_until(|| transcript.lines.lock().len() == 3).await;
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(peer.written_texts().len(), 1);
        client.stop().await;
    }

    #[tokio::test]
    async fn test_channel_session_in_order() {
        let dialer = Arc::new(MockDialer::new());
        let peer = dialer.accept();
        let (hub, mut rx) = ListenChannelHub::new(64);
        let client = ListenClient::with_sinks(
            test_options(),
            ListenOptions::new(),
            vec![Arc::new(ListenChannelSink::from_subscribers(&[&hub]))],
            dialer.clone(),
        );

        assert!(client.connect().await.expect("connect"));
        assert!(rx.open.recv().await.is_some());

        for seq in 0..50 {
            peer.send_text(&results_frame(&format!("line {seq}"), true));
        }
        for seq in 0..50 {
            let results = rx.results.recv().await.expect("result");
            assert_eq!(results.transcript(), format!("line {seq}"));
        }

        client.stop().await;
        assert!(rx.close.recv().await.is_some());
    }

    #[tokio::test]
    async fn test_stalled_channel_does_not_drop_other_types() {
        let dialer = Arc::new(MockDialer::new());
        let peer = dialer.accept();
        let (stalled, mut stalled_rx) = ListenChannelHub::new(1);
        let (draining, mut draining_rx) = ListenChannelHub::new(16);

        struct ResultsOnly(ListenChannelHub);
        struct MetadataOnly(ListenChannelHub);

        impl ListenChannels for ResultsOnly {
            fn open_channels(&self) -> Vec<mpsc::Sender<OpenResponse>> {
                Vec::new()
            }
            fn results_channels(&self) -> Vec<mpsc::Sender<ResultsResponse>> {
                self.0.results_channels()
            }
            fn metadata_channels(&self) -> Vec<mpsc::Sender<MetadataResponse>> {
                Vec::new()
            }
            fn speech_started_channels(&self) -> Vec<mpsc::Sender<SpeechStartedResponse>> {
                Vec::new()
            }
            fn utterance_end_channels(&self) -> Vec<mpsc::Sender<UtteranceEndResponse>> {
                Vec::new()
            }
            fn close_channels(&self) -> Vec<mpsc::Sender<CloseResponse>> {
                Vec::new()
            }
            fn error_channels(&self) -> Vec<mpsc::Sender<ErrorResponse>> {
                Vec::new()
            }
            fn unhandled_channels(&self) -> Vec<mpsc::Sender<Bytes>> {
                Vec::new()
            }
        }

        impl ListenChannels for MetadataOnly {
            fn open_channels(&self) -> Vec<mpsc::Sender<OpenResponse>> {
                Vec::new()
            }
            fn results_channels(&self) -> Vec<mpsc::Sender<ResultsResponse>> {
                Vec::new()
            }
            fn metadata_channels(&self) -> Vec<mpsc::Sender<MetadataResponse>> {
                self.0.metadata_channels()
            }
            fn speech_started_channels(&self) -> Vec<mpsc::Sender<SpeechStartedResponse>> {
                Vec::new()
            }
            fn utterance_end_channels(&self) -> Vec<mpsc::Sender<UtteranceEndResponse>> {
                Vec::new()
            }
            fn close_channels(&self) -> Vec<mpsc::Sender<CloseResponse>> {
                Vec::new()
            }
            fn error_channels(&self) -> Vec<mpsc::Sender<ErrorResponse>> {
                Vec::new()
            }
            fn unhandled_channels(&self) -> Vec<mpsc::Sender<Bytes>> {
                Vec::new()
            }
        }

        let client = ListenClient::with_sinks(
            test_options(),
            ListenOptions::new(),
            vec![Arc::new(ListenChannelSink::from_subscribers(&[
                &ResultsOnly(stalled),
                &MetadataOnly(draining),
            ]))],
            dialer.clone(),
        );
        assert!(client.connect().await.expect("connect"));

        let metadata = |id: u32| format!(r#"{{"type":"Metadata","request_id":"m{id}"}}"#);

        peer.send_text(&results_frame("buffered", true));
        for id in 0..3 {
            peer.send_text(&metadata(id));
        }
        for id in 0..3 {
            let received = draining_rx.metadata.recv().await.expect("metadata");
            assert_eq!(received.request_id, format!("m{id}"));
        }

        peer.send_text(&results_frame("blocked", true));
        peer.send_text(&metadata(3));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(matches!(
            draining_rx.metadata.try_recv(),
            Err(TryRecvError::Empty)
        ));

        assert_eq!(
            stalled_rx.results.recv().await.expect("first").transcript(),
            "buffered"
        );
        assert_eq!(
            stalled_rx.results.recv().await.expect("second").transcript(),
            "blocked"
        );
        let received = draining_rx.metadata.recv().await.expect("metadata");
        assert_eq!(received.request_id, "m3");

        client.stop().await;
    }

    #[tokio::test]
    async fn test_server_close_reported_to_callback() {
        let dialer = Arc::new(MockDialer::new());
        let peer = dialer.accept();
        let (client, transcript) = callback_client(test_options(), &dialer);

        assert!(client.connect().await.expect("connect"));
        peer.close(CloseCode::Policy, "DATA-0000 no audio");
        wait_until(|| transcript.lines.lock().len() == 3).await;

        assert_eq!(
            *transcript.lines.lock(),
            vec!["open", "error:1008", "close"]
        );
        assert!(!client.is_connected().await);
        client.stop().await;
    }

    #[tokio::test]
    async fn test_stop_returns_with_stalled_error_channel() {
        let dialer = Arc::new(MockDialer::new());
        let peer = dialer.accept();
        let (hub, _rx) = ListenChannelHub::new(1);
        let client = ListenClient::with_sinks(
            test_options(),
            ListenOptions::new(),
            vec![Arc::new(ListenChannelSink::from_subscribers(&[&hub]))],
            dialer.clone(),
        );

        assert!(client.connect().await.expect("connect"));

        // Fills the error channel; the close then blocks on reporting.
        peer.send_text(r#"{"type":"Error","code":"X"}"#);
        peer.close(CloseCode::Error, "server fault");
        tokio::time::sleep(Duration::from_millis(100)).await;

        tokio::time::timeout(Duration::from_secs(2), client.stop())
            .await
            .expect("stop returned");
        assert!(!client.is_connected().await);
    }

    #[tokio::test]
    async fn test_stop_returns_with_stalled_close_channel() {
        let dialer = Arc::new(MockDialer::new());
        let first = dialer.accept();
        let (hub, mut rx) = ListenChannelHub::new(1);
        let client = ListenClient::with_sinks(
            test_options(),
            ListenOptions::new(),
            vec![Arc::new(ListenChannelSink::from_subscribers(&[&hub]))],
            dialer.clone(),
        );

        assert!(client.connect().await.expect("connect"));
        assert!(rx.open.recv().await.is_some());
        first.close(CloseCode::Normal, "bye");
        wait_until_disconnected(client.transport()).await;

        // The first session's Close is never drained.
        let _second = dialer.accept();
        assert!(client.connect().await.expect("reconnect"));
        tokio::time::timeout(Duration::from_secs(3), client.stop())
            .await
            .expect("stop returned");
        assert!(!client.is_connected().await);
    }
}
