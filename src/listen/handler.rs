//! Protocol hooks for live transcription.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use url::Url;

use crate::diagnostics::{Diagnostics, diag};
use crate::error::{Error, Result};
use crate::protocol::{ControlMessage, FrameKind};
use crate::router::{Event, EventSink, Router};
use crate::transport::timers::{self, FlushTracker};
use crate::transport::{ProtocolHandler, Session, base_url};

use super::messages::ListenMessage;
use super::options::ListenOptions;

// ============================================================================
// Constants
// ============================================================================

/// Path of the live transcription endpoint.
pub const LISTEN_PATH: &str = "/v1/listen";

// ============================================================================
// FlushTracker Sink
// ============================================================================

#[async_trait]
impl EventSink<ListenMessage> for FlushTracker {
    async fn deliver(&self, event: Event<ListenMessage>) -> Result<()> {
        if let Event::Message(ListenMessage::Results(results)) = &event {
            if results.is_final {
                self.observe_final();
            } else {
                self.observe_interim();
            }
        }
        Ok(())
    }
}

// ============================================================================
// ListenHandler
// ============================================================================

/// Live transcription protocol handler.
#[derive(Debug)]
pub struct ListenHandler {
    options: ListenOptions,
    router: Router<ListenMessage>,
    /// Interim-result tracker and quiet period, when auto-flush is on.
    flush: Option<(Arc<FlushTracker>, Duration)>,
}

impl ListenHandler {
    /// Creates a handler dispatching to `sinks`.
    ///
    /// With `auto_flush_reply_delta` set, a [`FlushTracker`] is registered
    /// ahead of the consumer sinks.
    #[must_use]
    pub fn new(
        options: ListenOptions,
        sinks: Vec<Arc<dyn EventSink<ListenMessage>>>,
        auto_flush_reply_delta: Option<Duration>,
        diag: Diagnostics,
    ) -> Self {
        let flush = auto_flush_reply_delta.map(|delta| (Arc::new(FlushTracker::new()), delta));

        let mut all: Vec<Arc<dyn EventSink<ListenMessage>>> = Vec::with_capacity(sinks.len() + 1);
        if let Some((tracker, _)) = &flush {
            all.push(Arc::clone(tracker) as Arc<dyn EventSink<ListenMessage>>);
        }
        all.extend(sinks);

        Self {
            options,
            router: Router::new(all, diag),
            flush,
        }
    }

    /// Returns the transcription options.
    #[inline]
    #[must_use]
    pub fn options(&self) -> &ListenOptions {
        &self.options
    }

    /// Returns the flush tracker, if auto-flush is on.
    #[must_use]
    pub fn flush_tracker(&self) -> Option<&Arc<FlushTracker>> {
        self.flush.as_ref().map(|(tracker, _)| tracker)
    }
}

#[async_trait]
impl ProtocolHandler for ListenHandler {
    type Message = ListenMessage;

    fn url(&self, host: &str) -> Result<Url> {
        self.options.validate().map_err(Error::config)?;

        let mut url = base_url(host)?;
        url.set_path(LISTEN_PATH);

        let query = self.options.to_query();
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    async fn start(&self, session: &Session<Self>) -> Result<()> {
        let diag = session.diagnostics().clone();

        if session.options().keep_alive {
            session.spawn(
                "keepalive",
                timers::keep_alive(
                    session.writer(),
                    session.token().clone(),
                    session.options().keep_alive_interval,
                    ControlMessage::KEEP_ALIVE,
                    diag.clone(),
                ),
            );
        }

        if let Some((tracker, delta)) = &self.flush {
            tracker.observe_final();
            session.spawn(
                "auto-flush",
                timers::auto_flush(
                    session.writer(),
                    session.token().clone(),
                    Arc::clone(tracker),
                    *delta,
                    diag,
                ),
            );
        }

        Ok(())
    }

    async fn process_message(&self, kind: FrameKind, data: Bytes) -> Result<()> {
        match kind {
            FrameKind::Text => self.router.message(&data).await,
            FrameKind::Binary => {
                diag!(self.router.diagnostics(), TRACE, len = data.len(), "ignoring binary frame");
                Ok(())
            }
        }
    }

    fn close_message(&self) -> Option<String> {
        serde_json::to_string(&ControlMessage::CLOSE_STREAM).ok()
    }

    async fn finish(&self) {
        if let Some((tracker, _)) = &self.flush {
            tracker.observe_final();
        }
    }

    fn router(&self) -> &Router<ListenMessage> {
        &self.router
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use tracing::Level;

    use crate::listen::messages::ResultsResponse;

    fn handler(options: ListenOptions, flush: Option<Duration>) -> ListenHandler {
        ListenHandler::new(
            options,
            Vec::new(),
            flush,
            Diagnostics::new(Level::TRACE, "listen"),
        )
    }

    #[test]
    fn test_url_with_query() {
        let handler = handler(
            ListenOptions::new().with_model("nova-3").with_interim_results(),
            None,
        );
        let url = handler.url("api.voxstream.io").expect("url");
        assert_eq!(
            url.as_str(),
            "wss://api.voxstream.io/v1/listen?model=nova-3&interim_results=true"
        );
    }

    #[test]
    fn test_url_without_query() {
        let url = handler(ListenOptions::new(), None)
            .url("http://localhost:8080")
            .expect("url");
        assert_eq!(url.as_str(), "ws://localhost:8080/v1/listen");
    }

    #[test]
    fn test_invalid_options_are_config_errors() {
        let handler = handler(ListenOptions::new().with_encoding("linear16", 0), None);
        assert!(handler.url("api.voxstream.io").unwrap_err().is_config_error());
    }

    #[test]
    fn test_close_message_is_close_stream() {
        let handler = handler(ListenOptions::new(), None);
        assert_eq!(
            handler.close_message().as_deref(),
            Some(r#"{"type":"CloseStream"}"#)
        );
    }

    #[tokio::test]
    async fn test_flush_tracker_registered_first() {
        let handler = handler(ListenOptions::new(), Some(Duration::from_millis(500)));
        assert_eq!(handler.router().sink_count(), 1);

        let tracker = Arc::clone(handler.flush_tracker().expect("tracker"));
        handler
            .process_message(
                FrameKind::Text,
                Bytes::from_static(br#"{"type":"Results","is_final":false}"#),
            )
            .await
            .expect("dispatch");
        assert!(tracker.is_pending());

        let final_result = ResultsResponse {
            kind: "Results".into(),
            is_final: true,
            ..Default::default()
        };
        let frame = serde_json::to_vec(&final_result).expect("encode");
        handler
            .process_message(FrameKind::Text, Bytes::from(frame))
            .await
            .expect("dispatch");
        assert!(!tracker.is_pending());
    }

    #[tokio::test]
    async fn test_binary_is_noop() {
        let handler = handler(ListenOptions::new(), None);
        handler
            .process_message(FrameKind::Binary, Bytes::from_static(b"\x00\x01"))
            .await
            .expect("noop");
    }
}
