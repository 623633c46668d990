//! Inbound message dispatch.
//!
//! The [`Router`] reads the `type` discriminator of each text frame with a
//! cheap partial decode, fully decodes the frame into the family's
//! [`MessageSet`] variant and hands an [`Event`] to every registered
//! [`EventSink`].
//!
//! # Consumer shapes
//!
//! Each protocol family exposes two explicit consumer interfaces: a
//! callback trait (one method per message type, invoked in-line) and a
//! channel subscription trait (per-type getters returning senders). Both are
//! normalized into [`EventSink`] adapters at construction, so dispatch here
//! is single-path.
//!
//! # Backpressure
//!
//! Dispatch runs inside the listener task. A slow callback delays every
//! following frame, and a channel send waits until the subscriber has
//! capacity. A channel consumer that stops draining stalls the connection's
//! inbound processing once its buffer is full.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use serde::Deserialize;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::mpsc;

use crate::diagnostics::{Diagnostics, diag};
use crate::error::{Error, Result};
use crate::protocol::lifecycle::TYPE_ERROR;
use crate::protocol::{CloseResponse, ErrorResponse, OpenResponse};

// ============================================================================
// MessageSet
// ============================================================================

/// The closed set of typed messages a protocol family can receive.
///
/// Implemented by one enum per family with one variant per discriminator.
pub trait MessageSet: Clone + Send + Sync + fmt::Debug + 'static {
    /// Family name used in diagnostics.
    const FAMILY: &'static str;

    /// Decodes a frame whose discriminator is `kind`.
    ///
    /// Returns `None` if `kind` is not part of this family.
    fn decode(kind: &str, data: &[u8]) -> Option<serde_json::Result<Self>>;

    /// Discriminator of this message.
    fn kind(&self) -> &'static str;
}

// ============================================================================
// Event
// ============================================================================

/// A dispatched event.
#[derive(Debug, Clone)]
pub enum Event<M> {
    /// Connection established.
    Open(OpenResponse),
    /// Typed family message.
    Message(M),
    /// Inbound binary payload.
    Binary(Bytes),
    /// Connection closed gracefully.
    Close(CloseResponse),
    /// Server error frame or transport failure.
    Error(ErrorResponse),
    /// Text frame with an unrecognized discriminator.
    Unhandled(Bytes),
}

// ============================================================================
// EventSink
// ============================================================================

/// A registered destination for dispatched events.
#[async_trait]
pub trait EventSink<M>: Send + Sync {
    /// Delivers one event. Ownership of the payload moves to the sink.
    async fn deliver(&self, event: Event<M>) -> Result<()>;
}

/// Adapts a family callback trait into an [`EventSink`].
///
/// Each family implements `EventSink` for `CallbackSink<C>` where `C` is
/// its callback trait.
#[derive(Debug)]
pub struct CallbackSink<C>(pub C);

/// Sends `value` to every sender in turn, waiting for capacity on each.
///
/// A sender whose receiver is gone is skipped.
pub(crate) async fn fan_out<T: Clone + Send>(
    senders: &[mpsc::Sender<T>],
    value: T,
) -> Result<()> {
    let Some((last, rest)) = senders.split_last() else {
        return Ok(());
    };

    let mut closed = 0usize;
    for sender in rest {
        if sender.send(value.clone()).await.is_err() {
            closed += 1;
        }
    }
    if last.send(value).await.is_err() {
        closed += 1;
    }

    if closed == senders.len() {
        return Err(Error::callback("every subscriber channel is closed"));
    }
    Ok(())
}

// ============================================================================
// Router
// ============================================================================

/// Partial view of a text frame.
#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "type", default)]
    kind: Option<String>,
}

/// Routes inbound frames to sinks.
pub struct Router<M> {
    /// Registered sinks, in dispatch order.
    sinks: Vec<Arc<dyn EventSink<M>>>,
    /// Client diagnostics.
    diag: Diagnostics,
}

impl<M> fmt::Debug for Router<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("sinks", &self.sinks.len())
            .finish_non_exhaustive()
    }
}

impl<M: MessageSet> Router<M> {
    /// Creates a router over the given sinks.
    #[must_use]
    pub fn new(sinks: Vec<Arc<dyn EventSink<M>>>, diag: Diagnostics) -> Self {
        Self { sinks, diag }
    }

    /// Returns the number of registered sinks.
    #[inline]
    #[must_use]
    pub fn sink_count(&self) -> usize {
        self.sinks.len()
    }

    /// Returns the client diagnostics.
    #[inline]
    #[must_use]
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diag
    }

    /// Dispatches one text frame.
    ///
    /// # Errors
    ///
    /// - [`Error::Json`] if the frame is not a JSON object or fails to decode
    ///   into its message type
    /// - [`Error::InvalidMessageType`] if the discriminator is unknown (the
    ///   raw bytes were delivered to the unhandled sinks)
    pub async fn message(&self, data: &[u8]) -> Result<()> {
        let envelope: Envelope = serde_json::from_slice(data)?;
        let kind = envelope.kind.unwrap_or_default();

        if kind == TYPE_ERROR {
            let response: ErrorResponse = serde_json::from_slice(data)?;
            return self.distribute(Event::Error(response)).await;
        }

        match M::decode(&kind, data) {
            Some(decoded) => {
                let message = decoded?;
                diag!(self.diag, TRACE, kind = message.kind(), "dispatching message");
                self.distribute(Event::Message(message)).await
            }
            None => {
                diag!(self.diag, WARN, kind = %kind, family = M::FAMILY, "unhandled message type");
                self.distribute(Event::Unhandled(Bytes::copy_from_slice(data)))
                    .await?;
                Err(Error::invalid_message_type(kind))
            }
        }
    }

    /// Dispatches one binary frame verbatim.
    ///
    /// # Errors
    ///
    /// Returns the first sink error.
    pub async fn binary(&self, data: Bytes) -> Result<()> {
        self.distribute(Event::Binary(data)).await
    }

    /// Dispatches the open event.
    ///
    /// # Errors
    ///
    /// Returns the first sink error.
    pub async fn open(&self, open: &OpenResponse) -> Result<()> {
        let open = roundtrip(open)?;
        self.distribute(Event::Open(open)).await
    }

    /// Dispatches the close event.
    ///
    /// # Errors
    ///
    /// Returns the first sink error.
    pub async fn close(&self, close: &CloseResponse) -> Result<()> {
        let close = roundtrip(close)?;
        self.distribute(Event::Close(close)).await
    }

    /// Dispatches an error event.
    ///
    /// # Errors
    ///
    /// Returns the first sink error.
    pub async fn error(&self, error: &ErrorResponse) -> Result<()> {
        let error = roundtrip(error)?;
        self.distribute(Event::Error(error)).await
    }

    /// Delivers `event` to every sink; every sink is tried even if an
    /// earlier one fails.
    async fn distribute(&self, event: Event<M>) -> Result<()> {
        let Some((last, rest)) = self.sinks.split_last() else {
            return Ok(());
        };

        let mut first_error = None;
        for sink in rest {
            if let Err(e) = sink.deliver(event.clone()).await {
                diag!(self.diag, WARN, error = %e, "sink rejected event");
                first_error.get_or_insert(e);
            }
        }
        if let Err(e) = last.deliver(event).await {
            diag!(self.diag, WARN, error = %e, "sink rejected event");
            first_error.get_or_insert(e);
        }

        first_error.map_or(Ok(()), Err)
    }
}

/// Marshals and unmarshals a lifecycle event so every consumer receives an
/// object built the same way as one decoded from the wire.
fn roundtrip<T: Serialize + DeserializeOwned>(value: &T) -> Result<T> {
    let bytes = serde_json::to_vec(value)?;
    Ok(serde_json::from_slice(&bytes)?)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use parking_lot::Mutex;
    use serde::Deserialize;
    use tracing::Level;

    /// Minimal family used by router tests.
    #[derive(Debug, Clone, PartialEq, Deserialize)]
    struct Ping {
        seq: u32,
    }

    #[derive(Debug, Clone, PartialEq)]
    enum TestMessage {
        Ping(Ping),
    }

    impl MessageSet for TestMessage {
        const FAMILY: &'static str = "test";

        fn decode(kind: &str, data: &[u8]) -> Option<serde_json::Result<Self>> {
            match kind {
                "Ping" => Some(serde_json::from_slice(data).map(Self::Ping)),
                _ => None,
            }
        }

        fn kind(&self) -> &'static str {
            match self {
                Self::Ping(_) => "Ping",
            }
        }
    }

    /// Records a short label per delivered event.
    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl EventSink<TestMessage> for Recorder {
        async fn deliver(&self, event: Event<TestMessage>) -> Result<()> {
            let label = match event {
                Event::Open(_) => "open".to_string(),
                Event::Message(TestMessage::Ping(p)) => format!("ping:{}", p.seq),
                Event::Binary(b) => format!("binary:{}", b.len()),
                Event::Close(_) => "close".to_string(),
                Event::Error(e) => format!("error:{}", e.err_code),
                Event::Unhandled(_) => "unhandled".to_string(),
            };
            self.events.lock().push(label);
            Ok(())
        }
    }

    struct Failing;

    #[async_trait]
    impl EventSink<TestMessage> for Failing {
        async fn deliver(&self, _event: Event<TestMessage>) -> Result<()> {
            Err(Error::callback("nope"))
        }
    }

    fn router_with(sinks: Vec<Arc<dyn EventSink<TestMessage>>>) -> Router<TestMessage> {
        Router::new(sinks, Diagnostics::new(Level::TRACE, "test"))
    }

    #[tokio::test]
    async fn test_known_type_dispatched() {
        let recorder = Arc::new(Recorder::default());
        let router = router_with(vec![recorder.clone()]);

        router
            .message(br#"{"type":"Ping","seq":7}"#)
            .await
            .expect("dispatch");

        assert_eq!(*recorder.events.lock(), vec!["ping:7"]);
    }

    #[tokio::test]
    async fn test_unknown_type_falls_through_once() {
        let recorder = Arc::new(Recorder::default());
        let router = router_with(vec![recorder.clone()]);

        let err = router
            .message(br#"{"type":"Bogus","seq":1}"#)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::InvalidMessageType { ref kind } if kind == "Bogus"));
        assert_eq!(*recorder.events.lock(), vec!["unhandled"]);
    }

    #[tokio::test]
    async fn test_missing_discriminator_is_unhandled() {
        let recorder = Arc::new(Recorder::default());
        let router = router_with(vec![recorder.clone()]);

        let err = router.message(br#"{"seq":1}"#).await.unwrap_err();
        assert!(matches!(err, Error::InvalidMessageType { .. }));
        assert_eq!(*recorder.events.lock(), vec!["unhandled"]);
    }

    #[tokio::test]
    async fn test_non_json_frame_rejected() {
        let recorder = Arc::new(Recorder::default());
        let router = router_with(vec![recorder.clone()]);

        let err = router.message(b"not json").await.unwrap_err();
        assert!(matches!(err, Error::Json(_)));
        assert!(recorder.events.lock().is_empty());
    }

    #[tokio::test]
    async fn test_server_error_frame_routed_to_error() {
        let recorder = Arc::new(Recorder::default());
        let router = router_with(vec![recorder.clone()]);

        router
            .message(br#"{"type":"Error","code":"BAD","description":"x"}"#)
            .await
            .expect("dispatch");

        assert_eq!(*recorder.events.lock(), vec!["error:BAD"]);
    }

    #[tokio::test]
    async fn test_every_sink_receives_in_order() {
        let first = Arc::new(Recorder::default());
        let second = Arc::new(Recorder::default());
        let router = router_with(vec![first.clone(), second.clone()]);

        router.open(&OpenResponse::default()).await.expect("open");
        for seq in 0..5 {
            let frame = format!(r#"{{"type":"Ping","seq":{seq}}}"#);
            router.message(frame.as_bytes()).await.expect("dispatch");
        }
        router.close(&CloseResponse::default()).await.expect("close");

        let expected = vec![
            "open", "ping:0", "ping:1", "ping:2", "ping:3", "ping:4", "close",
        ];
        assert_eq!(*first.events.lock(), expected);
        assert_eq!(*second.events.lock(), expected);
    }

    #[tokio::test]
    async fn test_failing_sink_does_not_starve_others() {
        let recorder = Arc::new(Recorder::default());
        let router = router_with(vec![Arc::new(Failing), recorder.clone()]);

        let err = router.binary(Bytes::from_static(b"abc")).await.unwrap_err();
        assert!(matches!(err, Error::Callback { .. }));
        assert_eq!(*recorder.events.lock(), vec!["binary:3"]);
    }

    #[tokio::test]
    async fn test_fan_out_skips_closed_receivers() {
        let (open_tx, mut open_rx) = mpsc::channel::<u32>(1);
        let (closed_tx, closed_rx) = mpsc::channel::<u32>(1);
        drop(closed_rx);

        fan_out(&[closed_tx.clone(), open_tx], 5)
            .await
            .expect("one receiver alive");
        assert_eq!(open_rx.recv().await, Some(5));

        let err = fan_out(&[closed_tx], 6).await.unwrap_err();
        assert!(matches!(err, Error::Callback { .. }));
    }
}
