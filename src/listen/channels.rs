//! Channel consumer for live transcription.
//!
//! A subscriber exposes one getter per event type returning the senders it
//! wants fed. Several subscribers are merged into one [`ListenChannelSink`]
//! at construction.
//!
//! # Backpressure
//!
//! Each send waits for capacity, inside the listener task. A receiver that
//! is never drained stalls all inbound processing of the connection once
//! its buffer fills. Frames are never dropped to relieve it.

// ============================================================================
// Imports
// ============================================================================

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

use crate::error::Result;
use crate::protocol::{CloseResponse, ErrorResponse, OpenResponse};
use crate::router::{Event, EventSink, fan_out};

use super::messages::{
    ListenMessage, MetadataResponse, ResultsResponse, SpeechStartedResponse, UtteranceEndResponse,
};

// ============================================================================
// ListenChannels
// ============================================================================

/// Per-type channel subscriptions.
///
/// Each getter is called once, when the client is built. A full channel
/// blocks the listener until its consumer drains it.
pub trait ListenChannels: Send + Sync {
    /// Receivers of the `Open` lifecycle event.
    fn open_channels(&self) -> Vec<mpsc::Sender<OpenResponse>>;
    /// Receivers of interim and final transcripts.
    fn results_channels(&self) -> Vec<mpsc::Sender<ResultsResponse>>;
    /// Receivers of stream metadata.
    fn metadata_channels(&self) -> Vec<mpsc::Sender<MetadataResponse>>;
    /// Receivers of voice activity starts.
    fn speech_started_channels(&self) -> Vec<mpsc::Sender<SpeechStartedResponse>>;
    /// Receivers of utterance boundaries.
    fn utterance_end_channels(&self) -> Vec<mpsc::Sender<UtteranceEndResponse>>;
    /// Receivers of the `Close` lifecycle event.
    fn close_channels(&self) -> Vec<mpsc::Sender<CloseResponse>>;
    /// Receivers of server and transport errors.
    fn error_channels(&self) -> Vec<mpsc::Sender<ErrorResponse>>;
    /// Receivers of raw frames with an unknown discriminator.
    fn unhandled_channels(&self) -> Vec<mpsc::Sender<Bytes>>;
}

// ============================================================================
// ListenChannelSink
// ============================================================================

/// Merged channel subscriptions of one or more subscribers.
#[derive(Debug, Clone, Default)]
pub struct ListenChannelSink {
    open: Vec<mpsc::Sender<OpenResponse>>,
    results: Vec<mpsc::Sender<ResultsResponse>>,
    metadata: Vec<mpsc::Sender<MetadataResponse>>,
    speech_started: Vec<mpsc::Sender<SpeechStartedResponse>>,
    utterance_end: Vec<mpsc::Sender<UtteranceEndResponse>>,
    close: Vec<mpsc::Sender<CloseResponse>>,
    error: Vec<mpsc::Sender<ErrorResponse>>,
    unhandled: Vec<mpsc::Sender<Bytes>>,
}

impl ListenChannelSink {
    /// Collects the senders of every subscriber, in subscriber order.
    #[must_use]
    pub fn from_subscribers(subscribers: &[&dyn ListenChannels]) -> Self {
        let mut sink = Self::default();
        for subscriber in subscribers {
            sink.open.extend(subscriber.open_channels());
            sink.results.extend(subscriber.results_channels());
            sink.metadata.extend(subscriber.metadata_channels());
            sink.speech_started
                .extend(subscriber.speech_started_channels());
            sink.utterance_end.extend(subscriber.utterance_end_channels());
            sink.close.extend(subscriber.close_channels());
            sink.error.extend(subscriber.error_channels());
            sink.unhandled.extend(subscriber.unhandled_channels());
        }
        sink
    }
}

#[async_trait]
impl EventSink<ListenMessage> for ListenChannelSink {
    async fn deliver(&self, event: Event<ListenMessage>) -> Result<()> {
        match event {
            Event::Open(open) => fan_out(&self.open, open).await,
            Event::Message(ListenMessage::Results(results)) => {
                fan_out(&self.results, results).await
            }
            Event::Message(ListenMessage::Metadata(metadata)) => {
                fan_out(&self.metadata, metadata).await
            }
            Event::Message(ListenMessage::SpeechStarted(speech)) => {
                fan_out(&self.speech_started, speech).await
            }
            Event::Message(ListenMessage::UtteranceEnd(end)) => {
                fan_out(&self.utterance_end, end).await
            }
            Event::Close(close) => fan_out(&self.close, close).await,
            Event::Error(error) => fan_out(&self.error, error).await,
            Event::Unhandled(raw) => fan_out(&self.unhandled, raw).await,
            Event::Binary(_) => Ok(()),
        }
    }
}

// ============================================================================
// ListenChannelHub
// ============================================================================

/// Default subscriber owning one bounded channel per event type.
#[derive(Debug, Clone)]
pub struct ListenChannelHub {
    open: mpsc::Sender<OpenResponse>,
    results: mpsc::Sender<ResultsResponse>,
    metadata: mpsc::Sender<MetadataResponse>,
    speech_started: mpsc::Sender<SpeechStartedResponse>,
    utterance_end: mpsc::Sender<UtteranceEndResponse>,
    close: mpsc::Sender<CloseResponse>,
    error: mpsc::Sender<ErrorResponse>,
    unhandled: mpsc::Sender<Bytes>,
}

/// Receiving ends of a [`ListenChannelHub`].
#[derive(Debug)]
pub struct ListenReceivers {
    pub open: mpsc::Receiver<OpenResponse>,
    pub results: mpsc::Receiver<ResultsResponse>,
    pub metadata: mpsc::Receiver<MetadataResponse>,
    pub speech_started: mpsc::Receiver<SpeechStartedResponse>,
    pub utterance_end: mpsc::Receiver<UtteranceEndResponse>,
    pub close: mpsc::Receiver<CloseResponse>,
    pub error: mpsc::Receiver<ErrorResponse>,
    pub unhandled: mpsc::Receiver<Bytes>,
}

impl ListenChannelHub {
    /// Creates a hub whose channels each buffer `capacity` events.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    #[must_use]
    pub fn new(capacity: usize) -> (Self, ListenReceivers) {
        let (open, open_rx) = mpsc::channel(capacity);
        let (results, results_rx) = mpsc::channel(capacity);
        let (metadata, metadata_rx) = mpsc::channel(capacity);
        let (speech_started, speech_started_rx) = mpsc::channel(capacity);
        let (utterance_end, utterance_end_rx) = mpsc::channel(capacity);
        let (close, close_rx) = mpsc::channel(capacity);
        let (error, error_rx) = mpsc::channel(capacity);
        let (unhandled, unhandled_rx) = mpsc::channel(capacity);

        let hub = Self {
            open,
            results,
            metadata,
            speech_started,
            utterance_end,
            close,
            error,
            unhandled,
        };
        let receivers = ListenReceivers {
            open: open_rx,
            results: results_rx,
            metadata: metadata_rx,
            speech_started: speech_started_rx,
            utterance_end: utterance_end_rx,
            close: close_rx,
            error: error_rx,
            unhandled: unhandled_rx,
        };
        (hub, receivers)
    }
}

impl ListenChannels for ListenChannelHub {
    fn open_channels(&self) -> Vec<mpsc::Sender<OpenResponse>> {
        vec![self.open.clone()]
    }

    fn results_channels(&self) -> Vec<mpsc::Sender<ResultsResponse>> {
        vec![self.results.clone()]
    }

    fn metadata_channels(&self) -> Vec<mpsc::Sender<MetadataResponse>> {
        vec![self.metadata.clone()]
    }

    fn speech_started_channels(&self) -> Vec<mpsc::Sender<SpeechStartedResponse>> {
        vec![self.speech_started.clone()]
    }

    fn utterance_end_channels(&self) -> Vec<mpsc::Sender<UtteranceEndResponse>> {
        vec![self.utterance_end.clone()]
    }

    fn close_channels(&self) -> Vec<mpsc::Sender<CloseResponse>> {
        vec![self.close.clone()]
    }

    fn error_channels(&self) -> Vec<mpsc::Sender<ErrorResponse>> {
        vec![self.error.clone()]
    }

    fn unhandled_channels(&self) -> Vec<mpsc::Sender<Bytes>> {
        vec![self.unhandled.clone()]
    }
}

// ============================================================================
// Tests
// ============================================================================
