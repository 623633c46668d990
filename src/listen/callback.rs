//! Callback consumer for live transcription.
//!
//! Callbacks run in-line in the listener task: a slow callback delays every
//! following frame of the connection.

// ============================================================================
// Imports
// ============================================================================

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;
use crate::protocol::{CloseResponse, ErrorResponse, OpenResponse};
use crate::router::{CallbackSink, Event, EventSink};

use super::messages::{
    ListenMessage, MetadataResponse, ResultsResponse, SpeechStartedResponse, UtteranceEndResponse,
};

// ============================================================================
// ListenCallback
// ============================================================================

/// One method per live transcription event.
#[async_trait]
pub trait ListenCallback: Send + Sync + 'static {
    /// Connection established.
    async fn open(&self, open: OpenResponse) -> Result<()>;

    /// Transcription result.
    async fn results(&self, results: ResultsResponse) -> Result<()>;

    /// Stream summary.
    async fn metadata(&self, metadata: MetadataResponse) -> Result<()>;

    /// Speech detected.
    async fn speech_started(&self, speech: SpeechStartedResponse) -> Result<()>;

    /// Utterance ended.
    async fn utterance_end(&self, end: UtteranceEndResponse) -> Result<()>;

    /// Connection closed gracefully.
    async fn close(&self, close: CloseResponse) -> Result<()>;

    /// Server error frame or transport failure.
    async fn error(&self, error: ErrorResponse) -> Result<()>;

    /// Text frame with an unrecognized type.
    async fn unhandled(&self, raw: Bytes) -> Result<()>;
}

#[async_trait]
impl<C: ListenCallback> EventSink<ListenMessage> for CallbackSink<C> {
    async fn deliver(&self, event: Event<ListenMessage>) -> Result<()> {
        let callback = &self.0;
        match event {
            Event::Open(open) => callback.open(open).await,
            Event::Message(ListenMessage::Results(results)) => callback.results(results).await,
            Event::Message(ListenMessage::Metadata(metadata)) => callback.metadata(metadata).await,
            Event::Message(ListenMessage::SpeechStarted(speech)) => {
                callback.speech_started(speech).await
            }
            Event::Message(ListenMessage::UtteranceEnd(end)) => callback.utterance_end(end).await,
            Event::Close(close) => callback.close(close).await,
            Event::Error(error) => callback.error(error).await,
            Event::Unhandled(raw) => callback.unhandled(raw).await,
            Event::Binary(_) => Ok(()),
        }
    }
}

// ============================================================================
// LoggingListenCallback
// ============================================================================

/// Logs every event through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingListenCallback;

#[async_trait]
impl ListenCallback for LoggingListenCallback {
    async fn open(&self, _open: OpenResponse) -> Result<()> {
        tracing::info!("transcription stream open");
        Ok(())
    }

    async fn results(&self, results: ResultsResponse) -> Result<()> {
        let transcript = results.transcript();
        if !transcript.is_empty() {
            tracing::info!(is_final = results.is_final, transcript, "result");
        }
        Ok(())
    }

    async fn metadata(&self, metadata: MetadataResponse) -> Result<()> {
        tracing::info!(request_id = %metadata.request_id, duration = metadata.duration, "metadata");
        Ok(())
    }

    async fn speech_started(&self, speech: SpeechStartedResponse) -> Result<()> {
        tracing::debug!(timestamp = speech.timestamp, "speech started");
        Ok(())
    }

    async fn utterance_end(&self, end: UtteranceEndResponse) -> Result<()> {
        tracing::debug!(last_word_end = end.last_word_end, "utterance end");
        Ok(())
    }

    async fn close(&self, _close: CloseResponse) -> Result<()> {
        tracing::info!("transcription stream closed");
        Ok(())
    }

    async fn error(&self, error: ErrorResponse) -> Result<()> {
        tracing::error!(
            code = %error.err_code,
            message = %error.err_msg,
            description = %error.description,
            "transcription error"
        );
        Ok(())
    }

    async fn unhandled(&self, raw: Bytes) -> Result<()> {
        tracing::warn!(raw = %String::from_utf8_lossy(&raw), "unhandled message");
        Ok(())
    }
}
