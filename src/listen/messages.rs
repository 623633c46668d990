//! Live transcription messages.
//!
//! Server `Error` frames are not part of this set: the router sends them to
//! the error sink as [`ErrorResponse`](crate::protocol::ErrorResponse).

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};

use crate::router::MessageSet;

// ============================================================================
// Constants
// ============================================================================

/// Discriminator of [`ResultsResponse`].
pub const TYPE_RESULTS: &str = "Results";

/// Discriminator of [`MetadataResponse`].
pub const TYPE_METADATA: &str = "Metadata";

/// Discriminator of [`SpeechStartedResponse`].
pub const TYPE_SPEECH_STARTED: &str = "SpeechStarted";

/// Discriminator of [`UtteranceEndResponse`].
pub const TYPE_UTTERANCE_END: &str = "UtteranceEnd";

// ============================================================================
// Results
// ============================================================================

/// One recognized word.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Word {
    pub word: String,
    pub start: f64,
    pub end: f64,
    pub confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub punctuated_word: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speaker: Option<u32>,
}

/// One transcript hypothesis.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Alternative {
    pub transcript: String,
    pub confidence: f64,
    pub words: Vec<Word>,
}

/// Hypotheses for one audio channel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Channel {
    pub alternatives: Vec<Alternative>,
}

/// Request identifiers attached to each result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResultsMetadata {
    pub request_id: String,
    pub model_uuid: String,
}

/// Transcription result for one audio segment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResultsResponse {
    #[serde(rename = "type")]
    pub kind: String,
    pub channel_index: Vec<u32>,
    pub duration: f64,
    pub start: f64,
    /// The segment will not change anymore.
    pub is_final: bool,
    /// The speaker paused; the utterance is complete.
    pub speech_final: bool,
    /// Produced in response to a `Finalize` control message.
    pub from_finalize: bool,
    pub channel: Channel,
    pub metadata: ResultsMetadata,
}

impl ResultsResponse {
    /// Returns the best transcript, or an empty string.
    #[must_use]
    pub fn transcript(&self) -> &str {
        self.channel
            .alternatives
            .first()
            .map_or("", |alt| alt.transcript.as_str())
    }
}

// ============================================================================
// Metadata
// ============================================================================

/// Stream summary sent after `CloseStream`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataResponse {
    #[serde(rename = "type")]
    pub kind: String,
    pub transaction_key: String,
    pub request_id: String,
    pub sha256: String,
    pub created: String,
    pub duration: f64,
    pub channels: u32,
    pub models: Vec<String>,
}

// ============================================================================
// Voice Activity
// ============================================================================

/// Speech detected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechStartedResponse {
    #[serde(rename = "type")]
    pub kind: String,
    pub channel: Vec<u32>,
    pub timestamp: f64,
}

/// Silence ended an utterance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UtteranceEndResponse {
    #[serde(rename = "type")]
    pub kind: String,
    pub channel: Vec<u32>,
    pub last_word_end: f64,
}

// ============================================================================
// ListenMessage
// ============================================================================

/// Every typed message of the live transcription family.
#[derive(Debug, Clone, PartialEq)]
pub enum ListenMessage {
    Results(ResultsResponse),
    Metadata(MetadataResponse),
    SpeechStarted(SpeechStartedResponse),
    UtteranceEnd(UtteranceEndResponse),
}

impl MessageSet for ListenMessage {
    const FAMILY: &'static str = "listen";

    fn decode(kind: &str, data: &[u8]) -> Option<serde_json::Result<Self>> {
        let decoded = match kind {
            TYPE_RESULTS => serde_json::from_slice(data).map(Self::Results),
            TYPE_METADATA => serde_json::from_slice(data).map(Self::Metadata),
            TYPE_SPEECH_STARTED => serde_json::from_slice(data).map(Self::SpeechStarted),
            TYPE_UTTERANCE_END => serde_json::from_slice(data).map(Self::UtteranceEnd),
            _ => return None,
        };
        Some(decoded)
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::Results(_) => TYPE_RESULTS,
            Self::Metadata(_) => TYPE_METADATA,
            Self::SpeechStarted(_) => TYPE_SPEECH_STARTED,
            Self::UtteranceEnd(_) => TYPE_UTTERANCE_END,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
