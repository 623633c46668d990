//! Frame codec.
//!
//! Outbound control objects become text frames, raw buffers become binary
//! frames. Inbound frames are not decoded here: their bytes pass through
//! untouched to the router.

// ============================================================================
// Imports
// ============================================================================

use bytes::Bytes;
use serde::Serialize;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::{Message, Utf8Bytes};

use crate::error::Result;

// ============================================================================
// FrameKind
// ============================================================================

/// Payload kind of a data frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameKind {
    /// UTF-8 JSON text frame.
    Text,
    /// Raw binary frame.
    Binary,
}

impl FrameKind {
    /// Splits a data frame into its kind and payload.
    ///
    /// Returns `None` for control frames (ping, pong, close, raw).
    #[must_use]
    pub fn split(message: Message) -> Option<(Self, Bytes)> {
        match message {
            Message::Text(text) => Some((Self::Text, Bytes::copy_from_slice(text.as_bytes()))),
            Message::Binary(data) => Some((Self::Binary, data)),
            _ => None,
        }
    }
}

// ============================================================================
// ControlMessage
// ============================================================================

/// A payload-free control message (`{"type": "..."}`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ControlMessage {
    /// Discriminator.
    #[serde(rename = "type")]
    pub kind: &'static str,
}

impl ControlMessage {
    /// Keeps an idle connection open.
    pub const KEEP_ALIVE: Self = Self { kind: "KeepAlive" };

    /// Asks the server to finalize buffered audio.
    pub const FINALIZE: Self = Self { kind: "Finalize" };

    /// Tells the server no more audio follows.
    pub const CLOSE_STREAM: Self = Self { kind: "CloseStream" };
}

// ============================================================================
// Encoding
// ============================================================================

/// Serializes a control object into a text frame.
///
/// # Errors
///
/// Returns [`Error::Json`](crate::Error::Json) if serialization fails.
pub fn encode_control<T: Serialize + ?Sized>(value: &T) -> Result<Message> {
    let json = serde_json::to_string(value)?;
    Ok(Message::Text(json.into()))
}

/// Wraps raw bytes into a binary frame.
#[inline]
#[must_use]
pub fn encode_binary(data: impl Into<Bytes>) -> Message {
    Message::Binary(data.into())
}

/// Wraps text into a text frame.
#[inline]
#[must_use]
pub fn encode_text(text: impl Into<String>) -> Message {
    Message::Text(text.into().into())
}

/// Builds the standard normal-closure handshake frame.
#[inline]
#[must_use]
pub fn close_frame() -> Message {
    Message::Close(Some(CloseFrame {
        code: CloseCode::Normal,
        reason: Utf8Bytes::from_static(""),
    }))
}

// ============================================================================
// Tests
// ============================================================================
