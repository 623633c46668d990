//! Read-failure classification.
//!
//! Socket libraries do not agree on error wording, so classification works
//! from a small, explicit set of recognized causes and falls back to
//! [`ReadFault::Unknown`], which is treated as fatal. Causes are checked in a
//! fixed priority order:
//!
//! | # | Cause | Disposition |
//! |---|-------|-------------|
//! | 1 | Normal peer closure (`close 1000`) | graceful, no error |
//! | 2 | Use of an already-closed socket | graceful, no error |
//! | 3 | Address-level socket fault | error, fatal |
//! | 4 | Server error embedded in a close (`close <code> <reason>`) | error, graceful |
//! | 5 | End of stream | error, fatal |
//! | 6 | Anything else | error, fatal |

// ============================================================================
// Imports
// ============================================================================

use std::io::ErrorKind;
use std::sync::LazyLock;

use regex::Regex;
use tokio_tungstenite::tungstenite::Error as WsError;
use tokio_tungstenite::tungstenite::error::ProtocolError;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;

// ============================================================================
// Constants
// ============================================================================

/// Prefix used when rendering close frames as transport error strings.
pub const CLOSE_PREFIX: &str = "websocket";

/// Marker of a normal closure.
const NORMAL_CLOSURE: &str = "close 1000";

/// Markers of an operation on a socket that is already closed.
const CLOSED_SOCKET: &[&str] = &[
    "use of closed network connection",
    "Trying to work with closed connection",
    "Connection closed normally",
];

/// Markers of an address-level socket fault.
const ADDRESS_FAULT: &[&str] = &[
    "can't assign requested address",
    "Cannot assign requested address",
];

/// Markers of an unexpected end of stream.
const END_OF_STREAM: &[&str] = &["unexpected EOF", "unexpected end of file"];

/// Close frame with a non-normal status code.
static SERVER_CLOSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"close \d{4}\b").expect("server close pattern is valid"));

// ============================================================================
// Disposition
// ============================================================================

/// What the listener does after a read failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Polite close, no error event.
    Graceful,
    /// Error event, then polite close.
    GracefulWithError,
    /// Error event, then fatal close (no close handshake).
    Fatal,
}

impl Disposition {
    /// Returns `true` if an error event is emitted.
    #[inline]
    #[must_use]
    pub const fn reports_error(self) -> bool {
        !matches!(self, Self::Graceful)
    }

    /// Returns `true` if the close handshake is skipped.
    #[inline]
    #[must_use]
    pub const fn is_fatal(self) -> bool {
        matches!(self, Self::Fatal)
    }
}

// ============================================================================
// ReadFault
// ============================================================================

/// Recognized cause of a read failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadFault {
    /// Peer closed with status 1000.
    NormalClosure,
    /// Read on a socket that is already closed.
    ClosedSocket,
    /// Local address cannot be assigned.
    AddressUnavailable,
    /// Server-embedded error (close with a non-normal status).
    ServerError,
    /// Stream ended without a close handshake.
    EndOfStream,
    /// Unrecognized cause.
    Unknown,
}

impl ReadFault {
    /// Classifies an error message by substring, in priority order.
    #[must_use]
    pub fn classify(message: &str) -> Self {
        if message.contains(NORMAL_CLOSURE) {
            Self::NormalClosure
        } else if CLOSED_SOCKET.iter().any(|m| message.contains(m)) {
            Self::ClosedSocket
        } else if ADDRESS_FAULT.iter().any(|m| message.contains(m)) {
            Self::AddressUnavailable
        } else if SERVER_CLOSE.is_match(message) {
            Self::ServerError
        } else if message.trim() == "EOF" || END_OF_STREAM.iter().any(|m| message.contains(m)) {
            Self::EndOfStream
        } else {
            Self::Unknown
        }
    }

    /// Classifies a socket error, using structured causes before wording.
    #[must_use]
    pub fn from_ws_error(err: &WsError) -> Self {
        match err {
            WsError::ConnectionClosed | WsError::AlreadyClosed => Self::ClosedSocket,
            WsError::Io(io) => match io.kind() {
                ErrorKind::AddrNotAvailable => Self::AddressUnavailable,
                ErrorKind::UnexpectedEof => Self::EndOfStream,
                _ => Self::classify(&io.to_string()),
            },
            WsError::Protocol(ProtocolError::ResetWithoutClosingHandshake) => Self::EndOfStream,
            other => Self::classify(&other.to_string()),
        }
    }

    /// Returns the disposition for this cause.
    #[must_use]
    pub const fn disposition(self) -> Disposition {
        match self {
            Self::NormalClosure | Self::ClosedSocket => Disposition::Graceful,
            Self::ServerError => Disposition::GracefulWithError,
            Self::AddressUnavailable | Self::EndOfStream | Self::Unknown => Disposition::Fatal,
        }
    }

    /// Returns a short description for diagnostics.
    #[must_use]
    pub const fn describe(self) -> &'static str {
        match self {
            Self::NormalClosure => "peer closed normally",
            Self::ClosedSocket => "socket already closed",
            Self::AddressUnavailable => "fatal socket fault: address not available",
            Self::ServerError => "server closed with error",
            Self::EndOfStream => "stream ended unexpectedly",
            Self::Unknown => "unknown read failure",
        }
    }
}

/// Renders a received close frame as a transport error string and
/// classifies it.
///
/// A close without a status frame counts as normal.
#[must_use]
pub fn classify_close(frame: Option<&CloseFrame>) -> (ReadFault, String) {
    let Some(frame) = frame else {
        return (
            ReadFault::NormalClosure,
            format!("{CLOSE_PREFIX}: {NORMAL_CLOSURE} (no status)"),
        );
    };

    let code = u16::from(frame.code);
    let message = if frame.reason.is_empty() {
        format!("{CLOSE_PREFIX}: close {code}")
    } else {
        format!("{CLOSE_PREFIX}: close {code} {}", frame.reason.as_str())
    };

    let fault = if frame.code == CloseCode::Normal {
        ReadFault::NormalClosure
    } else {
        ReadFault::classify(&message)
    };
    (fault, message)
}

// ============================================================================
// Tests
// ============================================================================
