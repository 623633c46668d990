//! Lifecycle events.
//!
//! `Open` and `Close` are generated locally by the connection manager.
//! `Error` is either a server-sent error frame or a transport failure
//! normalized by [`ErrorResponse::from_transport`].

// ============================================================================
// Imports
// ============================================================================

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

// ============================================================================
// Constants
// ============================================================================

/// Discriminator of the open event.
pub const TYPE_OPEN: &str = "Open";

/// Discriminator of the close event.
pub const TYPE_CLOSE: &str = "Close";

/// Discriminator of the error event and of server error frames.
pub const TYPE_ERROR: &str = "Error";

/// Code and message used when a transport error has no recognizable shape.
pub const UNKNOWN_ERROR: &str = "UNKNOWN";

/// `<library>: <category> <code> <detail>`, e.g.
/// `websocket: close 1011 (internal server error): no audio received`.
static TRANSPORT_ERROR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<library>[\w.-]+): (?P<category>[A-Za-z_-]+) (?P<code>\d+)\s*(?P<detail>.*)$")
        .expect("transport error pattern is valid")
});

// ============================================================================
// OpenResponse
// ============================================================================

/// Connection established.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenResponse {
    /// Always `"Open"`.
    #[serde(rename = "type")]
    pub kind: String,
}

impl Default for OpenResponse {
    fn default() -> Self {
        Self {
            kind: TYPE_OPEN.to_string(),
        }
    }
}

// ============================================================================
// CloseResponse
// ============================================================================

/// Connection closed gracefully.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseResponse {
    /// Always `"Close"`.
    #[serde(rename = "type")]
    pub kind: String,
}

impl Default for CloseResponse {
    fn default() -> Self {
        Self {
            kind: TYPE_CLOSE.to_string(),
        }
    }
}

// ============================================================================
// ErrorResponse
// ============================================================================

/// Normalized error.
///
/// Server error frames deserialize straight into this shape (`code` and
/// `message` are accepted as aliases); transport failures are mapped by
/// [`ErrorResponse::from_transport`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Always `"Error"`.
    #[serde(rename = "type")]
    pub kind: String,

    /// Machine-readable code.
    #[serde(default, alias = "code")]
    pub err_code: String,

    /// Short message.
    #[serde(default, alias = "message")]
    pub err_msg: String,

    /// Human-readable description.
    #[serde(default)]
    pub description: String,

    /// Origin or sub-kind of the error.
    #[serde(default)]
    pub variant: String,
}

impl Default for ErrorResponse {
    fn default() -> Self {
        Self {
            kind: TYPE_ERROR.to_string(),
            err_code: String::new(),
            err_msg: String::new(),
            description: String::new(),
            variant: String::new(),
        }
    }
}

impl ErrorResponse {
    /// Creates an error response from its parts.
    #[must_use]
    pub fn new(
        err_code: impl Into<String>,
        err_msg: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            err_code: err_code.into(),
            err_msg: err_msg.into(),
            description: description.into(),
            ..Self::default()
        }
    }

    /// Maps a raw transport error string into the normalized shape.
    ///
    /// `websocket: close 1011 (internal server error): detail` yields code
    /// `1011`, message `close`, variant `websocket` and the remainder as the
    /// description. Anything else yields code and message
    /// [`UNKNOWN_ERROR`] with the raw text as description.
    #[must_use]
    pub fn from_transport(raw: &str) -> Self {
        match TRANSPORT_ERROR.captures(raw.trim()) {
            Some(caps) => {
                let detail = caps["detail"].trim();
                Self {
                    err_code: caps["code"].to_string(),
                    err_msg: caps["category"].to_string(),
                    description: if detail.is_empty() {
                        raw.trim().to_string()
                    } else {
                        detail.to_string()
                    },
                    variant: caps["library"].to_string(),
                    ..Self::default()
                }
            }
            None => Self::new(UNKNOWN_ERROR, UNKNOWN_ERROR, raw),
        }
    }

    /// Maps a crate error into the normalized shape.
    #[must_use]
    pub fn from_error(err: &crate::Error) -> Self {
        Self::from_transport(&err.to_string())
    }
}

// ============================================================================
// Tests
// ============================================================================
