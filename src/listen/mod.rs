//! Live transcription.
//!
//! Raw audio goes up as binary frames; transcription results come back as
//! JSON text frames.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `callback` | Callback consumer trait and logging default |
//! | `channels` | Channel consumer trait, merged sink and default hub |
//! | `client` | [`ListenClient`] |
//! | `handler` | Protocol hooks (URL, timers, close message) |
//! | `messages` | Inbound message schemas |
//! | `options` | Query parameters |

// ============================================================================
// Submodules
// ============================================================================

/// Callback consumer.
pub mod callback;

/// Channel consumer.
pub mod channels;

/// High-level client.
pub mod client;

/// Protocol hooks.
pub mod handler;

/// Inbound messages.
pub mod messages;

/// Query parameters.
pub mod options;

// ============================================================================
// Re-exports
// ============================================================================

pub use callback::{ListenCallback, LoggingListenCallback};
pub use channels::{ListenChannelHub, ListenChannelSink, ListenChannels, ListenReceivers};
pub use client::ListenClient;
pub use handler::{LISTEN_PATH, ListenHandler};
pub use messages::{
    Alternative, Channel, ListenMessage, MetadataResponse, ResultsMetadata, ResultsResponse,
    SpeechStartedResponse, UtteranceEndResponse, Word,
};
pub use options::ListenOptions;
