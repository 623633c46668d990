//! voxstream - Resilient WebSocket streaming for speech APIs.
//!
//! This library moves audio and JSON control messages over a long-lived
//! WebSocket and hands every inbound message to application code, either
//! through a callback trait or through typed channels.
//!
//! # Architecture
//!
//! - **Connection manager** ([`transport::WsClient`]): dial with bounded
//!   retries, mutex-serialized writes, graceful and fatal close
//! - **Listener**: one read task per connection, classifies read failures
//! - **Router** ([`router::Router`]): partial decode of the `type`
//!   discriminator, then typed dispatch to every registered sink
//! - **Timers**: keepalive and auto-flush, bound to the connection's
//!   cancellation token
//!
//! Protocol families plug in through [`transport::ProtocolHandler`]:
//!
//! - [`listen`]: live transcription
//! - [`agent`]: voice agent
//!
//! # Quick Start
//!
//! ```no_run
//! use voxstream::listen::{ListenChannelHub, ListenClient, ListenOptions};
//! use voxstream::{ClientOptions, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     // Reads VOXSTREAM_API_KEY / VOXSTREAM_ACCESS_TOKEN from the environment
//!     let options = ClientOptions::builder().keep_alive(true).build()?;
//!     let listen = ListenOptions::new().with_encoding("linear16", 16_000);
//!
//!     let (hub, mut rx) = ListenChannelHub::new(32);
//!     let client = ListenClient::with_channels(options, listen, &[&hub]);
//!
//!     tokio::spawn(async move {
//!         while let Some(results) = rx.results.recv().await {
//!             println!("{}", results.transcript());
//!         }
//!     });
//!
//!     if client.connect().await? {
//!         let audio = tokio::fs::File::open("speech.raw").await?;
//!         client.stream(audio).await?;
//!         client.stop().await;
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`agent`] | Voice agent family |
//! | [`diagnostics`] | Per-client log verbosity |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`listen`] | Live transcription family |
//! | [`options`] | Transport configuration and credentials |
//! | [`protocol`] | Frame codec and lifecycle events |
//! | [`router`] | Message dispatch |
//! | [`transport`] | Connection manager, listener, timers |

// ============================================================================
// Modules
// ============================================================================

/// Voice agent: settings handshake, conversation events, agent audio.
pub mod agent;

/// Per-client diagnostics.
///
/// Verbosity is held by each client, not set process-wide.
pub mod diagnostics;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Live transcription: audio up, results down.
pub mod listen;

/// Transport configuration.
///
/// Use [`ClientOptions::builder()`] to create validated options.
pub mod options;

/// Frame codec and lifecycle events.
pub mod protocol;

/// Message dispatch to callback and channel consumers.
pub mod router;

/// WebSocket transport layer.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Clients
pub use agent::{AgentCallback, AgentChannels, AgentClient, AgentSettings};
pub use listen::{ListenCallback, ListenChannels, ListenClient, ListenOptions};

// Configuration
pub use diagnostics::Diagnostics;
pub use options::{ClientOptions, ClientOptionsBuilder, Credential};

// Error types
pub use error::{Error, Result};

// Lifecycle events
pub use protocol::{CloseResponse, ErrorResponse, OpenResponse};
