//! WebSocket transport layer.
//!
//! Generic over the protocol family: everything family-specific enters
//! through a [`ProtocolHandler`].
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────┐  write_* (mutex)   ┌──────────┐
//! │  Application  │───────────────────►│          │
//! │  Timers       │                    │  Socket  │◄────► Service
//! └───────────────┘                    │          │
//!        ▲            ┌──────────┐     │          │
//!        └── Router ◄─│ Listener │◄────│          │
//!                     └──────────┘     └──────────┘
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `classify` | Read-failure classification |
//! | `connection` | Connection manager and write handle |
//! | `dialer` | Socket dialing and endpoint resolution |
//! | `handler` | Protocol hooks and per-connection session |
//! | `listener` | Per-connection read loop |
//! | `timers` | Keepalive and auto-flush |
//! | `tls` | rustls client configuration |

// ============================================================================
// Submodules
// ============================================================================

/// Read-failure classification.
pub mod classify;

/// Connection manager and write handle.
pub mod connection;

/// Socket dialing.
pub mod dialer;

/// Protocol hooks.
pub mod handler;

/// Per-connection read loop.
mod listener;

/// Keepalive and auto-flush timers.
pub mod timers;

/// TLS configuration.
mod tls;

#[cfg(test)]
pub(crate) mod mock;

// ============================================================================
// Re-exports
// ============================================================================

pub use classify::{Disposition, ReadFault};
pub use connection::{DEFAULT_CONNECT_RETRY, STREAM_CHUNK_SIZE, WsClient, Writer};
pub use dialer::{DialRequest, Dialer, FrameSink, FrameStream, Socket, TungsteniteDialer, base_url};
pub use handler::{ProtocolHandler, Session};
pub use timers::FlushTracker;
