//! Wire-level message types shared by every protocol family.
//!
//! # Protocol Overview
//!
//! | Frame | Direction | Purpose |
//! |-------|-----------|---------|
//! | Text (JSON, `type` discriminator) | both | Control and result messages |
//! | Binary | both | Raw audio |
//! | Close | both | Socket-level close handshake |
//!
//! Family-specific message schemas live in [`crate::listen`] and
//! [`crate::agent`]; this module only carries what the transport core
//! needs: the frame codec and the lifecycle events every consumer sees.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `frame` | Frame codec (outbound encode, inbound pass-through) |
//! | `lifecycle` | Open, Close and normalized Error events |

// ============================================================================
// Submodules
// ============================================================================

/// Frame codec.
pub mod frame;

/// Lifecycle events and the normalized error response.
pub mod lifecycle;

// ============================================================================
// Re-exports
// ============================================================================

pub use frame::{ControlMessage, FrameKind};
pub use lifecycle::{CloseResponse, ErrorResponse, OpenResponse};
