//! Client configuration.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`ClientOptions`] | Transport options shared by every protocol family |
//! | [`ClientOptionsBuilder`] | Fluent, validating builder |
//! | [`Credential`] | Resolved credential and its `Authorization` value |
//!
//! # Example
//!
//! ```no_run
//! use voxstream::ClientOptions;
//!
//! # fn example() -> voxstream::Result<()> {
//! let options = ClientOptions::builder()
//!     .host("api.voxstream.io")
//!     .api_key("secret")
//!     .keep_alive(true)
//!     .build()?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Submodules
// ============================================================================

/// Fluent builder pattern for client configuration.
pub mod builder;

/// Transport options.
pub mod client;

/// Credential resolution and the `Authorization` header.
pub mod credential;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::ClientOptionsBuilder;
pub use client::ClientOptions;
pub use credential::Credential;
