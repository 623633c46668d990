//! Per-client diagnostic verbosity.
//!
//! Every client carries its own [`Diagnostics`]: a maximum [`Level`] and a
//! span tagged with a client id and protocol family. Two clients in one
//! process can log at different verbosity without touching the global
//! subscriber.

// ============================================================================
// Imports
// ============================================================================

use tracing::{Level, Span, info_span};
use uuid::Uuid;

// ============================================================================
// Diagnostics
// ============================================================================

/// Verbosity threshold and span for one client instance.
#[derive(Debug, Clone)]
pub struct Diagnostics {
    /// Most verbose level this client emits.
    level: Level,
    /// Parent span for every event emitted by this client.
    span: Span,
}

impl Diagnostics {
    /// Creates diagnostics for a client of the given protocol family.
    #[must_use]
    pub fn new(level: Level, family: &'static str) -> Self {
        let client_id = Uuid::new_v4();
        Self {
            level,
            span: info_span!("voxstream", %client_id, family),
        }
    }

    /// Returns `true` if events at `level` pass this client's threshold.
    #[inline]
    #[must_use]
    pub fn enabled(&self, level: Level) -> bool {
        level <= self.level
    }

    /// Returns the configured threshold.
    #[inline]
    #[must_use]
    pub fn level(&self) -> Level {
        self.level
    }

    /// Returns the client span.
    #[inline]
    #[must_use]
    pub fn span(&self) -> &Span {
        &self.span
    }
}

// ============================================================================
// Macro
// ============================================================================

/// Emits a `tracing` event gated by a [`Diagnostics`] threshold.
///
/// ```ignore
/// diag!(self.diag, DEBUG, attempt, "dialing");
/// ```
macro_rules! diag {
    ($diag:expr, $level:ident, $($arg:tt)+) => {{
        let diag: &$crate::diagnostics::Diagnostics = &$diag;
        if diag.enabled(::tracing::Level::$level) {
            ::tracing::event!(parent: diag.span(), ::tracing::Level::$level, $($arg)+);
        }
    }};
}

pub(crate) use diag;

// ============================================================================
// Tests
// ============================================================================
