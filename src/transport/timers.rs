//! Keepalive and auto-flush timers.
//!
//! Both run as connection-bound tasks (see
//! [`Session::spawn`](super::Session::spawn)) and exit when the connection
//! token fires. Write failures are logged, never escalated: a missed
//! keepalive does not close the connection by itself.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;

use crate::diagnostics::{Diagnostics, diag};
use crate::protocol::ControlMessage;

use super::connection::Writer;

// ============================================================================
// Constants
// ============================================================================

/// Upper bound on the flush timer tick.
pub const FLUSH_TICK: Duration = Duration::from_millis(500);

// ============================================================================
// Keepalive
// ============================================================================

/// Sends `message` every `period` until `token` fires.
pub async fn keep_alive(
    writer: Writer,
    token: CancellationToken,
    period: Duration,
    message: ControlMessage,
    diag: Diagnostics,
) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            () = token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        match writer.write_control(&message).await {
            Ok(()) => diag!(diag, TRACE, kind = message.kind, "keepalive sent"),
            Err(e) => diag!(diag, WARN, error = %e, "keepalive failed"),
        }
    }

    diag!(diag, DEBUG, "keepalive stopped");
}

// ============================================================================
// FlushTracker
// ============================================================================

/// Tracks the last interim result not yet followed by a final one.
#[derive(Debug, Default)]
pub struct FlushTracker {
    last_interim: Mutex<Option<Instant>>,
}

impl FlushTracker {
    /// Creates an idle tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an interim result.
    pub fn observe_interim(&self) {
        *self.last_interim.lock() = Some(Instant::now());
    }

    /// Records a final result.
    pub fn observe_final(&self) {
        *self.last_interim.lock() = None;
    }

    /// Returns `true` and clears the mark if an interim result has waited
    /// at least `delta` without a follow-up.
    pub fn take_if_quiet(&self, delta: Duration) -> bool {
        let mut last = self.last_interim.lock();
        match *last {
            Some(at) if at.elapsed() >= delta => {
                *last = None;
                true
            }
            _ => false,
        }
    }

    /// Returns `true` if an interim result is pending.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.last_interim.lock().is_some()
    }
}

/// Sends a finalize control message whenever `tracker` has been quiet for
/// `delta`, until `token` fires.
pub async fn auto_flush(
    writer: Writer,
    token: CancellationToken,
    tracker: Arc<FlushTracker>,
    delta: Duration,
    diag: Diagnostics,
) {
    let tick = FLUSH_TICK.min(delta);
    let mut ticker = interval_at(Instant::now() + tick, tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            () = token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        if !tracker.take_if_quiet(delta) {
            continue;
        }

        match writer.write_control(&ControlMessage::FINALIZE).await {
            Ok(()) => diag!(diag, DEBUG, "auto-flush sent finalize"),
            Err(e) => diag!(diag, WARN, error = %e, "auto-flush failed"),
        }
    }

    diag!(diag, DEBUG, "auto-flush stopped");
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_tracker_quiet_period() {
        let tracker = FlushTracker::new();
        assert!(!tracker.take_if_quiet(Duration::from_millis(100)));

        tracker.observe_interim();
        assert!(tracker.is_pending());
        assert!(!tracker.take_if_quiet(Duration::from_millis(100)));

        tokio::time::advance(Duration::from_millis(150)).await;
        assert!(tracker.take_if_quiet(Duration::from_millis(100)));
        assert!(!tracker.is_pending());
        assert!(!tracker.take_if_quiet(Duration::from_millis(100)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_final_clears_tracker() {
        let tracker = FlushTracker::new();
        tracker.observe_interim();
        tracker.observe_final();

        tokio::time::advance(Duration::from_secs(5)).await;
        assert!(!tracker.take_if_quiet(Duration::from_millis(100)));
    }
}
