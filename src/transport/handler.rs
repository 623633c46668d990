//! Per-family protocol hooks.
//!
//! A [`ProtocolHandler`] supplies everything the generic connection manager
//! does not know: the connect URL, the post-connect handshake, the per-frame
//! forwarding into the family [`Router`] and the application-level close
//! message.

// ============================================================================
// Imports
// ============================================================================

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::FutureExt;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::diagnostics::Diagnostics;
use crate::error::{Error, Result};
use crate::options::ClientOptions;
use crate::protocol::FrameKind;
use crate::router::{MessageSet, Router};

use super::connection::{WsClient, Writer};

// ============================================================================
// ProtocolHandler
// ============================================================================

/// Hooks a protocol family plugs into the connection manager.
#[async_trait]
pub trait ProtocolHandler: Sized + Send + Sync + 'static {
    /// Typed messages this family receives.
    type Message: MessageSet;

    /// Resolves the full connection URL for `host`.
    ///
    /// Must be side-effect free; called once per dial attempt.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`]; the connect call aborts without retrying.
    fn url(&self, host: &str) -> Result<Url>;

    /// Runs once per established connection, before the first read.
    ///
    /// # Errors
    ///
    /// Errors are reported through the error sink; the connection stays up.
    async fn start(&self, session: &Session<Self>) -> Result<()>;

    /// Receives every non-empty inbound data frame.
    ///
    /// # Errors
    ///
    /// Errors are logged by the listener and never close the connection.
    async fn process_message(&self, kind: FrameKind, data: Bytes) -> Result<()>;

    /// Application-level close notice sent before the close handshake.
    fn close_message(&self) -> Option<String>;

    /// Runs during a graceful close, after the close handshake frame.
    async fn finish(&self) {}

    /// Returns the family router.
    fn router(&self) -> &Router<Self::Message>;
}

// ============================================================================
// Session
// ============================================================================

/// One established connection, as seen by [`ProtocolHandler::start`].
pub struct Session<H: ProtocolHandler> {
    client: WsClient<H>,
    generation: u64,
    token: CancellationToken,
}

impl<H: ProtocolHandler> fmt::Debug for Session<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

impl<H: ProtocolHandler> Session<H> {
    pub(crate) fn new(client: WsClient<H>, generation: u64, token: CancellationToken) -> Self {
        Self {
            client,
            generation,
            token,
        }
    }

    /// Returns a write handle.
    #[inline]
    #[must_use]
    pub fn writer(&self) -> Writer {
        self.client.writer()
    }

    /// Cancelled when this connection closes.
    #[inline]
    #[must_use]
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Returns the client options.
    #[inline]
    #[must_use]
    pub fn options(&self) -> &ClientOptions {
        self.client.options()
    }

    /// Returns the client diagnostics.
    #[inline]
    #[must_use]
    pub fn diagnostics(&self) -> &Diagnostics {
        self.client.diagnostics()
    }

    /// Spawns a background task bound to this connection.
    ///
    /// The task is joined by `stop()`. A panic inside it is reported as an
    /// error event and fatally closes this connection.
    pub fn spawn<F>(&self, name: &'static str, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let client = self.client.clone();
        let generation = self.generation;

        let handle = tokio::spawn(async move {
            if let Err(panic) = AssertUnwindSafe(task).catch_unwind().await {
                let err = Error::panic_recovered(format!("{name}: {}", panic_message(&*panic)));
                client.fault(&err, generation).await;
            }
        });

        self.client.track(handle);
    }
}

/// Renders a panic payload as text.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_message_payloads() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(&*payload), "boom");

        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(&*payload), "bang");

        let payload: Box<dyn Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(&*payload), "non-string panic payload");
    }
}
