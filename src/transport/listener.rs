//! Listener loop.
//!
//! One task per established connection reads frames in order and forwards
//! data frames to the protocol handler. A read failure is classified (see
//! [`classify`](super::classify)) into a graceful or fatal close. A panic
//! anywhere in the loop is caught at the task boundary, reported as an error
//! event and turned into a fatal close.

// ============================================================================
// Imports
// ============================================================================

use std::panic::AssertUnwindSafe;

use futures_util::{FutureExt, StreamExt};
use tokio::sync::oneshot;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use crate::diagnostics::diag;
use crate::error::Error;
use crate::protocol::{ErrorResponse, FrameKind};

use super::classify::{ReadFault, classify_close};
use super::connection::WsClient;
use super::dialer::FrameStream;
use super::handler::{ProtocolHandler, panic_message};

// ============================================================================
// Exit
// ============================================================================

/// Why the read loop stopped.
enum Exit {
    /// The connection token fired.
    Cancelled,
    /// The socket failed or the peer closed.
    Failed { fault: ReadFault, message: String },
}

// ============================================================================
// Listener
// ============================================================================

/// Runs the listener for connection `generation`.
///
/// Waits for the post-connect sequence to finish before the first read and
/// exits silently if the connection was replaced or closed meanwhile.
pub(crate) async fn run<H: ProtocolHandler>(
    client: WsClient<H>,
    mut stream: FrameStream,
    generation: u64,
    token: CancellationToken,
    ready: oneshot::Receiver<()>,
) {
    let _ = ready.await;

    if !client.is_live(generation).await {
        diag!(client.diagnostics(), DEBUG, generation, "listener has no connection, exiting");
        return;
    }

    diag!(client.diagnostics(), DEBUG, generation, "listener started");

    let outcome = AssertUnwindSafe(read_loop(&client, &mut stream, &token))
        .catch_unwind()
        .await;

    match outcome {
        Ok(Exit::Cancelled) => {
            diag!(client.diagnostics(), DEBUG, generation, "listener cancelled");
        }
        Ok(Exit::Failed { fault, message }) => {
            let disposition = fault.disposition();
            diag!(
                client.diagnostics(),
                DEBUG,
                generation,
                cause = fault.describe(),
                error = %message,
                "read loop ended"
            );

            if disposition.reports_error() {
                client.report(&ErrorResponse::from_transport(&message)).await;
            }
            client.close(disposition.is_fatal(), Some(generation)).await;
        }
        Err(panic) => {
            let err = Error::panic_recovered(panic_message(&*panic));
            client.fault(&err, generation).await;
        }
    }
}

/// Reads until cancellation or a read failure.
async fn read_loop<H: ProtocolHandler>(
    client: &WsClient<H>,
    stream: &mut FrameStream,
    token: &CancellationToken,
) -> Exit {
    loop {
        let next = tokio::select! {
            biased;
            () = token.cancelled() => return Exit::Cancelled,
            next = stream.next() => next,
        };

        let message = match next {
            Some(Ok(message)) => message,
            Some(Err(e)) => {
                return Exit::Failed {
                    fault: ReadFault::from_ws_error(&e),
                    message: e.to_string(),
                };
            }
            None => {
                return Exit::Failed {
                    fault: ReadFault::EndOfStream,
                    message: "unexpected EOF".to_string(),
                };
            }
        };

        if let Message::Close(frame) = &message {
            let (fault, message) = classify_close(frame.as_ref());
            return Exit::Failed { fault, message };
        }

        let Some((kind, data)) = FrameKind::split(message) else {
            continue;
        };
        if data.is_empty() {
            continue;
        }

        let result = tokio::select! {
            biased;
            () = token.cancelled() => return Exit::Cancelled,
            result = client.handler().process_message(kind, data) => result,
        };

        match result {
            Ok(()) => {}
            Err(e @ Error::InvalidMessageType { .. }) => {
                diag!(client.diagnostics(), DEBUG, error = %e, "frame fell through");
            }
            Err(e) => {
                diag!(client.diagnostics(), WARN, error = %e, "failed to process frame");
            }
        }
    }
}
