//! Socket dialing.
//!
//! The connection manager never names a concrete stream type: a [`Dialer`]
//! hands back a [`Socket`], a boxed frame sink plus a boxed frame stream.
//! [`TungsteniteDialer`] is the production implementation.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::pin::Pin;
use std::result::Result as StdResult;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{Sink, Stream, StreamExt};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderMap;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{Connector, connect_async_tls_with_config};
use url::Url;

use crate::diagnostics::{Diagnostics, diag};
use crate::error::{Error, Result};

use super::tls;

// ============================================================================
// Types
// ============================================================================

/// Outbound half of a socket.
pub type FrameSink = Pin<Box<dyn Sink<Message, Error = WsError> + Send>>;

/// Inbound half of a socket.
pub type FrameStream = Pin<Box<dyn Stream<Item = StdResult<Message, WsError>> + Send>>;

/// An established socket, split into its two halves.
pub struct Socket {
    /// Frames written by the connection manager.
    pub sink: FrameSink,
    /// Frames read by the listener.
    pub stream: FrameStream,
}

impl Socket {
    /// Creates a socket from any sink and stream pair.
    pub fn new<S, R>(sink: S, stream: R) -> Self
    where
        S: Sink<Message, Error = WsError> + Send + 'static,
        R: Stream<Item = StdResult<Message, WsError>> + Send + 'static,
    {
        Self {
            sink: Box::pin(sink),
            stream: Box::pin(stream),
        }
    }
}

impl fmt::Debug for Socket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Socket").finish_non_exhaustive()
    }
}

/// Everything needed for one dial attempt.
#[derive(Debug, Clone)]
pub struct DialRequest {
    /// Fully resolved connection URL.
    pub url: Url,
    /// Headers attached to the upgrade request.
    pub headers: HeaderMap,
    /// Accept any server certificate.
    pub skip_server_auth: bool,
    /// Timeout for the whole dial, TLS and upgrade included.
    pub timeout: Duration,
    /// Diagnostics of the dialing client.
    pub diag: Diagnostics,
}

// ============================================================================
// Dialer
// ============================================================================

/// Opens sockets.
#[async_trait]
pub trait Dialer: Send + Sync + 'static {
    /// Performs one dial attempt.
    ///
    /// # Errors
    ///
    /// Any error is treated as a transient failure and consumes one retry.
    async fn dial(&self, request: &DialRequest) -> Result<Socket>;
}

/// Dials with `tokio-tungstenite` over rustls.
#[derive(Debug, Default, Clone, Copy)]
pub struct TungsteniteDialer;

#[async_trait]
impl Dialer for TungsteniteDialer {
    async fn dial(&self, request: &DialRequest) -> Result<Socket> {
        let mut upgrade = request.url.as_str().into_client_request()?;

        let headers = upgrade.headers_mut();
        for name in request.headers.keys() {
            headers.remove(name);
        }
        for (name, value) in &request.headers {
            headers.append(name.clone(), value.clone());
        }

        let connector = match request.url.scheme() {
            "wss" => {
                if request.skip_server_auth {
                    diag!(request.diag, WARN, "server certificate verification disabled");
                }
                Some(Connector::Rustls(tls::client_config(request.skip_server_auth)?))
            }
            _ => None,
        };

        let (ws_stream, response) = timeout(
            request.timeout,
            connect_async_tls_with_config(upgrade, None, true, connector),
        )
        .await
        .map_err(|_| Error::connection_timeout(request.timeout.as_millis() as u64))?
        .map_err(|e| Error::connection(format!("{}: {e}", request.url)))?;

        diag!(
            request.diag,
            DEBUG,
            url = %request.url,
            status = %response.status(),
            "WebSocket upgraded"
        );

        let (sink, stream) = ws_stream.split();
        Ok(Socket::new(sink, stream))
    }
}

// ============================================================================
// Endpoint
// ============================================================================

/// Resolves a configured host into a base WebSocket URL.
///
/// A bare host gets `wss://`; `https` maps to `wss` and `http` to `ws`.
///
/// # Errors
///
/// Returns [`Error::Config`] for a blank host or an unsupported scheme.
pub fn base_url(host: &str) -> Result<Url> {
    let host = host.trim();

    let (scheme, rest) = match host.split_once("://") {
        Some((scheme, rest)) => {
            let scheme = match scheme.to_ascii_lowercase().as_str() {
                "wss" | "https" => "wss",
                "ws" | "http" => "ws",
                other => {
                    return Err(Error::config(format!("unsupported scheme {other:?}")));
                }
            };
            (scheme, rest)
        }
        None => ("wss", host),
    };

    let rest = rest.trim_end_matches('/');
    if rest.is_empty() {
        return Err(Error::config("host must not be empty"));
    }

    Ok(Url::parse(&format!("{scheme}://{rest}"))?)
}

// ============================================================================
// Tests
// ============================================================================
