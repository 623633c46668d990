//! Transport options shared by every protocol family.
//!
//! Family-specific settings (transcription query parameters, agent
//! settings) live next to their family; everything the connection manager,
//! dialer and timers need lives here.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use tokio_tungstenite::tungstenite::http::header::{AUTHORIZATION, USER_AGENT};
use tokio_tungstenite::tungstenite::http::{HeaderMap, HeaderName, HeaderValue};
use tracing::Level;

use crate::error::{Error, Result};

use super::builder::ClientOptionsBuilder;
use super::credential::Credential;

// ============================================================================
// Constants
// ============================================================================

/// Default service host.
pub const DEFAULT_HOST: &str = "api.voxstream.io";

/// Default delay between dial attempts.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(2);

/// Default timeout for a single dial attempt.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default keepalive period.
pub const DEFAULT_KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(5);

/// Default `User-Agent` header value.
pub const DEFAULT_USER_AGENT: &str = concat!("voxstream-rs/", env!("CARGO_PKG_VERSION"));

// ============================================================================
// ClientOptions
// ============================================================================

/// Transport configuration.
///
/// Build with [`ClientOptions::builder()`]; the builder validates and
/// resolves credentials from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientOptions {
    /// Service host, optionally with scheme (`https://`, `wss://`, `http://`, `ws://`).
    pub host: String,

    /// Resolved credential.
    pub credential: Option<Credential>,

    /// Accept any server certificate. Opt-in, for self-hosted deployments.
    pub skip_server_auth: bool,

    /// Emit periodic keepalive control messages.
    pub keep_alive: bool,

    /// Keepalive period.
    pub keep_alive_interval: Duration,

    /// Quiet period after an interim result before a finalize is forced.
    pub auto_flush_reply_delta: Option<Duration>,

    /// Fixed delay between dial attempts.
    pub retry_delay: Duration,

    /// Timeout for one dial attempt.
    pub connect_timeout: Duration,

    /// `User-Agent` header value.
    pub user_agent: String,

    /// Extra headers attached at dial time.
    pub headers: Vec<(String, String)>,

    /// Most verbose level this client logs at.
    pub verbosity: Level,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            credential: None,
            skip_server_auth: false,
            keep_alive: false,
            keep_alive_interval: DEFAULT_KEEP_ALIVE_INTERVAL,
            auto_flush_reply_delta: None,
            retry_delay: DEFAULT_RETRY_DELAY,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            headers: Vec::new(),
            verbosity: Level::INFO,
        }
    }
}

impl ClientOptions {
    /// Creates a configuration builder.
    #[inline]
    #[must_use]
    pub fn builder() -> ClientOptionsBuilder {
        ClientOptionsBuilder::new()
    }

    /// Builds the dial-time header map.
    ///
    /// Contains `User-Agent`, at most one `Authorization`, and the extra
    /// headers. The `Host` header is derived from the URL by the dialer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a header name or value is invalid.
    pub fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::with_capacity(self.headers.len() + 2);

        for (name, value) in &self.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| Error::config(format!("invalid header name {name:?}: {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| Error::config(format!("invalid value for header {name}: {e}")))?;
            headers.append(name, value);
        }

        let user_agent = HeaderValue::from_str(&self.user_agent)
            .map_err(|e| Error::config(format!("invalid user agent: {e}")))?;
        headers.insert(USER_AGENT, user_agent);

        if let Some(credential) = &self.credential {
            let mut value = HeaderValue::from_str(&credential.authorization())
                .map_err(|_| Error::config("credential contains invalid header characters"))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        Ok(headers)
    }
}

// ============================================================================
// Tests
// ============================================================================
