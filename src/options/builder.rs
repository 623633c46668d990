//! Builder pattern for client configuration.
//!
//! Provides a fluent API for configuring and validating [`ClientOptions`].
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use voxstream::ClientOptions;
//!
//! # fn example() -> voxstream::Result<()> {
//! let options = ClientOptions::builder()
//!     .access_token("eyJhbGciOi...")
//!     .keep_alive(true)
//!     .auto_flush_reply_delta(Duration::from_millis(1500))
//!     .build()?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::env;
use std::time::Duration;

use tracing::Level;

use crate::error::{Error, Result};

use super::client::ClientOptions;
use super::credential::Credential;

// ============================================================================
// Constants
// ============================================================================

/// Environment variable overriding the default host.
pub const HOST_ENV: &str = "VOXSTREAM_HOST";

// ============================================================================
// ClientOptionsBuilder
// ============================================================================

/// Builder for [`ClientOptions`].
///
/// Use [`ClientOptions::builder()`] to create a new builder.
#[derive(Debug, Default, Clone)]
pub struct ClientOptionsBuilder {
    /// Explicit host.
    host: Option<String>,
    /// Explicit bearer-style token.
    access_token: Option<String>,
    /// Explicit key-style credential.
    api_key: Option<String>,
    /// Accept any server certificate.
    skip_server_auth: bool,
    /// Enable keepalive timer.
    keep_alive: bool,
    /// Keepalive period override.
    keep_alive_interval: Option<Duration>,
    /// Auto-flush quiet period.
    auto_flush_reply_delta: Option<Duration>,
    /// Retry delay override.
    retry_delay: Option<Duration>,
    /// Connect timeout override.
    connect_timeout: Option<Duration>,
    /// User agent override.
    user_agent: Option<String>,
    /// Extra headers.
    headers: Vec<(String, String)>,
    /// Verbosity override.
    verbosity: Option<Level>,
}

// ============================================================================
// ClientOptionsBuilder Implementation
// ============================================================================

impl ClientOptionsBuilder {
    /// Creates a new builder with no configuration.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the service host (e.g. `api.voxstream.io` or `http://localhost:8080`).
    #[inline]
    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Sets a bearer-style access token.
    #[inline]
    #[must_use]
    pub fn access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    /// Sets a key-style API key.
    #[inline]
    #[must_use]
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Accepts any server certificate.
    ///
    /// Only for self-hosted deployments with private certificates.
    #[inline]
    #[must_use]
    pub fn skip_server_auth(mut self) -> Self {
        self.skip_server_auth = true;
        self
    }

    /// Enables or disables the keepalive timer.
    #[inline]
    #[must_use]
    pub fn keep_alive(mut self, enabled: bool) -> Self {
        self.keep_alive = enabled;
        self
    }

    /// Sets the keepalive period.
    #[inline]
    #[must_use]
    pub fn keep_alive_interval(mut self, interval: Duration) -> Self {
        self.keep_alive_interval = Some(interval);
        self
    }

    /// Enables auto-flush with the given quiet period.
    #[inline]
    #[must_use]
    pub fn auto_flush_reply_delta(mut self, delta: Duration) -> Self {
        self.auto_flush_reply_delta = Some(delta);
        self
    }

    /// Sets the fixed delay between dial attempts.
    #[inline]
    #[must_use]
    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = Some(delay);
        self
    }

    /// Sets the timeout for one dial attempt.
    #[inline]
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Overrides the `User-Agent` header.
    #[inline]
    #[must_use]
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Adds an extra header sent at dial time.
    #[inline]
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Sets the most verbose level this client logs at.
    #[inline]
    #[must_use]
    pub fn verbosity(mut self, level: Level) -> Self {
        self.verbosity = Some(level);
        self
    }

    /// Builds the options, resolving credentials and host from the process
    /// environment.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if the host is blank
    /// - [`Error::Config`] if a period or timeout is zero
    /// - [`Error::Config`] if a header is invalid
    pub fn build(self) -> Result<ClientOptions> {
        self.build_with_env(|name| env::var(name).ok())
    }

    /// Builds the options with an explicit environment lookup.
    ///
    /// # Errors
    ///
    /// Same as [`build`](Self::build).
    pub fn build_with_env(self, env: impl Fn(&str) -> Option<String>) -> Result<ClientOptions> {
        let defaults = ClientOptions::default();

        let host = self
            .host
            .clone()
            .or_else(|| env(HOST_ENV))
            .unwrap_or(defaults.host);
        let credential = Credential::resolve(
            self.access_token.as_deref(),
            self.api_key.as_deref(),
            &env,
        );

        let options = ClientOptions {
            host,
            credential,
            skip_server_auth: self.skip_server_auth,
            keep_alive: self.keep_alive,
            keep_alive_interval: self
                .keep_alive_interval
                .unwrap_or(defaults.keep_alive_interval),
            auto_flush_reply_delta: self.auto_flush_reply_delta,
            retry_delay: self.retry_delay.unwrap_or(defaults.retry_delay),
            connect_timeout: self.connect_timeout.unwrap_or(defaults.connect_timeout),
            user_agent: self.user_agent.unwrap_or(defaults.user_agent),
            headers: self.headers,
            verbosity: self.verbosity.unwrap_or(defaults.verbosity),
        };

        Self::validate(&options)?;
        Ok(options)
    }
}

// ============================================================================
// Validation
// ============================================================================

impl ClientOptionsBuilder {
    /// Validates the assembled options.
    fn validate(options: &ClientOptions) -> Result<()> {
        if options.host.trim().is_empty() {
            return Err(Error::config(
                "Host must not be empty. Use .host() or set VOXSTREAM_HOST.",
            ));
        }

        if options.keep_alive_interval.is_zero() {
            return Err(Error::config("Keepalive interval must be greater than zero"));
        }

        if options.connect_timeout.is_zero() {
            return Err(Error::config("Connect timeout must be greater than zero"));
        }

        if options.auto_flush_reply_delta.is_some_and(|d| d.is_zero()) {
            return Err(Error::config(
                "Auto-flush reply delta must be greater than zero",
            ));
        }

        options.headers()?;
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
