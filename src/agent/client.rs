//! High-level voice agent client.
//!
//! # Example
//!
//! ```no_run
//! use voxstream::agent::{AgentClient, AgentSettings, LoggingAgentCallback};
//! use voxstream::ClientOptions;
//!
//! # async fn example() -> voxstream::Result<()> {
//! let options = ClientOptions::builder().keep_alive(true).build()?;
//! let settings = AgentSettings::new().with_prompt("You are a helpful assistant.");
//!
//! let client = AgentClient::with_callback(options, settings, LoggingAgentCallback);
//! if client.connect().await? {
//!     client.inject_agent_message("Hello there!").await?;
//!     client.stop().await;
//! }
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use bytes::Bytes;
use tokio::io::AsyncRead;

use crate::diagnostics::Diagnostics;
use crate::error::Result;
use crate::options::ClientOptions;
use crate::protocol::ControlMessage;
use crate::router::{CallbackSink, EventSink, MessageSet};
use crate::transport::{DEFAULT_CONNECT_RETRY, Dialer, TungsteniteDialer, WsClient};

use super::callback::AgentCallback;
use super::channels::{AgentChannelSink, AgentChannels};
use super::handler::AgentHandler;
use super::messages::AgentMessage;
use super::settings::{
    AgentSettings, FunctionCallResponse, InjectAgentMessage, Provider, UpdatePrompt, UpdateSpeak,
};

// ============================================================================
// AgentClient
// ============================================================================

/// Voice agent client.
///
/// Cheap to clone; clones share one connection.
#[derive(Debug, Clone)]
pub struct AgentClient {
    inner: WsClient<AgentHandler>,
}

impl AgentClient {
    /// Creates a client delivering events to `callback`.
    #[must_use]
    pub fn with_callback<C: AgentCallback>(
        options: ClientOptions,
        settings: AgentSettings,
        callback: C,
    ) -> Self {
        Self::with_sinks(
            options,
            settings,
            vec![Arc::new(CallbackSink(callback))],
            Arc::new(TungsteniteDialer),
        )
    }

    /// Creates a client feeding the channels of every subscriber.
    #[must_use]
    pub fn with_channels(
        options: ClientOptions,
        settings: AgentSettings,
        subscribers: &[&dyn AgentChannels],
    ) -> Self {
        Self::with_sinks(
            options,
            settings,
            vec![Arc::new(AgentChannelSink::from_subscribers(subscribers))],
            Arc::new(TungsteniteDialer),
        )
    }

    /// Creates a client over explicit sinks and dialer.
    #[must_use]
    pub fn with_sinks(
        options: ClientOptions,
        settings: AgentSettings,
        sinks: Vec<Arc<dyn EventSink<AgentMessage>>>,
        dialer: Arc<dyn Dialer>,
    ) -> Self {
        let diag = Diagnostics::new(options.verbosity, AgentMessage::FAMILY);
        let handler = AgentHandler::new(settings, sinks, diag);

        Self {
            inner: WsClient::new(Arc::new(handler), dialer, Arc::new(options)),
        }
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Connects with the default number of attempts and sends the settings.
    ///
    /// # Errors
    ///
    /// See [`WsClient::connect`].
    pub async fn connect(&self) -> Result<bool> {
        self.inner.connect(DEFAULT_CONNECT_RETRY).await
    }

    /// Connects with up to `retry_limit` attempts.
    ///
    /// # Errors
    ///
    /// See [`WsClient::connect`].
    pub async fn connect_with_retry(&self, retry_limit: u32) -> Result<bool> {
        self.inner.connect(retry_limit).await
    }

    /// Re-arms retrying and connects.
    ///
    /// # Errors
    ///
    /// See [`WsClient::reconnect`].
    pub async fn reconnect(&self, retry_limit: u32) -> Result<bool> {
        self.inner.reconnect(retry_limit).await
    }

    pub async fn stop(&self) {
        self.inner.stop().await;
    }

    pub async fn is_connected(&self) -> bool {
        self.inner.is_connected().await
    }

    #[inline]
    #[must_use]
    pub fn transport(&self) -> &WsClient<AgentHandler> {
        &self.inner
    }

    // ========================================================================
    // Audio
    // ========================================================================

    /// Pumps microphone audio from `reader` until end of input or `stop()`.
    ///
    /// # Errors
    ///
    /// See [`WsClient::stream`].
    pub async fn stream<R>(&self, reader: R) -> Result<()>
    where
        R: AsyncRead + Unpin + Send,
    {
        self.inner.stream(reader).await
    }

    /// Sends one chunk of user audio.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConnection`](crate::Error::InvalidConnection)
    /// when not connected.
    pub async fn write_binary(&self, data: impl Into<Bytes>) -> Result<()> {
        self.inner.writer().write_binary(data).await
    }

    // ========================================================================
    // Control
    // ========================================================================

    /// # Errors
    ///
    /// Same as [`write_binary`](Self::write_binary).
    pub async fn keep_alive(&self) -> Result<()> {
        self.inner
            .writer()
            .write_control(&ControlMessage::KEEP_ALIVE)
            .await
    }

    /// Replaces the system prompt.
    ///
    /// # Errors
    ///
    /// Same as [`write_binary`](Self::write_binary).
    pub async fn update_prompt(&self, prompt: impl Into<String>) -> Result<()> {
        self.inner
            .writer()
            .write_control(&UpdatePrompt::new(prompt))
            .await
    }

    /// Switches the speak provider.
    ///
    /// # Errors
    ///
    /// Same as [`write_binary`](Self::write_binary).
    pub async fn update_speak(&self, provider: Provider) -> Result<()> {
        self.inner
            .writer()
            .write_control(&UpdateSpeak::new(provider))
            .await
    }

    /// Makes the agent say `message`.
    ///
    /// # Errors
    ///
    /// Same as [`write_binary`](Self::write_binary).
    pub async fn inject_agent_message(&self, message: impl Into<String>) -> Result<()> {
        self.inner
            .writer()
            .write_control(&InjectAgentMessage::new(message))
            .await
    }

    /// Answers a client-side function call.
    ///
    /// # Errors
    ///
    /// Same as [`write_binary`](Self::write_binary).
    pub async fn function_call_response(&self, response: &FunctionCallResponse) -> Result<()> {
        self.inner.writer().write_control(response).await
    }
}

// ============================================================================
// Tests
// ============================================================================
