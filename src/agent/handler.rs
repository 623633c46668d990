//! Protocol hooks for the voice agent.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use url::Url;

use crate::diagnostics::{Diagnostics, diag};
use crate::error::Result;
use crate::protocol::{ControlMessage, FrameKind};
use crate::router::{EventSink, Router};
use crate::transport::timers;
use crate::transport::{ProtocolHandler, Session, base_url};

use super::messages::AgentMessage;
use super::settings::AgentSettings;

// ============================================================================
// Constants
// ============================================================================

/// Path of the voice agent endpoint.
pub const AGENT_PATH: &str = "/v1/agent/converse";

// ============================================================================
// AgentHandler
// ============================================================================

/// Voice agent protocol handler.
#[derive(Debug)]
pub struct AgentHandler {
    settings: AgentSettings,
    router: Router<AgentMessage>,
}

impl AgentHandler {
    /// Creates a handler that sends `settings` on every connect and routes
    /// inbound frames to `sinks`.
    #[must_use]
    pub fn new(
        settings: AgentSettings,
        sinks: Vec<Arc<dyn EventSink<AgentMessage>>>,
        diag: Diagnostics,
    ) -> Self {
        Self {
            settings,
            router: Router::new(sinks, diag),
        }
    }

    /// Returns the settings sent on every connect.
    #[inline]
    #[must_use]
    pub fn settings(&self) -> &AgentSettings {
        &self.settings
    }
}

#[async_trait]
impl ProtocolHandler for AgentHandler {
    type Message = AgentMessage;

    fn url(&self, host: &str) -> Result<Url> {
        let mut url = base_url(host)?;
        url.set_path(AGENT_PATH);
        Ok(url)
    }

    async fn start(&self, session: &Session<Self>) -> Result<()> {
        session.writer().write_control(&self.settings).await?;
        diag!(session.diagnostics(), DEBUG, "settings sent");

        if session.options().keep_alive {
            session.spawn(
                "keepalive",
                timers::keep_alive(
                    session.writer(),
                    session.token().clone(),
                    session.options().keep_alive_interval,
                    ControlMessage::KEEP_ALIVE,
                    session.diagnostics().clone(),
                ),
            );
        }
        Ok(())
    }

    async fn process_message(&self, kind: FrameKind, data: Bytes) -> Result<()> {
        match kind {
            FrameKind::Text => self.router.message(&data).await,
            FrameKind::Binary => self.router.binary(data).await,
        }
    }

    fn close_message(&self) -> Option<String> {
        None
    }

    fn router(&self) -> &Router<AgentMessage> {
        &self.router
    }
}

// ============================================================================
// Tests
// ============================================================================
