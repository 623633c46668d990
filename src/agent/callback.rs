//! Callback consumer for the voice agent.
//!
//! Every method has an empty default, so an implementation overrides only
//! the events it cares about. Callbacks run in-line in the listener task.

// ============================================================================
// Imports
// ============================================================================

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;
use crate::protocol::{CloseResponse, ErrorResponse, OpenResponse};
use crate::router::{CallbackSink, Event, EventSink};

use super::messages::{
    AgentAudioDoneResponse, AgentMessage, AgentStartedSpeakingResponse, AgentThinkingResponse,
    ConversationTextResponse, FunctionCallRequest, InjectionRefusedResponse,
    PromptUpdatedResponse, SettingsAppliedResponse, SpeakUpdatedResponse,
    UserStartedSpeakingResponse, WarningResponse, WelcomeResponse,
};

// ============================================================================
// AgentCallback
// ============================================================================

/// One method per voice agent event.
#[async_trait]
pub trait AgentCallback: Send + Sync + 'static {
    async fn open(&self, _open: OpenResponse) -> Result<()> {
        Ok(())
    }

    async fn welcome(&self, _welcome: WelcomeResponse) -> Result<()> {
        Ok(())
    }

    async fn settings_applied(&self, _applied: SettingsAppliedResponse) -> Result<()> {
        Ok(())
    }

    async fn conversation_text(&self, _text: ConversationTextResponse) -> Result<()> {
        Ok(())
    }

    async fn user_started_speaking(&self, _speaking: UserStartedSpeakingResponse) -> Result<()> {
        Ok(())
    }

    async fn agent_thinking(&self, _thinking: AgentThinkingResponse) -> Result<()> {
        Ok(())
    }

    async fn function_call_request(&self, _request: FunctionCallRequest) -> Result<()> {
        Ok(())
    }

    async fn agent_started_speaking(
        &self,
        _speaking: AgentStartedSpeakingResponse,
    ) -> Result<()> {
        Ok(())
    }

    async fn agent_audio_done(&self, _done: AgentAudioDoneResponse) -> Result<()> {
        Ok(())
    }

    async fn prompt_updated(&self, _updated: PromptUpdatedResponse) -> Result<()> {
        Ok(())
    }

    async fn speak_updated(&self, _updated: SpeakUpdatedResponse) -> Result<()> {
        Ok(())
    }

    async fn injection_refused(&self, _refused: InjectionRefusedResponse) -> Result<()> {
        Ok(())
    }

    async fn warning(&self, _warning: WarningResponse) -> Result<()> {
        Ok(())
    }

    /// Raw agent speech, in the configured output format.
    async fn audio(&self, _audio: Bytes) -> Result<()> {
        Ok(())
    }

    async fn close(&self, _close: CloseResponse) -> Result<()> {
        Ok(())
    }

    /// Server error frame or transport failure.
    async fn error(&self, _error: ErrorResponse) -> Result<()> {
        Ok(())
    }

    /// Text frame with an unrecognized type.
    async fn unhandled(&self, _raw: Bytes) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl<C: AgentCallback> EventSink<AgentMessage> for CallbackSink<C> {
    async fn deliver(&self, event: Event<AgentMessage>) -> Result<()> {
        let callback = &self.0;
        match event {
            Event::Open(open) => callback.open(open).await,
            Event::Message(message) => match message {
                AgentMessage::Welcome(m) => callback.welcome(m).await,
                AgentMessage::SettingsApplied(m) => callback.settings_applied(m).await,
                AgentMessage::ConversationText(m) => callback.conversation_text(m).await,
                AgentMessage::UserStartedSpeaking(m) => callback.user_started_speaking(m).await,
                AgentMessage::AgentThinking(m) => callback.agent_thinking(m).await,
                AgentMessage::FunctionCallRequest(m) => callback.function_call_request(m).await,
                AgentMessage::AgentStartedSpeaking(m) => callback.agent_started_speaking(m).await,
                AgentMessage::AgentAudioDone(m) => callback.agent_audio_done(m).await,
                AgentMessage::PromptUpdated(m) => callback.prompt_updated(m).await,
                AgentMessage::SpeakUpdated(m) => callback.speak_updated(m).await,
                AgentMessage::InjectionRefused(m) => callback.injection_refused(m).await,
                AgentMessage::Warning(m) => callback.warning(m).await,
            },
            Event::Binary(audio) => callback.audio(audio).await,
            Event::Close(close) => callback.close(close).await,
            Event::Error(error) => callback.error(error).await,
            Event::Unhandled(raw) => callback.unhandled(raw).await,
        }
    }
}

// ============================================================================
// LoggingAgentCallback
// ============================================================================

/// Logs the conversation through `tracing`; audio is counted, not kept.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingAgentCallback;

#[async_trait]
impl AgentCallback for LoggingAgentCallback {
    async fn welcome(&self, welcome: WelcomeResponse) -> Result<()> {
        tracing::info!(request_id = %welcome.request_id, "agent session started");
        Ok(())
    }

    async fn conversation_text(&self, text: ConversationTextResponse) -> Result<()> {
        tracing::info!(role = %text.role, content = %text.content, "conversation");
        Ok(())
    }

    async fn function_call_request(&self, request: FunctionCallRequest) -> Result<()> {
        for function in &request.functions {
            tracing::info!(
                id = %function.id,
                name = %function.name,
                client_side = function.client_side,
                "function call requested"
            );
        }
        Ok(())
    }

    async fn audio(&self, audio: Bytes) -> Result<()> {
        tracing::trace!(bytes = audio.len(), "agent audio");
        Ok(())
    }

    async fn warning(&self, warning: WarningResponse) -> Result<()> {
        tracing::warn!(code = %warning.code, description = %warning.description, "agent warning");
        Ok(())
    }

    async fn close(&self, _close: CloseResponse) -> Result<()> {
        tracing::info!("agent session closed");
        Ok(())
    }

    async fn error(&self, error: ErrorResponse) -> Result<()> {
        tracing::error!(
            code = %error.err_code,
            message = %error.err_msg,
            description = %error.description,
            "agent error"
        );
        Ok(())
    }

    async fn unhandled(&self, raw: Bytes) -> Result<()> {
        tracing::warn!(raw = %String::from_utf8_lossy(&raw), "unhandled message");
        Ok(())
    }
}
