//! Channel consumer for the voice agent.
//!
//! Getters default to no channels; a subscriber overrides the ones it
//! wants. Sends wait for capacity inside the listener task, so a receiver
//! that is never drained eventually stalls the connection.

// ============================================================================
// Imports
// ============================================================================

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

use crate::error::Result;
use crate::protocol::{CloseResponse, ErrorResponse, OpenResponse};
use crate::router::{Event, EventSink, fan_out};

use super::messages::{
    AgentAudioDoneResponse, AgentMessage, AgentStartedSpeakingResponse, AgentThinkingResponse,
    ConversationTextResponse, FunctionCallRequest, InjectionRefusedResponse,
    PromptUpdatedResponse, SettingsAppliedResponse, SpeakUpdatedResponse,
    UserStartedSpeakingResponse, WarningResponse, WelcomeResponse,
};

// ============================================================================
// AgentChannels
// ============================================================================

/// Per-type channel subscriptions.
pub trait AgentChannels: Send + Sync {
    fn open_channels(&self) -> Vec<mpsc::Sender<OpenResponse>> {
        Vec::new()
    }
    fn welcome_channels(&self) -> Vec<mpsc::Sender<WelcomeResponse>> {
        Vec::new()
    }
    fn settings_applied_channels(&self) -> Vec<mpsc::Sender<SettingsAppliedResponse>> {
        Vec::new()
    }
    fn conversation_text_channels(&self) -> Vec<mpsc::Sender<ConversationTextResponse>> {
        Vec::new()
    }
    fn user_started_speaking_channels(&self) -> Vec<mpsc::Sender<UserStartedSpeakingResponse>> {
        Vec::new()
    }
    fn agent_thinking_channels(&self) -> Vec<mpsc::Sender<AgentThinkingResponse>> {
        Vec::new()
    }
    fn function_call_request_channels(&self) -> Vec<mpsc::Sender<FunctionCallRequest>> {
        Vec::new()
    }
    fn agent_started_speaking_channels(&self) -> Vec<mpsc::Sender<AgentStartedSpeakingResponse>> {
        Vec::new()
    }
    fn agent_audio_done_channels(&self) -> Vec<mpsc::Sender<AgentAudioDoneResponse>> {
        Vec::new()
    }
    fn prompt_updated_channels(&self) -> Vec<mpsc::Sender<PromptUpdatedResponse>> {
        Vec::new()
    }
    fn speak_updated_channels(&self) -> Vec<mpsc::Sender<SpeakUpdatedResponse>> {
        Vec::new()
    }
    fn injection_refused_channels(&self) -> Vec<mpsc::Sender<InjectionRefusedResponse>> {
        Vec::new()
    }
    fn warning_channels(&self) -> Vec<mpsc::Sender<WarningResponse>> {
        Vec::new()
    }
    fn audio_channels(&self) -> Vec<mpsc::Sender<Bytes>> {
        Vec::new()
    }
    fn close_channels(&self) -> Vec<mpsc::Sender<CloseResponse>> {
        Vec::new()
    }
    fn error_channels(&self) -> Vec<mpsc::Sender<ErrorResponse>> {
        Vec::new()
    }
    fn unhandled_channels(&self) -> Vec<mpsc::Sender<Bytes>> {
        Vec::new()
    }
}

// ============================================================================
// AgentChannelSink
// ============================================================================

/// Merged channel subscriptions of one or more subscribers.
#[derive(Debug, Clone, Default)]
pub struct AgentChannelSink {
    open: Vec<mpsc::Sender<OpenResponse>>,
    welcome: Vec<mpsc::Sender<WelcomeResponse>>,
    settings_applied: Vec<mpsc::Sender<SettingsAppliedResponse>>,
    conversation_text: Vec<mpsc::Sender<ConversationTextResponse>>,
    user_started_speaking: Vec<mpsc::Sender<UserStartedSpeakingResponse>>,
    agent_thinking: Vec<mpsc::Sender<AgentThinkingResponse>>,
    function_call_request: Vec<mpsc::Sender<FunctionCallRequest>>,
    agent_started_speaking: Vec<mpsc::Sender<AgentStartedSpeakingResponse>>,
    agent_audio_done: Vec<mpsc::Sender<AgentAudioDoneResponse>>,
    prompt_updated: Vec<mpsc::Sender<PromptUpdatedResponse>>,
    speak_updated: Vec<mpsc::Sender<SpeakUpdatedResponse>>,
    injection_refused: Vec<mpsc::Sender<InjectionRefusedResponse>>,
    warning: Vec<mpsc::Sender<WarningResponse>>,
    audio: Vec<mpsc::Sender<Bytes>>,
    close: Vec<mpsc::Sender<CloseResponse>>,
    error: Vec<mpsc::Sender<ErrorResponse>>,
    unhandled: Vec<mpsc::Sender<Bytes>>,
}

impl AgentChannelSink {
    /// Collects the senders of every subscriber, in subscriber order.
    #[must_use]
    pub fn from_subscribers(subscribers: &[&dyn AgentChannels]) -> Self {
        let mut sink = Self::default();
        for s in subscribers {
            sink.open.extend(s.open_channels());
            sink.welcome.extend(s.welcome_channels());
            sink.settings_applied.extend(s.settings_applied_channels());
            sink.conversation_text.extend(s.conversation_text_channels());
            sink.user_started_speaking
                .extend(s.user_started_speaking_channels());
            sink.agent_thinking.extend(s.agent_thinking_channels());
            sink.function_call_request
                .extend(s.function_call_request_channels());
            sink.agent_started_speaking
                .extend(s.agent_started_speaking_channels());
            sink.agent_audio_done.extend(s.agent_audio_done_channels());
            sink.prompt_updated.extend(s.prompt_updated_channels());
            sink.speak_updated.extend(s.speak_updated_channels());
            sink.injection_refused.extend(s.injection_refused_channels());
            sink.warning.extend(s.warning_channels());
            sink.audio.extend(s.audio_channels());
            sink.close.extend(s.close_channels());
            sink.error.extend(s.error_channels());
            sink.unhandled.extend(s.unhandled_channels());
        }
        sink
    }
}

#[async_trait]
impl EventSink<AgentMessage> for AgentChannelSink {
    async fn deliver(&self, event: Event<AgentMessage>) -> Result<()> {
        match event {
            Event::Open(open) => fan_out(&self.open, open).await,
            Event::Message(message) => match message {
                AgentMessage::Welcome(m) => fan_out(&self.welcome, m).await,
                AgentMessage::SettingsApplied(m) => fan_out(&self.settings_applied, m).await,
                AgentMessage::ConversationText(m) => fan_out(&self.conversation_text, m).await,
                AgentMessage::UserStartedSpeaking(m) => {
                    fan_out(&self.user_started_speaking, m).await
                }
                AgentMessage::AgentThinking(m) => fan_out(&self.agent_thinking, m).await,
                AgentMessage::FunctionCallRequest(m) => {
                    fan_out(&self.function_call_request, m).await
                }
                AgentMessage::AgentStartedSpeaking(m) => {
                    fan_out(&self.agent_started_speaking, m).await
                }
                AgentMessage::AgentAudioDone(m) => fan_out(&self.agent_audio_done, m).await,
                AgentMessage::PromptUpdated(m) => fan_out(&self.prompt_updated, m).await,
                AgentMessage::SpeakUpdated(m) => fan_out(&self.speak_updated, m).await,
                AgentMessage::InjectionRefused(m) => fan_out(&self.injection_refused, m).await,
                AgentMessage::Warning(m) => fan_out(&self.warning, m).await,
            },
            Event::Binary(audio) => fan_out(&self.audio, audio).await,
            Event::Close(close) => fan_out(&self.close, close).await,
            Event::Error(error) => fan_out(&self.error, error).await,
            Event::Unhandled(raw) => fan_out(&self.unhandled, raw).await,
        }
    }
}

// ============================================================================
// AgentChannelHub
// ============================================================================

/// Default subscriber owning one bounded channel per event type.
#[derive(Debug, Clone)]
pub struct AgentChannelHub {
    open: mpsc::Sender<OpenResponse>,
    welcome: mpsc::Sender<WelcomeResponse>,
    settings_applied: mpsc::Sender<SettingsAppliedResponse>,
    conversation_text: mpsc::Sender<ConversationTextResponse>,
    user_started_speaking: mpsc::Sender<UserStartedSpeakingResponse>,
    agent_thinking: mpsc::Sender<AgentThinkingResponse>,
    function_call_request: mpsc::Sender<FunctionCallRequest>,
    agent_started_speaking: mpsc::Sender<AgentStartedSpeakingResponse>,
    agent_audio_done: mpsc::Sender<AgentAudioDoneResponse>,
    prompt_updated: mpsc::Sender<PromptUpdatedResponse>,
    speak_updated: mpsc::Sender<SpeakUpdatedResponse>,
    injection_refused: mpsc::Sender<InjectionRefusedResponse>,
    warning: mpsc::Sender<WarningResponse>,
    audio: mpsc::Sender<Bytes>,
    close: mpsc::Sender<CloseResponse>,
    error: mpsc::Sender<ErrorResponse>,
    unhandled: mpsc::Sender<Bytes>,
}

/// Receiving ends of an [`AgentChannelHub`].
#[derive(Debug)]
pub struct AgentReceivers {
    pub open: mpsc::Receiver<OpenResponse>,
    pub welcome: mpsc::Receiver<WelcomeResponse>,
    pub settings_applied: mpsc::Receiver<SettingsAppliedResponse>,
    pub conversation_text: mpsc::Receiver<ConversationTextResponse>,
    pub user_started_speaking: mpsc::Receiver<UserStartedSpeakingResponse>,
    pub agent_thinking: mpsc::Receiver<AgentThinkingResponse>,
    pub function_call_request: mpsc::Receiver<FunctionCallRequest>,
    pub agent_started_speaking: mpsc::Receiver<AgentStartedSpeakingResponse>,
    pub agent_audio_done: mpsc::Receiver<AgentAudioDoneResponse>,
    pub prompt_updated: mpsc::Receiver<PromptUpdatedResponse>,
    pub speak_updated: mpsc::Receiver<SpeakUpdatedResponse>,
    pub injection_refused: mpsc::Receiver<InjectionRefusedResponse>,
    pub warning: mpsc::Receiver<WarningResponse>,
    pub audio: mpsc::Receiver<Bytes>,
    pub close: mpsc::Receiver<CloseResponse>,
    pub error: mpsc::Receiver<ErrorResponse>,
    pub unhandled: mpsc::Receiver<Bytes>,
}

impl AgentChannelHub {
    /// Creates a hub whose channels each buffer `capacity` events.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    #[must_use]
    pub fn new(capacity: usize) -> (Self, AgentReceivers) {
        let (open, open_rx) = mpsc::channel(capacity);
        let (welcome, welcome_rx) = mpsc::channel(capacity);
        let (settings_applied, settings_applied_rx) = mpsc::channel(capacity);
        let (conversation_text, conversation_text_rx) = mpsc::channel(capacity);
        let (user_started_speaking, user_started_speaking_rx) = mpsc::channel(capacity);
        let (agent_thinking, agent_thinking_rx) = mpsc::channel(capacity);
        let (function_call_request, function_call_request_rx) = mpsc::channel(capacity);
        let (agent_started_speaking, agent_started_speaking_rx) = mpsc::channel(capacity);
        let (agent_audio_done, agent_audio_done_rx) = mpsc::channel(capacity);
        let (prompt_updated, prompt_updated_rx) = mpsc::channel(capacity);
        let (speak_updated, speak_updated_rx) = mpsc::channel(capacity);
        let (injection_refused, injection_refused_rx) = mpsc::channel(capacity);
        let (warning, warning_rx) = mpsc::channel(capacity);
        let (audio, audio_rx) = mpsc::channel(capacity);
        let (close, close_rx) = mpsc::channel(capacity);
        let (error, error_rx) = mpsc::channel(capacity);
        let (unhandled, unhandled_rx) = mpsc::channel(capacity);

        let hub = Self {
            open,
            welcome,
            settings_applied,
            conversation_text,
            user_started_speaking,
            agent_thinking,
            function_call_request,
            agent_started_speaking,
            agent_audio_done,
            prompt_updated,
            speak_updated,
            injection_refused,
            warning,
            audio,
            close,
            error,
            unhandled,
        };
        let receivers = AgentReceivers {
            open: open_rx,
            welcome: welcome_rx,
            settings_applied: settings_applied_rx,
            conversation_text: conversation_text_rx,
            user_started_speaking: user_started_speaking_rx,
            agent_thinking: agent_thinking_rx,
            function_call_request: function_call_request_rx,
            agent_started_speaking: agent_started_speaking_rx,
            agent_audio_done: agent_audio_done_rx,
            prompt_updated: prompt_updated_rx,
            speak_updated: speak_updated_rx,
            injection_refused: injection_refused_rx,
            warning: warning_rx,
            audio: audio_rx,
            close: close_rx,
            error: error_rx,
            unhandled: unhandled_rx,
        };
        (hub, receivers)
    }
}

impl AgentChannels for AgentChannelHub {
    fn open_channels(&self) -> Vec<mpsc::Sender<OpenResponse>> {
        vec![self.open.clone()]
    }
    fn welcome_channels(&self) -> Vec<mpsc::Sender<WelcomeResponse>> {
        vec![self.welcome.clone()]
    }
    fn settings_applied_channels(&self) -> Vec<mpsc::Sender<SettingsAppliedResponse>> {
        vec![self.settings_applied.clone()]
    }
    fn conversation_text_channels(&self) -> Vec<mpsc::Sender<ConversationTextResponse>> {
        vec![self.conversation_text.clone()]
    }
    fn user_started_speaking_channels(&self) -> Vec<mpsc::Sender<UserStartedSpeakingResponse>> {
        vec![self.user_started_speaking.clone()]
    }
    fn agent_thinking_channels(&self) -> Vec<mpsc::Sender<AgentThinkingResponse>> {
        vec![self.agent_thinking.clone()]
    }
    fn function_call_request_channels(&self) -> Vec<mpsc::Sender<FunctionCallRequest>> {
        vec![self.function_call_request.clone()]
    }
    fn agent_started_speaking_channels(&self) -> Vec<mpsc::Sender<AgentStartedSpeakingResponse>> {
        vec![self.agent_started_speaking.clone()]
    }
    fn agent_audio_done_channels(&self) -> Vec<mpsc::Sender<AgentAudioDoneResponse>> {
        vec![self.agent_audio_done.clone()]
    }
    fn prompt_updated_channels(&self) -> Vec<mpsc::Sender<PromptUpdatedResponse>> {
        vec![self.prompt_updated.clone()]
    }
    fn speak_updated_channels(&self) -> Vec<mpsc::Sender<SpeakUpdatedResponse>> {
        vec![self.speak_updated.clone()]
    }
    fn injection_refused_channels(&self) -> Vec<mpsc::Sender<InjectionRefusedResponse>> {
        vec![self.injection_refused.clone()]
    }
    fn warning_channels(&self) -> Vec<mpsc::Sender<WarningResponse>> {
        vec![self.warning.clone()]
    }
    fn audio_channels(&self) -> Vec<mpsc::Sender<Bytes>> {
        vec![self.audio.clone()]
    }
    fn close_channels(&self) -> Vec<mpsc::Sender<CloseResponse>> {
        vec![self.close.clone()]
    }
    fn error_channels(&self) -> Vec<mpsc::Sender<ErrorResponse>> {
        vec![self.error.clone()]
    }
    fn unhandled_channels(&self) -> Vec<mpsc::Sender<Bytes>> {
        vec![self.unhandled.clone()]
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    /// Subscribes to conversation text only.
    struct Transcriber(mpsc::Sender<ConversationTextResponse>);

    impl AgentChannels for Transcriber {
        fn conversation_text_channels(&self) -> Vec<mpsc::Sender<ConversationTextResponse>> {
            vec![self.0.clone()]
        }
    }

    fn text(content: &str) -> AgentMessage {
        AgentMessage::ConversationText(ConversationTextResponse {
            kind: "ConversationText".into(),
            role: "user".into(),
            content: content.into(),
        })
    }

    #[tokio::test]
    async fn test_partial_subscriber_merged_with_hub() {
        let (hub, mut hub_rx) = AgentChannelHub::new(4);
        let (tx, mut rx) = mpsc::channel(4);
        let sink = AgentChannelSink::from_subscribers(&[&hub, &Transcriber(tx)]);

        sink.deliver(Event::Message(text("hello")))
            .await
            .expect("deliver");
        sink.deliver(Event::Open(OpenResponse::default()))
            .await
            .expect("deliver");

        assert_eq!(hub_rx.conversation_text.recv().await.expect("hub").content, "hello");
        assert_eq!(rx.recv().await.expect("transcriber").content, "hello");
        assert!(hub_rx.open.recv().await.is_some());
    }

    #[tokio::test]
    async fn test_binary_is_agent_audio() {
        let (hub, mut rx) = AgentChannelHub::new(2);
        let sink = AgentChannelSink::from_subscribers(&[&hub]);

        sink.deliver(Event::Binary(Bytes::from_static(b"\x01\x02")))
            .await
            .expect("deliver");
        assert_eq!(rx.audio.recv().await.as_deref(), Some(&b"\x01\x02"[..]));
        assert!(rx.unhandled.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_unsubscribed_type_is_dropped() {
        let (tx, _rx) = mpsc::channel(1);
        let sink = AgentChannelSink::from_subscribers(&[&Transcriber(tx)]);

        sink.deliver(Event::Close(CloseResponse::default()))
            .await
            .expect("no subscribers is not an error");
    }
}
