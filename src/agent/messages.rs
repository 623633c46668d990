//! Voice agent inbound messages.

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};

use crate::router::MessageSet;

// ============================================================================
// Constants
// ============================================================================

pub const TYPE_WELCOME: &str = "Welcome";
pub const TYPE_SETTINGS_APPLIED: &str = "SettingsApplied";
pub const TYPE_CONVERSATION_TEXT: &str = "ConversationText";
pub const TYPE_USER_STARTED_SPEAKING: &str = "UserStartedSpeaking";
pub const TYPE_AGENT_THINKING: &str = "AgentThinking";
pub const TYPE_FUNCTION_CALL_REQUEST: &str = "FunctionCallRequest";
pub const TYPE_AGENT_STARTED_SPEAKING: &str = "AgentStartedSpeaking";
pub const TYPE_AGENT_AUDIO_DONE: &str = "AgentAudioDone";
pub const TYPE_PROMPT_UPDATED: &str = "PromptUpdated";
pub const TYPE_SPEAK_UPDATED: &str = "SpeakUpdated";
pub const TYPE_INJECTION_REFUSED: &str = "InjectionRefused";
pub const TYPE_WARNING: &str = "Warning";

// ============================================================================
// Session
// ============================================================================

/// First message of every session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WelcomeResponse {
    #[serde(rename = "type")]
    pub kind: String,
    pub request_id: String,
}

/// The `Settings` message was accepted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsAppliedResponse {
    #[serde(rename = "type")]
    pub kind: String,
}

/// `UpdatePrompt` was applied.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptUpdatedResponse {
    #[serde(rename = "type")]
    pub kind: String,
}

/// `UpdateSpeak` was applied.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeakUpdatedResponse {
    #[serde(rename = "type")]
    pub kind: String,
}

/// Non-fatal server notice.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WarningResponse {
    #[serde(rename = "type")]
    pub kind: String,
    pub description: String,
    pub code: String,
}

// ============================================================================
// Conversation
// ============================================================================

/// One conversation turn, as text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversationTextResponse {
    #[serde(rename = "type")]
    pub kind: String,
    /// `user` or `assistant`.
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserStartedSpeakingResponse {
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentThinkingResponse {
    #[serde(rename = "type")]
    pub kind: String,
    pub content: String,
}

/// Latencies, in seconds, of the turn about to be spoken.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentStartedSpeakingResponse {
    #[serde(rename = "type")]
    pub kind: String,
    pub total_latency: f64,
    pub tts_latency: f64,
    pub ttt_latency: f64,
}

/// All audio of the current turn has been sent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentAudioDoneResponse {
    #[serde(rename = "type")]
    pub kind: String,
}

/// An `InjectAgentMessage` arrived while the agent could not speak.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InjectionRefusedResponse {
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
}

// ============================================================================
// Function Calling
// ============================================================================

/// One requested function invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FunctionCall {
    pub id: String,
    pub name: String,
    /// JSON-encoded arguments.
    pub arguments: String,
    /// The client, not the server, must execute the function.
    pub client_side: bool,
}

/// The agent wants one or more functions called.
///
/// Client-side calls are answered with
/// [`FunctionCallResponse`](super::settings::FunctionCallResponse).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FunctionCallRequest {
    #[serde(rename = "type")]
    pub kind: String,
    pub functions: Vec<FunctionCall>,
}

// ============================================================================
// AgentMessage
// ============================================================================

/// Every typed message of the voice agent family.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentMessage {
    Welcome(WelcomeResponse),
    SettingsApplied(SettingsAppliedResponse),
    ConversationText(ConversationTextResponse),
    UserStartedSpeaking(UserStartedSpeakingResponse),
    AgentThinking(AgentThinkingResponse),
    FunctionCallRequest(FunctionCallRequest),
    AgentStartedSpeaking(AgentStartedSpeakingResponse),
    AgentAudioDone(AgentAudioDoneResponse),
    PromptUpdated(PromptUpdatedResponse),
    SpeakUpdated(SpeakUpdatedResponse),
    InjectionRefused(InjectionRefusedResponse),
    Warning(WarningResponse),
}

impl MessageSet for AgentMessage {
    const FAMILY: &'static str = "agent";

    fn decode(kind: &str, data: &[u8]) -> Option<serde_json::Result<Self>> {
        let decoded = match kind {
            TYPE_WELCOME => serde_json::from_slice(data).map(Self::Welcome),
            TYPE_SETTINGS_APPLIED => serde_json::from_slice(data).map(Self::SettingsApplied),
            TYPE_CONVERSATION_TEXT => serde_json::from_slice(data).map(Self::ConversationText),
            TYPE_USER_STARTED_SPEAKING => {
                serde_json::from_slice(data).map(Self::UserStartedSpeaking)
            }
            TYPE_AGENT_THINKING => serde_json::from_slice(data).map(Self::AgentThinking),
            TYPE_FUNCTION_CALL_REQUEST => {
                serde_json::from_slice(data).map(Self::FunctionCallRequest)
            }
            TYPE_AGENT_STARTED_SPEAKING => {
                serde_json::from_slice(data).map(Self::AgentStartedSpeaking)
            }
            TYPE_AGENT_AUDIO_DONE => serde_json::from_slice(data).map(Self::AgentAudioDone),
            TYPE_PROMPT_UPDATED => serde_json::from_slice(data).map(Self::PromptUpdated),
            TYPE_SPEAK_UPDATED => serde_json::from_slice(data).map(Self::SpeakUpdated),
            TYPE_INJECTION_REFUSED => serde_json::from_slice(data).map(Self::InjectionRefused),
            TYPE_WARNING => serde_json::from_slice(data).map(Self::Warning),
            _ => return None,
        };
        Some(decoded)
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::Welcome(_) => TYPE_WELCOME,
            Self::SettingsApplied(_) => TYPE_SETTINGS_APPLIED,
            Self::ConversationText(_) => TYPE_CONVERSATION_TEXT,
            Self::UserStartedSpeaking(_) => TYPE_USER_STARTED_SPEAKING,
            Self::AgentThinking(_) => TYPE_AGENT_THINKING,
            Self::FunctionCallRequest(_) => TYPE_FUNCTION_CALL_REQUEST,
            Self::AgentStartedSpeaking(_) => TYPE_AGENT_STARTED_SPEAKING,
            Self::AgentAudioDone(_) => TYPE_AGENT_AUDIO_DONE,
            Self::PromptUpdated(_) => TYPE_PROMPT_UPDATED,
            Self::SpeakUpdated(_) => TYPE_SPEAK_UPDATED,
            Self::InjectionRefused(_) => TYPE_INJECTION_REFUSED,
            Self::Warning(_) => TYPE_WARNING,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
