//! Voice agent.
//!
//! User audio goes up as binary frames, agent speech comes back as binary
//! frames, and conversation events travel as JSON text frames in both
//! directions. Every connection starts with a `Settings` message.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `callback` | Callback consumer trait and logging default |
//! | `channels` | Channel consumer trait, merged sink and default hub |
//! | `client` | [`AgentClient`] |
//! | `handler` | Protocol hooks (URL, settings handshake, keepalive) |
//! | `messages` | Inbound message schemas |
//! | `settings` | `Settings` and on-demand outbound messages |

// ============================================================================
// Submodules
// ============================================================================

/// Callback consumer.
pub mod callback;

/// Channel consumer.
pub mod channels;

/// High-level client.
pub mod client;

/// Protocol hooks.
pub mod handler;

/// Inbound messages.
pub mod messages;

/// Outbound messages.
pub mod settings;

// ============================================================================
// Re-exports
// ============================================================================

pub use callback::{AgentCallback, LoggingAgentCallback};
pub use channels::{AgentChannelHub, AgentChannelSink, AgentChannels, AgentReceivers};
pub use client::AgentClient;
pub use handler::{AGENT_PATH, AgentHandler};
pub use messages::{
    AgentAudioDoneResponse, AgentMessage, AgentStartedSpeakingResponse, AgentThinkingResponse,
    ConversationTextResponse, FunctionCall, FunctionCallRequest, InjectionRefusedResponse,
    PromptUpdatedResponse, SettingsAppliedResponse, SpeakUpdatedResponse,
    UserStartedSpeakingResponse, WarningResponse, WelcomeResponse,
};
pub use settings::{
    AgentPipeline, AgentSettings, AudioFormat, AudioSettings, FunctionCallResponse,
    FunctionDefinition, InjectAgentMessage, ListenSettings, Provider, SpeakSettings,
    ThinkSettings, UpdatePrompt, UpdateSpeak,
};
