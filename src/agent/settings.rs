//! Voice agent outbound messages.
//!
//! [`AgentSettings`] is sent once per connection, right after the socket
//! opens. The remaining types are sent on demand through
//! [`AgentClient`](super::AgentClient).
//!
//! # Example
//!
//! ```
//! use voxstream::agent::{AgentSettings, Provider};
//!
//! let settings = AgentSettings::new()
//!     .with_prompt("You are a terse assistant.")
//!     .with_greeting("Hi!")
//!     .with_speak_provider(Provider::new("deepgram").with_model("aura-2-thalia-en"));
//!
//! let json = serde_json::to_value(&settings).unwrap();
//! assert_eq!(json["type"], "Settings");
//! assert_eq!(json["agent"]["greeting"], "Hi!");
//! ```

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ============================================================================
// Constants
// ============================================================================

pub const TYPE_SETTINGS: &str = "Settings";
pub const TYPE_UPDATE_PROMPT: &str = "UpdatePrompt";
pub const TYPE_UPDATE_SPEAK: &str = "UpdateSpeak";
pub const TYPE_INJECT_AGENT_MESSAGE: &str = "InjectAgentMessage";
pub const TYPE_FUNCTION_CALL_RESPONSE: &str = "FunctionCallResponse";

/// Default input and output encoding.
pub const DEFAULT_ENCODING: &str = "linear16";

/// Default input and output sample rate in Hz.
pub const DEFAULT_SAMPLE_RATE: u32 = 24_000;

// ============================================================================
// Provider
// ============================================================================

/// A listen, think or speak provider.
///
/// Provider-specific keys go into `extra` and are flattened on the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Provider {
    #[serde(rename = "type")]
    pub kind: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Provider {
    #[must_use]
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Adds a provider-specific key.
    #[must_use]
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

// ============================================================================
// Audio
// ============================================================================

/// Raw audio format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioFormat {
    pub encoding: String,
    pub sample_rate: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container: Option<String>,
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self {
            encoding: DEFAULT_ENCODING.to_string(),
            sample_rate: DEFAULT_SAMPLE_RATE,
            container: None,
        }
    }
}

/// Audio sent by the client and audio spoken back by the agent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioSettings {
    pub input: AudioFormat,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<AudioFormat>,
}

// ============================================================================
// Agent
// ============================================================================

/// A function the agent may call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDefinition {
    pub name: String,
    pub description: String,
    /// JSON schema of the arguments.
    pub parameters: Value,
    /// Server-side endpoint; absent for client-side functions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListenSettings {
    pub provider: Provider,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThinkSettings {
    pub provider: Provider,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub functions: Vec<FunctionDefinition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeakSettings {
    pub provider: Provider,
}

/// Listen, think and speak pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentPipeline {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    pub listen: ListenSettings,
    pub think: ThinkSettings,
    pub speak: SpeakSettings,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub greeting: Option<String>,
}

impl Default for AgentPipeline {
    fn default() -> Self {
        Self {
            language: None,
            listen: ListenSettings {
                provider: Provider::new("deepgram").with_model("nova-3"),
            },
            think: ThinkSettings {
                provider: Provider::new("open_ai").with_model("gpt-4o-mini"),
                prompt: None,
                functions: Vec::new(),
            },
            speak: SpeakSettings {
                provider: Provider::new("deepgram").with_model("aura-2-thalia-en"),
            },
            greeting: None,
        }
    }
}

// ============================================================================
// AgentSettings
// ============================================================================

/// The `Settings` message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSettings {
    #[serde(rename = "type")]
    pub kind: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub experimental: bool,

    pub audio: AudioSettings,

    pub agent: AgentPipeline,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            kind: TYPE_SETTINGS.to_string(),
            tags: Vec::new(),
            experimental: false,
            audio: AudioSettings {
                input: AudioFormat::default(),
                output: Some(AudioFormat::default()),
            },
            agent: AgentPipeline::default(),
        }
    }
}

impl AgentSettings {
    /// Creates settings with linear16 audio at 24 kHz both ways.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_input_audio(mut self, encoding: impl Into<String>, sample_rate: u32) -> Self {
        self.audio.input = AudioFormat {
            encoding: encoding.into(),
            sample_rate,
            container: None,
        };
        self
    }

    /// Sets the agent's audio format; `None` disables spoken output.
    #[must_use]
    pub fn with_output_audio(mut self, output: Option<AudioFormat>) -> Self {
        self.audio.output = output;
        self
    }

    #[must_use]
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.agent.language = Some(language.into());
        self
    }

    #[must_use]
    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.agent.think.prompt = Some(prompt.into());
        self
    }

    #[must_use]
    pub fn with_greeting(mut self, greeting: impl Into<String>) -> Self {
        self.agent.greeting = Some(greeting.into());
        self
    }

    #[must_use]
    pub fn with_listen_provider(mut self, provider: Provider) -> Self {
        self.agent.listen.provider = provider;
        self
    }

    #[must_use]
    pub fn with_think_provider(mut self, provider: Provider) -> Self {
        self.agent.think.provider = provider;
        self
    }

    #[must_use]
    pub fn with_speak_provider(mut self, provider: Provider) -> Self {
        self.agent.speak.provider = provider;
        self
    }

    #[must_use]
    pub fn with_function(mut self, function: FunctionDefinition) -> Self {
        self.agent.think.functions.push(function);
        self
    }

    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }
}

// ============================================================================
// On-demand Messages
// ============================================================================

/// Replaces the system prompt mid-conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdatePrompt {
    #[serde(rename = "type")]
    kind: &'static str,
    pub prompt: String,
}

impl UpdatePrompt {
    #[must_use]
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            kind: TYPE_UPDATE_PROMPT,
            prompt: prompt.into(),
        }
    }
}

/// Switches the speak provider mid-conversation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpdateSpeak {
    #[serde(rename = "type")]
    kind: &'static str,
    pub speak: SpeakSettings,
}

impl UpdateSpeak {
    #[must_use]
    pub fn new(provider: Provider) -> Self {
        Self {
            kind: TYPE_UPDATE_SPEAK,
            speak: SpeakSettings { provider },
        }
    }
}

/// Makes the agent say `message` verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InjectAgentMessage {
    #[serde(rename = "type")]
    kind: &'static str,
    pub message: String,
}

impl InjectAgentMessage {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            kind: TYPE_INJECT_AGENT_MESSAGE,
            message: message.into(),
        }
    }
}

/// Result of a client-side function call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FunctionCallResponse {
    #[serde(rename = "type")]
    kind: &'static str,
    /// Id from the matching [`FunctionCall`](super::messages::FunctionCall).
    pub id: String,
    pub name: String,
    pub content: String,
}

impl FunctionCallResponse {
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            kind: TYPE_FUNCTION_CALL_RESPONSE,
            id: id.into(),
            name: name.into(),
            content: content.into(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
