//! Live transcription query options.
//!
//! Every option becomes one query parameter of the `/v1/listen` URL.
//!
//! # Example
//!
//! ```
//! use voxstream::listen::ListenOptions;
//!
//! let options = ListenOptions::new()
//!     .with_model("nova-3")
//!     .with_encoding("linear16", 16_000)
//!     .with_interim_results()
//!     .with_keyword("voxstream");
//!
//! let query = options.to_query();
//! assert!(query.contains(&("interim_results".to_string(), "true".to_string())));
//! ```

// ============================================================================
// ListenOptions
// ============================================================================

/// Transcription stream configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListenOptions {
    /// Model name.
    pub model: Option<String>,

    /// BCP-47 language tag.
    pub language: Option<String>,

    /// Raw audio encoding (e.g. `linear16`).
    pub encoding: Option<String>,

    /// Sample rate in Hz; required with `encoding`.
    pub sample_rate: Option<u32>,

    /// Number of interleaved audio channels.
    pub channels: Option<u32>,

    /// Emit interim (non-final) results.
    pub interim_results: bool,

    /// Add punctuation.
    pub punctuate: bool,

    /// Apply smart formatting.
    pub smart_format: bool,

    /// Emit `SpeechStarted` events.
    pub vad_events: bool,

    /// Silence in milliseconds that ends an utterance.
    pub utterance_end_ms: Option<u32>,

    /// Silence in milliseconds that finalizes a segment.
    pub endpointing: Option<u32>,

    /// Boosted keywords.
    pub keywords: Vec<String>,

    /// Additional raw query parameters.
    pub extra: Vec<(String, String)>,
}

// ============================================================================
// Builder Methods
// ============================================================================

impl ListenOptions {
    /// Creates empty options; the service picks its defaults.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the model.
    #[inline]
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Sets the language.
    #[inline]
    #[must_use]
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    /// Sets the raw audio encoding and sample rate.
    #[inline]
    #[must_use]
    pub fn with_encoding(mut self, encoding: impl Into<String>, sample_rate: u32) -> Self {
        self.encoding = Some(encoding.into());
        self.sample_rate = Some(sample_rate);
        self
    }

    /// Sets the channel count.
    #[inline]
    #[must_use]
    pub fn with_channels(mut self, channels: u32) -> Self {
        self.channels = Some(channels);
        self
    }

    /// Enables interim results.
    #[inline]
    #[must_use]
    pub fn with_interim_results(mut self) -> Self {
        self.interim_results = true;
        self
    }

    /// Enables punctuation.
    #[inline]
    #[must_use]
    pub fn with_punctuate(mut self) -> Self {
        self.punctuate = true;
        self
    }

    /// Enables smart formatting.
    #[inline]
    #[must_use]
    pub fn with_smart_format(mut self) -> Self {
        self.smart_format = true;
        self
    }

    /// Enables voice activity events.
    #[inline]
    #[must_use]
    pub fn with_vad_events(mut self) -> Self {
        self.vad_events = true;
        self
    }

    /// Sets the utterance-end silence window.
    #[inline]
    #[must_use]
    pub fn with_utterance_end_ms(mut self, ms: u32) -> Self {
        self.utterance_end_ms = Some(ms);
        self
    }

    /// Sets the endpointing silence window.
    #[inline]
    #[must_use]
    pub fn with_endpointing(mut self, ms: u32) -> Self {
        self.endpointing = Some(ms);
        self
    }

    /// Adds a boosted keyword.
    #[inline]
    #[must_use]
    pub fn with_keyword(mut self, keyword: impl Into<String>) -> Self {
        self.keywords.push(keyword.into());
        self
    }

    /// Adds a raw query parameter.
    #[inline]
    #[must_use]
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.push((name.into(), value.into()));
        self
    }
}

// ============================================================================
// Conversion Methods
// ============================================================================

impl ListenOptions {
    /// Converts options to query pairs, in a stable order.
    #[must_use]
    pub fn to_query(&self) -> Vec<(String, String)> {
        let mut query = Vec::with_capacity(12 + self.keywords.len() + self.extra.len());
        let mut push = |name: &str, value: String| query.push((name.to_string(), value));

        if let Some(model) = &self.model {
            push("model", model.clone());
        }
        if let Some(language) = &self.language {
            push("language", language.clone());
        }
        if let Some(encoding) = &self.encoding {
            push("encoding", encoding.clone());
        }
        if let Some(rate) = self.sample_rate {
            push("sample_rate", rate.to_string());
        }
        if let Some(channels) = self.channels {
            push("channels", channels.to_string());
        }
        if self.interim_results {
            push("interim_results", "true".to_string());
        }
        if self.punctuate {
            push("punctuate", "true".to_string());
        }
        if self.smart_format {
            push("smart_format", "true".to_string());
        }
        if self.vad_events {
            push("vad_events", "true".to_string());
        }
        if let Some(ms) = self.utterance_end_ms {
            push("utterance_end_ms", ms.to_string());
        }
        if let Some(ms) = self.endpointing {
            push("endpointing", ms.to_string());
        }
        for keyword in &self.keywords {
            push("keywords", keyword.clone());
        }

        query.extend(self.extra.iter().cloned());
        query
    }

    /// Validates the options.
    ///
    /// # Errors
    ///
    /// Returns an error message if validation fails.
    pub fn validate(&self) -> Result<(), String> {
        if self.encoding.is_some() && self.sample_rate.is_none_or(|rate| rate == 0) {
            return Err("Raw encoding requires a non-zero sample rate".to_string());
        }
        if self.channels == Some(0) {
            return Err("Channel count must be greater than zero".to_string());
        }
        if self.utterance_end_ms.is_some() && !self.interim_results {
            return Err("utterance_end_ms requires interim results".to_string());
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
