//! Generation and wrapper configuration

use serde::{Deserialize, Serialize};

/// Default sampling parameters a backend applies when the caller omits them
///
/// API arguments supplied with a query take precedence over these values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Maximum number of tokens to generate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Randomness (0.0-2.0, higher = more random)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Nucleus sampling threshold
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    /// Stop generation when these sequences are encountered
    #[serde(rename = "stop", skip_serializing_if = "Option::is_none")]
    pub stop_sequences: Option<Vec<String>>,
}

impl GenerationConfig {
    /// Create a new configuration with the specified max tokens
    pub fn new(max_tokens: u32) -> Self {
        Self {
            max_tokens: Some(max_tokens),
            ..Self::default()
        }
    }

    /// Set the temperature
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set the top_p value
    pub fn with_top_p(mut self, top_p: f32) -> Self {
        self.top_p = Some(top_p);
        self
    }

    /// Set stop sequences
    pub fn with_stop_sequences(mut self, stop_sequences: Vec<String>) -> Self {
        self.stop_sequences = Some(stop_sequences);
        self
    }
}

/// Settings shared by the four operations of a chat-based wrapper
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatOptions {
    /// Optional system template; `{KEY}` placeholders take prompt argument values
    pub system: Option<String>,
    /// Corrective re-asks allowed when structured output fails to validate
    pub object_retries: usize,
}

impl ChatOptions {
    pub const DEFAULT: ChatOptions = ChatOptions {
        system: None,
        object_retries: 1,
    };

    pub fn new() -> Self {
        Self::DEFAULT
    }

    /// Set the system template
    pub fn with_system(mut self, template: impl Into<String>) -> Self {
        self.system = Some(template.into());
        self
    }

    /// Set the structured-output retry budget
    pub fn with_object_retries(mut self, retries: usize) -> Self {
        self.object_retries = retries;
        self
    }
}

impl Default for ChatOptions {
    fn default() -> Self {
        Self::DEFAULT
    }
}
