//! Generation requests, settings and related enums.

use bon::Builder;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::message::ModelMessage;
use super::usage::Usage;

/// Settings controlling text generation.
///
/// ```
/// use copilot_llm::types::GenerationSettings;
///
/// let settings = GenerationSettings::builder()
///     .temperature(0.2)
///     .max_tokens(256)
///     .build();
/// assert_eq!(settings.max_tokens, Some(256));
/// ```
#[derive(Debug, Clone, Builder, Serialize, Deserialize, Default, PartialEq)]
pub struct GenerationSettings {
    pub max_tokens: Option<u32>,
    pub temperature: Option<f64>,
    pub top_p: Option<f64>,
    pub stop_sequences: Option<Vec<String>>,
    pub presence_penalty: Option<f64>,
    pub frequency_penalty: Option<f64>,
}

/// Tool definition forwarded to the completions API.
///
/// `parameters` is an already-built JSON schema; it is passed through untouched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// A single generation request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationRequest {
    pub messages: Vec<ModelMessage>,
    pub settings: GenerationSettings,
    /// Overrides the configured model for this request only.
    pub model: Option<String>,
    pub tools: Vec<ToolDefinition>,
}

impl GenerationRequest {
    pub fn new(messages: Vec<ModelMessage>) -> Self {
        Self {
            messages,
            ..Default::default()
        }
    }

    pub fn with_settings(mut self, settings: GenerationSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }
}

/// Why generation finished.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ToolCalls,
    ContentFilter,
    Other,
}

impl FinishReason {
    /// Map a wire `finish_reason`; unknown values become [`FinishReason::Other`].
    pub fn from_wire(reason: &str) -> Self {
        reason.parse().unwrap_or(Self::Other)
    }
}

/// Final result after consuming a fragment stream.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationResult {
    pub text: String,
    pub finish_reason: Option<FinishReason>,
    pub usage: Option<Usage>,
}
