//! Chat-completions wire format: request bodies and response shapes.

use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::types::{
    ContentPart, FinishReason, GenerationRequest, GenerationSettings, ModelMessage, Usage,
};

/// Build the JSON body for `POST /chat/completions`.
pub fn build_request_body(model: &str, request: &GenerationRequest, stream: bool) -> Value {
    let messages = request
        .messages
        .iter()
        .map(message_to_wire)
        .collect::<Vec<_>>();

    let mut obj = Map::new();
    obj.insert("model".into(), model.into());
    obj.insert("messages".into(), messages.into());
    obj.insert("stream".into(), stream.into());
    insert_settings(&mut obj, &request.settings);

    if !request.tools.is_empty() {
        let tool_defs: Vec<Value> = request
            .tools
            .iter()
            .map(|t| {
                json!({
                    "type": "function",
                    "function": {
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.parameters,
                    }
                })
            })
            .collect();
        obj.insert("tools".into(), tool_defs.into());
    }

    Value::Object(obj)
}

fn insert_settings(obj: &mut Map<String, Value>, settings: &GenerationSettings) {
    if let Some(max) = settings.max_tokens {
        obj.insert("max_tokens".into(), max.into());
    }
    if let Some(temp) = settings.temperature {
        obj.insert("temperature".into(), temp.into());
    }
    if let Some(top_p) = settings.top_p {
        obj.insert("top_p".into(), top_p.into());
    }
    if let Some(ref stops) = settings.stop_sequences {
        obj.insert("stop".into(), json!(stops));
    }
    if let Some(pp) = settings.presence_penalty {
        obj.insert("presence_penalty".into(), pp.into());
    }
    if let Some(fp) = settings.frequency_penalty {
        obj.insert("frequency_penalty".into(), fp.into());
    }
}

/// Convert one message. A lone text part becomes a plain string; anything
/// else becomes a parts array. Messages without content omit the field.
pub fn message_to_wire(msg: &ModelMessage) -> Value {
    let role = msg.role.as_str();

    match msg.content.as_slice() {
        [] => json!({ "role": role }),
        [ContentPart::Text { text }] if text.is_empty() => json!({ "role": role }),
        [ContentPart::Text { text }] => json!({ "role": role, "content": text }),
        parts => {
            let parts: Vec<Value> = parts
                .iter()
                .filter_map(|part| match part {
                    ContentPart::Text { text } if text.is_empty() => None,
                    ContentPart::Text { text } => Some(json!({
                        "type": "text",
                        "text": text,
                    })),
                    ContentPart::Image(img) => Some(json!({
                        "type": "image_url",
                        "image_url": { "url": format!("data:{};base64,{}", img.mime_type, img.data) }
                    })),
                })
                .collect();
            json!({ "role": role, "content": parts })
        }
    }
}

// Response types

#[derive(Debug, Deserialize)]
pub struct ChatCompletionResponse {
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
    pub usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
pub struct ChatChoice {
    pub message: ChatResponseMessage,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChatResponseMessage {
    pub content: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct WireUsage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
    #[serde(default)]
    pub total_tokens: u32,
}

impl From<WireUsage> for Usage {
    fn from(u: WireUsage) -> Self {
        Usage {
            input_tokens: u.prompt_tokens,
            output_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ChatCompletionChunk {
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
    pub usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
pub struct ChunkChoice {
    #[serde(default)]
    pub delta: ChunkDelta,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ChunkDelta {
    pub content: Option<String>,
}

impl ChatCompletionResponse {
    /// Text, finish reason and usage of the first choice.
    pub fn into_parts(self) -> (String, Option<FinishReason>, Option<Usage>) {
        let usage = self.usage.map(Usage::from);
        match self.choices.into_iter().next() {
            Some(choice) => (
                choice.message.content.unwrap_or_default(),
                choice
                    .finish_reason
                    .as_deref()
                    .filter(|r| !r.is_empty())
                    .map(FinishReason::from_wire),
                usage,
            ),
            None => (String::new(), None, usage),
        }
    }
}
