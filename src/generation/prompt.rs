//! Flattening a conversation into a single prompt for push sessions.

use crate::types::{ModelMessage, Role};

/// Render messages as one prompt string.
///
/// A lone message is sent as its bare text. Longer conversations become
/// `Label: text` blocks separated by blank lines, skipping messages with no
/// text.
///
/// ```
/// use copilot_llm::generation::format_prompt;
/// use copilot_llm::types::ModelMessage;
///
/// let prompt = format_prompt(&[ModelMessage::user("Hello"), ModelMessage::assistant("Hi there!")]);
/// assert_eq!(prompt, "User: Hello\n\nAssistant: Hi there!");
/// ```
pub fn format_prompt(messages: &[ModelMessage]) -> String {
    if let [only] = messages {
        return extract_text(only);
    }
    messages
        .iter()
        .filter_map(|message| {
            let text = extract_text(message);
            (!text.is_empty()).then(|| format!("{}: {}", role_label(message.role), text))
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Non-empty text parts joined by newlines.
pub fn extract_text(message: &ModelMessage) -> String {
    message
        .text_parts()
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn role_label(role: Role) -> &'static str {
    match role {
        Role::System => "System",
        Role::User => "User",
        Role::Assistant => "Assistant",
        Role::Tool => "Tool",
    }
}
