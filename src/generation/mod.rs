//! Generation orchestration: the Copilot client, prompt flattening and
//! stream collection.

pub mod collect;
pub mod llm;
pub mod prompt;

pub use collect::collect_stream;
pub use llm::CopilotLlm;
pub use prompt::{extract_text, format_prompt};
