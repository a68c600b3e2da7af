//! Copilot chat-completions transport: HTTP plumbing and wire conversion.

pub mod chat;
pub mod http;
