//! Response fragments emitted by a generation stream.

use serde::Serialize;

use super::generation::FinishReason;
use super::message::Role;
use super::usage::Usage;

/// One piece of a generated response.
///
/// A fragment is either partial (incremental text, never turn-complete) or the
/// single turn-complete fragment that ends a generation. The two constructors
/// are the only way to build one, so the partial and turn-complete flags are
/// never both set.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ResponseFragment {
    pub role: Role,
    pub text: String,
    partial: bool,
    turn_complete: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<FinishReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

impl ResponseFragment {
    /// An incremental text delta.
    pub fn partial(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
            partial: true,
            turn_complete: false,
            finish_reason: None,
            usage: None,
        }
    }

    /// The final fragment of a turn, carrying the complete text.
    pub fn turn_complete(
        text: impl Into<String>,
        finish_reason: Option<FinishReason>,
        usage: Option<Usage>,
    ) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
            partial: false,
            turn_complete: true,
            finish_reason,
            usage,
        }
    }

    /// Incremental text; more fragments follow.
    pub fn is_partial(&self) -> bool {
        self.partial
    }

    /// The last fragment of the turn.
    pub fn is_turn_complete(&self) -> bool {
        self.turn_complete
    }
}
