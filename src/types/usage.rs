//! Token usage counters.

use serde::{Deserialize, Serialize};

/// Token usage for a generation, as last reported by the server.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub total_tokens: u32,
}
