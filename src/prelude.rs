//! Convenience re-exports for common use.

pub use crate::auth::{AuthError, DeviceAuthClient, DeviceGrant};
pub use crate::bridge::{AssistantSession, FragmentStream, SessionEvent};
pub use crate::config::CopilotConfig;
pub use crate::error::{CopilotError, Result};
pub use crate::generation::{collect_stream, CopilotLlm};
pub use crate::types::{
    ContentPart, FinishReason, GenerationRequest, GenerationResult, GenerationSettings,
    ModelMessage, ResponseFragment, Role, Usage,
};
