//! Folding a fragment stream into a single result.

use futures::StreamExt;

use crate::bridge::FragmentStream;
use crate::error::CopilotError;
use crate::types::GenerationResult;

/// Drain `stream` into a [`GenerationResult`].
///
/// Partial texts are concatenated; a turn-complete fragment's text replaces
/// them, since it carries the whole message. The first error is returned.
pub async fn collect_stream(mut stream: FragmentStream) -> Result<GenerationResult, CopilotError> {
    let mut result = GenerationResult::default();

    while let Some(fragment) = stream.next().await {
        let fragment = fragment?;
        if fragment.is_turn_complete() {
            if !fragment.text.is_empty() || result.text.is_empty() {
                result.text = fragment.text;
            }
            result.finish_reason = fragment.finish_reason;
            result.usage = fragment.usage;
        } else {
            result.text.push_str(&fragment.text);
        }
    }

    Ok(result)
}
