//! Pull transport: decode a chat-completions SSE body into bridge events.

use std::fmt::Display;

use futures::{Stream, StreamExt};
use tracing::debug;

use super::BridgeEvent;
use crate::error::CopilotError;
use crate::provider::chat::ChatCompletionChunk;
use crate::provider::http::{parse_sse_data, SseData};
use crate::types::{FinishReason, Usage};

/// Splits a byte stream into trimmed lines, buffering partial lines across
/// reads.
#[derive(Debug, Default)]
pub struct LineDecoder {
    buffer: Vec<u8>,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed bytes, returning every line completed by them.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(bytes);
        let mut lines = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            lines.push(String::from_utf8_lossy(&line).trim().to_string());
        }
        lines
    }

    /// Whatever is left once the body ends without a trailing newline.
    pub fn finish(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.buffer);
        let line = String::from_utf8_lossy(&rest).trim().to_string();
        (!line.is_empty()).then_some(line)
    }
}

/// Turns SSE lines into bridge events.
///
/// A chunk carrying `finish_reason` is held back; the final message (with all
/// text seen so far and the latest usage) is released on `[DONE]` or end of
/// body. Without a finish reason the stream ends as [`BridgeEvent::Idle`].
#[derive(Debug, Default)]
pub struct ChunkDecoder {
    text: String,
    usage: Option<Usage>,
    pending_finish: Option<FinishReason>,
    done: bool,
}

impl ChunkDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Decode one trimmed line. Malformed frames are skipped.
    pub fn decode_line(&mut self, line: &str) -> Option<BridgeEvent> {
        if self.done {
            return None;
        }
        match parse_sse_data(line)? {
            SseData::Done => Some(self.terminal()),
            SseData::Data(data) => {
                let chunk = match serde_json::from_str::<ChatCompletionChunk>(data) {
                    Ok(chunk) => chunk,
                    Err(error) => {
                        debug!(error = %error, "Skipping malformed SSE frame");
                        return None;
                    }
                };
                if let Some(usage) = chunk.usage {
                    self.usage = Some(usage.into());
                }
                let choice = chunk.choices.into_iter().next()?;
                if let Some(reason) = choice.finish_reason.as_deref().filter(|r| !r.is_empty()) {
                    self.pending_finish = Some(FinishReason::from_wire(reason));
                }
                let content = choice.delta.content.filter(|c| !c.is_empty())?;
                self.text.push_str(&content);
                Some(BridgeEvent::Delta(content))
            }
        }
    }

    /// The terminal event at end of body, unless one was already produced.
    pub fn finish(&mut self) -> Option<BridgeEvent> {
        (!self.done).then(|| self.terminal())
    }

    fn terminal(&mut self) -> BridgeEvent {
        self.done = true;
        match self.pending_finish.take() {
            Some(finish_reason) => BridgeEvent::FinalMessage {
                text: std::mem::take(&mut self.text),
                finish_reason: Some(finish_reason),
                usage: self.usage.take(),
            },
            None => BridgeEvent::Idle,
        }
    }
}

/// Decode an SSE byte stream into bridge events.
///
/// A read failure ends the stream with [`BridgeEvent::Error`].
pub fn sse_events<S, B, E>(body: S) -> impl Stream<Item = BridgeEvent> + Send + 'static
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Display + Send + 'static,
{
    async_stream::stream! {
        futures::pin_mut!(body);
        let mut lines = LineDecoder::new();
        let mut decoder = ChunkDecoder::new();

        'read: while let Some(chunk) = body.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(error) => {
                    debug!(error = %error, "SSE body read failed");
                    yield BridgeEvent::Error(CopilotError::Stream(error.to_string()));
                    return;
                }
            };
            for line in lines.push(chunk.as_ref()) {
                if let Some(event) = decoder.decode_line(&line) {
                    yield event;
                    if decoder.is_done() {
                        break 'read;
                    }
                }
            }
        }

        if let Some(line) = lines.finish() {
            if let Some(event) = decoder.decode_line(&line) {
                yield event;
            }
        }
        if let Some(event) = decoder.finish() {
            yield event;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn line_decoder_joins_split_reads() {
        let mut lines = LineDecoder::new();
        assert!(lines.push(b"data: {\"a\"").is_empty());
        assert_eq!(lines.push(b":1}\r\ndata: [DO"), vec!["data: {\"a\":1}"]);
        assert_eq!(lines.push(b"NE]\n\n"), vec!["data: [DONE]", ""]);
        assert_eq!(lines.finish(), None);
    }

    #[test]
    fn line_decoder_keeps_multibyte_text_split_across_reads() {
        let mut lines = LineDecoder::new();
        let bytes = "data: é\n".as_bytes();
        assert!(lines.push(&bytes[..7]).is_empty());
        assert_eq!(lines.push(&bytes[7..]), vec!["data: é"]);
    }

    #[test]
    fn finish_reason_is_held_until_done() {
        let mut decoder = ChunkDecoder::new();
        assert!(matches!(
            decoder.decode_line(r#"data: {"choices":[{"delta":{"content":"Hi"}}]}"#),
            Some(BridgeEvent::Delta(t)) if t == "Hi"
        ));
        assert!(decoder
            .decode_line(r#"data: {"choices":[{"delta":{},"finish_reason":"stop"}],"usage":{"prompt_tokens":1,"completion_tokens":2,"total_tokens":3}}"#)
            .is_none());
        match decoder.decode_line("data: [DONE]") {
            Some(BridgeEvent::FinalMessage {
                text,
                finish_reason,
                usage,
            }) => {
                assert_eq!(text, "Hi");
                assert_eq!(finish_reason, Some(FinishReason::Stop));
                assert_eq!(usage.map(|u| u.total_tokens), Some(3));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(decoder.finish().is_none());
    }

    #[test]
    fn done_without_finish_reason_is_idle() {
        let mut decoder = ChunkDecoder::new();
        assert!(matches!(
            decoder.decode_line("data: [DONE]"),
            Some(BridgeEvent::Idle)
        ));
        assert!(decoder.decode_line("data: [DONE]").is_none());
    }

    #[test]
    fn malformed_and_non_data_lines_are_skipped() {
        let mut decoder = ChunkDecoder::new();
        assert!(decoder.decode_line("data: {not json").is_none());
        assert!(decoder.decode_line("event: message").is_none());
        assert!(decoder.decode_line("").is_none());
        assert!(!decoder.is_done());
    }
}
