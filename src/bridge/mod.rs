//! Streaming response bridge.
//!
//! Transports (a push session or an SSE body) produce [`BridgeEvent`]s; the
//! merge loop in [`bridge_events`] turns them into one ordered, cancellable
//! stream of [`ResponseFragment`]s with a single terminal transition.

pub mod push;
pub mod queue;
pub mod sse;

pub use push::{
    listener_for, push_fragments, AssistantSession, EventListener, SessionEvent, Subscription,
};
pub use queue::{event_queue, Delivery, EventReceiver, EventSender};
pub use sse::{sse_events, ChunkDecoder, LineDecoder};

use futures::stream::BoxStream;
use futures::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::CopilotError;
use crate::types::{FinishReason, ResponseFragment, Usage};
use crate::util::cancel::until_cancelled;

/// The caller-facing fragment stream.
pub type FragmentStream = BoxStream<'static, Result<ResponseFragment, CopilotError>>;

/// A transport-level event on its way to the merge loop.
#[derive(Debug)]
pub enum BridgeEvent {
    /// Incremental text.
    Delta(String),
    /// The completed message.
    FinalMessage {
        text: String,
        finish_reason: Option<FinishReason>,
        usage: Option<Usage>,
    },
    /// The source finished without a final message.
    Idle,
    /// Out-of-band failure from the source.
    Error(CopilotError),
}

impl BridgeEvent {
    /// Whether this event ends the stream.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Delta(_))
    }
}

/// Merge transport events into response fragments.
///
/// - `Delta` becomes a partial fragment when `streaming` is set (empty deltas
///   are skipped) and is ignored otherwise.
/// - `FinalMessage` becomes the one turn-complete fragment.
/// - `Idle` ends the stream quietly, `Error` yields the error.
/// - Cancellation yields [`CopilotError::Cancelled`] and takes priority over
///   events already queued.
///
/// Nothing is yielded after a terminal transition. Dropping the returned
/// stream drops `events`, which releases the underlying transport.
pub fn bridge_events<S>(events: S, streaming: bool, cancel: CancellationToken) -> FragmentStream
where
    S: Stream<Item = BridgeEvent> + Send + 'static,
{
    let stream = async_stream::stream! {
        futures::pin_mut!(events);
        loop {
            let event = match until_cancelled(&cancel, events.next()).await {
                None => {
                    debug!("Generation cancelled");
                    yield Err(CopilotError::Cancelled);
                    break;
                }
                Some(None) => {
                    debug!("Event source ended without a terminal event");
                    break;
                }
                Some(Some(event)) => event,
            };

            match event {
                BridgeEvent::Delta(text) => {
                    if streaming && !text.is_empty() {
                        yield Ok(ResponseFragment::partial(text));
                    }
                }
                BridgeEvent::FinalMessage { text, finish_reason, usage } => {
                    yield Ok(ResponseFragment::turn_complete(text, finish_reason, usage));
                    break;
                }
                BridgeEvent::Idle => break,
                BridgeEvent::Error(error) => {
                    yield Err(error);
                    break;
                }
            }
        }
    };
    Box::pin(stream)
}
