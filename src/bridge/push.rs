//! Push transport: a caller-owned assistant session that reports events
//! through callbacks.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::queue::{event_queue, Delivery, EventSender};
use super::{bridge_events, BridgeEvent, FragmentStream};
use crate::error::CopilotError;
use crate::util::cancel::until_cancelled;

/// An event reported by a push session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// `assistant.message_delta`
    MessageDelta(String),
    /// `assistant.message`, carrying the whole message.
    Message(String),
    /// `session.idle`
    Idle,
    /// `session.error`
    Error(String),
    /// Any other event type; ignored by the bridge.
    Other(String),
}

impl SessionEvent {
    /// Parse the session wire shape `{"type": ..., "data": {...}}`.
    ///
    /// ```
    /// use copilot_llm::bridge::SessionEvent;
    /// use serde_json::json;
    ///
    /// let event = SessionEvent::from_json(&json!({
    ///     "type": "assistant.message_delta",
    ///     "data": { "deltaContent": "Hel" }
    /// }));
    /// assert_eq!(event, SessionEvent::MessageDelta("Hel".into()));
    /// ```
    pub fn from_json(value: &Value) -> Self {
        let kind = value.get("type").and_then(Value::as_str).unwrap_or_default();
        let data_str = |key: &str| {
            value
                .get("data")
                .and_then(|data| data.get(key))
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        match kind {
            "assistant.message_delta" => Self::MessageDelta(data_str("deltaContent")),
            "assistant.message" => Self::Message(data_str("content")),
            "session.idle" => Self::Idle,
            "session.error" => Self::Error(data_str("message")),
            other => Self::Other(other.to_string()),
        }
    }

    /// The bridge event this maps to, if any.
    pub fn into_bridge_event(self) -> Option<BridgeEvent> {
        match self {
            Self::MessageDelta(text) => Some(BridgeEvent::Delta(text)),
            Self::Message(text) => Some(BridgeEvent::FinalMessage {
                text,
                finish_reason: None,
                usage: None,
            }),
            Self::Idle => Some(BridgeEvent::Idle),
            Self::Error(message) => Some(BridgeEvent::Error(CopilotError::Upstream(message))),
            Self::Other(_) => None,
        }
    }
}

/// Callback a session invokes for each event, on its own thread or task.
pub type EventListener = Arc<dyn Fn(SessionEvent) + Send + Sync>;

/// Keeps a listener registered; dropping it unsubscribes.
pub struct Subscription {
    unsubscribe: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(unsubscribe: impl FnOnce() + Send + 'static) -> Self {
        Self {
            unsubscribe: Some(Box::new(unsubscribe)),
        }
    }

    /// A subscription with nothing to release.
    pub fn noop() -> Self {
        Self { unsubscribe: None }
    }

    pub fn unsubscribe(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.unsubscribe.is_some())
            .finish()
    }
}

/// A conversational session driven by an external assistant runtime.
#[async_trait]
pub trait AssistantSession: Send + Sync {
    /// Register `listener` for all subsequent events.
    fn subscribe(&self, listener: EventListener) -> Subscription;

    /// Submit a prompt. Replies arrive through subscribed listeners.
    async fn send_message(&self, prompt: &str) -> Result<(), CopilotError>;
}

/// A listener that forwards session events into `sender`.
pub fn listener_for(sender: EventSender) -> EventListener {
    Arc::new(move |event: SessionEvent| {
        let Some(event) = event.into_bridge_event() else {
            return;
        };
        if sender.send(event) == Delivery::Closed {
            debug!("Session event arrived after consumer went away");
        }
    })
}

/// Subscribe to `session`, send `prompt` and stream the reply.
///
/// The subscription lives as long as the returned stream.
pub async fn push_fragments(
    session: Arc<dyn AssistantSession>,
    prompt: String,
    streaming: bool,
    queue_capacity: usize,
    cancel: CancellationToken,
) -> Result<FragmentStream, CopilotError> {
    let (sender, receiver) = event_queue(queue_capacity);
    let subscription = session.subscribe(listener_for(sender));

    match until_cancelled(&cancel, session.send_message(&prompt)).await {
        None => return Err(CopilotError::Cancelled),
        Some(Err(error)) => {
            warn!(error = %error, "Failed to send message to session");
            return Err(error);
        }
        Some(Ok(())) => {}
    }

    let events = futures::stream::unfold(
        (receiver, subscription),
        |(mut receiver, subscription)| async move {
            let event = receiver.recv().await?;
            Some((event, (receiver, subscription)))
        },
    );
    Ok(bridge_events(events, streaming, cancel))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn parses_session_wire_events() {
        let cases = [
            (
                json!({"type": "assistant.message", "data": {"content": "Hello"}}),
                SessionEvent::Message("Hello".into()),
            ),
            (json!({"type": "session.idle"}), SessionEvent::Idle),
            (
                json!({"type": "session.error", "data": {"message": "quota"}}),
                SessionEvent::Error("quota".into()),
            ),
            (
                json!({"type": "tool.execution_start", "data": {}}),
                SessionEvent::Other("tool.execution_start".into()),
            ),
        ];
        for (value, expected) in cases {
            assert_eq!(SessionEvent::from_json(&value), expected);
        }
    }

    #[test]
    fn other_events_have_no_bridge_mapping() {
        assert!(SessionEvent::Other("x".into()).into_bridge_event().is_none());
        assert!(matches!(
            SessionEvent::Error("bad".into()).into_bridge_event(),
            Some(BridgeEvent::Error(CopilotError::Upstream(m))) if m == "bad"
        ));
    }

    #[test]
    fn dropping_subscription_unsubscribes_once() {
        let released = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&released);
        let subscription = Subscription::new(move || {
            assert!(!flag.swap(true, Ordering::SeqCst));
        });
        drop(subscription);
        assert!(released.load(Ordering::SeqCst));
    }
}
