//! Shared test helpers: a scripted push session.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use copilot_llm::bridge::{AssistantSession, EventListener, SessionEvent, Subscription};
use copilot_llm::error::CopilotError;
use serde_json::Value;

type Listeners = Arc<Mutex<Vec<(usize, EventListener)>>>;

/// A push session that replays wire events from its own OS thread once a
/// message is sent.
pub struct MockSession {
    script: Vec<Value>,
    delay: Duration,
    listeners: Listeners,
    next_id: AtomicUsize,
    prompts: Mutex<Vec<String>>,
    fail_send: bool,
}

impl MockSession {
    pub fn new(script: Vec<Value>) -> Self {
        Self {
            script,
            delay: Duration::ZERO,
            listeners: Arc::new(Mutex::new(Vec::new())),
            next_id: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
            fail_send: false,
        }
    }

    /// Pause between events.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn failing() -> Self {
        Self {
            fail_send: true,
            ..Self::new(Vec::new())
        }
    }

    pub fn active_listeners(&self) -> usize {
        self.listeners.lock().expect("listeners lock poisoned").len()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().expect("prompts lock poisoned").clone()
    }
}

#[async_trait]
impl AssistantSession for MockSession {
    fn subscribe(&self, listener: EventListener) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.listeners
            .lock()
            .expect("listeners lock poisoned")
            .push((id, listener));
        let listeners = Arc::clone(&self.listeners);
        Subscription::new(move || {
            listeners
                .lock()
                .expect("listeners lock poisoned")
                .retain(|(existing, _)| *existing != id);
        })
    }

    async fn send_message(&self, prompt: &str) -> Result<(), CopilotError> {
        if self.fail_send {
            return Err(CopilotError::Upstream("session closed".to_string()));
        }
        self.prompts
            .lock()
            .expect("prompts lock poisoned")
            .push(prompt.to_string());

        let script = self.script.clone();
        let listeners = Arc::clone(&self.listeners);
        let delay = self.delay;
        std::thread::spawn(move || {
            for value in script {
                if !delay.is_zero() {
                    std::thread::sleep(delay);
                }
                let event = SessionEvent::from_json(&value);
                let current: Vec<EventListener> = listeners
                    .lock()
                    .expect("listeners lock poisoned")
                    .iter()
                    .map(|(_, listener)| Arc::clone(listener))
                    .collect();
                for listener in current {
                    listener(event.clone());
                }
            }
        });
        Ok(())
    }
}

pub fn delta(text: &str) -> Value {
    serde_json::json!({ "type": "assistant.message_delta", "data": { "deltaContent": text } })
}

pub fn message(text: &str) -> Value {
    serde_json::json!({ "type": "assistant.message", "data": { "content": text } })
}

pub fn idle() -> Value {
    serde_json::json!({ "type": "session.idle", "data": {} })
}

pub fn session_error(message: &str) -> Value {
    serde_json::json!({ "type": "session.error", "data": { "message": message } })
}
