#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use copilot_llm::auth::{AccessTokenSource, AuthError, DeviceAuthClient, DeviceCodePoll};
use tokio::time::Instant;
use wiremock::MockServer;

/// Access-token source replaying a fixed script and recording call times.
#[derive(Default)]
pub struct ScriptedSource {
    script: Mutex<VecDeque<Result<DeviceCodePoll, AuthError>>>,
    calls: Mutex<Vec<Instant>>,
}

impl ScriptedSource {
    pub fn new(script: Vec<Result<DeviceCodePoll, AuthError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn call_times(&self) -> Vec<Instant> {
        self.calls.lock().expect("calls lock poisoned").clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().expect("calls lock poisoned").len()
    }
}

#[async_trait]
impl AccessTokenSource for ScriptedSource {
    async fn check_access_token(&self, _device_code: &str) -> Result<DeviceCodePoll, AuthError> {
        self.calls
            .lock()
            .expect("calls lock poisoned")
            .push(Instant::now());
        self.script
            .lock()
            .expect("script lock poisoned")
            .pop_front()
            .unwrap_or(Ok(DeviceCodePoll::Pending))
    }
}

pub fn pending() -> Result<DeviceCodePoll, AuthError> {
    Ok(DeviceCodePoll::Pending)
}

pub fn slow_down() -> Result<DeviceCodePoll, AuthError> {
    Ok(DeviceCodePoll::SlowDown)
}

pub fn authorized(token: &str) -> Result<DeviceCodePoll, AuthError> {
    Ok(DeviceCodePoll::Authorized {
        access_token: token.to_string(),
    })
}

pub fn device_client(server: &MockServer) -> DeviceAuthClient {
    DeviceAuthClient::new(reqwest::Client::new(), None)
        .with_device_code_url(format!("{}/login/device/code", server.uri()))
        .with_access_token_url(format!("{}/login/oauth/access_token", server.uri()))
}

pub fn exchange_url(server: &MockServer) -> String {
    format!("{}/copilot_internal/v2/token", server.uri())
}
