//! Shared HTTP client construction, Copilot headers, SSE line parsing and
//! status mapping.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE, USER_AGENT};

use tracing::warn;

use crate::error::CopilotError;

/// User agent sent to GitHub OAuth and token endpoints.
pub const AUTH_USER_AGENT: &str = "GitHubCopilotChat/0.35.0";
/// User agent sent to the Copilot API and the token exchange.
pub const COPILOT_USER_AGENT: &str = "GitHubCopilotChat/0.32.4";
pub const COPILOT_EDITOR_VERSION: &str = "vscode/1.105.1";
pub const COPILOT_EDITOR_PLUGIN_VERSION: &str = "copilot-chat/0.32.4";
pub const COPILOT_INTEGRATION_ID: &str = "vscode-chat";
pub const COPILOT_OPENAI_INTENT: &str = "conversation-panel";
pub const COPILOT_INITIATOR: &str = "user";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Build a client with a connect timeout only.
///
/// Whole-request timeouts are applied per request, since streaming responses
/// may legitimately stay open longer than any fixed deadline.
pub fn build_client() -> Result<reqwest::Client, CopilotError> {
    reqwest::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .pool_max_idle_per_host(10)
        .build()
        .map_err(|e| CopilotError::Configuration(format!("Failed to build HTTP client: {e}")))
}

/// Headers for GitHub's device-code and OAuth token endpoints.
pub fn oauth_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(USER_AGENT, HeaderValue::from_static(AUTH_USER_AGENT));
    headers
}

/// Editor identification headers Copilot expects on every call.
pub fn editor_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(COPILOT_USER_AGENT));
    headers.insert(
        "Editor-Version",
        HeaderValue::from_static(COPILOT_EDITOR_VERSION),
    );
    headers.insert(
        "Editor-Plugin-Version",
        HeaderValue::from_static(COPILOT_EDITOR_PLUGIN_VERSION),
    );
    headers.insert(
        "Copilot-Integration-Id",
        HeaderValue::from_static(COPILOT_INTEGRATION_ID),
    );
    headers
}

/// Headers for the Copilot token exchange.
pub fn exchange_headers(github_token: &str) -> HeaderMap {
    let mut headers = editor_headers();
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    insert_bearer(&mut headers, github_token);
    headers
}

/// Headers for a chat-completions call.
pub fn chat_headers(credential: &str, stream: bool) -> HeaderMap {
    let mut headers = editor_headers();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    let accept = if stream {
        "text/event-stream"
    } else {
        "application/json"
    };
    headers.insert(ACCEPT, HeaderValue::from_static(accept));
    headers.insert(
        "Openai-Intent",
        HeaderValue::from_static(COPILOT_OPENAI_INTENT),
    );
    headers.insert("X-Initiator", HeaderValue::from_static(COPILOT_INITIATOR));
    insert_bearer(&mut headers, credential);
    headers
}

fn insert_bearer(headers: &mut HeaderMap, token: &str) {
    match HeaderValue::from_str(&format!("Bearer {token}")) {
        Ok(val) => {
            headers.insert(AUTHORIZATION, val);
        }
        Err(_) => warn!(
            token_len = token.len(),
            "Token is not a valid header value; sending request without Authorization"
        ),
    }
}

/// A classified SSE `data:` payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SseData<'a> {
    Data(&'a str),
    Done,
}

/// Parse one trimmed SSE line.
///
/// Returns `None` for blank lines, comments and any field other than `data`.
pub fn parse_sse_data(line: &str) -> Option<SseData<'_>> {
    let data = line.strip_prefix("data:")?.trim_start();
    if data == "[DONE]" {
        return Some(SseData::Done);
    }
    Some(SseData::Data(data))
}

/// Map a non-success chat-completions status to an error.
pub fn status_to_error(status: u16, body: &str) -> CopilotError {
    match status {
        429 => CopilotError::RateLimited {
            retry_after_ms: extract_retry_after(body),
        },
        _ => CopilotError::api(status, body),
    }
}

fn extract_retry_after(body: &str) -> Option<u64> {
    // Try to parse retry-after from JSON error body
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("retry_after"))
                .and_then(|r| r.as_f64())
                .map(|s| (s * 1000.0) as u64)
        })
}
