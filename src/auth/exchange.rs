use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::credential::Credential;
use super::AuthError;
use crate::provider::http::exchange_headers;
use crate::util::cancel::until_cancelled;

/// Epoch values above this are taken to be milliseconds.
const MILLIS_THRESHOLD: i64 = 10_000_000_000;

/// Trades a GitHub token for a short-lived Copilot token.
#[derive(Debug, Clone)]
pub struct CredentialExchanger {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl CredentialExchanger {
    pub fn new(client: reqwest::Client, url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client,
            url: url.into(),
            timeout,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// One exchange call. Not retried.
    pub async fn exchange(
        &self,
        github_token: &str,
        cancel: &CancellationToken,
    ) -> Result<Credential, AuthError> {
        debug!(url = %self.url, "Exchanging GitHub token for Copilot token");
        let request = async {
            let resp = self
                .client
                .get(&self.url)
                .headers(exchange_headers(github_token))
                .timeout(self.timeout)
                .send()
                .await?;
            let status = resp.status();
            let body = resp.text().await?;
            Ok::<_, AuthError>((status, body))
        };
        let (status, body) = until_cancelled(cancel, request)
            .await
            .ok_or(AuthError::Cancelled)??;

        if !status.is_success() {
            warn!(status = status.as_u16(), "Copilot token exchange failed");
            return Err(AuthError::Status {
                endpoint: "token exchange",
                status: status.as_u16(),
                body,
            });
        }

        let payload: ExchangeResponse = serde_json::from_str(&body)?;
        if payload.token.is_empty() {
            return Err(AuthError::InvalidResponse(
                "Copilot token response has an empty token".to_string(),
            ));
        }
        let expires_at = parse_expires_at(&payload.expires_at)?;
        debug!(%expires_at, "Copilot token exchanged");
        Ok(Credential::exchanged(payload.token, expires_at))
    }
}

#[derive(Debug, Deserialize)]
struct ExchangeResponse {
    token: String,
    #[serde(default)]
    expires_at: serde_json::Value,
}

/// Parse `expires_at` given as integer or numeric string, in seconds or
/// milliseconds since the epoch.
pub fn parse_expires_at(value: &serde_json::Value) -> Result<DateTime<Utc>, AuthError> {
    let raw = if let Some(num) = value.as_i64() {
        num
    } else if let Some(text) = value.as_str() {
        text.trim().parse::<i64>().map_err(|_| {
            AuthError::InvalidResponse("Copilot token expires_at invalid".to_string())
        })?
    } else {
        return Err(AuthError::InvalidResponse(
            "Copilot token expires_at missing".to_string(),
        ));
    };
    let secs = if raw > MILLIS_THRESHOLD { raw / 1000 } else { raw };
    DateTime::<Utc>::from_timestamp(secs, 0).ok_or_else(|| {
        AuthError::InvalidResponse("Copilot token expires_at out of range".to_string())
    })
}
