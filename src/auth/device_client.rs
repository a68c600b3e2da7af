use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::device_code::{poll_until_authorized, AccessTokenSource, DeviceCodePoll, DeviceGrant};
use super::AuthError;
use crate::config::Endpoints;
use crate::provider::http::oauth_headers;
use crate::util::cancel::until_cancelled;

/// OAuth client id of the Copilot editor integration.
pub const COPILOT_CLIENT_ID: &str = "Iv1.b507a08c87ecfe98";
pub const DEVICE_SCOPE: &str = "read:user";
pub const DEVICE_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:device_code";

const DEFAULT_AUTH_TIMEOUT: Duration = Duration::from_secs(30);

/// GitHub device-authorization client.
///
/// Never prints; the grant is handed to the caller to display.
///
/// # Example
/// ```no_run
/// use copilot_llm::auth::DeviceAuthClient;
/// use tokio_util::sync::CancellationToken;
///
/// # async fn run() -> Result<(), copilot_llm::auth::AuthError> {
/// let client = DeviceAuthClient::new(reqwest::Client::new(), None);
/// let token = client
///     .authenticate(&CancellationToken::new(), |grant| {
///         println!("Visit {} and enter {}", grant.verification_uri, grant.user_code);
///     })
///     .await?;
/// # let _ = token;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct DeviceAuthClient {
    client: reqwest::Client,
    client_id: String,
    device_code_url: String,
    access_token_url: String,
    timeout: Duration,
}

impl DeviceAuthClient {
    /// Client for github.com, or for an enterprise domain when given.
    pub fn new(client: reqwest::Client, enterprise_url: Option<&str>) -> Self {
        let endpoints = Endpoints::resolve(enterprise_url);
        Self {
            client,
            client_id: COPILOT_CLIENT_ID.to_string(),
            device_code_url: endpoints.device_code_url,
            access_token_url: endpoints.access_token_url,
            timeout: DEFAULT_AUTH_TIMEOUT,
        }
    }

    pub fn with_device_code_url(mut self, url: impl Into<String>) -> Self {
        self.device_code_url = url.into();
        self
    }

    pub fn with_access_token_url(mut self, url: impl Into<String>) -> Self {
        self.access_token_url = url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Request a device code and user code.
    pub async fn start_device_flow(
        &self,
        cancel: &CancellationToken,
    ) -> Result<DeviceGrant, AuthError> {
        debug!(url = %self.device_code_url, "Starting device flow");
        let request = self
            .client
            .post(&self.device_code_url)
            .headers(oauth_headers())
            .timeout(self.timeout)
            .json(&json!({
                "client_id": self.client_id,
                "scope": DEVICE_SCOPE,
            }))
            .send();
        let resp = until_cancelled(cancel, request)
            .await
            .ok_or(AuthError::Cancelled)??;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            error!(status = status.as_u16(), body = %body, "Device code request failed");
            return Err(AuthError::Status {
                endpoint: "device code",
                status: status.as_u16(),
                body,
            });
        }

        let body = resp.text().await?;
        let payload: DeviceCodeResponse = serde_json::from_str(&body)?;
        let expires_at = grant_expiry(payload.expires_in)?;
        let grant = DeviceGrant {
            device_code: payload.device_code,
            user_code: payload.user_code,
            verification_uri: payload.verification_uri,
            interval_secs: payload.interval,
            expires_at,
        };
        info!(
            verification_uri = %grant.verification_uri,
            user_code = %grant.user_code,
            expires_in = payload.expires_in,
            interval = grant.interval_secs,
            "Device flow started"
        );
        Ok(grant)
    }

    /// Check once whether the user has approved `device_code`.
    pub async fn check_access_token(&self, device_code: &str) -> Result<DeviceCodePoll, AuthError> {
        let resp = self
            .client
            .post(&self.access_token_url)
            .headers(oauth_headers())
            .timeout(self.timeout)
            .json(&json!({
                "client_id": self.client_id,
                "device_code": device_code,
                "grant_type": DEVICE_GRANT_TYPE,
            }))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            debug!(status = status.as_u16(), body = %body, "Access token request returned non-OK status");
            return Err(AuthError::Status {
                endpoint: "access token",
                status: status.as_u16(),
                body,
            });
        }

        let body = resp.text().await?;
        let payload: AccessTokenResponse = serde_json::from_str(&body)?;
        if let Some(code) = payload.error.as_deref().filter(|c| !c.is_empty()) {
            debug!(error = code, "Access token response contains error");
            return Ok(match code {
                "authorization_pending" => DeviceCodePoll::Pending,
                "slow_down" => DeviceCodePoll::SlowDown,
                "access_denied" => DeviceCodePoll::AccessDenied,
                "expired_token" => DeviceCodePoll::Expired,
                other => return Err(AuthError::OAuth(other.to_string())),
            });
        }
        match payload.access_token.filter(|t| !t.is_empty()) {
            Some(access_token) => Ok(DeviceCodePoll::Authorized { access_token }),
            // Neither token nor error: keep waiting.
            None => Ok(DeviceCodePoll::Pending),
        }
    }

    /// Poll until the grant resolves, starting at `interval_secs` (minimum 1).
    pub async fn poll_for_access_token(
        &self,
        device_code: &str,
        interval_secs: u64,
        cancel: &CancellationToken,
    ) -> Result<String, AuthError> {
        let interval = Duration::from_secs(interval_secs.max(1));
        poll_until_authorized(self, device_code, interval, cancel).await
    }

    /// Run the whole flow: start, hand the grant to `on_grant`, then poll.
    pub async fn authenticate<F>(
        &self,
        cancel: &CancellationToken,
        on_grant: F,
    ) -> Result<String, AuthError>
    where
        F: FnOnce(&DeviceGrant),
    {
        info!("Starting GitHub Copilot authentication");
        let grant = self.start_device_flow(cancel).await?;
        on_grant(&grant);
        let token = self
            .poll_for_access_token(&grant.device_code, grant.interval_secs, cancel)
            .await?;
        info!("Authentication completed");
        Ok(token)
    }
}

fn grant_expiry(expires_in: u64) -> Result<DateTime<Utc>, AuthError> {
    i64::try_from(expires_in)
        .ok()
        .and_then(chrono::Duration::try_seconds)
        .and_then(|lifetime| Utc::now().checked_add_signed(lifetime))
        .ok_or_else(|| AuthError::InvalidResponse(format!("expires_in out of range: {expires_in}")))
}

#[async_trait]
impl AccessTokenSource for DeviceAuthClient {
    async fn check_access_token(&self, device_code: &str) -> Result<DeviceCodePoll, AuthError> {
        DeviceAuthClient::check_access_token(self, device_code).await
    }
}

#[derive(Debug, Deserialize)]
struct DeviceCodeResponse {
    device_code: String,
    user_code: String,
    verification_uri: String,
    expires_in: u64,
    #[serde(default)]
    interval: u64,
}

#[derive(Debug, Deserialize)]
struct AccessTokenResponse {
    access_token: Option<String>,
    error: Option<String>,
}
