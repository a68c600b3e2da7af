use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::AuthError;
use crate::util::cancel::until_cancelled;

/// Amount added to the polling interval on every `slow_down` response.
pub const SLOW_DOWN_INCREMENT: Duration = Duration::from_secs(5);

/// Device-authorization grant handed out by the device-code endpoint.
///
/// # Example
/// ```no_run
/// use copilot_llm::auth::DeviceGrant;
/// use chrono::{Duration, Utc};
///
/// let grant = DeviceGrant {
///     device_code: "device-code".to_string(),
///     user_code: "ABCD-EFGH".to_string(),
///     verification_uri: "https://github.com/login/device".to_string(),
///     interval_secs: 5,
///     expires_at: Utc::now() + Duration::seconds(900),
/// };
/// println!("Visit {} and enter {}", grant.verification_uri, grant.user_code);
/// ```
#[derive(Clone)]
pub struct DeviceGrant {
    /// Secret, sent back on every poll. Never logged.
    pub device_code: String,
    pub user_code: String,
    pub verification_uri: String,
    pub interval_secs: u64,
    /// Informational; the polling loop relies on `expired_token` instead.
    pub expires_at: DateTime<Utc>,
}

impl DeviceGrant {
    /// Initial polling interval. Never below one second.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

impl fmt::Debug for DeviceGrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceGrant")
            .field("device_code", &"***")
            .field("user_code", &self.user_code)
            .field("verification_uri", &self.verification_uri)
            .field("interval_secs", &self.interval_secs)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Outcome of a single access-token check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceCodePoll {
    Pending,
    SlowDown,
    Authorized { access_token: String },
    AccessDenied,
    Expired,
}

/// What the polling loop should do next.
#[derive(Debug)]
pub enum PollStep {
    /// Wait this long, then poll again.
    Continue(Duration),
    Authorized(String),
    Failed(AuthError),
}

/// Interval and attempt bookkeeping for device-code polling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollState {
    interval: Duration,
    attempts: u32,
}

impl PollState {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            attempts: 0,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Fold one poll outcome into the state.
    ///
    /// `slow_down` grows the interval permanently; later `authorization_pending`
    /// responses keep the grown interval.
    pub fn advance(&mut self, outcome: Result<DeviceCodePoll, AuthError>) -> PollStep {
        self.attempts += 1;
        match outcome {
            Ok(DeviceCodePoll::Pending) => PollStep::Continue(self.interval),
            Ok(DeviceCodePoll::SlowDown) => {
                self.interval += SLOW_DOWN_INCREMENT;
                PollStep::Continue(self.interval)
            }
            Ok(DeviceCodePoll::Authorized { access_token }) => PollStep::Authorized(access_token),
            Ok(DeviceCodePoll::AccessDenied) => PollStep::Failed(AuthError::AccessDenied),
            Ok(DeviceCodePoll::Expired) => PollStep::Failed(AuthError::ExpiredOrInvalidGrant),
            Err(error) => PollStep::Failed(error),
        }
    }
}

/// Anything that can answer "has the user approved this device code yet?".
#[async_trait]
pub trait AccessTokenSource: Send + Sync {
    async fn check_access_token(&self, device_code: &str) -> Result<DeviceCodePoll, AuthError>;
}

/// Poll `source` until the grant resolves or `cancel` fires.
///
/// Waits one interval before the first check. Cancellation wins over both the
/// sleep and an in-flight check, and no check starts once it is observed.
pub async fn poll_until_authorized<S>(
    source: &S,
    device_code: &str,
    interval: Duration,
    cancel: &CancellationToken,
) -> Result<String, AuthError>
where
    S: AccessTokenSource + ?Sized,
{
    let mut state = PollState::new(interval);
    let mut wait = state.interval();
    info!(
        initial_interval_secs = interval.as_secs(),
        "Starting to poll for access token"
    );

    loop {
        if until_cancelled(cancel, tokio::time::sleep(wait))
            .await
            .is_none()
        {
            warn!(attempts = state.attempts(), "Device-code polling cancelled");
            return Err(AuthError::Cancelled);
        }

        let outcome = match until_cancelled(cancel, source.check_access_token(device_code)).await {
            Some(outcome) => outcome,
            None => {
                warn!(attempts = state.attempts(), "Device-code polling cancelled");
                return Err(AuthError::Cancelled);
            }
        };

        let slowed = matches!(outcome, Ok(DeviceCodePoll::SlowDown));
        match state.advance(outcome) {
            PollStep::Continue(next) => {
                if slowed {
                    warn!(
                        new_interval_secs = next.as_secs(),
                        "Received slow_down, increasing polling interval"
                    );
                } else {
                    debug!("Authorization still pending");
                }
                wait = next;
            }
            PollStep::Authorized(token) => {
                info!(attempts = state.attempts(), "Obtained access token");
                return Ok(token);
            }
            PollStep::Failed(error) => {
                warn!(attempts = state.attempts(), error = %error, "Device-code polling failed");
                return Err(error);
            }
        }
    }
}
