//! Timeout helper.

use std::future::Future;
use std::time::Duration;

use crate::error::CopilotError;

/// Wrap a future with a timeout, reporting expiry as [`CopilotError::Timeout`].
pub async fn with_timeout<T, E>(
    duration: Duration,
    future: impl Future<Output = Result<T, E>>,
) -> Result<T, CopilotError>
where
    E: Into<CopilotError>,
{
    match tokio::time::timeout(duration, future).await {
        Ok(result) => result.map_err(Into::into),
        Err(_) => Err(CopilotError::Timeout(duration.as_millis() as u64)),
    }
}
