//! Racing futures against a cancellation token.

use std::future::Future;

use tokio_util::sync::CancellationToken;

/// Run `future` until it completes or `cancel` fires.
///
/// Cancellation is checked first on every poll, so an already-cancelled token
/// never lets the future start. Returns `None` when cancelled.
pub async fn until_cancelled<F: Future>(
    cancel: &CancellationToken,
    future: F,
) -> Option<F::Output> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        output = future => Some(output),
    }
}
