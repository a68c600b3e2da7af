use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::credential::{classify_token, CredentialStore, Provenance};
use super::exchange::CredentialExchanger;
use super::AuthError;

/// Hands out a usable bearer credential for chat calls.
///
/// Direct tokens are returned as-is. Anything else is exchanged and cached in
/// the shared [`CredentialStore`] until it gets within `refresh_margin` of
/// expiry.
#[derive(Debug, Clone)]
pub struct CredentialManager {
    github_token: String,
    provenance: Provenance,
    exchanger: CredentialExchanger,
    store: Arc<CredentialStore>,
    refresh_margin: Duration,
}

impl CredentialManager {
    pub fn new(
        github_token: impl Into<String>,
        exchanger: CredentialExchanger,
        store: Arc<CredentialStore>,
        refresh_margin: Duration,
    ) -> Self {
        let github_token = github_token.into();
        let provenance = classify_token(&github_token);
        Self {
            github_token,
            provenance,
            exchanger,
            store,
            refresh_margin,
        }
    }

    pub fn provenance(&self) -> Provenance {
        self.provenance
    }

    pub fn store(&self) -> &Arc<CredentialStore> {
        &self.store
    }

    /// Return a credential valid for at least `refresh_margin`.
    ///
    /// Concurrent callers that find the cache stale queue on the store's write
    /// lock; the first performs the exchange and the rest reuse its result.
    pub async fn ensure_credential(&self, cancel: &CancellationToken) -> Result<String, AuthError> {
        if cancel.is_cancelled() {
            return Err(AuthError::Cancelled);
        }
        if self.provenance == Provenance::Direct {
            return Ok(self.github_token.clone());
        }

        if let Some(credential) = self.store.valid(self.refresh_margin).await {
            return Ok(credential.value().to_string());
        }

        let mut guard = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AuthError::Cancelled),
            guard = self.store.lock() => guard,
        };
        if let Some(credential) = guard.valid(self.refresh_margin) {
            debug!("Credential refreshed by another caller");
            return Ok(credential.value().to_string());
        }

        let credential = self.exchanger.exchange(&self.github_token, cancel).await?;
        info!(expires_at = ?credential.expires_at(), "Copilot credential refreshed");
        let value = credential.value().to_string();
        guard.store(credential);
        Ok(value)
    }

    /// Drop the cached exchanged credential so the next call re-exchanges.
    pub async fn invalidate(&self) {
        if self.provenance == Provenance::Exchanged {
            debug!("Invalidating cached Copilot credential");
            self.store.clear().await;
        }
    }
}
