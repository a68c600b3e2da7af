use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{RwLock, RwLockWriteGuard};

/// Prefix of fine-grained personal access tokens, which Copilot accepts as-is.
pub const DIRECT_TOKEN_PREFIX: &str = "github_pat_";

/// How a credential was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    /// Long-lived token used without exchange. Never expires locally.
    Direct,
    /// Short-lived Copilot token obtained through the exchange endpoint.
    Exchanged,
}

/// Decide whether a GitHub token can be sent to Copilot directly.
///
/// ```
/// use copilot_llm::auth::{classify_token, Provenance};
///
/// assert_eq!(classify_token("github_pat_11ABC"), Provenance::Direct);
/// assert_eq!(classify_token("gho_abc"), Provenance::Exchanged);
/// ```
pub fn classify_token(token: &str) -> Provenance {
    if token.starts_with(DIRECT_TOKEN_PREFIX) {
        Provenance::Direct
    } else {
        Provenance::Exchanged
    }
}

/// A bearer credential for the chat-completions endpoint.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    value: String,
    expires_at: Option<DateTime<Utc>>,
    provenance: Provenance,
}

impl Credential {
    pub fn direct(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            expires_at: None,
            provenance: Provenance::Direct,
        }
    }

    pub fn exchanged(value: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            value: value.into(),
            expires_at: Some(expires_at),
            provenance: Provenance::Exchanged,
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    pub fn provenance(&self) -> Provenance {
        self.provenance
    }

    /// Usable at `now` with at least `margin` left before expiry.
    ///
    /// Direct credentials are always valid.
    pub fn is_valid_at(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        match (self.provenance, self.expires_at) {
            (Provenance::Direct, _) => true,
            (Provenance::Exchanged, None) => false,
            (Provenance::Exchanged, Some(expires_at)) => {
                let margin = chrono::Duration::from_std(margin).unwrap_or(chrono::Duration::MAX);
                now.checked_add_signed(margin)
                    .is_some_and(|deadline| deadline < expires_at)
            }
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("value", &"***")
            .field("expires_at", &self.expires_at)
            .field("provenance", &self.provenance)
            .finish()
    }
}

/// Shared cache for the current exchanged credential.
///
/// Readers check validity under the shared lock; a refresh takes the exclusive
/// lock and re-checks before calling out, so concurrent callers collapse into a
/// single exchange.
#[derive(Debug, Default)]
pub struct CredentialStore {
    current: RwLock<Option<Credential>>,
}

impl CredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Currently cached credential, valid or not.
    pub async fn current(&self) -> Option<Credential> {
        self.current.read().await.clone()
    }

    /// Cached credential if still valid with `margin` to spare.
    pub async fn valid(&self, margin: Duration) -> Option<Credential> {
        let guard = self.current.read().await;
        valid_in(&guard, margin)
    }

    /// Take exclusive access for a refresh.
    pub async fn lock(&self) -> CredentialGuard<'_> {
        CredentialGuard {
            inner: self.current.write().await,
        }
    }

    pub async fn store(&self, credential: Credential) {
        *self.current.write().await = Some(credential);
    }

    pub async fn clear(&self) {
        *self.current.write().await = None;
    }
}

/// Exclusive handle over the store, held across a refresh.
pub struct CredentialGuard<'a> {
    inner: RwLockWriteGuard<'a, Option<Credential>>,
}

impl CredentialGuard<'_> {
    pub fn valid(&self, margin: Duration) -> Option<Credential> {
        valid_in(&self.inner, margin)
    }

    pub fn store(&mut self, credential: Credential) {
        *self.inner = Some(credential);
    }
}

fn valid_in(slot: &Option<Credential>, margin: Duration) -> Option<Credential> {
    slot.as_ref()
        .filter(|credential| credential.is_valid_at(Utc::now(), margin))
        .cloned()
}
