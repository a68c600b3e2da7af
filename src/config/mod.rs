//! Client configuration (builder or environment).

pub mod endpoints;

pub use endpoints::{normalize_domain, Endpoints};

use std::fmt;
use std::time::Duration;

use bon::Builder;
use tracing::warn;

pub const DEFAULT_MODEL: &str = "gpt-4";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_EVENT_QUEUE_CAPACITY: usize = 64;
pub const DEFAULT_REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Configuration for [`CopilotLlm`](crate::generation::CopilotLlm).
///
/// ```
/// use std::time::Duration;
/// use copilot_llm::config::CopilotConfig;
///
/// let config = CopilotConfig::builder()
///     .github_token("gho_example")
///     .model("gpt-4o")
///     .timeout(Duration::from_secs(30))
///     .build();
/// assert_eq!(config.event_queue_capacity, 64);
/// ```
#[derive(Clone, Builder)]
pub struct CopilotConfig {
    /// GitHub token: `github_pat_` tokens are used directly, others exchanged.
    #[builder(into)]
    pub github_token: Option<String>,
    /// GitHub Enterprise domain or URL.
    #[builder(into)]
    pub enterprise_url: Option<String>,
    #[builder(into, default = DEFAULT_MODEL.to_string())]
    pub model: String,
    /// Per-request timeout for token endpoints and non-streaming completions.
    #[builder(default = DEFAULT_TIMEOUT)]
    pub timeout: Duration,
    /// Capacity of the delta queue between a transport and the consumer.
    #[builder(default = DEFAULT_EVENT_QUEUE_CAPACITY)]
    pub event_queue_capacity: usize,
    /// How long before expiry an exchanged credential is refreshed.
    #[builder(default = DEFAULT_REFRESH_MARGIN)]
    pub refresh_margin: Duration,
    /// Explicit endpoint set; derived from `enterprise_url` when absent.
    pub endpoints: Option<Endpoints>,
    pub http_client: Option<reqwest::Client>,
}

impl fmt::Debug for CopilotConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CopilotConfig")
            .field("github_token", &self.github_token.as_ref().map(|_| "***"))
            .field("enterprise_url", &self.enterprise_url)
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .field("event_queue_capacity", &self.event_queue_capacity)
            .field("refresh_margin", &self.refresh_margin)
            .field("endpoints", &self.endpoints)
            .field("http_client", &self.http_client.as_ref().map(|_| ".."))
            .finish()
    }
}

impl Default for CopilotConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl CopilotConfig {
    /// Load from environment variables (after reading `.env` if present).
    ///
    /// - `COPILOT_GITHUB_TOKEN`, falling back to `GITHUB_TOKEN`
    /// - `GITHUB_ENTERPRISE_URL`
    /// - `COPILOT_MODEL`
    /// - `COPILOT_TIMEOUT_SECS`
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv(); // load .env if present, ignore error
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let mut config = Self::builder()
            .maybe_github_token(get("COPILOT_GITHUB_TOKEN").or_else(|| get("GITHUB_TOKEN")))
            .maybe_enterprise_url(get("GITHUB_ENTERPRISE_URL"))
            .build();

        if let Some(model) = get("COPILOT_MODEL") {
            config.model = model;
        }
        if let Some(raw) = get("COPILOT_TIMEOUT_SECS") {
            match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => config.timeout = Duration::from_secs(secs),
                _ => warn!(value = %raw, "Ignoring invalid COPILOT_TIMEOUT_SECS"),
            }
        }
        config
    }

    /// Endpoints in effect: the explicit set, or one derived from `enterprise_url`.
    pub fn resolved_endpoints(&self) -> Endpoints {
        self.endpoints
            .clone()
            .unwrap_or_else(|| Endpoints::resolve(self.enterprise_url.as_deref()))
    }
}
