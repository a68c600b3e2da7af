//! GitHub / Copilot endpoint derivation.

pub const DEFAULT_BASE_URL: &str = "https://api.githubcopilot.com";
pub const DEFAULT_TOKEN_EXCHANGE_URL: &str = "https://api.github.com/copilot_internal/v2/token";
pub const DEFAULT_DEVICE_CODE_URL: &str = "https://github.com/login/device/code";
pub const DEFAULT_ACCESS_TOKEN_URL: &str = "https://github.com/login/oauth/access_token";

/// The set of URLs a client talks to.
///
/// ```
/// use copilot_llm::config::Endpoints;
///
/// let endpoints = Endpoints::resolve(Some("https://company.ghe.com/"));
/// assert_eq!(endpoints.base_url, "https://copilot-api.company.ghe.com");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    /// Chat-completions base; `/chat/completions` is appended.
    pub base_url: String,
    pub token_exchange_url: String,
    pub device_code_url: String,
    pub access_token_url: String,
}

impl Endpoints {
    /// Public github.com endpoints.
    pub fn github() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            token_exchange_url: DEFAULT_TOKEN_EXCHANGE_URL.to_string(),
            device_code_url: DEFAULT_DEVICE_CODE_URL.to_string(),
            access_token_url: DEFAULT_ACCESS_TOKEN_URL.to_string(),
        }
    }

    /// GitHub Enterprise endpoints for a domain or URL.
    pub fn enterprise(url: &str) -> Self {
        let domain = normalize_domain(url);
        Self {
            base_url: format!("https://copilot-api.{domain}"),
            token_exchange_url: format!("https://api.{domain}/copilot_internal/v2/token"),
            device_code_url: format!("https://{domain}/login/device/code"),
            access_token_url: format!("https://{domain}/login/oauth/access_token"),
        }
    }

    /// Enterprise endpoints when a non-empty override is given, github.com otherwise.
    pub fn resolve(enterprise_url: Option<&str>) -> Self {
        match enterprise_url.map(str::trim).filter(|url| !url.is_empty()) {
            Some(url) => Self::enterprise(url),
            None => Self::github(),
        }
    }

    /// Full chat-completions URL.
    pub fn chat_completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

impl Default for Endpoints {
    fn default() -> Self {
        Self::github()
    }
}

/// Reduce a domain or URL to the bare domain.
pub fn normalize_domain(url: &str) -> String {
    let trimmed = url.trim();
    let without_scheme = trimmed
        .strip_prefix("https://")
        .or_else(|| trimmed.strip_prefix("http://"))
        .unwrap_or(trimmed);
    without_scheme.trim_end_matches('/').to_string()
}
