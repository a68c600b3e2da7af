use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::collect::collect_stream;
use super::prompt::format_prompt;
use crate::auth::{CredentialExchanger, CredentialManager, CredentialStore};
use crate::bridge::{bridge_events, push_fragments, sse_events, AssistantSession, BridgeEvent, FragmentStream};
use crate::config::CopilotConfig;
use crate::error::CopilotError;
use crate::provider::chat::{build_request_body, ChatCompletionResponse};
use crate::provider::http::{build_client, chat_headers, status_to_error};
use crate::types::{GenerationRequest, GenerationResult};
use crate::util::cancel::until_cancelled;
use crate::util::timeout::with_timeout;

const PROVIDER_NAME: &str = "github-copilot";

/// GitHub Copilot completion client.
///
/// Talks to the chat-completions endpoint over HTTP, or drives a caller-owned
/// [`AssistantSession`]. Either way the reply arrives as a [`FragmentStream`].
///
/// # Example
/// ```no_run
/// use copilot_llm::prelude::*;
/// use futures::StreamExt;
/// use tokio_util::sync::CancellationToken;
///
/// # async fn run() -> Result<()> {
/// let llm = CopilotLlm::new(CopilotConfig::from_env())?;
/// let request = GenerationRequest::new(vec![ModelMessage::user("Say hi")]);
/// let mut stream = llm
///     .generate_content(request, true, CancellationToken::new())
///     .await?;
/// while let Some(fragment) = stream.next().await {
///     print!("{}", fragment?.text);
/// }
/// # Ok(())
/// # }
/// ```
pub struct CopilotLlm {
    model: String,
    queue_capacity: usize,
    transport: Transport,
}

enum Transport {
    Http(HttpTransport),
    Session(Arc<dyn AssistantSession>),
}

struct HttpTransport {
    client: reqwest::Client,
    credentials: CredentialManager,
    chat_url: String,
    timeout: Duration,
}

impl CopilotLlm {
    /// HTTP client with its own credential cache. Requires a GitHub token.
    pub fn new(config: CopilotConfig) -> Result<Self, CopilotError> {
        Self::with_credential_store(config, Arc::new(CredentialStore::new()))
    }

    /// HTTP client sharing `store` with other clients for the same token.
    pub fn with_credential_store(
        config: CopilotConfig,
        store: Arc<CredentialStore>,
    ) -> Result<Self, CopilotError> {
        let token = config
            .github_token
            .clone()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| {
                CopilotError::Configuration(
                    "GitHub token is required (set COPILOT_GITHUB_TOKEN or GITHUB_TOKEN)"
                        .to_string(),
                )
            })?;
        let client = match config.http_client.clone() {
            Some(client) => client,
            None => build_client()?,
        };
        let endpoints = config.resolved_endpoints();
        let exchanger = CredentialExchanger::new(
            client.clone(),
            endpoints.token_exchange_url.clone(),
            config.timeout,
        );
        let credentials = CredentialManager::new(token, exchanger, store, config.refresh_margin);
        debug!(
            model = %config.model,
            base_url = %endpoints.base_url,
            provenance = ?credentials.provenance(),
            "Created Copilot HTTP client"
        );
        Ok(Self {
            model: config.model,
            queue_capacity: config.event_queue_capacity,
            transport: Transport::Http(HttpTransport {
                client,
                credentials,
                chat_url: endpoints.chat_completions_url(),
                timeout: config.timeout,
            }),
        })
    }

    /// Client driving a push session. No credentials are needed here; the
    /// session owns its own authentication.
    pub fn with_session(config: CopilotConfig, session: Arc<dyn AssistantSession>) -> Self {
        Self {
            model: config.model,
            queue_capacity: config.event_queue_capacity,
            transport: Transport::Session(session),
        }
    }

    pub fn name(&self) -> &'static str {
        PROVIDER_NAME
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Credential manager of the HTTP transport.
    pub fn credentials(&self) -> Option<&CredentialManager> {
        match &self.transport {
            Transport::Http(http) => Some(&http.credentials),
            Transport::Session(_) => None,
        }
    }

    /// Start a generation and return its fragments.
    ///
    /// With `stream` set, partial fragments precede the final one; otherwise
    /// only the final fragment is produced. Cancelling `cancel` ends the
    /// stream with [`CopilotError::Cancelled`].
    pub async fn generate_content(
        &self,
        request: GenerationRequest,
        stream: bool,
        cancel: CancellationToken,
    ) -> Result<FragmentStream, CopilotError> {
        if request.messages.is_empty() {
            return Err(CopilotError::InvalidArgument(
                "request has no messages".to_string(),
            ));
        }
        match &self.transport {
            Transport::Http(http) => self.http_fragments(http, request, stream, cancel).await,
            Transport::Session(session) => {
                let prompt = format_prompt(&request.messages);
                debug!(stream, prompt_len = prompt.len(), "Copilot session generate_content");
                push_fragments(
                    Arc::clone(session),
                    prompt,
                    stream,
                    self.queue_capacity,
                    cancel,
                )
                .await
            }
        }
    }

    /// Non-streaming generation collected into one result.
    pub async fn generate(
        &self,
        request: GenerationRequest,
        cancel: CancellationToken,
    ) -> Result<GenerationResult, CopilotError> {
        collect_stream(self.generate_content(request, false, cancel).await?).await
    }

    async fn http_fragments(
        &self,
        http: &HttpTransport,
        request: GenerationRequest,
        stream: bool,
        cancel: CancellationToken,
    ) -> Result<FragmentStream, CopilotError> {
        let model = request.model.as_deref().unwrap_or(&self.model);
        let credential = http.credentials.ensure_credential(&cancel).await?;
        let body = build_request_body(model, &request, stream);

        debug!(model, stream, "Copilot generate_content");

        let send = http
            .client
            .post(&http.chat_url)
            .headers(chat_headers(&credential, stream))
            .json(&body)
            .send();
        // Streaming bodies stay open as long as the model talks, so only the
        // non-streaming request gets a deadline.
        let resp = if stream {
            until_cancelled(&cancel, send)
                .await
                .ok_or(CopilotError::Cancelled)??
        } else {
            until_cancelled(&cancel, with_timeout(http.timeout, send))
                .await
                .ok_or(CopilotError::Cancelled)??
        };

        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            let body_text = until_cancelled(&cancel, resp.text())
                .await
                .ok_or(CopilotError::Cancelled)?
                .unwrap_or_default();
            warn!(status, "Copilot chat request failed");
            if status == 401 {
                http.credentials.invalidate().await;
            }
            return Err(status_to_error(status, &body_text));
        }

        if stream {
            let events = sse_events(resp.bytes_stream());
            return Ok(bridge_events(events, true, cancel));
        }

        let text = until_cancelled(&cancel, with_timeout(http.timeout, resp.text()))
            .await
            .ok_or(CopilotError::Cancelled)??;
        let response: ChatCompletionResponse = serde_json::from_str(&text)?;
        let (text, finish_reason, usage) = response.into_parts();
        let event = BridgeEvent::FinalMessage {
            text,
            finish_reason,
            usage,
        };
        Ok(bridge_events(futures::stream::iter([event]), false, cancel))
    }
}

impl fmt::Debug for CopilotLlm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let transport = match &self.transport {
            Transport::Http(http) => http.chat_url.as_str(),
            Transport::Session(_) => "session",
        };
        f.debug_struct("CopilotLlm")
            .field("model", &self.model)
            .field("transport", &transport)
            .finish()
    }
}
