//! End-to-end generation through `CopilotLlm`.

mod common;

use std::sync::Arc;

use copilot_llm::config::{CopilotConfig, Endpoints};
use copilot_llm::error::CopilotError;
use copilot_llm::generation::{collect_stream, CopilotLlm};
use copilot_llm::types::{FinishReason, GenerationRequest, ModelMessage, ResponseFragment};
use futures::StreamExt;
use pretty_assertions::assert_eq;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{delta, idle, message, MockSession};

const SSE_BODY: &str = concat!(
    "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n",
    "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\n",
    "data: {\"choices\":[{\"delta\":{\"content\":\"lo\"},\"finish_reason\":\"stop\"}]}\n\n",
    "data: [DONE]\n\n",
);

fn config(server: &MockServer, token: &str) -> CopilotConfig {
    CopilotConfig::builder()
        .github_token(token)
        .endpoints(Endpoints {
            base_url: server.uri(),
            token_exchange_url: format!("{}/copilot_internal/v2/token", server.uri()),
            ..Endpoints::github()
        })
        .build()
}

fn hello_request() -> GenerationRequest {
    GenerationRequest::new(vec![ModelMessage::user("Say hello")])
}

async fn collect_fragments(
    llm: &CopilotLlm,
    request: GenerationRequest,
    stream: bool,
) -> Vec<Result<ResponseFragment, CopilotError>> {
    llm.generate_content(request, stream, CancellationToken::new())
        .await
        .expect("generate_content")
        .collect()
        .await
}

#[tokio::test]
async fn streaming_http_generation_with_direct_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer github_pat_direct"))
        .and(header("accept", "text/event-stream"))
        .and(header("openai-intent", "conversation-panel"))
        .and(body_partial_json(json!({ "model": "gpt-4", "stream": true })))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(SSE_BODY),
        )
        .expect(1)
        .mount(&server)
        .await;

    let llm = CopilotLlm::new(config(&server, "github_pat_direct")).expect("llm");
    let fragments = collect_fragments(&llm, hello_request(), true).await;

    let fragments: Vec<_> = fragments
        .into_iter()
        .map(|f| f.expect("fragment"))
        .collect();
    assert_eq!(fragments.len(), 3);
    assert_eq!(fragments[0], ResponseFragment::partial("Hel"));
    assert_eq!(fragments[1], ResponseFragment::partial("lo"));
    assert_eq!(
        fragments[2],
        ResponseFragment::turn_complete("Hello", Some(FinishReason::Stop), None)
    );
}

#[tokio::test]
async fn non_streaming_http_generation_yields_one_final_fragment() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("accept", "application/json"))
        .and(body_partial_json(json!({ "stream": false })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "chatcmpl-1",
            "choices": [{
                "index": 0,
                "message": { "role": "assistant", "content": "Hello there" },
                "finish_reason": "stop"
            }],
            "usage": { "prompt_tokens": 5, "completion_tokens": 2, "total_tokens": 7 }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let llm = CopilotLlm::new(config(&server, "github_pat_direct")).expect("llm");
    let result = llm
        .generate(hello_request(), CancellationToken::new())
        .await
        .expect("generate");

    assert_eq!(result.text, "Hello there");
    assert_eq!(result.finish_reason, Some(FinishReason::Stop));
    assert_eq!(result.usage.map(|u| u.total_tokens), Some(7));
}

#[tokio::test]
async fn oauth_token_is_exchanged_before_chat() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/copilot_internal/v2/token"))
        .and(header("authorization", "Bearer gho_oauth"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token": "copilot-short-lived",
            "expires_at": 4102444800i64
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer copilot-short-lived"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(SSE_BODY),
        )
        .expect(2)
        .mount(&server)
        .await;

    let llm = CopilotLlm::new(config(&server, "gho_oauth")).expect("llm");
    for _ in 0..2 {
        let stream = llm
            .generate_content(hello_request(), true, CancellationToken::new())
            .await
            .expect("generate_content");
        let result = collect_stream(stream).await.expect("collect");
        assert_eq!(result.text, "Hello");
    }
}

#[tokio::test]
async fn unauthorized_chat_invalidates_cached_credential() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/copilot_internal/v2/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token": "copilot-short-lived",
            "expires_at": 4102444800i64
        })))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_string("token expired"))
        .expect(2)
        .mount(&server)
        .await;

    let llm = CopilotLlm::new(config(&server, "gho_oauth")).expect("llm");
    for _ in 0..2 {
        let err = llm
            .generate_content(hello_request(), true, CancellationToken::new())
            .await
            .err()
            .expect("error");
        assert!(matches!(err, CopilotError::Api { status: 401, .. }));
    }
}

#[tokio::test]
async fn rate_limited_chat_maps_retry_after() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(429).set_body_json(json!({ "error": { "retry_after": 2 } })),
        )
        .mount(&server)
        .await;

    let llm = CopilotLlm::new(config(&server, "github_pat_direct")).expect("llm");
    let err = llm
        .generate_content(hello_request(), false, CancellationToken::new())
        .await
        .err()
        .expect("error");

    assert!(matches!(
        err,
        CopilotError::RateLimited {
            retry_after_ms: Some(2000)
        }
    ));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn request_model_overrides_configured_model() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({ "model": "claude-sonnet-4" })))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(SSE_BODY),
        )
        .expect(1)
        .mount(&server)
        .await;

    let llm = CopilotLlm::new(config(&server, "github_pat_direct")).expect("llm");
    let fragments =
        collect_fragments(&llm, hello_request().with_model("claude-sonnet-4"), true).await;

    assert!(fragments.iter().all(Result::is_ok));
}

#[tokio::test]
async fn empty_request_is_rejected() {
    let server = MockServer::start().await;
    let llm = CopilotLlm::new(config(&server, "github_pat_direct")).expect("llm");

    let err = llm
        .generate_content(GenerationRequest::default(), true, CancellationToken::new())
        .await
        .err()
        .expect("error");

    assert!(matches!(err, CopilotError::InvalidArgument(_)));
}

#[tokio::test]
async fn cancelled_before_start_makes_no_requests() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/copilot_internal/v2/token"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let llm = CopilotLlm::new(config(&server, "gho_oauth")).expect("llm");
    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = llm
        .generate_content(hello_request(), true, cancel)
        .await
        .err()
        .expect("error");

    assert!(err.is_cancelled());
}

#[tokio::test]
async fn session_transport_sends_formatted_prompt() {
    let session = Arc::new(MockSession::new(vec![
        delta("Fine"),
        delta(", thanks"),
        message("Fine, thanks"),
        idle(),
    ]));
    let llm = CopilotLlm::with_session(CopilotConfig::default(), session.clone());
    let request = GenerationRequest::new(vec![
        ModelMessage::system("Be brief"),
        ModelMessage::user("How are you?"),
    ]);

    let result = collect_stream(
        llm.generate_content(request, true, CancellationToken::new())
            .await
            .expect("generate_content"),
    )
    .await
    .expect("collect");

    assert_eq!(result.text, "Fine, thanks");
    assert_eq!(
        session.prompts(),
        vec!["System: Be brief\n\nUser: How are you?"]
    );
    assert!(llm.credentials().is_none());
}

#[tokio::test]
async fn slow_non_streaming_response_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(std::time::Duration::from_secs(2))
                .set_body_json(json!({ "choices": [] })),
        )
        .mount(&server)
        .await;

    let mut config = config(&server, "github_pat_direct");
    config.timeout = std::time::Duration::from_millis(100);
    let llm = CopilotLlm::new(config).expect("llm");

    let err = llm
        .generate(hello_request(), CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, CopilotError::Timeout(100)));
}
