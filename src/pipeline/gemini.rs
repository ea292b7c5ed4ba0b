//! Direct REST client for Google's Generative Language API.
//!
//! `POST {base_url}/v1beta/models/{model}:generateContent` with the prompt
//! and the image as two parts of a single user turn. The key travels in the
//! `x-goog-api-key` header so it never ends up in a logged URL.

use crate::config::AnalyzerConfig;
use crate::error::{InferenceError, NutritionError};
use crate::pipeline::compose::InferenceRequest;
use crate::pipeline::inference::{InferenceClient, InferenceResult};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

const PROVIDER: &str = "gemini";

/// Longest slice of an error body carried into an error message.
const MAX_ERROR_DETAIL: usize = 300;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    role: &'static str,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part {
    Text { text: String },
    InlineData { inline_data: InlineData },
}

#[derive(Debug, Serialize)]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: usize,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: Option<u64>,
    #[serde(default)]
    candidates_token_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

/// [`InferenceClient`] speaking the Gemini `generateContent` REST protocol.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    api_key: String,
    model: String,
    endpoint: String,
    temperature: f32,
    max_tokens: usize,
    timeout_secs: u64,
    client: Client,
}

impl GeminiClient {
    pub fn new(
        api_key: &str,
        model: &str,
        base_url: &str,
        config: &AnalyzerConfig,
    ) -> Result<Self, NutritionError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.api_timeout_secs))
            .build()
            .map_err(|e| NutritionError::Internal(format!("HTTP client: {e}")))?;

        Ok(Self {
            api_key: api_key.to_string(),
            model: model.to_string(),
            endpoint: endpoint_for(base_url, model),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            timeout_secs: config.api_timeout_secs,
            client,
        })
    }

    fn build_body(&self, request: &InferenceRequest) -> GenerateContentRequest {
        GenerateContentRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![
                    Part::Text {
                        text: request.prompt.clone(),
                    },
                    Part::InlineData {
                        inline_data: InlineData {
                            mime_type: request.image.mime_type.clone(),
                            data: request.image_base64(),
                        },
                    },
                ],
            }],
            generation_config: GenerationConfig {
                temperature: self.temperature,
                max_output_tokens: self.max_tokens,
            },
        }
    }
}

#[async_trait]
impl InferenceClient for GeminiClient {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn generate(&self, request: &InferenceRequest) -> Result<InferenceResult, InferenceError> {
        let body = self.build_body(request);
        debug!(
            "POST {} ({} prompt chars, {} image bytes)",
            self.endpoint,
            request.prompt.len(),
            request.image.data.len()
        );

        let response = self
            .client
            .post(&self.endpoint)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    InferenceError::Timeout {
                        provider: PROVIDER.into(),
                        secs: self.timeout_secs,
                    }
                } else {
                    InferenceError::Network {
                        provider: PROVIDER.into(),
                        detail: e.to_string(),
                    }
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = retry_after_secs(response.headers());
            let text = response.text().await.unwrap_or_default();
            warn!("Gemini API error: {}", status);
            return Err(classify_status(status, &text, retry_after));
        }

        let text = response.text().await.map_err(|e| InferenceError::Network {
            provider: PROVIDER.into(),
            detail: e.to_string(),
        })?;

        parse_response(&text, &self.model)
    }
}

fn endpoint_for(base_url: &str, model: &str) -> String {
    format!(
        "{}/v1beta/models/{}:generateContent",
        base_url.trim_end_matches('/'),
        model
    )
}

fn retry_after_secs(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

/// Map a non-success HTTP status to the matching [`InferenceError`].
fn classify_status(status: StatusCode, body: &str, retry_after: Option<u64>) -> InferenceError {
    let detail = error_detail(body);
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => InferenceError::Auth {
            provider: PROVIDER.into(),
            detail,
        },
        StatusCode::TOO_MANY_REQUESTS => InferenceError::RateLimited {
            provider: PROVIDER.into(),
            retry_after_secs: retry_after,
        },
        _ => InferenceError::Api {
            provider: PROVIDER.into(),
            status: status.as_u16(),
            detail,
        },
    }
}

/// Pull `error.message` out of a Google error body, else a truncated raw body.
fn error_detail(body: &str) -> String {
    let message = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string));
    match message {
        Some(m) => m,
        None => body.trim().chars().take(MAX_ERROR_DETAIL).collect(),
    }
}

/// Join every text part of the first candidate.
fn parse_response(body: &str, model: &str) -> Result<InferenceResult, InferenceError> {
    let parsed: GenerateContentResponse =
        serde_json::from_str(body).map_err(|e| InferenceError::MalformedResponse {
            provider: PROVIDER.into(),
            detail: e.to_string(),
        })?;

    let Some(candidate) = parsed.candidates.first() else {
        return Err(InferenceError::EmptyResponse {
            provider: PROVIDER.into(),
            reason: parsed.prompt_feedback.and_then(|f| f.block_reason),
        });
    };

    let text: String = candidate
        .content
        .iter()
        .flat_map(|c| c.parts.iter())
        .filter_map(|p| p.text.as_deref())
        .collect();

    if text.trim().is_empty() {
        return Err(InferenceError::EmptyResponse {
            provider: PROVIDER.into(),
            reason: candidate.finish_reason.clone(),
        });
    }

    let usage = parsed.usage_metadata.as_ref();
    Ok(InferenceResult {
        text,
        model: model.to_string(),
        input_tokens: usage.and_then(|u| u.prompt_token_count),
        output_tokens: usage.and_then(|u| u.candidates_token_count),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::normalize::NormalizedImagePayload;

    fn request() -> InferenceRequest {
        InferenceRequest {
            prompt: "T make it vegan-only".into(),
            image: NormalizedImagePayload {
                mime_type: "image/png".into(),
                data: vec![1, 2, 3],
                width: 1,
                height: 1,
            },
        }
    }

    fn client() -> GeminiClient {
        GeminiClient::new(
            "k",
            "gemini-2.5-flash",
            "https://example.test/",
            &AnalyzerConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn endpoint_strips_trailing_slash() {
        assert_eq!(
            client().endpoint,
            "https://example.test/v1beta/models/gemini-2.5-flash:generateContent"
        );
    }

    #[test]
    fn body_has_prompt_then_inline_image() {
        let body = serde_json::to_value(client().build_body(&request())).unwrap();
        let parts = &body["contents"][0]["parts"];
        assert_eq!(parts[0]["text"], "T make it vegan-only");
        assert_eq!(parts[1]["inline_data"]["mime_type"], "image/png");
        assert_eq!(parts[1]["inline_data"]["data"], "AQID");
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 2048);
    }

    #[test]
    fn parses_text_and_usage() {
        let body = r#"{
            "candidates": [{"content": {"parts": [{"text": "1. Rice - 200 kcal"}, {"text": "\nHealthy."}]}, "finishReason": "STOP"}],
            "usageMetadata": {"promptTokenCount": 300, "candidatesTokenCount": 42}
        }"#;
        let r = parse_response(body, "gemini-2.5-flash").unwrap();
        assert_eq!(r.text, "1. Rice - 200 kcal\nHealthy.");
        assert_eq!(r.input_tokens, Some(300));
        assert_eq!(r.output_tokens, Some(42));
    }

    #[test]
    fn blocked_prompt_is_empty_response_with_reason() {
        let body = r#"{"promptFeedback": {"blockReason": "SAFETY"}}"#;
        match parse_response(body, "m") {
            Err(InferenceError::EmptyResponse { reason, .. }) => {
                assert_eq!(reason.as_deref(), Some("SAFETY"))
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn non_json_is_malformed() {
        assert!(matches!(
            parse_response("<html>bad gateway</html>", "m"),
            Err(InferenceError::MalformedResponse { .. })
        ));
    }

    #[test]
    fn status_classification() {
        let body = r#"{"error": {"code": 403, "message": "API key not valid"}}"#;
        match classify_status(StatusCode::FORBIDDEN, body, None) {
            InferenceError::Auth { detail, .. } => assert_eq!(detail, "API key not valid"),
            other => panic!("unexpected: {other:?}"),
        }
        assert!(matches!(
            classify_status(StatusCode::TOO_MANY_REQUESTS, "", Some(7)),
            InferenceError::RateLimited {
                retry_after_secs: Some(7),
                ..
            }
        ));
        assert!(matches!(
            classify_status(StatusCode::INTERNAL_SERVER_ERROR, "oops", None),
            InferenceError::Api { status: 500, .. }
        ));
    }

    #[tokio::test]
    async fn refused_connection_is_network_error() {
        // Bind then drop to get a local port nothing is listening on.
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let c = GeminiClient::new(
            "k",
            "m",
            &format!("http://127.0.0.1:{port}"),
            &AnalyzerConfig::default(),
        )
        .unwrap();

        match c.generate(&request()).await {
            Err(InferenceError::Network { provider, .. }) => assert_eq!(provider, "gemini"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    /// Serve one canned HTTP response on a local port and hand back the
    /// raw request that was received.
    async fn serve_once(
        response: String,
    ) -> (String, tokio::task::JoinHandle<String>) {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut raw = Vec::new();
            let mut buf = [0u8; 4096];
            // Read headers, then exactly Content-Length body bytes.
            let body_start = loop {
                let n = socket.read(&mut buf).await.unwrap();
                assert!(n > 0, "client closed before sending headers");
                raw.extend_from_slice(&buf[..n]);
                if let Some(pos) = raw.windows(4).position(|w| w == b"\r\n\r\n") {
                    break pos + 4;
                }
            };
            let head = String::from_utf8_lossy(&raw[..body_start]).to_lowercase();
            let content_length: usize = head
                .lines()
                .find_map(|l| l.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(0);
            while raw.len() < body_start + content_length {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                raw.extend_from_slice(&buf[..n]);
            }
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            String::from_utf8_lossy(&raw).into_owned()
        });
        (base_url, handle)
    }

    fn http_response(status_line: &str, extra_headers: &str, body: &str) -> String {
        format!(
            "HTTP/1.1 {status_line}\r\ncontent-type: application/json\r\n{extra_headers}\
             content-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        )
    }

    fn client_at(base_url: &str) -> GeminiClient {
        GeminiClient::new("secret-key", "gemini-2.5-flash", base_url, &AnalyzerConfig::default())
            .unwrap()
    }

    #[tokio::test]
    async fn generate_parses_a_successful_reply() {
        let body = r#"{"candidates":[{"content":{"parts":[{"text":"1. Rice - 200 kcal"}]},"finishReason":"STOP"}],"usageMetadata":{"promptTokenCount":12,"candidatesTokenCount":5}}"#;
        let (base_url, server) = serve_once(http_response("200 OK", "", body)).await;

        let result = client_at(&base_url).generate(&request()).await.unwrap();
        assert_eq!(result.text, "1. Rice - 200 kcal");
        assert_eq!(result.model, "gemini-2.5-flash");
        assert_eq!(result.input_tokens, Some(12));
        assert_eq!(result.output_tokens, Some(5));

        let seen = server.await.unwrap();
        assert!(seen.starts_with("POST /v1beta/models/gemini-2.5-flash:generateContent "));
        assert!(seen.to_lowercase().contains("x-goog-api-key: secret-key"));
        assert!(!seen.lines().next().unwrap_or("").contains("secret-key"));
        assert!(seen.contains("\"inline_data\""));
    }

    #[tokio::test]
    async fn generate_maps_429_with_retry_after() {
        let body = r#"{"error":{"code":429,"message":"Resource has been exhausted"}}"#;
        let (base_url, server) = serve_once(http_response(
            "429 Too Many Requests",
            "retry-after: 17\r\n",
            body,
        ))
        .await;

        match client_at(&base_url).generate(&request()).await {
            Err(InferenceError::RateLimited {
                provider,
                retry_after_secs,
            }) => {
                assert_eq!(provider, "gemini");
                assert_eq!(retry_after_secs, Some(17));
            }
            other => panic!("unexpected: {other:?}"),
        }
        server.await.unwrap();
    }

    #[tokio::test]
    async fn generate_maps_server_error_with_detail() {
        let body = r#"{"error":{"code":404,"message":"models/gemini-2.5-flash is not found"}}"#;
        let (base_url, server) = serve_once(http_response("404 Not Found", "", body)).await;

        match client_at(&base_url).generate(&request()).await {
            Err(InferenceError::Api { status, detail, .. }) => {
                assert_eq!(status, 404);
                assert_eq!(detail, "models/gemini-2.5-flash is not found");
            }
            other => panic!("unexpected: {other:?}"),
        }
        server.await.unwrap();
    }
}
