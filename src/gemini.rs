//! Google Gemini `generateContent` client with Google Search grounding.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::ScanError;
use crate::screener::{Completion, ModelBackend};
use crate::types::Source;

/// Explicit client settings; the credential is injected, never read from the environment here.
#[derive(Debug, Clone)]
pub struct GeminiSettings {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub timeout_secs: u64,
}

/// Credential header; keeps the key out of the request URL and therefore out of
/// reqwest error text.
const API_KEY_HEADER: &str = "x-goog-api-key";

pub struct GeminiClient {
    api_key: String,
    model: String,
    base_url: String,
    client: Client,
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    tools: Vec<Tool>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct Tool {
    google_search: GoogleSearch,
}

#[derive(Debug, Serialize)]
struct GoogleSearch {}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    grounding_metadata: Option<GroundingMetadata>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroundingMetadata {
    #[serde(default)]
    grounding_chunks: Vec<GroundingChunk>,
}

#[derive(Debug, Deserialize)]
struct GroundingChunk {
    web: Option<WebChunk>,
}

#[derive(Debug, Deserialize)]
struct WebChunk {
    uri: Option<String>,
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

impl GeminiClient {
    /// Fails with a configuration error when no credential is present, before any
    /// network activity.
    pub fn new(settings: GeminiSettings) -> Result<Self, ScanError> {
        let api_key = settings
            .api_key
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                ScanError::Configuration(
                    "Gemini API key not found. Set GEMINI_API_KEY (or API_KEY).".to_string(),
                )
            })?;

        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| ScanError::Configuration(format!("HTTP client: {e}")))?;

        Ok(Self {
            api_key,
            model: settings.model,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        let model = if self.model.starts_with("models/") {
            self.model.clone()
        } else {
            format!("models/{}", self.model)
        };
        format!("{}/{model}:generateContent", self.base_url)
    }
}

fn citations_from(metadata: Option<&GroundingMetadata>) -> Vec<Source> {
    metadata
        .map(|m| {
            m.grounding_chunks
                .iter()
                .filter_map(|c| c.web.as_ref())
                .filter_map(|w| match (&w.title, &w.uri) {
                    (Some(title), Some(uri)) if !uri.is_empty() => Some(Source {
                        title: title.clone(),
                        uri: uri.clone(),
                    }),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default()
}

#[async_trait]
impl ModelBackend for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<Completion, ScanError> {
        let start = Instant::now();
        let body = GenerateContentRequest {
            contents: vec![Content { role: "user", parts: vec![Part { text: prompt }] }],
            tools: vec![Tool { google_search: GoogleSearch {} }],
        };

        let response = self
            .client
            .post(self.endpoint())
            .header(API_KEY_HEADER, self.api_key.as_str())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let raw = response.text().await?;
        let parsed: Option<GenerateContentResponse> = serde_json::from_str(&raw).ok();

        if !status.is_success() {
            let message = parsed
                .and_then(|p| p.error)
                .map(|e| e.message)
                .unwrap_or_else(|| raw.chars().take(200).collect());
            warn!(status = status.as_u16(), model = %self.model, "Gemini request rejected");
            return Err(ScanError::Transport(format!("Gemini returned {status}: {message}")));
        }

        let parsed = parsed.ok_or_else(|| {
            ScanError::Transport("Gemini returned an undecodable response envelope".to_string())
        })?;
        if let Some(e) = parsed.error {
            return Err(ScanError::Transport(format!("Gemini error: {}", e.message)));
        }

        let candidate = parsed.candidates.into_iter().next();
        let text: String = candidate
            .as_ref()
            .and_then(|c| c.content.as_ref())
            .map(|c| c.parts.iter().filter_map(|p| p.text.as_deref()).collect())
            .unwrap_or_default();
        let citations = citations_from(candidate.as_ref().and_then(|c| c.grounding_metadata.as_ref()));

        debug!(
            model = %self.model,
            elapsed_ms = start.elapsed().as_millis() as u64,
            text_chars = text.chars().count(),
            citations = citations.len(),
            finish_reason = candidate.as_ref().and_then(|c| c.finish_reason.as_deref()).unwrap_or("n/a"),
            "Gemini completion received"
        );

        if text.trim().is_empty() {
            return Err(ScanError::Format("model returned no text".to_string()));
        }
        Ok(Completion { text, citations })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn settings(base_url: &str) -> GeminiSettings {
        GeminiSettings {
            api_key: Some("test-key".to_string()),
            model: "gemini-2.5-flash".to_string(),
            base_url: base_url.to_string(),
            timeout_secs: 5,
        }
    }

    #[test]
    fn missing_key_fails_before_any_call() {
        let mut s = settings("http://127.0.0.1:9");
        s.api_key = None;
        assert!(matches!(GeminiClient::new(s), Err(ScanError::Configuration(_))));

        let mut s = settings("http://127.0.0.1:9");
        s.api_key = Some("   ".to_string());
        assert!(matches!(GeminiClient::new(s), Err(ScanError::Configuration(_))));
    }

    #[test]
    fn endpoint_accepts_prefixed_model() {
        let mut s = settings("https://example.test/v1beta/");
        s.model = "models/gemini-x".to_string();
        let c = GeminiClient::new(s).unwrap();
        assert_eq!(c.endpoint(), "https://example.test/v1beta/models/gemini-x:generateContent");
    }

    #[tokio::test]
    async fn sends_search_tool_and_reads_text_with_citations() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/gemini-2.5-flash:generateContent"))
            .and(header("x-goog-api-key", "test-key"))
            .and(body_partial_json(json!({"tools": [{"google_search": {}}]})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{
                    "content": {"parts": [{"text": "```json\n[{\"symbol\":"}, {"text": "\"AAPL\"}]\n```"}]},
                    "finishReason": "STOP",
                    "groundingMetadata": {"groundingChunks": [
                        {"web": {"uri": "https://a.example", "title": "A"}},
                        {"web": {"uri": "https://b.example"}},
                        {"retrievedContext": {}}
                    ]}
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = GeminiClient::new(settings(&server.uri())).unwrap();
        let completion = client.generate("prompt").await.unwrap();
        assert_eq!(completion.text, "```json\n[{\"symbol\":\"AAPL\"}]\n```");
        assert_eq!(
            completion.citations,
            vec![Source { title: "A".to_string(), uri: "https://a.example".to_string() }]
        );
    }

    #[tokio::test]
    async fn api_error_status_is_transport_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({
                "error": {"code": 403, "message": "API key not valid"}
            })))
            .mount(&server)
            .await;

        let client = GeminiClient::new(settings(&server.uri())).unwrap();
        match client.generate("prompt").await {
            Err(ScanError::Transport(msg)) => assert!(msg.contains("API key not valid"), "{msg}"),
            other => panic!("expected transport error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_candidate_text_is_format_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"candidates": []})))
            .mount(&server)
            .await;

        let client = GeminiClient::new(settings(&server.uri())).unwrap();
        assert!(matches!(client.generate("prompt").await, Err(ScanError::Format(_))));
    }

    #[tokio::test]
    async fn unreachable_service_is_transport_error() {
        let client = GeminiClient::new(settings("http://127.0.0.1:9")).unwrap();
        assert!(matches!(client.generate("prompt").await, Err(ScanError::Transport(_))));
    }

    #[tokio::test]
    async fn credential_never_reaches_error_detail() {
        let mut s = settings("http://127.0.0.1:9");
        s.api_key = Some("SECRET-KEY-123".to_string());
        s.model = "m".to_string();
        let err = GeminiClient::new(s).unwrap().generate("prompt").await.unwrap_err();
        assert!(!err.detail().contains("SECRET-KEY-123"), "{}", err.detail());

        let resp = axum::response::IntoResponse::into_response(crate::error::AppError::from(err));
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        assert!(!String::from_utf8_lossy(&bytes).contains("SECRET-KEY-123"));
    }

    #[tokio::test]
    async fn key_is_not_sent_in_query_string() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(query_param("key", "test-key"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{"content": {"parts": [{"text": "[]"}]}}]
            })))
            .mount(&server)
            .await;

        let client = GeminiClient::new(settings(&server.uri())).unwrap();
        assert_eq!(client.generate("prompt").await.unwrap().text, "[]");
    }
}
