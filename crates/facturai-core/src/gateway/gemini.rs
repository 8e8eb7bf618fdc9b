//! Live extraction through the Gemini `generateContent` API.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::{ExtractionGateway, Result};
use crate::error::GatewayError;
use crate::models::config::GatewayConfig;
use crate::models::raw::RawExtractionResponse;
use crate::request::ExtractionRequest;

/// Gemini API client sending each invoice as inline PDF data.
pub struct GeminiGateway {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: String,
    timeout_secs: u64,
    max_file_bytes: u64,
    temperature: f32,
}

impl GeminiGateway {
    /// Create a client with the configured timeout.
    pub fn new(config: &GatewayConfig, api_key: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GatewayError::Client(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: api_key.into(),
            timeout_secs: config.timeout_secs,
            max_file_bytes: config.max_file_bytes,
            temperature: config.temperature,
        })
    }

    fn url(&self) -> String {
        format!("{}/models/{}:generateContent", self.endpoint, self.model)
    }

    async fn read_document(&self, request: &ExtractionRequest) -> Result<Vec<u8>> {
        let size = tokio::fs::metadata(&request.path).await?.len();
        if size > self.max_file_bytes {
            return Err(GatewayError::TooLarge {
                size,
                limit: self.max_file_bytes,
            });
        }
        Ok(tokio::fs::read(&request.path).await?)
    }

    fn map_send_error(&self, e: reqwest::Error) -> GatewayError {
        if e.is_timeout() {
            GatewayError::Timeout(self.timeout_secs)
        } else {
            GatewayError::Http(e.to_string())
        }
    }
}

/// Request body for `models/{model}:generateContent`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
enum Part<'a> {
    Text(&'a str),
    InlineData(InlineData),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: &'static str,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    response_mime_type: &'static str,
}

/// Response body from `generateContent`.
#[derive(Debug, Default, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

fn build_body<'a>(instructions: &'a str, document: &[u8], temperature: f32) -> GenerateRequest<'a> {
    GenerateRequest {
        contents: vec![Content {
            role: "user",
            parts: vec![
                Part::Text(instructions),
                Part::InlineData(InlineData {
                    mime_type: "application/pdf",
                    data: BASE64.encode(document),
                }),
            ],
        }],
        generation_config: GenerationConfig {
            temperature,
            response_mime_type: "application/json",
        },
    }
}

/// Concatenated text of the first candidate.
fn candidate_text(response: GenerateResponse) -> Result<String> {
    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or(GatewayError::EmptyResponse)?;

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(GatewayError::EmptyResponse);
    }
    Ok(text)
}

#[async_trait]
impl ExtractionGateway for GeminiGateway {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn extract(&self, request: &ExtractionRequest) -> Result<RawExtractionResponse> {
        let document = self.read_document(request).await?;
        debug!(
            "Sending {} ({} bytes) to {}",
            request.source_file,
            document.len(),
            self.model
        );

        let body = build_body(request.instructions, &document, self.temperature);

        let response = self
            .client
            .post(self.url())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Service {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::InvalidJson(e.to_string()))?;

        let text = candidate_text(parsed)?;
        trace!("Raw response for {}: {}", request.source_file, text);

        RawExtractionResponse::from_text(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::build_request;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::path::Path;

    #[test]
    fn test_request_body_shape() {
        let body = build_body("extract", b"%PDF", 0.0);
        let value = serde_json::to_value(&body).unwrap();

        assert_eq!(
            value,
            json!({
                "contents": [{
                    "role": "user",
                    "parts": [
                        {"text": "extract"},
                        {"inlineData": {"mimeType": "application/pdf", "data": "JVBERg=="}}
                    ]
                }],
                "generationConfig": {"temperature": 0.0, "responseMimeType": "application/json"}
            })
        );
    }

    #[test]
    fn test_candidate_text_joins_parts() {
        let response: GenerateResponse = serde_json::from_value(json!({
            "candidates": [{"content": {"parts": [{"text": "{\"total\":"}, {"text": " 5}"}]}}]
        }))
        .unwrap();

        assert_eq!(candidate_text(response).unwrap(), "{\"total\": 5}");
    }

    #[test]
    fn test_candidate_text_without_candidates() {
        let response: GenerateResponse = serde_json::from_value(json!({})).unwrap();
        assert!(matches!(
            candidate_text(response),
            Err(GatewayError::EmptyResponse)
        ));
    }

    #[test]
    fn test_url() {
        let gateway = GeminiGateway::new(&GatewayConfig::default(), "key").unwrap();
        assert_eq!(
            gateway.url(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash:generateContent"
        );
    }

    #[tokio::test]
    async fn test_oversized_file_is_rejected_before_sending() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.pdf");
        std::fs::write(&path, vec![0u8; 64]).unwrap();

        let config = GatewayConfig {
            max_file_bytes: 16,
            ..GatewayConfig::default()
        };
        let gateway = GeminiGateway::new(&config, "key").unwrap();
        let result = gateway.extract(&build_request(0, &path, dir.path())).await;

        assert!(matches!(
            result,
            Err(GatewayError::TooLarge { size: 64, limit: 16 })
        ));
    }

    #[tokio::test]
    async fn test_missing_file_is_read_error() {
        let gateway = GeminiGateway::new(&GatewayConfig::default(), "key").unwrap();
        let request = build_request(0, Path::new("/nonexistent/a.pdf"), Path::new("/nonexistent"));

        assert!(matches!(
            gateway.extract(&request).await,
            Err(GatewayError::Read(_))
        ));
    }

    /// Serve one canned HTTP response on a local port and return its base URL.
    async fn serve_once(status: &'static str, body: &'static str) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut received = Vec::new();
            let mut buf = [0u8; 8192];
            while !request_complete(&received) {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                received.extend_from_slice(&buf[..n]);
            }

            let response = format!(
                "HTTP/1.1 {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;
        });

        format!("http://{}", addr)
    }

    fn request_complete(data: &[u8]) -> bool {
        let Some(end) = data.windows(4).position(|w| w == b"\r\n\r\n") else {
            return false;
        };
        let head = String::from_utf8_lossy(&data[..end]).to_lowercase();
        let length: usize = head
            .lines()
            .find_map(|line| line.strip_prefix("content-length:"))
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(0);
        data.len() >= end + 4 + length
    }

    async fn extract_from(endpoint: String) -> Result<RawExtractionResponse> {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.pdf");
        std::fs::write(&path, b"%PDF-1.4").unwrap();

        let config = GatewayConfig {
            endpoint,
            timeout_secs: 10,
            ..GatewayConfig::default()
        };
        let gateway = GeminiGateway::new(&config, "key").unwrap();
        gateway.extract(&build_request(0, &path, dir.path())).await
    }

    #[tokio::test]
    async fn test_success_response_is_parsed() {
        let endpoint = serve_once(
            "200 OK",
            r#"{"candidates":[{"content":{"parts":[{"text":"```json\n{\"total\": 5}\n```"}]}}]}"#,
        )
        .await;

        let raw = extract_from(endpoint).await.unwrap();
        assert_eq!(raw.value(), &json!({"total": 5}));
    }

    #[tokio::test]
    async fn test_error_status_is_service_error() {
        let endpoint = serve_once("500 Internal Server Error", r#"{"error":"boom"}"#).await;

        match extract_from(endpoint).await {
            Err(GatewayError::Service { status, body }) => {
                assert_eq!(status, 500);
                assert_eq!(body, r#"{"error":"boom"}"#);
            }
            other => panic!("expected service error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_malformed_body_is_invalid_json() {
        let endpoint = serve_once("200 OK", "this is not json").await;

        assert!(matches!(
            extract_from(endpoint).await,
            Err(GatewayError::InvalidJson(_))
        ));
    }

    #[tokio::test]
    async fn test_unreachable_service_is_http_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.pdf");
        std::fs::write(&path, b"%PDF-1.4").unwrap();

        let config = GatewayConfig {
            endpoint: "http://127.0.0.1:1".to_string(),
            timeout_secs: 5,
            ..GatewayConfig::default()
        };
        let gateway = GeminiGateway::new(&config, "key").unwrap();
        let result = gateway.extract(&build_request(0, &path, dir.path())).await;

        assert!(matches!(
            result,
            Err(GatewayError::Http(_)) | Err(GatewayError::Timeout(_))
        ));
    }
}
