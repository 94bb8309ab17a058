//! Ollama HTTP backend.

use super::TextBackend;
use crate::config::BackendConfig;
use crate::errors::BackendError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Request body for Ollama `/api/generate`.
#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<GenerateOptions>,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f32,
}

/// Response body from Ollama `/api/generate`.
#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

/// Backend that calls a local (or remote) Ollama server.
#[derive(Debug, Clone)]
pub struct OllamaBackend {
    client: reqwest::Client,
    config: BackendConfig,
}

impl OllamaBackend {
    /// Creates a backend from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Http`] if the HTTP client cannot be built.
    pub fn new(config: BackendConfig) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| BackendError::Http(e.to_string()))?;

        Ok(Self { client, config })
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    /// Returns the generation URL.
    #[must_use]
    pub fn generate_url(&self) -> String {
        format!("{}/api/generate", self.config.base_url())
    }

    fn request_body<'a>(&'a self, prompt: &'a str) -> GenerateRequest<'a> {
        GenerateRequest {
            model: &self.config.model,
            prompt,
            stream: false,
            options: self
                .config
                .temperature
                .map(|temperature| GenerateOptions { temperature }),
        }
    }

    fn map_send_error(&self, e: &reqwest::Error) -> BackendError {
        if e.is_connect() {
            BackendError::Unreachable {
                endpoint: self.config.base_url().to_string(),
            }
        } else if e.is_timeout() {
            BackendError::Timeout {
                seconds: self.config.timeout_seconds,
            }
        } else {
            BackendError::Http(e.to_string())
        }
    }
}

#[async_trait]
impl TextBackend for OllamaBackend {
    fn name(&self) -> &'static str {
        "ollama"
    }

    async fn generate(&self, prompt: &str) -> Result<String, BackendError> {
        let url = self.generate_url();
        tracing::debug!(
            url = %url,
            model = %self.config.model,
            prompt_bytes = prompt.len(),
            "Sending generation request"
        );

        let response = self
            .client
            .post(&url)
            .json(&self.request_body(prompt))
            .send()
            .await
            .map_err(|e| self.map_send_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Status {
                code: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                BackendError::Timeout {
                    seconds: self.config.timeout_seconds,
                }
            } else {
                BackendError::InvalidResponse(e.to_string())
            }
        })?;

        tracing::debug!(response_bytes = parsed.response.len(), "Generation finished");
        Ok(parsed.response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_generate_url() {
        let backend =
            OllamaBackend::new(BackendConfig::new().with_endpoint("http://localhost:11434/")).unwrap();
        assert_eq!(backend.generate_url(), "http://localhost:11434/api/generate");
    }

    #[test]
    fn test_request_body_without_options() {
        let backend = OllamaBackend::new(BackendConfig::default()).unwrap();
        let body = serde_json::to_value(backend.request_body("hello")).unwrap();

        assert_eq!(
            body,
            serde_json::json!({
                "model": "llama3.1:latest",
                "prompt": "hello",
                "stream": false,
            })
        );
    }

    #[test]
    fn test_request_body_with_temperature() {
        let backend = OllamaBackend::new(BackendConfig::new().with_temperature(0.5)).unwrap();
        let body = serde_json::to_value(backend.request_body("hi")).unwrap();

        assert_eq!(body["options"]["temperature"], serde_json::json!(0.5));
    }

    #[test]
    fn test_response_decoding() {
        let parsed: GenerateResponse =
            serde_json::from_str(r#"{"model": "m", "response": "{\"topics\": []}", "done": true}"#)
                .unwrap();
        assert_eq!(parsed.response, "{\"topics\": []}");
    }

    #[tokio::test]
    async fn test_unreachable_endpoint() {
        // Port 9 (discard) is not served on loopback in test environments.
        let backend = OllamaBackend::new(
            BackendConfig::new()
                .with_endpoint("http://127.0.0.1:9")
                .with_timeout_seconds(5),
        )
        .unwrap();

        let err = backend.generate("ping").await.unwrap_err();
        assert!(matches!(err, BackendError::Unreachable { .. }), "got {err:?}");
    }

    /// Serves one canned HTTP response on loopback and returns the endpoint
    /// plus a handle yielding the request body that was received.
    async fn serve_once(status_line: &'static str, body: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let endpoint = format!("http://{}", listener.local_addr().unwrap());

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut received = Vec::new();
            let mut buf = [0_u8; 4096];

            let header_end = loop {
                let n = socket.read(&mut buf).await.unwrap();
                received.extend_from_slice(&buf[..n]);
                if let Some(pos) = received.windows(4).position(|w| w == b"\r\n\r\n") {
                    break pos + 4;
                }
                assert!(n > 0, "connection closed before headers");
            };
            let headers = String::from_utf8_lossy(&received[..header_end]).to_lowercase();
            let content_length: usize = headers
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .map_or(0, |v| v.trim().parse().unwrap());
            while received.len() < header_end + content_length {
                let n = socket.read(&mut buf).await.unwrap();
                assert!(n > 0, "connection closed before body");
                received.extend_from_slice(&buf[..n]);
            }

            let response = format!(
                "{status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();

            String::from_utf8_lossy(&received[header_end..]).into_owned()
        });

        (endpoint, handle)
    }

    fn backend_for(endpoint: &str) -> OllamaBackend {
        OllamaBackend::new(BackendConfig::new().with_endpoint(endpoint).with_timeout_seconds(5)).unwrap()
    }

    #[tokio::test]
    async fn test_generate_success() {
        let (endpoint, server) =
            serve_once("HTTP/1.1 200 OK", r#"{"model": "m", "response": "{\"topics\": []}", "done": true}"#).await;

        let text = backend_for(&endpoint).generate("segment this").await.unwrap();
        assert_eq!(text, "{\"topics\": []}");

        let request: serde_json::Value = serde_json::from_str(&server.await.unwrap()).unwrap();
        assert_eq!(request["prompt"], "segment this");
        assert_eq!(request["stream"], false);
    }

    #[tokio::test]
    async fn test_non_success_status() {
        let (endpoint, server) =
            serve_once("HTTP/1.1 404 Not Found", r#"{"error": "model 'llama3.1:latest' not found"}"#).await;

        let err = backend_for(&endpoint).generate("ping").await.unwrap_err();
        server.await.unwrap();

        match err {
            BackendError::Status { code, body } => {
                assert_eq!(code, 404);
                assert!(body.contains("not found"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_malformed_body() {
        let (endpoint, server) = serve_once("HTTP/1.1 200 OK", r#"{"done": true}"#).await;

        let err = backend_for(&endpoint).generate("ping").await.unwrap_err();
        server.await.unwrap();

        assert!(matches!(err, BackendError::InvalidResponse(_)), "got {err:?}");
    }
}
