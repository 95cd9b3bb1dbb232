//! Outbound HTTP seam.

use std::future::Future;
use std::pin::Pin;

use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method};
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::error::AiError;

/// A fully resolved provider request.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    /// HTTP method, e.g. `POST`.
    pub method: String,
    /// Absolute URL.
    pub url: String,
    /// Header name/value pairs.
    pub headers: Vec<(String, String)>,
    /// JSON body.
    pub body: Value,
}

impl HttpRequest {
    /// Returns the value of the first header named `name` (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Raw provider answer. Status codes are not interpreted here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// Status code.
    pub status: u16,
    /// Canonical reason phrase, empty if unknown.
    pub status_text: String,
    /// Response body text.
    pub body: String,
}

impl HttpResponse {
    /// Returns true for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends one request and returns the raw response.
///
/// Implementations must not retry and must not apply their own timeout;
/// callers cancel by dropping the future.
pub trait HttpTransport: Send + Sync {
    /// Sends `request`.
    fn send<'a>(
        &'a self,
        request: &'a HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, AiError>> + Send + 'a>>;
}

/// [`HttpTransport`] backed by `reqwest`.
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Creates a transport with a default client.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a transport around an existing client.
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

impl HttpTransport for ReqwestTransport {
    fn send<'a>(
        &'a self,
        request: &'a HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, AiError>> + Send + 'a>> {
        Box::pin(async move {
            let url = Url::parse(&request.url)
                .map_err(|e| AiError::Network(format!("Invalid URL '{}': {e}", request.url)))?;
            let method = Method::from_bytes(request.method.to_ascii_uppercase().as_bytes())
                .map_err(|e| AiError::Network(format!("Invalid method '{}': {e}", request.method)))?;
            let body = serde_json::to_vec(&request.body)
                .map_err(|e| AiError::Network(format!("Failed to serialize body: {e}")))?;

            let mut builder = self.client.request(method, url).body(body);
            for (name, value) in &request.headers {
                builder = builder.header(name.as_str(), value.as_str());
            }
            if request.header("content-type").is_none() {
                builder = builder.header(CONTENT_TYPE, "application/json");
            }

            let response = builder
                .send()
                .await
                .map_err(|e| AiError::Network(e.to_string()))?;

            let status = response.status();
            let body = response
                .text()
                .await
                .map_err(|e| AiError::Network(format!("Failed to read response body: {e}")))?;
            debug!(status = status.as_u16(), body_len = body.len(), "Read response body");

            Ok(HttpResponse {
                status: status.as_u16(),
                status_text: status.canonical_reason().unwrap_or_default().to_string(),
                body,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn header_lookup_is_case_insensitive() {
        let request = HttpRequest {
            method: "POST".to_string(),
            url: "http://localhost/x".to_string(),
            headers: vec![("Authorization".to_string(), "Bearer k".to_string())],
            body: json!({}),
        };
        assert_eq!(request.header("authorization"), Some("Bearer k"));
        assert_eq!(request.header("x-api-key"), None);
    }

    #[test]
    fn success_range() {
        let response = |status| HttpResponse {
            status,
            status_text: String::new(),
            body: String::new(),
        };
        assert!(response(200).is_success());
        assert!(response(204).is_success());
        assert!(!response(301).is_success());
        assert!(!response(429).is_success());
    }

    #[tokio::test]
    async fn truncated_body_is_a_network_error() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 4096];
            let _ = socket.read(&mut buf).await;
            socket
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 100\r\n\r\nshort")
                .await
                .unwrap();
        });

        let request = HttpRequest {
            method: "POST".to_string(),
            url: format!("http://{addr}/v1/chat"),
            headers: Vec::new(),
            body: json!({}),
        };
        let err = ReqwestTransport::new().send(&request).await.unwrap_err();
        assert!(matches!(err, AiError::Network(msg) if msg.contains("Failed to read response body")));
    }

    #[tokio::test]
    async fn invalid_url_is_a_network_error() {
        let request = HttpRequest {
            method: "POST".to_string(),
            url: "not a url".to_string(),
            headers: Vec::new(),
            body: json!({}),
        };
        let err = ReqwestTransport::new().send(&request).await.unwrap_err();
        assert!(matches!(err, AiError::Network(msg) if msg.contains("Invalid URL")));
    }
}
