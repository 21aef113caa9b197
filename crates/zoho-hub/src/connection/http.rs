//! HTTP client abstraction for the Zoho APIs
//!
//! This module provides a trait-based HTTP client that can be easily mocked for testing.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use url::Url;

/// Body of an outbound request
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Empty,
    Json(Value),
    /// `application/x-www-form-urlencoded` pairs
    Form(Vec<(String, String)>),
}

/// A fully built request, ready to be sent (and re-sent)
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: RequestBody,
}

impl HttpRequest {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: RequestBody::Empty,
        }
    }

    pub fn form(mut self, pairs: Vec<(String, String)>) -> Self {
        self.body = RequestBody::Form(pairs);
        self
    }

    /// Replaces the `Authorization` header
    pub fn set_authorization(&mut self, value: HeaderValue) {
        self.headers.insert(AUTHORIZATION, value);
    }

    /// The `Authorization` header, if set and printable
    pub fn authorization(&self) -> Option<&str> {
        self.headers.get(AUTHORIZATION)?.to_str().ok()
    }
}

/// Trait for making HTTP requests
///
/// This abstraction allows easy mocking of HTTP calls in tests.
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Sends the request and returns the raw response
    ///
    /// Non-2xx statuses are not errors at this level.
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse>;
}

/// Response from an HTTP request
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Returns true if status is in 2xx range
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Deserializes the body as JSON
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_str(&self.body).context("Failed to parse JSON response")
    }

    /// Decodes the body leniently: empty or malformed bodies become `null`
    pub fn into_value(self) -> Value {
        if self.body.trim().is_empty() {
            return Value::Null;
        }

        match serde_json::from_str(&self.body) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(
                    "Passing through malformed response body (status {}): {}",
                    self.status,
                    e
                );
                Value::Null
            }
        }
    }
}

/// Production HTTP client using reqwest
#[derive(Debug, Clone)]
pub struct ReqwestClient {
    inner: reqwest::Client,
}

impl ReqwestClient {
    /// Creates a client whose requests give up after `timeout`
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let inner = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self { inner })
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse> {
        let builder = self
            .inner
            .request(request.method.clone(), request.url.clone())
            .headers(request.headers.clone());

        let builder = match &request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(body) => builder.json(body),
            RequestBody::Form(pairs) => builder.form(pairs),
        };

        let response = builder
            .send()
            .await
            .with_context(|| format!("Failed to send {} {}", request.method, request.url))?;

        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();

        Ok(HttpResponse { status, body })
    }
}


#[cfg(test)]
mod tests {
    use super::mock::MockHttpClient;
    use super::*;
    use serde_json::json;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[tokio::test]
    async fn mock_client_serves_queue_then_repeats_last() {
        let client = MockHttpClient::new()
            .respond(200, "first")
            .respond(500, "second");
        let request = HttpRequest::new(Method::GET, url("https://api.example.com/data"));

        assert_eq!(client.send(&request).await.unwrap().body, "first");
        assert_eq!(client.send(&request).await.unwrap().status, 500);
        assert_eq!(client.send(&request).await.unwrap().body, "second");
        assert_eq!(client.request_count(), 3);
    }

    #[tokio::test]
    async fn mock_client_errors_without_responses() {
        let client = MockHttpClient::new();
        let request = HttpRequest::new(Method::GET, url("https://api.example.com/unknown"));

        let result = client.send(&request).await;
        assert!(result.unwrap_err().to_string().contains("No mock response configured"));
    }

    #[tokio::test]
    async fn mock_client_handler_sees_request() {
        let client = MockHttpClient::with_handler(|req| {
            HttpResponse::new(200, req.authorization().unwrap_or("none").to_string())
        });

        let mut request = HttpRequest::new(Method::GET, url("https://api.example.com/me"));
        request.set_authorization(HeaderValue::from_static("Zoho-oauthtoken abc"));

        let response = client.send(&request).await.unwrap();
        assert_eq!(response.body, "Zoho-oauthtoken abc");
        assert_eq!(
            client.get_requests()[0].authorization(),
            Some("Zoho-oauthtoken abc")
        );
    }

    #[test]
    fn request_builders_set_body() {
        let request = HttpRequest::new(Method::POST, url("https://api.example.com/"));
        assert_eq!(request.body, RequestBody::Empty);

        let request = request.form(vec![("k".to_string(), "v".to_string())]);
        assert_eq!(
            request.body,
            RequestBody::Form(vec![("k".to_string(), "v".to_string())])
        );
        assert!(request.authorization().is_none());
    }

    #[test]
    fn http_response_is_success() {
        assert!(HttpResponse::new(200, "{}").is_success());
        assert!(HttpResponse::new(204, "").is_success());
        assert!(!HttpResponse::new(401, "{}").is_success());
        assert!(!HttpResponse::new(500, "{}").is_success());
    }

    #[test]
    fn into_value_is_lenient() {
        assert_eq!(HttpResponse::new(200, r#"{"a": 1}"#).into_value(), json!({"a": 1}));
        assert_eq!(HttpResponse::new(204, "").into_value(), Value::Null);
        assert_eq!(HttpResponse::new(204, "  \n").into_value(), Value::Null);
        assert_eq!(HttpResponse::new(502, "<html>bad gateway</html>").into_value(), Value::Null);
    }

    #[test]
    fn json_reports_parse_errors() {
        let response = HttpResponse::new(200, "nope");
        let result: Result<Value> = response.json();
        assert!(result.is_err());
    }
}
