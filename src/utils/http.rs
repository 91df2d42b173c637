//! HTTP client utilities.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::future::Future;
use std::time::Duration;

use super::retry::{with_retry, RetryConfig};
use crate::sources::SourceError;

/// Default per-call timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Longest error body kept in a `SourceError::Status` message
const MAX_ERROR_BODY: usize = 512;

/// HTTP client with a fixed call timeout and a retry policy
///
/// Each provider owns one instance; every outbound call goes through
/// [`HttpClient::execute`] so the retry policy is applied uniformly.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    retry: RetryConfig,
    label: String,
}

impl HttpClient {
    /// Create a new HTTP client with default settings
    pub fn new(label: impl Into<String>) -> Result<Self, SourceError> {
        Self::builder(label).build()
    }

    /// Start building a client
    pub fn builder(label: impl Into<String>) -> HttpClientBuilder {
        HttpClientBuilder {
            label: label.into(),
            user_agent: concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).to_string(),
            timeout: DEFAULT_TIMEOUT,
            retry: RetryConfig::default(),
            headers: Vec::new(),
        }
    }

    /// Run one outbound call under the retry policy
    pub async fn execute<T, F, Fut>(&self, context: &str, operation: F) -> Result<T, SourceError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, SourceError>>,
    {
        let context = format!("{} {}", self.label, context);
        with_retry(&self.retry, &context, operation).await
    }

    /// GET a URL and return the body as text
    pub async fn get_text(
        &self,
        url: &str,
        query: &[(&str, String)],
        context: &str,
    ) -> Result<String, SourceError> {
        self.execute(context, move || async move {
            let response = self.client.get(url).query(query).send().await?;
            let response = check_status(response).await?;
            Ok(response.text().await?)
        })
        .await
    }

    /// GET a URL and decode the JSON body
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
        context: &str,
    ) -> Result<T, SourceError> {
        let body = self.get_text(url, query, context).await?;
        Ok(serde_json::from_str(&body)?)
    }
}

/// Map non-success statuses onto `SourceError`
async fn check_status(response: Response) -> Result<Response, SourceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(SourceError::RateLimit);
    }

    let mut message = response.text().await.unwrap_or_default();
    if message.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !message.is_char_boundary(cut) {
            cut -= 1;
        }
        message.truncate(cut);
    }

    Err(SourceError::Status {
        status: status.as_u16(),
        message,
    })
}

/// Builder for [`HttpClient`]
#[derive(Debug, Clone)]
pub struct HttpClientBuilder {
    label: String,
    user_agent: String,
    timeout: Duration,
    retry: RetryConfig,
    headers: Vec<(String, String)>,
}

impl HttpClientBuilder {
    /// Set the user agent
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Set the per-call timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the retry policy
    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Send a header with every request (API keys)
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Build the client
    pub fn build(self) -> Result<HttpClient, SourceError> {
        let mut headers = HeaderMap::new();
        for (name, value) in &self.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| SourceError::InvalidRequest(format!("header name {}: {}", name, e)))?;
            let mut value = HeaderValue::from_str(value)
                .map_err(|e| SourceError::InvalidRequest(format!("header {}: {}", name, e)))?;
            value.set_sensitive(true);
            headers.insert(name, value);
        }

        let client = Client::builder()
            .user_agent(&self.user_agent)
            .default_headers(headers)
            .timeout(self.timeout)
            .connect_timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| SourceError::InvalidRequest(format!("Failed to create HTTP client: {}", e)))?;

        Ok(HttpClient {
            client,
            retry: self.retry,
            label: self.label,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let client = HttpClient::new("pubmed").unwrap();
        assert_eq!(client.label, "pubmed");
        assert_eq!(client.retry.max_attempts, 3);
    }

    #[test]
    fn test_invalid_header_rejected() {
        let result = HttpClient::builder("semantic")
            .header("x-api-key", "bad\nvalue")
            .build();
        assert!(matches!(result, Err(SourceError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_status_mapping() {
        let mut server = mockito::Server::new_async().await;
        let _bad = server
            .mock("GET", "/bad")
            .with_status(400)
            .with_body("limit exceeded")
            .create_async()
            .await;
        let _busy = server
            .mock("GET", "/busy")
            .with_status(429)
            .expect(2)
            .create_async()
            .await;

        let client = HttpClient::builder("test")
            .retry(RetryConfig::immediate().max_attempts(2))
            .build()
            .unwrap();

        let err = client
            .get_text(&format!("{}/bad", server.url()), &[], "bad")
            .await
            .unwrap_err();
        match err {
            SourceError::Status { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "limit exceeded");
            }
            other => panic!("unexpected error: {:?}", other),
        }

        let err = client
            .get_text(&format!("{}/busy", server.url()), &[], "busy")
            .await
            .unwrap_err();
        assert!(matches!(err, SourceError::RateLimit));
    }
}
