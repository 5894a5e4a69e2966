use std::{collections::VecDeque, sync::Arc, time::Duration};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::AiCacheError;

#[derive(Debug, Clone)]
pub struct ProviderRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Value,
    /// Per-call deadline. `None` leaves the client default in place.
    pub timeout: Option<Duration>,
}

#[derive(Debug, Clone)]
pub struct ProviderResponse {
    pub status: u16,
    pub body: Value,
}

impl ProviderResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Transport used by every HTTP-speaking provider.
#[async_trait]
pub trait ProviderBackend: Send + Sync {
    async fn send(&self, request: ProviderRequest) -> Result<ProviderResponse, AiCacheError>;
}

/// Production backend using reqwest.
pub struct HttpBackend {
    client: reqwest::Client,
}

impl HttpBackend {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn transport_error(url: &str, e: reqwest::Error) -> AiCacheError {
    if e.is_timeout() {
        AiCacheError::Timeout(format!("request to {url} timed out"))
    } else {
        AiCacheError::Transport(format!("HTTP request to {url} failed: {e}"))
    }
}

/// Interpret a response body: JSON when it parses, the raw text otherwise.
fn parse_body(text: &str) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}

#[async_trait]
impl ProviderBackend for HttpBackend {
    async fn send(&self, request: ProviderRequest) -> Result<ProviderResponse, AiCacheError> {
        let mut builder = self.client.post(&request.url);
        for (key, value) in &request.headers {
            builder = builder.header(key, value);
        }
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }
        builder = builder.json(&request.body);

        let response = builder
            .send()
            .await
            .map_err(|e| transport_error(&request.url, e))?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| transport_error(&request.url, e))?;

        Ok(ProviderResponse {
            status,
            body: parse_body(&text),
        })
    }
}

/// Test backend with queued responses. Every request it receives is recorded.
pub struct FakeBackend {
    responses: Arc<Mutex<VecDeque<Result<ProviderResponse, AiCacheError>>>>,
    requests: Arc<Mutex<Vec<ProviderRequest>>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(VecDeque::new())),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn push_response(&self, response: ProviderResponse) -> &Self {
        self.responses
            .try_lock()
            .expect("not concurrent during setup")
            .push_back(Ok(response));
        self
    }

    /// Queue a `200` response with the given JSON body.
    pub fn push_json(&self, body: Value) -> &Self {
        self.push_response(ProviderResponse { status: 200, body })
    }

    pub fn push_error(&self, error: AiCacheError) -> &Self {
        self.responses
            .try_lock()
            .expect("not concurrent during setup")
            .push_back(Err(error));
        self
    }

    /// Requests received so far, oldest first.
    pub async fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().await.clone()
    }
}

impl Default for FakeBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProviderBackend for FakeBackend {
    async fn send(&self, request: ProviderRequest) -> Result<ProviderResponse, AiCacheError> {
        self.requests.lock().await.push(request);
        let mut responses = self.responses.lock().await;
        responses
            .pop_front()
            .unwrap_or_else(|| Err(AiCacheError::Transport("FakeBackend exhausted".to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_body_empty_is_null() {
        assert_eq!(parse_body(""), Value::Null);
        assert_eq!(parse_body("  \n"), Value::Null);
    }

    #[test]
    fn parse_body_keeps_non_json_text() {
        assert_eq!(parse_body("ok"), Value::String("ok".to_string()));
    }

    #[test]
    fn parse_body_json() {
        assert_eq!(parse_body(r#"{"a":1}"#)["a"], 1);
    }
}
