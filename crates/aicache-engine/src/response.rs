use bytes::Bytes;
use serde_json::{json, Value};

/// A synthesized response that answers the request from the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedResponse {
    pub status: u16,
    pub content_type: &'static str,
    pub body: Bytes,
}

impl CachedResponse {
    /// A complete `chat.completion` document carrying `answer`.
    pub fn single_shot(model: &str, answer: &str) -> Self {
        let body = json!({
            "id": "from-cache",
            "object": "chat.completion",
            "model": model,
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": answer},
                "finish_reason": "stop",
            }],
            "usage": {"prompt_tokens": 0, "completion_tokens": 0, "total_tokens": 0},
        });
        Self {
            status: 200,
            content_type: "application/json",
            body: Bytes::from(body.to_string()),
        }
    }

    /// One `chat.completion.chunk` frame carrying all of `answer`, then `[DONE]`.
    pub fn stream(model: &str, answer: &str) -> Self {
        let chunk = json!({
            "id": "from-cache",
            "object": "chat.completion.chunk",
            "model": model,
            "choices": [{
                "index": 0,
                "delta": {"role": "assistant", "content": answer},
                "finish_reason": "stop",
            }],
        });
        Self {
            status: 200,
            content_type: "text/event-stream",
            body: Bytes::from(format!("data: {chunk}\n\ndata: [DONE]\n\n")),
        }
    }

    /// Parse the body as JSON. Only meaningful for single-shot responses.
    pub fn json(&self) -> Option<Value> {
        serde_json::from_slice(&self.body).ok()
    }
}
