#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use aicache_core::{
    AiCacheError, Embeddings, KvStore, QueryResult, ScoreOrder, VectorStoreProvider,
};
use aicache_embeddings::FakeEmbeddings;
use aicache_engine::{
    CacheEngine, HeaderAction, InMemoryKvStore, RequestBodyAction, RequestSession,
};
use async_trait::async_trait;
use bytes::Bytes;
use serde_json::json;

// ---------------------------------------------------------------------------
// Counting / failing providers
// ---------------------------------------------------------------------------

/// In-memory KV store that counts calls and can be told to fail.
#[derive(Default)]
pub struct TestKv {
    pub inner: InMemoryKvStore,
    pub gets: AtomicUsize,
    pub sets: AtomicUsize,
    pub fail_get: bool,
    pub fail_set: bool,
}

impl TestKv {
    pub fn failing() -> Self {
        Self {
            fail_get: true,
            fail_set: true,
            ..Default::default()
        }
    }

    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn sets(&self) -> usize {
        self.sets.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KvStore for TestKv {
    fn key_prefix(&self) -> &str {
        self.inner.key_prefix()
    }

    async fn get(&self, key: &str) -> Result<Option<String>, AiCacheError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        if self.fail_get {
            return Err(AiCacheError::Cache("connection refused".to_string()));
        }
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), AiCacheError> {
        self.sets.fetch_add(1, Ordering::SeqCst);
        if self.fail_set {
            return Err(AiCacheError::Timeout("SET exceeded 1000ms".to_string()));
        }
        self.inner.set(key, value).await
    }
}

/// Deterministic embeddings that count calls and can be told to fail.
#[derive(Default)]
pub struct TestEmbeddings {
    inner: FakeEmbeddings,
    pub calls: AtomicUsize,
    pub fail: bool,
}

impl TestEmbeddings {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Embeddings for TestEmbeddings {
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, AiCacheError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(AiCacheError::Embedding("HTTP 503".to_string()));
        }
        self.inner.embed_query(text).await
    }
}

/// Vector store returning scripted candidates and recording uploads.
pub struct ScriptedVectorStore {
    pub order: ScoreOrder,
    pub threshold: f64,
    pub candidates: Mutex<Vec<QueryResult>>,
    pub uploads: Mutex<Vec<(Vec<f32>, String, String)>>,
    pub queries: AtomicUsize,
    pub fail: bool,
}

impl ScriptedVectorStore {
    pub fn new(order: ScoreOrder, threshold: f64) -> Self {
        Self {
            order,
            threshold,
            candidates: Mutex::new(Vec::new()),
            uploads: Mutex::new(Vec::new()),
            queries: AtomicUsize::new(0),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(ScoreOrder::LowerIsCloser, 1000.0)
        }
    }

    pub fn with_candidate(self, answer: &str, score: f64) -> Self {
        self.candidates.lock().unwrap().push(QueryResult {
            answer: answer.to_string(),
            score,
            text: None,
        });
        self
    }

    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    pub fn uploads(&self) -> Vec<(Vec<f32>, String, String)> {
        self.uploads.lock().unwrap().clone()
    }
}

#[async_trait]
impl VectorStoreProvider for ScriptedVectorStore {
    fn provider_type(&self) -> &'static str {
        "scripted"
    }

    fn similarity_threshold(&self) -> f64 {
        self.threshold
    }

    fn score_order(&self) -> ScoreOrder {
        self.order
    }

    async fn query_nearest(
        &self,
        _embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<QueryResult>, AiCacheError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(AiCacheError::VectorStore("HTTP 500".to_string()));
        }
        let candidates = self.candidates.lock().unwrap();
        Ok(candidates.iter().take(top_k).cloned().collect())
    }

    async fn upload(
        &self,
        embedding: &[f32],
        key: &str,
        answer: &str,
    ) -> Result<(), AiCacheError> {
        if self.fail {
            return Err(AiCacheError::VectorStore("HTTP 500".to_string()));
        }
        self.uploads
            .lock()
            .unwrap()
            .push((embedding.to_vec(), key.to_string(), answer.to_string()));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub fn json_headers() -> Vec<(String, String)> {
    vec![
        ("Content-Type".to_string(), "application/json".to_string()),
        ("Accept-Encoding".to_string(), "gzip".to_string()),
    ]
}

pub fn chat_body(question: &str, stream: bool) -> Vec<u8> {
    json!({
        "model": "gpt-4o",
        "stream": stream,
        "messages": [
            {"role": "system", "content": "You are helpful."},
            {"role": "user", "content": question}
        ]
    })
    .to_string()
    .into_bytes()
}

pub fn completion(answer: &str) -> Bytes {
    Bytes::from(
        json!({
            "id": "chatcmpl-1",
            "object": "chat.completion",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": answer}}]
        })
        .to_string(),
    )
}

pub fn delta_frame(content: &str) -> String {
    format!(
        "data: {}\n\n",
        json!({"choices": [{"index": 0, "delta": {"content": content}}]})
    )
}

/// Gate and look up one request.
pub async fn start(
    engine: &CacheEngine,
    question: &str,
    stream: bool,
) -> (RequestSession, RequestBodyAction) {
    let mut session = engine.new_session();
    let mut headers = json_headers();
    assert_eq!(
        engine.on_request_headers(&mut session, &mut headers),
        HeaderAction::StopIteration
    );
    let action = engine
        .on_request_body(&mut session, &chat_body(question, stream))
        .await;
    (session, action)
}

/// Serve one single-shot miss from a fake backend and wait for the write-back.
pub async fn serve_miss(engine: &CacheEngine, question: &str, answer: &str) {
    let (mut session, action) = start(engine, question, false).await;
    assert_eq!(action, RequestBodyAction::Resume);
    engine.on_response_headers(&mut session, Some("application/json"));
    engine.on_response_body(&mut session, completion(answer), true);
    let handle = session.take_write_back().expect("write-back spawned");
    handle.wait().await;
}
