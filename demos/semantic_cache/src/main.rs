use std::sync::Arc;

use aicache::core::AiCacheError;
use aicache::embeddings::FakeEmbeddings;
use aicache::engine::{
    CacheEngine, CacheHit, InMemoryKvStore, RequestBodyAction, RequestSession, SemanticSearch,
};
use aicache::vectorstores::InMemoryVectorStore;
use bytes::Bytes;
use serde_json::json;

/// Stand-in for the LLM backend: streams `answer` as three SSE frames.
fn backend_stream(answer: &str) -> Vec<Bytes> {
    let mid = answer.len() / 2;
    let (head, tail) = answer.split_at(mid);
    let frame = |content: &str| {
        format!(
            "data: {}\n\n",
            json!({"object": "chat.completion.chunk", "choices": [{"index": 0, "delta": {"content": content}}]})
        )
    };
    let raw = format!("{}{}data: [DONE]\n\n", frame(head), frame(tail));
    // Deliver in chunks that ignore frame boundaries.
    raw.as_bytes()
        .chunks(17)
        .map(Bytes::copy_from_slice)
        .collect()
}

async fn ask(engine: &CacheEngine, question: &str, backend_answer: &str) -> RequestSession {
    let mut session = engine.new_session();
    let mut headers = vec![
        ("Content-Type".to_string(), "application/json".to_string()),
        ("Accept-Encoding".to_string(), "gzip".to_string()),
    ];
    engine.on_request_headers(&mut session, &mut headers);

    let body = json!({
        "model": "demo",
        "stream": true,
        "messages": [{"role": "user", "content": question}]
    })
    .to_string();

    match engine.on_request_body(&mut session, body.as_bytes()).await {
        RequestBodyAction::Respond(response) => {
            println!("  served from cache ({})", response.content_type);
            print!("  {}", String::from_utf8_lossy(&response.body));
        }
        RequestBodyAction::Resume => {
            println!("  miss, forwarding to backend");
            engine.on_response_headers(&mut session, Some("text/event-stream"));
            let chunks = backend_stream(backend_answer);
            let last = chunks.len() - 1;
            for (i, chunk) in chunks.into_iter().enumerate() {
                engine.on_response_body(&mut session, chunk, i == last);
            }
            if let Some(handle) = session.take_write_back() {
                let report = handle.wait().await;
                println!(
                    "  write-back: kv={} vector={:?}",
                    report.kv_stored, report.vector_stored
                );
            }
        }
        RequestBodyAction::Continue => println!("  not cacheable"),
    }
    session
}

#[tokio::main]
async fn main() -> Result<(), AiCacheError> {
    tracing_subscriber::fmt::init();

    let kv = Arc::new(InMemoryKvStore::new("demo"));
    let vectors = Arc::new(InMemoryVectorStore::new(0.98));
    let engine = CacheEngine::new(kv.clone()).with_semantic_search(
        SemanticSearch::new(Arc::new(FakeEmbeddings::new(32)), vectors.clone()).with_top_k(3),
    );

    // --- First request: miss, answer is streamed and written back ---
    println!("=== Cache Miss (first request) ===");
    ask(&engine, "What is the capital of France?", "The capital of France is Paris.").await;

    // --- Same request: exact hit ---
    println!("\n=== Exact Hit (same request) ===");
    let session = ask(&engine, "What is the capital of France?", "unused").await;
    println!("  hit: {:?}", session.hit());

    // --- Reworded request: semantic hit through the vector tier ---
    println!("\n=== Semantic Hit (reworded request) ===");
    let session = ask(&engine, "What is the capital of France ?", "unused").await;
    match session.hit() {
        Some(CacheHit::Semantic { score, .. }) => println!("  similarity: {score:.4}"),
        other => println!("  hit: {other:?}"),
    }

    // --- Unrelated request: miss ---
    println!("\n=== Cache Miss (different request) ===");
    ask(&engine, "Who created Rust?", "Rust was started by Graydon Hoare.").await;

    println!("\nkv entries: {}, vector entries: {}", kv.len().await, vectors.len().await);
    Ok(())
}
