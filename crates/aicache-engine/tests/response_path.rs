mod common;

use std::sync::Arc;

use aicache_core::{JsonPath, KvStore};
use aicache_engine::{CacheEngine, FieldPaths, InMemoryKvStore, RequestBodyAction};
use bytes::Bytes;
use common::{delta_frame, start};

/// Paths for the bare `{"delta": "..."}` frames used below.
fn delta_paths() -> FieldPaths {
    FieldPaths::default()
        .with_cache_stream_value(JsonPath::parse("delta").unwrap())
        .with_stream_tool_calls(JsonPath::parse("tool_calls").unwrap())
}

async fn capture(
    engine: &CacheEngine,
    question: &str,
    content_type: &str,
    chunks: &[&str],
) -> Option<aicache_engine::WriteBackReport> {
    let (mut session, action) = start(engine, question, false).await;
    assert_eq!(action, RequestBodyAction::Resume);
    engine.on_response_headers(&mut session, Some(content_type));

    let last = chunks.len() - 1;
    for (i, chunk) in chunks.iter().enumerate() {
        let chunk = Bytes::copy_from_slice(chunk.as_bytes());
        let out = engine.on_response_body(&mut session, chunk.clone(), i == last);
        assert_eq!(out, chunk, "chunks pass through unmodified");
    }
    match session.take_write_back() {
        Some(handle) => Some(handle.wait().await),
        None => None,
    }
}

fn engine(kv: Arc<InMemoryKvStore>) -> CacheEngine {
    CacheEngine::new(kv).with_field_paths(delta_paths())
}

#[tokio::test]
async fn frames_in_separate_chunks_then_empty_final() {
    let kv = Arc::new(InMemoryKvStore::default());
    let engine = engine(kv.clone());
    let report = capture(
        &engine,
        "greet",
        "text/event-stream",
        &[
            "data: {\"delta\":\"He\"}\n\n",
            "data: {\"delta\":\"llo\"}\n\n",
            "",
        ],
    )
    .await
    .expect("write-back spawned");

    assert!(report.kv_stored);
    assert_eq!(kv.get("greet").await.unwrap().as_deref(), Some("Hello"));
}

#[tokio::test]
async fn frame_split_across_chunk_boundary() {
    let kv = Arc::new(InMemoryKvStore::default());
    let engine = engine(kv.clone());
    capture(
        &engine,
        "greet",
        "text/event-stream",
        &["data: {\"delta\":\"He", "llo\"}\n\ndata: [DONE]\n\n"],
    )
    .await
    .expect("write-back spawned");

    assert_eq!(kv.get("greet").await.unwrap().as_deref(), Some("Hello"));
}

#[tokio::test]
async fn byte_at_a_time_delivery() {
    let kv = Arc::new(InMemoryKvStore::default());
    let engine = CacheEngine::new(kv.clone());
    let stream = format!(
        "{}{}{}data: [DONE]\n\n",
        delta_frame("Ru"),
        delta_frame("st"),
        delta_frame("!")
    );
    let pieces: Vec<String> = stream.chars().map(String::from).collect();
    let chunks: Vec<&str> = pieces.iter().map(String::as_str).collect();

    capture(&engine, "lang", "text/event-stream", &chunks)
        .await
        .expect("write-back spawned");
    assert_eq!(kv.get("lang").await.unwrap().as_deref(), Some("Rust!"));
}

#[tokio::test]
async fn tool_call_frame_suppresses_write() {
    let kv = Arc::new(InMemoryKvStore::default());
    let engine = engine(kv.clone());
    let report = capture(
        &engine,
        "weather",
        "text/event-stream",
        &[
            "data: {\"delta\":\"Let me check\"}\n\n",
            "data: {\"tool_calls\":[{\"id\":\"call_1\",\"function\":{\"name\":\"weather\"}}]}\n\n",
            "data: {\"delta\":\" the weather.\"}\n\ndata: [DONE]\n\n",
        ],
    )
    .await;

    assert!(report.is_none());
    assert!(kv.is_empty().await);
}

#[tokio::test]
async fn unterminated_final_frame_is_not_cached() {
    let kv = Arc::new(InMemoryKvStore::default());
    let engine = engine(kv.clone());
    let report = capture(
        &engine,
        "cut",
        "text/event-stream",
        &["data: {\"delta\":\"Hel\"}\n\n", "data: {\"delta\":\"lo\"}"],
    )
    .await;

    assert!(report.is_none());
    assert!(kv.is_empty().await);
}

#[tokio::test]
async fn event_lines_and_comments_are_ignored() {
    let kv = Arc::new(InMemoryKvStore::default());
    let engine = engine(kv.clone());
    capture(
        &engine,
        "events",
        "text/event-stream; charset=utf-8",
        &[
            ": ping\n\n",
            "event: message\ndata: {\"delta\":\"ok\"}\n\n",
            "data: not-json\n\n",
            "",
        ],
    )
    .await
    .expect("write-back spawned");

    assert_eq!(kv.get("events").await.unwrap().as_deref(), Some("ok"));
}

#[tokio::test]
async fn empty_stream_is_not_cached() {
    let kv = Arc::new(InMemoryKvStore::default());
    let engine = engine(kv.clone());
    let report = capture(&engine, "nothing", "text/event-stream", &["data: [DONE]\n\n", ""]).await;
    assert!(report.is_none());
}

#[tokio::test]
async fn single_shot_body_split_across_chunks() {
    let kv = Arc::new(InMemoryKvStore::default());
    let engine = CacheEngine::new(kv.clone());
    let body = common::completion("Split answer");
    let text = std::str::from_utf8(&body).unwrap();
    let (a, b) = text.split_at(text.len() / 2);
    let (b, c) = b.split_at(b.len() / 2);

    capture(&engine, "split", "application/json", &[a, b, c])
        .await
        .expect("write-back spawned");
    assert_eq!(
        kv.get("split").await.unwrap().as_deref(),
        Some("Split answer")
    );
}

#[tokio::test]
async fn single_shot_tool_call_is_not_cached() {
    let kv = Arc::new(InMemoryKvStore::default());
    let engine = CacheEngine::new(kv.clone());
    let body = serde_json::json!({
        "choices": [{
            "message": {
                "content": null,
                "tool_calls": [{"id": "call_1", "type": "function"}]
            }
        }]
    })
    .to_string();

    let report = capture(&engine, "tools", "application/json", &[body.as_str()]).await;
    assert!(report.is_none());
    assert!(kv.is_empty().await);
}

#[tokio::test]
async fn single_shot_without_value_is_not_cached() {
    let kv = Arc::new(InMemoryKvStore::default());
    let engine = CacheEngine::new(kv.clone());
    let report = capture(
        &engine,
        "err",
        "application/json",
        &[r#"{"error":{"message":"rate limited"}}"#],
    )
    .await;
    assert!(report.is_none());
}

#[tokio::test]
async fn request_stream_flag_selects_stream_mode_without_sse_header() {
    let kv = Arc::new(InMemoryKvStore::default());
    let engine = CacheEngine::new(kv.clone());
    let (mut session, action) = start(&engine, "flagged", true).await;
    assert_eq!(action, RequestBodyAction::Resume);
    engine.on_response_headers(&mut session, None);

    let frame = Bytes::from(format!("{}data: [DONE]\n\n", delta_frame("streamed")));
    engine.on_response_body(&mut session, frame, true);
    session.take_write_back().unwrap().wait().await;
    assert_eq!(kv.get("flagged").await.unwrap().as_deref(), Some("streamed"));
}

#[tokio::test]
async fn write_back_reuses_lookup_embedding() {
    use aicache_core::ScoreOrder;
    use aicache_engine::SemanticSearch;
    use common::{ScriptedVectorStore, TestEmbeddings};

    let embeddings = Arc::new(TestEmbeddings::default());
    let store = Arc::new(ScriptedVectorStore::new(ScoreOrder::LowerIsCloser, 1000.0));
    let engine = CacheEngine::new(Arc::new(InMemoryKvStore::default()))
        .with_semantic_search(SemanticSearch::new(embeddings.clone(), store.clone()));

    let report = capture(
        &engine,
        "What is Rust?",
        "application/json",
        &[std::str::from_utf8(&common::completion("A language.")).unwrap()],
    )
    .await
    .expect("write-back spawned");

    assert_eq!(report.vector_stored, Some(true));
    assert_eq!(embeddings.calls(), 1);
    let uploads = store.uploads();
    assert_eq!(uploads.len(), 1);
    assert_eq!(uploads[0].1, "What is Rust?");
    assert_eq!(uploads[0].2, "A language.");
    assert_eq!(uploads[0].0.len(), 4);
}
