//! Cache decision and response-reassembly engine.
//!
//! [`CacheEngine`] sits between a host transport and an LLM backend:
//!
//! 1. [`on_request_headers`](CacheEngine::on_request_headers) gates the
//!    request on its content type and holds JSON requests back.
//! 2. [`on_request_body`](CacheEngine::on_request_body) derives the cache key
//!    and looks it up, first exactly in a [`KvStore`](aicache_core::KvStore),
//!    then by similarity through an optional [`SemanticSearch`]. A hit is
//!    answered with a synthesized [`CachedResponse`].
//! 3. [`on_response_body`](CacheEngine::on_response_body) mirrors the backend
//!    response, single-shot JSON or SSE, and once it is complete writes the
//!    answer back to both tiers in the background.
//!
//! Every provider or parse failure degrades to a miss or a skipped write.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use aicache_engine::{CacheEngine, InMemoryKvStore, RequestBodyAction};
//! use bytes::Bytes;
//!
//! # async fn example() {
//! let engine = CacheEngine::new(Arc::new(InMemoryKvStore::default()));
//! let mut session = engine.new_session();
//!
//! let mut headers = vec![("content-type".to_string(), "application/json".to_string())];
//! engine.on_request_headers(&mut session, &mut headers);
//!
//! let body = br#"{"messages":[{"role":"user","content":"What is Rust?"}]}"#;
//! if let RequestBodyAction::Resume = engine.on_request_body(&mut session, body).await {
//!     engine.on_response_headers(&mut session, Some("application/json"));
//!     let chunk = Bytes::from_static(br#"{"choices":[{"message":{"content":"A language."}}]}"#);
//!     let _ = engine.on_response_body(&mut session, chunk, true);
//! }
//! # }
//! ```

mod engine;
mod gate;
mod in_memory;
mod lookup;
mod paths;
mod reassembler;
mod response;
mod session;
mod write_back;

pub use engine::{CacheEngine, RequestBodyAction};
pub use gate::{HeaderAction, Headers};
pub use in_memory::InMemoryKvStore;
pub use lookup::SemanticSearch;
pub use paths::{
    FieldPaths, DEFAULT_CACHE_KEY_PATH, DEFAULT_CACHE_STREAM_VALUE_PATH,
    DEFAULT_CACHE_VALUE_PATH, DEFAULT_STREAM_TOOL_CALLS_PATH, DEFAULT_TOOL_CALLS_PATH,
};
pub use reassembler::{ResponseMode, StreamReassembler};
pub use response::CachedResponse;
pub use session::{CacheHit, RequestSession};
pub use write_back::{WriteBackHandle, WriteBackReport};
