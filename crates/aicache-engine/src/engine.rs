use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use aicache_core::{AiCacheError, KvStore};
use bytes::Bytes;
use serde_json::Value;
use tracing::Instrument;

use crate::gate::{self, HeaderAction, Headers};
use crate::lookup::{lookup, LookupOutcome};
use crate::session::Phase;
use crate::write_back::{WriteBack, WriteBackReport};
use crate::{CacheHit, CachedResponse, FieldPaths, RequestSession, SemanticSearch};

/// What the host should do once the request body was seen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestBodyAction {
    /// Uncacheable request: release it unchanged, nothing is captured.
    Continue,
    /// Cache hit: answer with this response and never contact the backend.
    Respond(CachedResponse),
    /// Cache miss: release the withheld request and feed the response back
    /// through [`CacheEngine::on_response_body`].
    Resume,
}

/// The cache decision and response-reassembly engine.
///
/// A host drives one [`RequestSession`] per request through the lifecycle
/// calls in order: request headers, request body, response headers, response
/// body chunks. No call ever fails the request: provider and parse errors are
/// logged and degrade to a miss, or to no write.
pub struct CacheEngine {
    kv: Arc<dyn KvStore>,
    semantic: Option<SemanticSearch>,
    paths: FieldPaths,
    response_model: String,
    next_session: AtomicU64,
}

impl CacheEngine {
    /// Create an engine with only the exact-match tier.
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self {
            kv,
            semantic: None,
            paths: FieldPaths::default(),
            response_model: "from-cache".to_string(),
            next_session: AtomicU64::new(0),
        }
    }

    /// Enable the vector tier.
    pub fn with_semantic_search(mut self, semantic: SemanticSearch) -> Self {
        self.semantic = Some(semantic);
        self
    }

    pub fn with_field_paths(mut self, paths: FieldPaths) -> Self {
        self.paths = paths;
        self
    }

    /// Model name reported in synthesized hits.
    pub fn with_response_model(mut self, model: impl Into<String>) -> Self {
        self.response_model = model.into();
        self
    }

    pub fn field_paths(&self) -> &FieldPaths {
        &self.paths
    }

    pub fn has_semantic_search(&self) -> bool {
        self.semantic.is_some()
    }

    /// Start the state for a new request.
    pub fn new_session(&self) -> RequestSession {
        RequestSession::new(self.next_session.fetch_add(1, Ordering::Relaxed) + 1)
    }

    // -----------------------------------------------------------------------
    // Request path
    // -----------------------------------------------------------------------

    /// Gate the request on its content type.
    pub fn on_request_headers(
        &self,
        session: &mut RequestSession,
        headers: &mut impl Headers,
    ) -> HeaderAction {
        let _span = session_span(session).entered();
        let action = gate::inspect(headers);
        session.phase = match action {
            HeaderAction::StopIteration => Phase::AwaitingBody,
            HeaderAction::Continue | HeaderAction::ContinueWithoutBody => Phase::Done,
        };
        action
    }

    /// Derive the cache key and run the two-tier lookup.
    ///
    /// Only requests the gate withheld are looked up. A repeated body for the
    /// same session is looked up again until the response starts; after that
    /// it passes through and the captured key is kept. A stream flag set by an
    /// earlier body is kept.
    pub async fn on_request_body(
        &self,
        session: &mut RequestSession,
        body: &[u8],
    ) -> RequestBodyAction {
        let span = session_span(session);
        self.handle_request_body(session, body)
            .instrument(span)
            .await
    }

    async fn handle_request_body(
        &self,
        session: &mut RequestSession,
        body: &[u8],
    ) -> RequestBodyAction {
        if !matches!(session.phase, Phase::AwaitingBody | Phase::Capturing) {
            tracing::debug!("request body outside a gated session, passing through");
            return RequestBodyAction::Continue;
        }
        if session.response_started {
            // Key and embedding stay bound to the response already being captured.
            tracing::debug!("request body after response start, keeping captured key");
            return RequestBodyAction::Continue;
        }

        let doc = match parse_request(body) {
            Ok(doc) => doc,
            Err(e) => {
                tracing::warn!(error = %e, "skipping cache");
                session.phase = Phase::Done;
                return RequestBodyAction::Continue;
            }
        };
        if doc.get("stream").and_then(Value::as_bool) == Some(true) {
            session.mark_stream();
        }

        let key = self.paths.cache_key.text(&doc);
        tracing::debug!(key = %key, path = %self.paths.cache_key, "cache key derived");
        if key.is_empty() {
            tracing::debug!("no cache key in request body, passing through");
            session.key = None;
            session.phase = Phase::Done;
            return RequestBodyAction::Continue;
        }
        session.key = Some(key.clone());

        match lookup(self.kv.as_ref(), self.semantic.as_ref(), &key).await {
            LookupOutcome::Hit(hit) => {
                match &hit {
                    CacheHit::Exact { .. } => tracing::info!("exact cache hit"),
                    CacheHit::Semantic { score, .. } => {
                        tracing::info!(score = *score, "semantic cache hit")
                    }
                }
                let response = self.synthesize(session.is_stream(), hit.answer());
                session.hit = Some(hit);
                session.phase = Phase::Done;
                RequestBodyAction::Respond(response)
            }
            LookupOutcome::Miss { embedding } => {
                session.embedding = embedding;
                session.phase = Phase::Capturing;
                RequestBodyAction::Resume
            }
        }
    }

    fn synthesize(&self, stream: bool, answer: &str) -> CachedResponse {
        if stream {
            CachedResponse::stream(&self.response_model, answer)
        } else {
            CachedResponse::single_shot(&self.response_model, answer)
        }
    }

    // -----------------------------------------------------------------------
    // Response path
    // -----------------------------------------------------------------------

    /// Fix the response mode. `text/event-stream` forces stream mode; anything
    /// else keeps whatever the request body declared.
    pub fn on_response_headers(&self, session: &mut RequestSession, content_type: Option<&str>) {
        session.response_started = true;
        if content_type.is_some_and(|ct| ct.contains("text/event-stream")) {
            session.mark_stream();
        }
    }

    /// Mirror one response chunk and return it unchanged.
    ///
    /// On the final chunk of a captured miss, a non-empty answer from a
    /// response without tool calls is written back in the background; the
    /// handle is parked in the session (see
    /// [`RequestSession::take_write_back`]).
    pub fn on_response_body(
        &self,
        session: &mut RequestSession,
        chunk: Bytes,
        is_last: bool,
    ) -> Bytes {
        session.response_started = true;
        if session.phase != Phase::Capturing {
            return chunk;
        }
        let _span = session_span(session).entered();

        if session.is_tool_call() {
            if is_last {
                session.phase = Phase::Done;
            }
            return chunk;
        }

        let mode = session.mode();
        if !is_last {
            session.reassembler.push(mode, &chunk, &self.paths);
            return chunk;
        }

        session.phase = Phase::Done;
        match session.reassembler.finish(mode, &chunk, &self.paths) {
            Ok(Some(answer)) => self.spawn_write_back(session, answer),
            Ok(None) if session.is_tool_call() => {
                tracing::debug!("response carries a tool call, not caching")
            }
            Ok(None) => tracing::warn!(?mode, "no cacheable value in response"),
            Err(e) => tracing::warn!(error = %e, "response not cached"),
        }
        chunk
    }

    fn spawn_write_back(&self, session: &mut RequestSession, answer: String) {
        let Some(key) = session.key.clone() else {
            return;
        };
        tracing::info!(bytes = answer.len(), "writing answer back");
        session.write_back = self
            .writer()
            .spawn(key, answer, session.embedding.take());
    }

    /// Store an entry in both tiers directly, as a completed response would.
    pub async fn store(&self, key: &str, answer: &str) -> WriteBackReport {
        self.writer().run(key, answer, None).await
    }

    fn writer(&self) -> WriteBack {
        WriteBack {
            kv: Arc::clone(&self.kv),
            semantic: self.semantic.clone(),
        }
    }
}

fn session_span(session: &RequestSession) -> tracing::Span {
    tracing::info_span!("session", id = session.id())
}

fn parse_request(body: &[u8]) -> Result<Value, AiCacheError> {
    serde_json::from_slice(body)
        .map_err(|e| AiCacheError::Parsing(format!("request body is not json: {e}")))
}
