use crate::reassembler::{ResponseMode, StreamReassembler};
use crate::write_back::WriteBackHandle;

/// How a request was answered from the cache.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheHit {
    /// The key-value store held the exact key.
    Exact { answer: String },
    /// A vector candidate passed the backend's threshold.
    Semantic { answer: String, score: f64 },
}

impl CacheHit {
    pub fn answer(&self) -> &str {
        match self {
            CacheHit::Exact { answer } | CacheHit::Semantic { answer, .. } => answer,
        }
    }
}

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Phase {
    /// Headers not yet inspected, or the gate let the request through untouched.
    Open,
    /// JSON request held back until the lookup decides.
    AwaitingBody,
    /// Miss: the response is mirrored for write-back.
    Capturing,
    /// Nothing more to do: hit served, uncacheable, or response finished.
    Done,
}

/// Per-request cache state.
///
/// Exactly one session exists per request, created by
/// [`CacheEngine::new_session`](crate::CacheEngine::new_session) and passed by
/// `&mut` to every lifecycle call for that request. Sessions are never shared.
#[derive(Debug)]
pub struct RequestSession {
    id: u64,
    pub(crate) phase: Phase,
    pub(crate) key: Option<String>,
    pub(crate) stream: bool,
    /// Set once response headers or a response chunk were seen.
    pub(crate) response_started: bool,
    pub(crate) embedding: Option<Vec<f32>>,
    pub(crate) reassembler: StreamReassembler,
    pub(crate) hit: Option<CacheHit>,
    pub(crate) write_back: Option<WriteBackHandle>,
}

impl RequestSession {
    pub(crate) fn new(id: u64) -> Self {
        Self {
            id,
            phase: Phase::Open,
            key: None,
            stream: false,
            response_started: false,
            embedding: None,
            reassembler: StreamReassembler::new(),
            hit: None,
            write_back: None,
        }
    }

    /// Monotonic id, unique per engine.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The derived cache key, once the request body was parsed.
    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    /// Whether the response is treated as a stream. Once set, stays set.
    pub fn is_stream(&self) -> bool {
        self.stream
    }

    pub(crate) fn mark_stream(&mut self) {
        self.stream = true;
    }

    pub(crate) fn mode(&self) -> ResponseMode {
        if self.stream {
            ResponseMode::Stream
        } else {
            ResponseMode::SingleShot
        }
    }

    /// Whether the response carried a tool call and so will not be cached.
    pub fn is_tool_call(&self) -> bool {
        self.reassembler.is_tool_call()
    }

    /// The hit served for this request, if any.
    pub fn hit(&self) -> Option<&CacheHit> {
        self.hit.as_ref()
    }

    /// Take the handle of the write-back spawned for this response.
    pub fn take_write_back(&mut self) -> Option<WriteBackHandle> {
        self.write_back.take()
    }

    /// Connection teardown: abandon any pending write-back.
    pub fn close(&mut self) {
        if let Some(handle) = self.write_back.take() {
            handle.abandon();
        }
        self.phase = Phase::Done;
    }
}
