//! Mirrors response chunks into session state until a cacheable value can be
//! extracted. Nothing here alters the bytes the client receives.

use aicache_core::AiCacheError;
use bytes::BytesMut;
use serde_json::Value;

use crate::FieldPaths;

const FRAME_SEPARATOR: &[u8] = b"\n\n";
const DONE_MARKER: &str = "[DONE]";

/// Response framing, fixed once response headers are seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseMode {
    /// One JSON document, possibly split across chunks.
    SingleShot,
    /// Server-sent events, frames separated by a blank line.
    Stream,
}

/// Byte-accumulation state machine for one response.
#[derive(Debug, Default)]
pub struct StreamReassembler {
    /// Single-shot accumulator.
    body: BytesMut,
    /// Stream bytes after the last complete frame.
    partial: BytesMut,
    /// Offset in `partial` before which no separator can start.
    scanned: usize,
    /// Deltas assembled from complete frames so far.
    answer: String,
    tool_call: bool,
}

impl StreamReassembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a tool or function call was seen. Permanent for the response.
    pub fn is_tool_call(&self) -> bool {
        self.tool_call
    }

    /// Answer text assembled from stream deltas so far.
    pub fn assembled(&self) -> &str {
        &self.answer
    }

    /// Bytes held back as an incomplete trailing frame.
    pub fn pending(&self) -> usize {
        self.partial.len()
    }

    /// Mirror a non-final chunk.
    pub fn push(&mut self, mode: ResponseMode, chunk: &[u8], paths: &FieldPaths) {
        match mode {
            ResponseMode::SingleShot => self.body.extend_from_slice(chunk),
            ResponseMode::Stream => {
                self.partial.extend_from_slice(chunk);
                self.drain_frames(paths);
            }
        }
    }

    /// Mirror the final chunk and extract the cacheable value.
    ///
    /// Returns `Ok(None)` when the response is complete but yields nothing to
    /// cache: an empty value, or a tool call anywhere in the response. A
    /// single-shot body that is not JSON, or a stream whose last frame is not
    /// terminated, is a [`AiCacheError::Parsing`] error.
    pub fn finish(
        &mut self,
        mode: ResponseMode,
        chunk: &[u8],
        paths: &FieldPaths,
    ) -> Result<Option<String>, AiCacheError> {
        let value = match mode {
            ResponseMode::SingleShot => self.finish_single_shot(chunk, paths)?,
            ResponseMode::Stream => self.finish_stream(chunk, paths)?,
        };
        if self.tool_call {
            return Ok(None);
        }
        Ok(value.filter(|v| !v.is_empty()))
    }

    fn finish_single_shot(
        &mut self,
        chunk: &[u8],
        paths: &FieldPaths,
    ) -> Result<Option<String>, AiCacheError> {
        self.body.extend_from_slice(chunk);
        let body = self.body.split();
        let doc: Value = serde_json::from_slice(&body)
            .map_err(|e| AiCacheError::Parsing(format!("response body is not json: {e}")))?;

        if is_present(paths.tool_calls.find(&doc)) {
            self.tool_call = true;
            return Ok(None);
        }
        Ok(Some(paths.cache_value.text(&doc)))
    }

    fn finish_stream(
        &mut self,
        chunk: &[u8],
        paths: &FieldPaths,
    ) -> Result<Option<String>, AiCacheError> {
        self.partial.extend_from_slice(chunk);
        if self.partial.is_empty() {
            return Ok(Some(std::mem::take(&mut self.answer)));
        }
        if !self.partial.ends_with(FRAME_SEPARATOR) {
            let pending = self.partial.len();
            self.partial.clear();
            self.scanned = 0;
            return Err(AiCacheError::Parsing(format!(
                "stream ended inside an unterminated frame ({pending} bytes pending)"
            )));
        }
        self.drain_frames(paths);
        Ok(Some(std::mem::take(&mut self.answer)))
    }

    /// Hand every complete frame in `partial` to the frame parser, keeping the
    /// unterminated remainder.
    fn drain_frames(&mut self, paths: &FieldPaths) {
        while let Some(pos) = find_separator(&self.partial, self.scanned) {
            let frame = self.partial.split_to(pos + FRAME_SEPARATOR.len());
            self.scanned = 0;
            self.process_frame(&frame[..pos], paths);
        }
        // A separator may straddle the next chunk boundary.
        self.scanned = self
            .partial
            .len()
            .saturating_sub(FRAME_SEPARATOR.len() - 1);
    }

    fn process_frame(&mut self, frame: &[u8], paths: &FieldPaths) {
        let text = match std::str::from_utf8(frame) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(error = %e, "skipping sse frame that is not utf-8");
                return;
            }
        };
        let Some(payload) = data_payload(text) else {
            return;
        };
        if payload.trim() == DONE_MARKER {
            return;
        }
        let doc: Value = match serde_json::from_str(&payload) {
            Ok(doc) => doc,
            Err(e) => {
                tracing::warn!(error = %e, "skipping sse frame with malformed json");
                return;
            }
        };

        if !self.tool_call && is_present(paths.stream_tool_calls.find(&doc)) {
            tracing::debug!("tool call in stream, response will not be cached");
            self.tool_call = true;
        }
        self.answer.push_str(&paths.cache_stream_value.text(&doc));
    }
}

/// Position of the first separator starting at or after `from`.
fn find_separator(buf: &[u8], from: usize) -> Option<usize> {
    buf.get(from..)?
        .windows(FRAME_SEPARATOR.len())
        .position(|w| w == FRAME_SEPARATOR)
        .map(|pos| from + pos)
}

/// Join the `data:` lines of one frame. `None` when the frame has none
/// (comments, bare `event:` frames).
fn data_payload(frame: &str) -> Option<String> {
    let mut payload: Option<String> = None;
    for line in frame.split('\n') {
        let line = line.trim_end_matches('\r');
        let Some(data) = line.strip_prefix("data:") else {
            continue;
        };
        let data = data.strip_prefix(' ').unwrap_or(data);
        match payload.as_mut() {
            Some(p) => {
                p.push('\n');
                p.push_str(data);
            }
            None => payload = Some(data.to_string()),
        }
    }
    payload
}

/// A tool-call marker counts when it carries something: null, `false`, and
/// empty strings, arrays, or objects do not.
fn is_present(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(items)) => !items.is_empty(),
        Some(Value::Object(map)) => !map.is_empty(),
        Some(Value::Number(_)) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aicache_core::JsonPath;
    use serde_json::json;

    fn delta_paths() -> FieldPaths {
        FieldPaths::default()
            .with_cache_stream_value(JsonPath::parse("delta").unwrap())
            .with_stream_tool_calls(JsonPath::parse("tool_calls").unwrap())
    }

    #[test]
    fn data_payload_joins_lines_and_ignores_others() {
        assert_eq!(
            data_payload("event: message\ndata: {\"a\":\ndata: 1}").as_deref(),
            Some("{\"a\":\n1}")
        );
        assert_eq!(data_payload(": keep-alive"), None);
        assert_eq!(data_payload("data:[DONE]\r").as_deref(), Some("[DONE]"));
    }

    #[test]
    fn presence_of_tool_calls() {
        assert!(!is_present(None));
        assert!(!is_present(Some(&Value::Null)));
        assert!(!is_present(Some(&json!([]))));
        assert!(is_present(Some(&json!([{"id": "call_1"}]))));
        assert!(is_present(Some(&json!({"name": "f"}))));
    }

    #[test]
    fn remainder_is_kept_between_chunks() {
        let paths = delta_paths();
        let mut r = StreamReassembler::new();
        r.push(ResponseMode::Stream, b"data: {\"delta\":\"a\"}\n\ndata: {\"del", &paths);
        assert_eq!(r.assembled(), "a");
        assert_eq!(r.pending(), "data: {\"del".len());
        r.push(ResponseMode::Stream, b"ta\":\"b\"}\n", &paths);
        assert_eq!(r.assembled(), "a");
        r.push(ResponseMode::Stream, b"\n", &paths);
        assert_eq!(r.assembled(), "ab");
        assert_eq!(r.pending(), 0);
    }

    #[test]
    fn scan_resumes_where_the_last_chunk_ended() {
        let paths = delta_paths();
        let mut r = StreamReassembler::new();
        let frame = b"data: {\"delta\":\"long\"}\n\n";
        for byte in &frame[..frame.len() - 1] {
            r.push(ResponseMode::Stream, std::slice::from_ref(byte), &paths);
            assert_eq!(r.scanned, r.pending().saturating_sub(1));
        }
        assert_eq!(r.assembled(), "");
        r.push(ResponseMode::Stream, b"\n", &paths);
        assert_eq!(r.assembled(), "long");
        assert_eq!((r.pending(), r.scanned), (0, 0));
    }

    #[test]
    fn find_separator_respects_offset() {
        assert_eq!(find_separator(b"a\n\nb\n\n", 0), Some(1));
        assert_eq!(find_separator(b"a\n\nb\n\n", 2), Some(4));
        assert_eq!(find_separator(b"ab", 5), None);
    }

    #[test]
    fn multibyte_characters_split_across_chunks() {
        let paths = delta_paths();
        let frame = "data: {\"delta\":\"héllo\"}\n\n".as_bytes();
        let split = frame.iter().position(|b| *b == 0xC3).unwrap() + 1;
        let mut r = StreamReassembler::new();
        r.push(ResponseMode::Stream, &frame[..split], &paths);
        let value = r.finish(ResponseMode::Stream, &frame[split..], &paths).unwrap();
        assert_eq!(value.as_deref(), Some("héllo"));
    }

    #[test]
    fn pending_partial_on_empty_final_chunk_is_malformed() {
        let paths = delta_paths();
        let mut r = StreamReassembler::new();
        r.push(ResponseMode::Stream, b"data: {\"delta\":\"a\"}\n\ndata: {", &paths);
        assert!(r.finish(ResponseMode::Stream, b"", &paths).is_err());
    }

    #[test]
    fn single_shot_rejects_non_json() {
        let paths = FieldPaths::default();
        let mut r = StreamReassembler::new();
        r.push(ResponseMode::SingleShot, b"<html>", &paths);
        let err = r.finish(ResponseMode::SingleShot, b"</html>", &paths);
        assert!(matches!(err, Err(AiCacheError::Parsing(_))));
    }
}
