//! Request gate: decides from headers whether a body is worth caching.

/// Mutable view of a header map, as handed over by the host transport.
///
/// Header names are compared case-insensitively.
pub trait Headers {
    fn get(&self, name: &str) -> Option<&str>;
    fn remove(&mut self, name: &str);
}

impl Headers for Vec<(String, String)> {
    fn get(&self, name: &str) -> Option<&str> {
        self.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    fn remove(&mut self, name: &str) {
        self.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
    }
}

/// What the host should do with the request after its headers were inspected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderAction {
    /// No body: forward untouched.
    Continue,
    /// Body is not JSON: forward it unread, without buffering.
    ContinueWithoutBody,
    /// JSON body: hold the headers until the lookup decides.
    StopIteration,
}

/// Classify a request by content type. For JSON bodies, `Accept-Encoding` is
/// stripped so the backend answers uncompressed.
pub(crate) fn inspect(headers: &mut impl Headers) -> HeaderAction {
    let content_type = headers.get("content-type").unwrap_or_default();
    if content_type.is_empty() {
        return HeaderAction::Continue;
    }
    if !content_type.contains("application/json") {
        tracing::warn!(content_type, "request body is not json, skipping cache");
        return HeaderAction::ContinueWithoutBody;
    }
    headers.remove("accept-encoding");
    HeaderAction::StopIteration
}
