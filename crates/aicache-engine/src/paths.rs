use aicache_core::JsonPath;

/// Where the engine reads keys, answers, and tool-call markers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPaths {
    /// Cache key inside the request body.
    pub cache_key: JsonPath,
    /// Answer inside a single-shot response body.
    pub cache_value: JsonPath,
    /// Answer delta inside one SSE `data:` payload.
    pub cache_stream_value: JsonPath,
    /// Tool-call marker inside a single-shot response body.
    pub tool_calls: JsonPath,
    /// Tool-call marker inside one SSE `data:` payload.
    pub stream_tool_calls: JsonPath,
}

pub const DEFAULT_CACHE_KEY_PATH: &str = "messages[-1].content";
pub const DEFAULT_CACHE_VALUE_PATH: &str = "choices[0].message.content";
pub const DEFAULT_CACHE_STREAM_VALUE_PATH: &str = "choices[0].delta.content";
pub const DEFAULT_TOOL_CALLS_PATH: &str = "choices[0].message.tool_calls";
pub const DEFAULT_STREAM_TOOL_CALLS_PATH: &str = "choices[0].delta.tool_calls";

fn builtin(raw: &str) -> JsonPath {
    JsonPath::parse(raw).expect("built-in field path should not fail")
}

impl Default for FieldPaths {
    /// OpenAI chat-completion layout.
    fn default() -> Self {
        Self {
            cache_key: builtin(DEFAULT_CACHE_KEY_PATH),
            cache_value: builtin(DEFAULT_CACHE_VALUE_PATH),
            cache_stream_value: builtin(DEFAULT_CACHE_STREAM_VALUE_PATH),
            tool_calls: builtin(DEFAULT_TOOL_CALLS_PATH),
            stream_tool_calls: builtin(DEFAULT_STREAM_TOOL_CALLS_PATH),
        }
    }
}

impl FieldPaths {
    pub fn with_cache_key(mut self, path: JsonPath) -> Self {
        self.cache_key = path;
        self
    }

    pub fn with_cache_value(mut self, path: JsonPath) -> Self {
        self.cache_value = path;
        self
    }

    pub fn with_cache_stream_value(mut self, path: JsonPath) -> Self {
        self.cache_stream_value = path;
        self
    }

    pub fn with_tool_calls(mut self, path: JsonPath) -> Self {
        self.tool_calls = path;
        self
    }

    pub fn with_stream_tool_calls(mut self, path: JsonPath) -> Self {
        self.stream_tool_calls = path;
        self
    }
}
