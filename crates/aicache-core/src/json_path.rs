use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::AiCacheError;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    /// Dot segment. Numeric names also index into arrays (`choices.0`).
    Key(String),
    /// Bracketed index; negative values count from the end.
    Index(i64),
}

/// A field path into a JSON document, e.g. `messages[-1].content` or
/// `choices.0.delta.content`.
///
/// Paths are parsed once, at configuration time, so a malformed path is a
/// [`AiCacheError::Config`] rather than a per-request failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct JsonPath {
    raw: String,
    segments: Vec<Segment>,
}

impl JsonPath {
    pub fn parse(path: &str) -> Result<Self, AiCacheError> {
        let raw = path.trim();
        if raw.is_empty() {
            return Err(AiCacheError::Config("field path is empty".to_string()));
        }

        let mut segments = Vec::new();
        for part in raw.split('.') {
            let (name, mut rest) = match part.find('[') {
                Some(i) => (&part[..i], &part[i..]),
                None => (part, ""),
            };
            if name.is_empty() && rest.is_empty() {
                return Err(AiCacheError::Config(format!(
                    "field path '{raw}' has an empty segment"
                )));
            }
            if !name.is_empty() {
                segments.push(Segment::Key(name.to_string()));
            }
            while !rest.is_empty() {
                let inner = rest.strip_prefix('[').ok_or_else(|| {
                    AiCacheError::Config(format!("field path '{raw}': unexpected '{rest}'"))
                })?;
                let end = inner.find(']').ok_or_else(|| {
                    AiCacheError::Config(format!("field path '{raw}': unterminated '['"))
                })?;
                let index: i64 = inner[..end].trim().parse().map_err(|_| {
                    AiCacheError::Config(format!(
                        "field path '{raw}': '{}' is not an array index",
                        &inner[..end]
                    ))
                })?;
                segments.push(Segment::Index(index));
                rest = &inner[end + 1..];
            }
        }

        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Resolve the path against `root`.
    pub fn find<'a>(&self, root: &'a Value) -> Option<&'a Value> {
        let mut current = root;
        for segment in &self.segments {
            current = match (segment, current) {
                (Segment::Key(key), Value::Object(map)) => map.get(key)?,
                (Segment::Key(key), Value::Array(items)) => index(items, key.parse().ok()?)?,
                (Segment::Index(i), Value::Array(items)) => index(items, *i)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Resolve the path and render the result with [`value_to_text`].
    pub fn text(&self, root: &Value) -> String {
        value_to_text(self.find(root))
    }
}

fn index(items: &[Value], i: i64) -> Option<&Value> {
    let pos = if i < 0 { items.len() as i64 + i } else { i };
    if pos < 0 {
        return None;
    }
    items.get(pos as usize)
}

/// Render an extracted value as cache text: strings verbatim, null or missing
/// as empty, anything else as compact JSON.
pub fn value_to_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

impl TryFrom<String> for JsonPath {
    type Error = AiCacheError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        JsonPath::parse(&value)
    }
}

impl From<JsonPath> for String {
    fn from(path: JsonPath) -> Self {
        path.raw
    }
}

impl fmt::Display for JsonPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
