mod dashscope;
mod fake;
mod openai;

pub use dashscope::{DashScopeEmbeddings, DashScopeEmbeddingsConfig};
pub use fake::FakeEmbeddings;
pub use openai::{OpenAiEmbeddings, OpenAiEmbeddingsConfig};

// Re-export the Embeddings trait from core.
pub use aicache_core::Embeddings;

use aicache_core::AiCacheError;

pub(crate) fn default_timeout_ms() -> u64 {
    10_000
}

/// Convert a JSON number array into an embedding vector.
pub(crate) fn to_vector(values: &[serde_json::Value]) -> Result<Vec<f32>, AiCacheError> {
    values
        .iter()
        .map(|v| {
            v.as_f64()
                .map(|f| f as f32)
                .ok_or_else(|| AiCacheError::Embedding(format!("non-numeric embedding value: {v}")))
        })
        .collect()
}
