use std::collections::HashMap;

use aicache_core::{AiCacheError, QueryResult, ScoreOrder, VectorStoreProvider};
use async_trait::async_trait;
use tokio::sync::RwLock;

/// Stored answer with the embedding of the query that produced it.
struct StoredEntry {
    embedding: Vec<f32>,
    answer: String,
}

/// In-memory vector store using cosine similarity.
///
/// Entries are keyed by cache key, so uploading the same key twice replaces
/// the earlier entry instead of adding a duplicate candidate.
pub struct InMemoryVectorStore {
    entries: RwLock<HashMap<String, StoredEntry>>,
    similarity_threshold: f64,
}

impl InMemoryVectorStore {
    /// Create a store accepting candidates whose cosine similarity is at least
    /// `similarity_threshold`. A typical value is 0.95.
    pub fn new(similarity_threshold: f64) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            similarity_threshold,
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

impl Default for InMemoryVectorStore {
    fn default() -> Self {
        Self::new(0.95)
    }
}

#[async_trait]
impl VectorStoreProvider for InMemoryVectorStore {
    fn provider_type(&self) -> &'static str {
        "memory"
    }

    fn similarity_threshold(&self) -> f64 {
        self.similarity_threshold
    }

    fn score_order(&self) -> ScoreOrder {
        ScoreOrder::HigherIsCloser
    }

    async fn query_nearest(
        &self,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<QueryResult>, AiCacheError> {
        let entries = self.entries.read().await;

        let mut scored: Vec<QueryResult> = entries
            .iter()
            .map(|(key, entry)| QueryResult {
                answer: entry.answer.clone(),
                score: cosine_similarity(embedding, &entry.embedding) as f64,
                text: Some(key.clone()),
            })
            .collect();

        // Sort by score descending
        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(top_k);

        Ok(scored)
    }

    async fn upload(
        &self,
        embedding: &[f32],
        key: &str,
        answer: &str,
    ) -> Result<(), AiCacheError> {
        if embedding.is_empty() {
            return Err(AiCacheError::VectorStore(
                "refusing to store an empty embedding".to_string(),
            ));
        }
        let mut entries = self.entries.write().await;
        entries.insert(
            key.to_string(),
            StoredEntry {
                embedding: embedding.to_vec(),
                answer: answer.to_string(),
            },
        );
        Ok(())
    }
}

/// Compute cosine similarity between two vectors.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }

    dot / (mag_a * mag_b)
}
