use std::sync::Arc;

use aicache_core::{Embeddings, KvStore, QueryResult, ScoreOrder, VectorStoreProvider};

use crate::CacheHit;

/// The optional vector tier: an embedding provider paired with a vector store.
#[derive(Clone)]
pub struct SemanticSearch {
    pub embeddings: Arc<dyn Embeddings>,
    pub vector_store: Arc<dyn VectorStoreProvider>,
    /// Candidates requested per query.
    pub top_k: usize,
}

impl SemanticSearch {
    pub fn new(
        embeddings: Arc<dyn Embeddings>,
        vector_store: Arc<dyn VectorStoreProvider>,
    ) -> Self {
        Self {
            embeddings,
            vector_store,
            top_k: 1,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k.max(1);
        self
    }
}

/// Result of a two-tier lookup.
#[derive(Debug)]
pub(crate) enum LookupOutcome {
    Hit(CacheHit),
    /// Carries the query embedding when one was computed, so write-back can reuse it.
    Miss { embedding: Option<Vec<f32>> },
}

/// Exact lookup first, then the vector tier. Every provider failure is a miss.
pub(crate) async fn lookup(
    kv: &dyn KvStore,
    semantic: Option<&SemanticSearch>,
    key: &str,
) -> LookupOutcome {
    match kv.get(key).await {
        Ok(Some(answer)) if !answer.is_empty() => {
            return LookupOutcome::Hit(CacheHit::Exact { answer });
        }
        Ok(_) => tracing::debug!("exact lookup missed"),
        Err(e) => tracing::warn!(error = %e, "exact lookup failed, treating as miss"),
    }

    let Some(semantic) = semantic else {
        return LookupOutcome::Miss { embedding: None };
    };

    let embedding = match semantic.embeddings.embed_query(key).await {
        Ok(embedding) => embedding,
        Err(e) => {
            tracing::warn!(error = %e, "embedding failed, treating as miss");
            return LookupOutcome::Miss { embedding: None };
        }
    };

    let store = &semantic.vector_store;
    let candidates = match store.query_nearest(&embedding, semantic.top_k).await {
        Ok(candidates) => candidates,
        Err(e) => {
            tracing::warn!(
                provider = store.provider_type(),
                error = %e,
                "vector query failed, treating as miss"
            );
            return LookupOutcome::Miss {
                embedding: Some(embedding),
            };
        }
    };

    match accept_best(candidates, store.score_order(), store.similarity_threshold()) {
        Some(best) => LookupOutcome::Hit(CacheHit::Semantic {
            answer: best.answer,
            score: best.score,
        }),
        None => LookupOutcome::Miss {
            embedding: Some(embedding),
        },
    }
}

/// Pick the closest candidate and accept it only if it passes `threshold`.
///
/// Ranking is recomputed from scores rather than trusting backend order.
/// Candidates with a NaN score or an empty answer are ignored.
pub(crate) fn accept_best(
    candidates: Vec<QueryResult>,
    order: ScoreOrder,
    threshold: f64,
) -> Option<QueryResult> {
    let best = candidates
        .into_iter()
        .filter(|c| !c.score.is_nan() && !c.answer.is_empty())
        .reduce(|best, c| {
            if order.is_better(c.score, best.score) {
                c
            } else {
                best
            }
        })?;

    if order.accepts(best.score, threshold) {
        Some(best)
    } else {
        tracing::debug!(score = best.score, threshold, "best candidate rejected");
        None
    }
}
