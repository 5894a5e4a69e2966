use aicache_core::AiCacheError;
use async_trait::async_trait;

use crate::Embeddings;

/// Offline embeddings for demos and tests.
///
/// Each byte of the cache key is added into bucket `i % dimensions` and the
/// result is normalised, so keys differing by a character or two land close
/// together under cosine similarity while unrelated keys do not.
#[derive(Debug, Clone, Copy)]
pub struct FakeEmbeddings {
    dimensions: usize,
}

impl FakeEmbeddings {
    /// Zero dimensions is treated as one.
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }
}

impl Default for FakeEmbeddings {
    fn default() -> Self {
        Self::new(4)
    }
}

#[async_trait]
impl Embeddings for FakeEmbeddings {
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, AiCacheError> {
        Ok(bucket_vector(text, self.dimensions))
    }
}

fn bucket_vector(text: &str, dimensions: usize) -> Vec<f32> {
    let mut buckets = vec![0.0f32; dimensions];
    for (i, byte) in text.bytes().enumerate() {
        buckets[i % dimensions] += f32::from(byte);
    }
    let norm = buckets.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        buckets.iter_mut().for_each(|x| *x /= norm);
    }
    buckets
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[test]
    fn near_keys_are_closer_than_unrelated_ones() {
        let base = bucket_vector("What is the capital of France?", 16);
        let near = bucket_vector("What is the capital of France ?", 16);
        let far = bucket_vector("Who created Rust?", 16);
        assert!(cosine(&base, &near) > cosine(&base, &far));
    }

    #[test]
    fn zero_dimensions_clamped() {
        assert_eq!(FakeEmbeddings::new(0).dimensions(), 1);
    }
}
