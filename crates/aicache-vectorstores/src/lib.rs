mod in_memory;

pub use in_memory::InMemoryVectorStore;

// Re-export the provider contract from core.
pub use aicache_core::{QueryResult, ScoreOrder, VectorStoreProvider};
