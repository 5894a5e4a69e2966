//! [ChromaDB](https://www.trychroma.com/) backend for the AiCache vector path.
//!
//! Stores one document per cached answer: the document id is the original
//! query and the document body is the answer. Scores are Chroma distances,
//! so smaller is closer.

mod vector_store;

pub use vector_store::{ChromaConfig, ChromaVectorStore, CHROMA_THRESHOLD};
