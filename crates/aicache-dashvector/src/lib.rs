//! [DashVector](https://help.aliyun.com/product/2510217.html) backend for the
//! AiCache vector path.
//!
//! Each cached answer is one doc whose fields carry the original `query` and
//! its `answer`. Every call authenticates with the collection's API token.

mod vector_store;

pub use vector_store::{DashVectorConfig, DashVectorStore, DASHVECTOR_THRESHOLD};
