use std::sync::Arc;

use aicache_core::KvStore;
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::SemanticSearch;

/// What a finished write-back managed to store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteBackReport {
    /// The answer reached the key-value store.
    pub kv_stored: bool,
    /// The answer reached the vector store. `None` without a vector tier.
    pub vector_stored: Option<bool>,
}

/// Handle to a write-back running in the background.
///
/// Dropping the handle detaches the task; it still runs to completion.
#[derive(Debug)]
pub struct WriteBackHandle {
    task: JoinHandle<WriteBackReport>,
}

impl WriteBackHandle {
    /// Wait for the write-back to finish. An abandoned or panicked task
    /// reports nothing stored.
    pub async fn wait(self) -> WriteBackReport {
        match self.task.await {
            Ok(report) => report,
            Err(e) => {
                tracing::warn!(error = %e, "write-back did not complete");
                WriteBackReport {
                    kv_stored: false,
                    vector_stored: None,
                }
            }
        }
    }

    /// Abort the write-back. Whatever already reached a store stays there.
    pub fn abandon(self) {
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Stores a `(key, answer)` pair in both tiers, off the response path.
#[derive(Clone)]
pub(crate) struct WriteBack {
    pub(crate) kv: Arc<dyn KvStore>,
    pub(crate) semantic: Option<SemanticSearch>,
}

impl WriteBack {
    /// Spawn the write-back on the current Tokio runtime. Returns `None`
    /// outside a runtime, in which case nothing is written.
    pub(crate) fn spawn(
        &self,
        key: String,
        answer: String,
        embedding: Option<Vec<f32>>,
    ) -> Option<WriteBackHandle> {
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(e) => {
                tracing::warn!(error = %e, "no runtime for write-back, dropping");
                return None;
            }
        };
        let this = self.clone();
        let task = runtime.spawn(
            async move { this.run(&key, &answer, embedding).await }.in_current_span(),
        );
        Some(WriteBackHandle { task })
    }

    pub(crate) async fn run(
        &self,
        key: &str,
        answer: &str,
        embedding: Option<Vec<f32>>,
    ) -> WriteBackReport {
        let kv_write = async {
            match self.kv.set(key, answer).await {
                Ok(()) => {
                    tracing::info!(prefix = self.kv.key_prefix(), "answer stored");
                    true
                }
                Err(e) => {
                    tracing::warn!(error = %e, "key-value write failed");
                    false
                }
            }
        };
        let vector_write = async {
            match &self.semantic {
                Some(semantic) => Some(upload(semantic, key, answer, embedding).await),
                None => None,
            }
        };

        let (kv_stored, vector_stored) = tokio::join!(kv_write, vector_write);
        WriteBackReport {
            kv_stored,
            vector_stored,
        }
    }
}

async fn upload(
    semantic: &SemanticSearch,
    key: &str,
    answer: &str,
    embedding: Option<Vec<f32>>,
) -> bool {
    let embedding = match embedding {
        Some(embedding) => embedding,
        None => match semantic.embeddings.embed_query(key).await {
            Ok(embedding) => embedding,
            Err(e) => {
                tracing::warn!(error = %e, "embedding for write-back failed");
                return false;
            }
        },
    };

    let store = &semantic.vector_store;
    match store.upload(&embedding, key, answer).await {
        Ok(()) => {
            tracing::info!(provider = store.provider_type(), "embedding uploaded");
            true
        }
        Err(e) => {
            tracing::warn!(provider = store.provider_type(), error = %e, "vector upload failed");
            false
        }
    }
}
