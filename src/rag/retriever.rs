// Copyright 2024-2026 llamacpp-observer Contributors
// SPDX-License-Identifier: Apache-2.0

//! Top-k chunk lookup.

use std::sync::Arc;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

use super::types::Chunk;
use super::vector_db::{VectorStore, VectorStoreError};
use crate::error::ErrorKind;

/// Used when the caller asks for zero or fewer results.
pub const DEFAULT_LIMIT: usize = 5;

#[derive(Error, Debug)]
pub enum RetrieveError {
    #[error(transparent)]
    Store(#[from] VectorStoreError),

    #[error("Retrieval cancelled")]
    Cancelled,
}

impl RetrieveError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RetrieveError::Store(_) => ErrorKind::Retrieval,
            RetrieveError::Cancelled => ErrorKind::Cancelled,
        }
    }
}

#[derive(Clone)]
pub struct Retriever {
    store: Arc<dyn VectorStore>,
}

impl Retriever {
    pub fn new(store: Arc<dyn VectorStore>) -> Self {
        Self { store }
    }

    /// Ask the vector DB for the `limit` closest chunks, in its order.
    pub async fn query(&self, cancel: &CancellationToken, query: &str, limit: i64) -> Result<Vec<Chunk>, RetrieveError> {
        let n = if limit <= 0 { DEFAULT_LIMIT } else { limit as usize };
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(RetrieveError::Cancelled),
            result = self.store.query(query, n) => Ok(result?),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rag::types::ChunkRecord;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct CountingStore {
        asked: Mutex<Vec<usize>>,
    }

    #[async_trait]
    impl VectorStore for CountingStore {
        async fn store(&self, _: usize, _: &ChunkRecord<'_>) -> Result<(), VectorStoreError> {
            Ok(())
        }

        async fn query(&self, _: &str, n: usize) -> Result<Vec<Chunk>, VectorStoreError> {
            self.asked.lock().push(n);
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_non_positive_limit_defaults_to_five() {
        let store = Arc::new(CountingStore::default());
        let retriever = Retriever::new(store.clone());
        let cancel = CancellationToken::new();
        retriever.query(&cancel, "q", 0).await.unwrap();
        retriever.query(&cancel, "q", -3).await.unwrap();
        retriever.query(&cancel, "q", 3).await.unwrap();
        assert_eq!(*store.asked.lock(), vec![5, 5, 3]);
    }

    #[tokio::test]
    async fn test_cancelled_query() {
        let retriever = Retriever::new(Arc::new(CountingStore::default()));
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = retriever.query(&cancel, "q", 3).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Cancelled);
    }
}
