// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! In-memory vector store for chunk storage
//! Used for development deployments and tests.

use async_trait::async_trait;
use parking_lot::RwLock;

use super::embedding::{cosine_similarity, HashingEmbedder};
use crate::domain::document::{DocumentChunk, ScoredChunk, VectorStore, VectorStoreError};

struct StoredChunk {
    chunk: DocumentChunk,
    embedding: Vec<f32>,
}

/// In-memory implementation of VectorStore. Chunks are kept in insertion
/// order so equal scores rank stably.
pub struct InMemoryVectorStore {
    embedder: HashingEmbedder,
    chunks: RwLock<Vec<StoredChunk>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::with_embedder(HashingEmbedder::new())
    }

    pub fn with_embedder(embedder: HashingEmbedder) -> Self {
        Self {
            embedder,
            chunks: RwLock::new(Vec::new()),
        }
    }
}

impl Default for InMemoryVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn similarity_search(&self, query: &str, k: usize) -> Result<Vec<ScoredChunk>, VectorStoreError> {
        let query_embedding = self.embedder.embed(query);
        let chunks = self.chunks.read();

        let mut results: Vec<ScoredChunk> = chunks
            .iter()
            .map(|stored| ScoredChunk {
                chunk: stored.chunk.clone(),
                score: cosine_similarity(&query_embedding, &stored.embedding),
            })
            .collect();

        // Sort by similarity descending
        results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        results.truncate(k);

        Ok(results)
    }

    async fn add_chunks(&self, chunks: Vec<DocumentChunk>) -> Result<(), VectorStoreError> {
        if let Some(bad) = chunks.iter().find(|c| c.document_id.is_empty()) {
            return Err(VectorStoreError::InvalidChunk(format!(
                "chunk {} has no document id",
                bad.id
            )));
        }

        let stored: Vec<StoredChunk> = chunks
            .into_iter()
            .map(|chunk| StoredChunk {
                embedding: self.embedder.embed(&chunk.text),
                chunk,
            })
            .collect();

        self.chunks.write().extend(stored);
        Ok(())
    }

    async fn delete_document(&self, document_id: &str) -> Result<usize, VectorStoreError> {
        let mut chunks = self.chunks.write();
        let before = chunks.len();
        chunks.retain(|stored| stored.chunk.document_id != document_id);
        Ok(before - chunks.len())
    }

    async fn count(&self) -> Result<usize, VectorStoreError> {
        Ok(self.chunks.read().len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    fn chunk(document_id: &str, text: &str) -> DocumentChunk {
        DocumentChunk::new(document_id, text, Map::new())
    }

    #[tokio::test]
    async fn test_search_orders_by_relevance() {
        let store = InMemoryVectorStore::new();
        store
            .add_chunks(vec![
                chunk("d1", "network switch firmware upgrade"),
                chunk("d2", "employee vacation policy and holidays"),
                chunk("d3", "vacation request form"),
            ])
            .await
            .unwrap();

        let results = store.similarity_search("vacation policy", 2).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].chunk.document_id, "d2");
        assert!(results[0].score >= results[1].score);
    }

    #[tokio::test]
    async fn test_delete_document_removes_all_chunks() {
        let store = InMemoryVectorStore::new();
        store
            .add_chunks(vec![chunk("d1", "a"), chunk("d1", "b"), chunk("d2", "c")])
            .await
            .unwrap();

        assert_eq!(store.delete_document("d1").await.unwrap(), 2);
        assert_eq!(store.delete_document("d1").await.unwrap(), 0);
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_rejects_chunk_without_document() {
        let store = InMemoryVectorStore::new();
        let result = store.add_chunks(vec![chunk("", "orphan")]).await;
        assert!(matches!(result, Err(VectorStoreError::InvalidChunk(_))));
        assert_eq!(store.count().await.unwrap(), 0);
    }
}
