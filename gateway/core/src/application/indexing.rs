// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Document Indexing
//!
//! Splits document text into overlapping chunks and writes them to the vector
//! store with the document's permission fields repeated on every chunk.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Re-indexing is delete-then-insert and not atomic: a
//!   concurrent query may briefly see zero or partial chunks of a document.

use anyhow::{Context, Result};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use super::permission_aggregator::PermissionAggregator;
use crate::domain::directory::PermissionSource;
use crate::domain::document::{ChunkMetadata, DocumentChunk, SourceDocument, VectorStore};
use crate::domain::permission::{AccessLevel, PermissionRecord};

pub const DEFAULT_CHUNK_SIZE: usize = 1000;
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

/// Split `text` into chunks of at most `chunk_size` characters, consecutive
/// chunks sharing up to `chunk_overlap` characters. Breaks at the last
/// whitespace in the window when one exists past the overlap region.
pub fn split_text(text: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let chunk_size = chunk_size.max(1);
    let overlap = chunk_overlap.min(chunk_size - 1);

    let mut chunks = Vec::new();
    let mut start = 0;

    while start < chars.len() {
        let mut end = (start + chunk_size).min(chars.len());

        if end < chars.len() {
            if let Some(pos) = chars[start..end].iter().rposition(|c| c.is_whitespace()) {
                if pos > overlap {
                    end = start + pos + 1;
                }
            }
        }

        let piece: String = chars[start..end].iter().collect();
        let piece = piece.trim();
        if !piece.is_empty() {
            chunks.push(piece.to_string());
        }

        if end >= chars.len() {
            break;
        }
        start = end - overlap;
    }

    chunks
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexingReport {
    pub document_id: String,
    pub chunks_removed: usize,
    pub chunks_indexed: usize,
    pub access_level: AccessLevel,
}

pub struct DocumentIndexingService {
    store: Arc<dyn VectorStore>,
    aggregator: Arc<PermissionAggregator>,
    source: Option<Arc<dyn PermissionSource>>,
    chunk_size: usize,
    chunk_overlap: usize,
}

impl DocumentIndexingService {
    pub fn new(
        store: Arc<dyn VectorStore>,
        aggregator: Arc<PermissionAggregator>,
        source: Option<Arc<dyn PermissionSource>>,
    ) -> Self {
        Self {
            store,
            aggregator,
            source,
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }

    pub fn with_chunking(mut self, chunk_size: usize, chunk_overlap: usize) -> Self {
        self.chunk_size = chunk_size;
        self.chunk_overlap = chunk_overlap;
        self
    }

    /// Fetch and aggregate the document's permissions, then replace its chunks.
    /// Without a permission source or drive id the document is indexed as
    /// private with nobody granted.
    pub async fn reindex_document(&self, document: &SourceDocument) -> Result<IndexingReport> {
        let record = match (&self.source, document.drive_id.as_deref()) {
            (Some(source), Some(drive_id)) => {
                self.aggregator
                    .fetch_document_permissions(source.as_ref(), drive_id, &document.id)
                    .await
            }
            _ => PermissionRecord::unavailable("no permission source for document"),
        };

        self.reindex_with_permissions(document, &record).await
    }

    pub async fn reindex_with_permissions(
        &self,
        document: &SourceDocument,
        permissions: &PermissionRecord,
    ) -> Result<IndexingReport> {
        let texts = split_text(&document.content, self.chunk_size, self.chunk_overlap);
        if texts.is_empty() {
            info!(document_id = %document.id, "Document has no text content, skipping");
            return Ok(IndexingReport {
                document_id: document.id.clone(),
                chunks_removed: 0,
                chunks_indexed: 0,
                access_level: permissions.access_level(),
            });
        }

        let fields = permissions.to_fields();
        let chunks: Vec<DocumentChunk> = texts
            .into_iter()
            .enumerate()
            .map(|(index, text)| {
                let metadata = ChunkMetadata::for_chunk(document, index, fields.clone()).into_map();
                DocumentChunk::new(document.id.clone(), text, metadata)
            })
            .collect();
        let chunk_count = chunks.len();

        let removed = self
            .store
            .delete_document(&document.id)
            .await
            .with_context(|| format!("Failed to delete existing chunks of {}", document.id))?;

        self.store
            .add_chunks(chunks)
            .await
            .with_context(|| format!("Failed to index chunks of {}", document.id))?;

        info!(
            document_id = %document.id,
            removed,
            indexed = chunk_count,
            access_level = %permissions.access_level(),
            "Re-indexed document"
        );

        Ok(IndexingReport {
            document_id: document.id.clone(),
            chunks_removed: removed,
            chunks_indexed: chunk_count,
            access_level: permissions.access_level(),
        })
    }

    pub async fn remove_document(&self, document_id: &str) -> Result<usize> {
        let removed = self
            .store
            .delete_document(document_id)
            .await
            .with_context(|| format!("Failed to remove document {}", document_id))?;
        info!(document_id, removed, "Removed document from index");
        Ok(removed)
    }
}
