// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Document
//!
//! Source documents, indexed chunks with their metadata, and the vector store port.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Indexed chunk types and the vector store port. Chunk
//!   metadata is kept as a JSON object so that permission fields written by
//!   older indexers (string-encoded lists) survive a round trip untouched.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::access::{AUTHORIZED_GROUPS_FIELD, AUTHORIZED_USERS_FIELD};
use super::permission::PermissionFields;

pub const DOCUMENT_ID_FIELD: &str = "documentId";
pub const DOCUMENT_NAME_FIELD: &str = "documentName";
pub const WEB_URL_FIELD: &str = "webUrl";

/// A SharePoint document ready for indexing. Text extraction happens upstream.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceDocument {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub web_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drive_id: Option<String>,
    #[serde(default)]
    pub content: String,
}

/// Typed view of the metadata written onto every chunk of a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkMetadata {
    pub document_id: String,
    pub document_name: String,
    pub web_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<String>,
    pub chunk_index: usize,
    #[serde(flatten)]
    pub permissions: PermissionFields,
}

impl ChunkMetadata {
    pub fn for_chunk(document: &SourceDocument, chunk_index: usize, permissions: PermissionFields) -> Self {
        Self {
            document_id: document.id.clone(),
            document_name: document.name.clone(),
            web_url: document.web_url.clone(),
            last_modified: document.last_modified.clone(),
            chunk_index,
            permissions,
        }
    }

    pub fn into_map(self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }
}

/// One indexed text chunk with its flat metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub id: String,
    pub document_id: String,
    pub text: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl DocumentChunk {
    pub fn new(document_id: impl Into<String>, text: impl Into<String>, metadata: Map<String, Value>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            document_id: document_id.into(),
            text: text.into(),
            metadata,
        }
    }

    fn metadata_str(&self, field: &str) -> Option<&str> {
        self.metadata.get(field).and_then(Value::as_str)
    }

    /// `documentId` from metadata, else the chunk's own document id.
    pub fn source_document_id(&self) -> &str {
        self.metadata_str(DOCUMENT_ID_FIELD).unwrap_or(&self.document_id)
    }

    pub fn document_name(&self) -> Option<&str> {
        self.metadata_str(DOCUMENT_NAME_FIELD)
    }

    pub fn web_url(&self) -> Option<&str> {
        self.metadata_str(WEB_URL_FIELD)
    }
}

/// A similarity-search candidate, higher score is more relevant.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    pub chunk: DocumentChunk,
    pub score: f64,
}

/// A permitted search result as handed to the response layer. ACL fields are
/// removed; `access_level` is kept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    pub document_id: String,
    pub text: String,
    pub metadata: Map<String, Value>,
    pub score: f64,
}

impl SearchHit {
    pub fn from_scored(scored: ScoredChunk) -> Self {
        let document_id = scored.chunk.source_document_id().to_string();
        let mut metadata = scored.chunk.metadata;
        metadata.remove(AUTHORIZED_USERS_FIELD);
        metadata.remove(AUTHORIZED_GROUPS_FIELD);
        Self {
            document_id,
            text: scored.chunk.text,
            metadata,
            score: scored.score,
        }
    }

    pub fn document_name(&self) -> &str {
        self.metadata
            .get(DOCUMENT_NAME_FIELD)
            .and_then(Value::as_str)
            .unwrap_or("Unknown")
    }

    pub fn web_url(&self) -> &str {
        self.metadata
            .get(WEB_URL_FIELD)
            .and_then(Value::as_str)
            .unwrap_or_default()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum VectorStoreError {
    #[error("Vector store unavailable: {0}")]
    Unavailable(String),

    #[error("Embedding failed: {0}")]
    Embedding(String),

    #[error("Invalid chunk: {0}")]
    InvalidChunk(String),
}

/// Similarity index over document chunks.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Up to `k` chunks ordered by descending relevance.
    async fn similarity_search(&self, query: &str, k: usize) -> Result<Vec<ScoredChunk>, VectorStoreError>;

    async fn add_chunks(&self, chunks: Vec<DocumentChunk>) -> Result<(), VectorStoreError>;

    /// Remove every chunk of a document, returning how many were removed.
    async fn delete_document(&self, document_id: &str) -> Result<usize, VectorStoreError>;

    async fn count(&self) -> Result<usize, VectorStoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::permission::AccessLevel;
    use serde_json::json;

    fn document() -> SourceDocument {
        SourceDocument {
            id: "doc-1".to_string(),
            name: "Budget.xlsx".to_string(),
            web_url: "https://acme.sharepoint.com/Budget.xlsx".to_string(),
            last_modified: Some("2026-03-01T10:00:00Z".to_string()),
            drive_id: None,
            content: String::new(),
        }
    }

    #[test]
    fn test_chunk_metadata_field_names() {
        let permissions = PermissionFields {
            authorized_users: vec!["a@acme.com".to_string()],
            authorized_groups: vec![],
            access_level: AccessLevel::Restricted,
        };
        let map = ChunkMetadata::for_chunk(&document(), 2, permissions).into_map();

        assert_eq!(map["documentId"], "doc-1");
        assert_eq!(map["documentName"], "Budget.xlsx");
        assert_eq!(map["chunkIndex"], 2);
        assert_eq!(map["lastModified"], "2026-03-01T10:00:00Z");
        assert_eq!(map["authorized_users"], json!(["a@acme.com"]));
        assert_eq!(map["access_level"], "restricted");
    }

    #[test]
    fn test_search_hit_strips_acl_fields() {
        let metadata = json!({
            "documentId": "doc-1",
            "documentName": "Budget.xlsx",
            "authorized_users": ["a@acme.com"],
            "authorized_groups": "['Finance']",
            "access_level": "restricted"
        });
        let chunk = DocumentChunk::new("doc-1", "text", metadata.as_object().cloned().unwrap());
        let hit = SearchHit::from_scored(ScoredChunk { chunk, score: 0.9 });

        assert!(!hit.metadata.contains_key("authorized_users"));
        assert!(!hit.metadata.contains_key("authorized_groups"));
        assert_eq!(hit.metadata["access_level"], "restricted");
        assert_eq!(hit.document_name(), "Budget.xlsx");
        assert_eq!(hit.web_url(), "");
    }
}
