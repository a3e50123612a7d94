// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Filtered Retrieval
//!
//! Similarity search with per-candidate permission filtering.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Over-fetch `overfetch_factor * n` candidates, keep the
//!   permitted ones in relevance order until `n` are collected. There is no
//!   second fetch round, so fewer than `n` results may come back.

use std::sync::Arc;
use tracing::{debug, info, warn};

use super::access_control::AccessDecisionEngine;
use super::group_membership::MembershipScope;
use crate::domain::document::{SearchHit, VectorStore};

pub const DEFAULT_OVERFETCH_FACTOR: usize = 3;

pub struct FilteredRetrievalService {
    store: Arc<dyn VectorStore>,
    engine: Arc<AccessDecisionEngine>,
    overfetch_factor: usize,
}

impl FilteredRetrievalService {
    pub fn new(store: Arc<dyn VectorStore>, engine: Arc<AccessDecisionEngine>) -> Self {
        Self {
            store,
            engine,
            overfetch_factor: DEFAULT_OVERFETCH_FACTOR,
        }
    }

    pub fn with_overfetch_factor(mut self, factor: usize) -> Self {
        self.overfetch_factor = factor.max(1);
        self
    }

    pub fn engine(&self) -> &AccessDecisionEngine {
        &self.engine
    }

    /// Permitted hits for `user_email`, at most `requested_count`, with ACL
    /// fields removed. Store failures yield an empty list.
    pub async fn search(
        &self,
        query: &str,
        requested_count: usize,
        user_email: Option<&str>,
        dev_mode: bool,
    ) -> Vec<SearchHit> {
        if requested_count == 0 {
            return Vec::new();
        }

        let fetch_count = requested_count.saturating_mul(self.overfetch_factor);
        let candidates = match self.store.similarity_search(query, fetch_count).await {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!(error = %e, "Similarity search failed, returning no documents");
                return Vec::new();
            }
        };
        let fetched = candidates.len();

        let user_email = user_email.map(str::trim).filter(|e| !e.is_empty());
        let permitted: Vec<SearchHit> = match user_email {
            Some(email) if !dev_mode => {
                let mut scope = MembershipScope::new();
                let mut permitted = Vec::with_capacity(requested_count.min(candidates.len()));
                for candidate in candidates {
                    if permitted.len() >= requested_count {
                        break;
                    }
                    let decision = self
                        .engine
                        .decide(&candidate.chunk.metadata, email, false, &mut scope)
                        .await;
                    if decision.is_allowed() {
                        permitted.push(SearchHit::from_scored(candidate));
                    }
                }
                debug!(directory_lookups = scope.lookups(), "Filtered candidates");
                permitted
            }
            _ => candidates
                .into_iter()
                .take(requested_count)
                .map(SearchHit::from_scored)
                .collect(),
        };

        metrics::histogram!("docgate_retrieval_results").record(permitted.len() as f64);
        info!(
            requested = requested_count,
            fetched,
            returned = permitted.len(),
            dev_mode,
            filtered = user_email.is_some() && !dev_mode,
            "Filtered retrieval complete"
        );

        permitted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::access::AccessPolicy;
    use crate::domain::document::{DocumentChunk, ScoredChunk, VectorStoreError};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::json;

    struct FixedStore {
        chunks: Vec<ScoredChunk>,
        requested_k: Mutex<Option<usize>>,
    }

    #[async_trait]
    impl VectorStore for FixedStore {
        async fn similarity_search(&self, _query: &str, k: usize) -> Result<Vec<ScoredChunk>, VectorStoreError> {
            *self.requested_k.lock() = Some(k);
            Ok(self.chunks.iter().take(k).cloned().collect())
        }

        async fn add_chunks(&self, _chunks: Vec<DocumentChunk>) -> Result<(), VectorStoreError> {
            Ok(())
        }

        async fn delete_document(&self, _document_id: &str) -> Result<usize, VectorStoreError> {
            Ok(0)
        }

        async fn count(&self) -> Result<usize, VectorStoreError> {
            Ok(self.chunks.len())
        }
    }

    struct BrokenStore;

    #[async_trait]
    impl VectorStore for BrokenStore {
        async fn similarity_search(&self, _query: &str, _k: usize) -> Result<Vec<ScoredChunk>, VectorStoreError> {
            Err(VectorStoreError::Unavailable("index offline".to_string()))
        }

        async fn add_chunks(&self, _chunks: Vec<DocumentChunk>) -> Result<(), VectorStoreError> {
            Ok(())
        }

        async fn delete_document(&self, _document_id: &str) -> Result<usize, VectorStoreError> {
            Ok(0)
        }

        async fn count(&self) -> Result<usize, VectorStoreError> {
            Ok(0)
        }
    }

    fn chunk(id: &str, access_level: &str, score: f64) -> ScoredChunk {
        let metadata = json!({
            "documentId": id,
            "documentName": format!("{}.docx", id),
            "access_level": access_level,
            "authorized_users": ["owner@acme.com"],
            "authorized_groups": []
        });
        ScoredChunk {
            chunk: DocumentChunk::new(id, format!("text of {}", id), metadata.as_object().cloned().unwrap()),
            score,
        }
    }

    fn service(store: Arc<dyn VectorStore>) -> FilteredRetrievalService {
        let engine = AccessDecisionEngine::new(Arc::new(AccessPolicy::from_domain_list("acme.com")), None);
        FilteredRetrievalService::new(store, Arc::new(engine))
    }

    #[tokio::test]
    async fn test_overfetches_three_times_requested() {
        let store = Arc::new(FixedStore {
            chunks: (0..20).map(|i| chunk(&format!("d{}", i), "public", 1.0 - i as f64 / 100.0)).collect(),
            requested_k: Mutex::new(None),
        });
        let hits = service(store.clone()).search("x", 4, Some("bob@acme.com"), false).await;

        assert_eq!(*store.requested_k.lock(), Some(12));
        assert_eq!(hits.len(), 4);
    }

    #[tokio::test]
    async fn test_filters_in_relevance_order() {
        let chunks = vec![
            chunk("a", "private", 0.9),
            chunk("b", "public", 0.8),
            chunk("c", "private", 0.7),
            chunk("d", "organization", 0.6),
        ];
        let store = Arc::new(FixedStore { chunks, requested_k: Mutex::new(None) });

        let hits = service(store).search("x", 5, Some("u@partner.com"), false).await;
        let ids: Vec<&str> = hits.iter().map(|h| h.document_id.as_str()).collect();
        assert_eq!(ids, vec!["b"]);
    }

    #[tokio::test]
    async fn test_dev_mode_and_anonymous_skip_filtering() {
        let chunks = vec![chunk("a", "private", 0.9), chunk("b", "private", 0.8), chunk("c", "private", 0.7)];
        let store = Arc::new(FixedStore { chunks, requested_k: Mutex::new(None) });
        let service = service(store);

        assert_eq!(service.search("x", 2, Some("u@partner.com"), true).await.len(), 2);
        assert_eq!(service.search("x", 2, None, false).await.len(), 2);
        assert_eq!(service.search("x", 2, Some(""), false).await.len(), 2);
    }

    #[tokio::test]
    async fn test_acl_fields_are_stripped() {
        let store = Arc::new(FixedStore {
            chunks: vec![chunk("a", "restricted", 0.9)],
            requested_k: Mutex::new(None),
        });
        let hits = service(store).search("x", 1, Some("owner@acme.com"), false).await;

        assert_eq!(hits.len(), 1);
        assert!(!hits[0].metadata.contains_key("authorized_users"));
        assert!(!hits[0].metadata.contains_key("authorized_groups"));
        assert_eq!(hits[0].metadata["access_level"], "restricted");
    }

    #[tokio::test]
    async fn test_store_failure_returns_empty() {
        let hits = service(Arc::new(BrokenStore)).search("x", 5, Some("bob@acme.com"), false).await;
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_huge_requested_count_is_bounded_by_candidates() {
        let store = Arc::new(FixedStore {
            chunks: vec![chunk("a", "public", 0.9), chunk("b", "private", 0.8)],
            requested_k: Mutex::new(None),
        });
        let hits = service(store.clone()).search("x", 1 << 40, Some("bob@acme.com"), false).await;

        assert_eq!(*store.requested_k.lock(), Some(3 << 40));
        assert_eq!(hits.len(), 1);
    }

    #[tokio::test]
    async fn test_zero_requested_returns_empty() {
        let store = Arc::new(FixedStore {
            chunks: vec![chunk("a", "public", 0.9)],
            requested_k: Mutex::new(None),
        });
        assert!(service(store).search("x", 0, Some("bob@acme.com"), false).await.is_empty());
    }
}
