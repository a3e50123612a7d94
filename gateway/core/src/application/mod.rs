// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod permission_aggregator;
pub mod group_membership;
pub mod access_control;
pub mod retrieval;
pub mod indexing;
pub mod chat;

// Re-export services for convenience
pub use permission_aggregator::PermissionAggregator;
pub use group_membership::{GroupMembershipResolver, MembershipScope};
pub use access_control::AccessDecisionEngine;
pub use retrieval::FilteredRetrievalService;
pub use indexing::{split_text, DocumentIndexingService, IndexingReport};
pub use chat::{ChatAnswer, ChatService, SourceReference};
