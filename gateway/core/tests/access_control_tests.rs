// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! End-to-end tests for the permission core.
//!
//! Raw Graph permission entries are aggregated into a record, flattened onto
//! chunk metadata the way indexing stores it, and evaluated by the access
//! decision engine with a scripted directory.

use async_trait::async_trait;
use docgate_core::application::{AccessDecisionEngine, GroupMembershipResolver, PermissionAggregator};
use docgate_core::domain::access::AccessPolicy;
use docgate_core::domain::directory::{DirectoryClient, DirectoryError, DirectoryGroup};
use docgate_core::domain::graph_permission::RawPermission;
use docgate_core::domain::permission::{AccessLevel, PermissionRecord};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// Directory with fixed memberships. Unknown users fail with a network error.
struct ScriptedDirectory {
    memberships: HashMap<String, Vec<DirectoryGroup>>,
}

impl ScriptedDirectory {
    fn new() -> Self {
        Self {
            memberships: HashMap::new(),
        }
    }

    fn with_member(mut self, user: &str, display_name: &str, mail: &str) -> Self {
        self.memberships
            .entry(user.to_string())
            .or_default()
            .push(DirectoryGroup {
                display_name: Some(display_name.to_string()),
                mail: Some(mail.to_string()),
                ..Default::default()
            });
        self
    }
}

#[async_trait]
impl DirectoryClient for ScriptedDirectory {
    async fn get_token(&self) -> Result<String, DirectoryError> {
        Ok("token".to_string())
    }

    async fn list_member_of(&self, user_email: &str) -> Result<Vec<DirectoryGroup>, DirectoryError> {
        self.memberships
            .get(user_email)
            .cloned()
            .ok_or_else(|| DirectoryError::Network("connection reset".to_string()))
    }

    async fn get_group(&self, group_id: &str) -> Result<DirectoryGroup, DirectoryError> {
        Err(DirectoryError::NotFound(group_id.to_string()))
    }
}

fn raw(entries: Value) -> Vec<RawPermission> {
    serde_json::from_value(entries).unwrap()
}

fn metadata(record: &PermissionRecord) -> Map<String, Value> {
    match serde_json::to_value(record.to_fields()).unwrap() {
        Value::Object(map) => map,
        other => panic!("unexpected metadata {other}"),
    }
}

fn acme_engine(directory: Option<Arc<dyn DirectoryClient>>) -> AccessDecisionEngine {
    AccessDecisionEngine::new(Arc::new(AccessPolicy::new(["acme.com"])), directory)
}

#[tokio::test]
async fn test_anonymous_link_scenario() {
    let record = PermissionAggregator::new(None)
        .aggregate(&raw(json!([{"link": {"scope": "anonymous"}}])))
        .await;

    assert_eq!(record.access_level(), AccessLevel::Public);
    assert!(record.users().is_empty());
    assert!(record.groups().is_empty());
    assert_eq!(record.sharing_links().len(), 1);
    assert_eq!(record.sharing_links()[0].scope, "anonymous");
}

#[tokio::test]
async fn test_anonymous_link_wins_regardless_of_order() {
    let aggregator = PermissionAggregator::new(None);
    let entries = json!([
        {"grantedToV2": {"user": {"email": "alice@acme.com"}}},
        {"link": {"type": "view", "scope": "organization"}},
        {"link": {"type": "view", "scope": "anonymous"}},
        {"grantedToV2": {"siteGroup": {"displayName": "demo Members"}}}
    ]);

    let forward = aggregator.aggregate(&raw(entries.clone())).await;
    let mut reversed_entries = raw(entries);
    reversed_entries.reverse();
    let reversed = aggregator.aggregate(&reversed_entries).await;

    assert_eq!(forward.access_level(), AccessLevel::Public);
    assert_eq!(reversed.access_level(), AccessLevel::Public);
    assert_eq!(forward.users(), reversed.users());
}

#[tokio::test]
async fn test_access_level_classification() {
    let aggregator = PermissionAggregator::new(None);

    let organization = aggregator
        .aggregate(&raw(json!([
            {"link": {"type": "edit", "scope": "organization"}},
            {"link": {"type": "view", "scope": "users"}}
        ])))
        .await;
    assert_eq!(organization.access_level(), AccessLevel::Organization);

    let restricted = aggregator
        .aggregate(&raw(json!([
            {"grantedToV2": {"user": {"email": "Alice@Acme.com"}}},
            {"grantedToIdentities": [{"group": {"email": "Finance@Acme.com", "id": "g-1"}}]}
        ])))
        .await;
    assert_eq!(restricted.access_level(), AccessLevel::Restricted);
    assert!(restricted.users().contains("alice@acme.com"));
    assert!(restricted.groups().contains("finance@acme.com"));

    let private = aggregator.aggregate(&raw(json!([{"roles": ["owner"]}]))).await;
    assert_eq!(private.access_level(), AccessLevel::Private);

    let empty = aggregator.aggregate(&[]).await;
    assert_eq!(empty.access_level(), AccessLevel::Private);
}

#[tokio::test]
async fn test_decisions_follow_access_level() {
    let engine = acme_engine(None);
    let aggregator = PermissionAggregator::new(None);

    let public = aggregator
        .aggregate(&raw(json!([{"link": {"scope": "anonymous"}}])))
        .await;
    assert!(engine.has_access(&metadata(&public), "guest@partner.com", false).await);

    let organization = aggregator
        .aggregate(&raw(json!([{"link": {"scope": "organization"}}])))
        .await;
    assert!(engine.has_access(&metadata(&organization), "bob@acme.com", false).await);
    assert!(!engine.has_access(&metadata(&organization), "bob@partner.com", false).await);

    let restricted = aggregator
        .aggregate(&raw(json!([{"grantedToV2": {"user": {"email": "alice@acme.com"}}}])))
        .await;
    assert!(engine.has_access(&metadata(&restricted), "alice@acme.com", false).await);
    // Same organization does not open a restricted document.
    assert!(!engine.has_access(&metadata(&restricted), "bob@acme.com", false).await);
}

#[tokio::test]
async fn test_partner_domain_denied_for_organization_document() {
    let engine = acme_engine(None);
    let metadata = json!({"access_level": "organization"});

    assert!(
        !engine
            .has_access(metadata.as_object().unwrap(), "u@partner.com", false)
            .await
    );
}

#[tokio::test]
async fn test_dev_mode_allows_everything() {
    let engine = acme_engine(None);

    assert!(engine.has_access(&Map::new(), "", true).await);
    assert!(engine.has_access(&Map::new(), "anyone@partner.com", true).await);
}

#[tokio::test]
async fn test_email_match_is_case_insensitive() {
    let engine = acme_engine(None);
    let metadata = json!({"access_level": "restricted", "authorized_users": ["A@b.com"]});

    assert!(
        engine
            .has_access(metadata.as_object().unwrap(), "a@b.com", false)
            .await
    );
}

#[tokio::test]
async fn test_legacy_string_lists_match_native_lists() {
    let engine = acme_engine(None);
    let legacy = json!({"access_level": "private", "authorized_users": "['a@b.com']"});
    let native = json!({"access_level": "private", "authorized_users": ["a@b.com"]});

    for user in ["a@b.com", "c@d.com"] {
        assert_eq!(
            engine.has_access(legacy.as_object().unwrap(), user, false).await,
            engine.has_access(native.as_object().unwrap(), user, false).await,
        );
    }
}

#[tokio::test]
async fn test_group_grant_resolved_through_directory() {
    let directory = ScriptedDirectory::new().with_member("carol@acme.com", "Finance Team", "finance@acme.com");
    let engine = acme_engine(Some(Arc::new(directory)));
    let metadata = json!({
        "access_level": "restricted",
        "authorized_groups": ["finance@acme.com"]
    });

    assert!(engine.has_access(metadata.as_object().unwrap(), "carol@acme.com", false).await);
    // Not in the directory: the lookup fails and resolves to deny.
    assert!(!engine.has_access(metadata.as_object().unwrap(), "dave@acme.com", false).await);
}

#[tokio::test]
async fn test_directory_failure_resolves_to_false() {
    let resolver = GroupMembershipResolver::new(
        Arc::new(AccessPolicy::new(["acme.com"])),
        Some(Arc::new(ScriptedDirectory::new())),
    );

    let groups = vec!["finance@acme.com".to_string()];
    assert!(!resolver.is_member("erin@acme.com", &groups).await);
}

#[tokio::test]
async fn test_missing_identity_is_denied() {
    let engine = acme_engine(None);
    let metadata = json!({"access_level": "public"});

    assert!(!engine.has_access(metadata.as_object().unwrap(), "", false).await);
}
