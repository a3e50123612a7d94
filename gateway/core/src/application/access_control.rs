// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Access Decision Engine
//!
//! Decides whether a user may see a chunk, given the permission fields stored
//! in its metadata.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Per-candidate check used by filtered retrieval and the
//!   permission check endpoint. Read-only: never touches document state.
//!
//! Evaluation order:
//!
//! 1. dev mode allows everything
//! 2. no permission fields at all denies (fail closed)
//! 3. `public` allows
//! 4. `organization` allows iff the email domain is an org domain
//! 5. otherwise a direct user match, then group membership

use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::debug;

use super::group_membership::{GroupMembershipResolver, MembershipScope};
use crate::domain::access::{
    AccessDecision, AccessDecisionInput, AccessPolicy, AllowReason, DenyReason,
};
use crate::domain::directory::DirectoryClient;
use crate::domain::permission::AccessLevel;

pub struct AccessDecisionEngine {
    resolver: GroupMembershipResolver,
}

impl AccessDecisionEngine {
    pub fn new(policy: Arc<AccessPolicy>, directory: Option<Arc<dyn DirectoryClient>>) -> Self {
        Self {
            resolver: GroupMembershipResolver::new(policy, directory),
        }
    }

    pub fn policy(&self) -> &AccessPolicy {
        self.resolver.policy()
    }

    pub async fn has_access(&self, metadata: &Map<String, Value>, user_email: &str, dev_mode: bool) -> bool {
        let mut scope = MembershipScope::new();
        self.decide(metadata, user_email, dev_mode, &mut scope)
            .await
            .is_allowed()
    }

    pub async fn decide(
        &self,
        metadata: &Map<String, Value>,
        user_email: &str,
        dev_mode: bool,
        scope: &mut MembershipScope,
    ) -> AccessDecision {
        let decision = self.evaluate(metadata, user_email, dev_mode, scope).await;

        metrics::counter!(
            "docgate_access_decisions_total",
            "outcome" => decision.outcome(),
            "reason" => decision.reason()
        )
        .increment(1);
        debug!(
            user = user_email,
            document_id = metadata.get("documentId").and_then(serde_json::Value::as_str).unwrap_or_default(),
            outcome = decision.outcome(),
            reason = decision.reason(),
            "Access decision"
        );

        decision
    }

    async fn evaluate(
        &self,
        metadata: &Map<String, Value>,
        user_email: &str,
        dev_mode: bool,
        scope: &mut MembershipScope,
    ) -> AccessDecision {
        if dev_mode {
            return AccessDecision::Allow(AllowReason::DevMode);
        }

        let user_email = user_email.trim();
        if user_email.is_empty() {
            return AccessDecision::Deny(DenyReason::MissingIdentity);
        }

        let Some(input) = AccessDecisionInput::from_metadata(metadata) else {
            return AccessDecision::Deny(DenyReason::NoPermissionMetadata);
        };

        match input.access_level {
            AccessLevel::Public => AccessDecision::Allow(AllowReason::Public),
            AccessLevel::Organization => {
                if self.policy().is_org_member(user_email) {
                    AccessDecision::Allow(AllowReason::OrganizationDomain)
                } else {
                    AccessDecision::Deny(DenyReason::OutsideOrganization)
                }
            }
            AccessLevel::Restricted | AccessLevel::Private => {
                if input.grants_user(user_email) {
                    AccessDecision::Allow(AllowReason::DirectUser)
                } else if self
                    .resolver
                    .is_member_in_scope(user_email, &input.authorized_groups, scope)
                    .await
                {
                    AccessDecision::Allow(AllowReason::GroupMembership)
                } else {
                    AccessDecision::Deny(DenyReason::NotAuthorized)
                }
            }
        }
    }
}
