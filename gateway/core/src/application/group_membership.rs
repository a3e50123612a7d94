// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Group Membership Resolver
//!
//! Decides whether a user belongs to any of a document's authorized groups.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Fast path for site-local default groups, one directory
//!   `memberOf` call otherwise. Every failure resolves to "not a member".
//!
//! A [`MembershipScope`] memoizes the user's directory groups for the length
//! of one retrieval call, so filtering many candidates costs at most one
//! `memberOf` round trip per user. Nothing is cached across requests.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::domain::access::AccessPolicy;
use crate::domain::directory::{DirectoryClient, DirectoryGroup};

/// Lowercased display names and mail addresses of a user's groups.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserGroups {
    display_names: HashSet<String>,
    mails: HashSet<String>,
}

impl UserGroups {
    pub fn from_groups(groups: &[DirectoryGroup]) -> Self {
        let mut sets = Self::default();
        for group in groups {
            if let Some(name) = &group.display_name {
                sets.display_names.insert(name.trim().to_lowercase());
            }
            if let Some(mail) = &group.mail {
                sets.mails.insert(mail.trim().to_lowercase());
            }
        }
        sets
    }

    pub fn matches(&self, candidate: &str) -> bool {
        let candidate = candidate.trim().to_lowercase();
        self.display_names.contains(&candidate) || self.mails.contains(&candidate)
    }
}

/// Request-scoped memo of directory lookups, keyed by lowercased user email.
/// `None` records a failed lookup, which keeps denying for the rest of the scope.
#[derive(Debug, Default)]
pub struct MembershipScope {
    lookups: HashMap<String, Option<Arc<UserGroups>>>,
}

impl MembershipScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookups(&self) -> usize {
        self.lookups.len()
    }
}

pub struct GroupMembershipResolver {
    policy: Arc<AccessPolicy>,
    directory: Option<Arc<dyn DirectoryClient>>,
}

impl GroupMembershipResolver {
    pub fn new(policy: Arc<AccessPolicy>, directory: Option<Arc<dyn DirectoryClient>>) -> Self {
        Self { policy, directory }
    }

    pub fn policy(&self) -> &AccessPolicy {
        &self.policy
    }

    /// Single check with its own scope.
    pub async fn is_member(&self, user_email: &str, candidate_groups: &[String]) -> bool {
        let mut scope = MembershipScope::new();
        self.is_member_in_scope(user_email, candidate_groups, &mut scope)
            .await
    }

    pub async fn is_member_in_scope(
        &self,
        user_email: &str,
        candidate_groups: &[String],
        scope: &mut MembershipScope,
    ) -> bool {
        if candidate_groups.is_empty() {
            return false;
        }

        if self.policy.is_org_member(user_email)
            && candidate_groups.iter().any(|g| self.policy.is_site_group(g))
        {
            debug!(user = user_email, "Site group fast path matched");
            return true;
        }

        let resolvable: Vec<&String> = candidate_groups
            .iter()
            .filter(|g| self.policy.is_directory_resolvable(g))
            .collect();

        if resolvable.is_empty() {
            debug!(user = user_email, "No directory-resolvable groups to check");
            return false;
        }

        let Some(groups) = self.user_groups(user_email, scope).await else {
            return false;
        };

        resolvable.iter().any(|candidate| groups.matches(candidate))
    }

    async fn user_groups(
        &self,
        user_email: &str,
        scope: &mut MembershipScope,
    ) -> Option<Arc<UserGroups>> {
        let key = user_email.trim().to_lowercase();
        if let Some(cached) = scope.lookups.get(&key) {
            return cached.clone();
        }

        let resolved = self.lookup(&key).await;
        scope.lookups.insert(key, resolved.clone());
        resolved
    }

    async fn lookup(&self, user_email: &str) -> Option<Arc<UserGroups>> {
        let Some(directory) = &self.directory else {
            warn!(user = user_email, "No directory configured, group membership denied");
            return None;
        };

        match directory.list_member_of(user_email).await {
            Ok(groups) => {
                metrics::counter!("docgate_directory_lookups_total", "outcome" => "success")
                    .increment(1);
                debug!(user = user_email, groups = groups.len(), "Resolved directory groups");
                Some(Arc::new(UserGroups::from_groups(&groups)))
            }
            Err(e) => {
                metrics::counter!("docgate_directory_lookups_total", "outcome" => "error")
                    .increment(1);
                warn!(user = user_email, error = %e, "Group membership lookup failed, denying");
                None
            }
        }
    }
}
