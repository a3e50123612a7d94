// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Access Decision Types
//!
//! - [`AccessPolicy`]: organization-wide settings the decision needs
//!   (org domains, site-local group naming). Built from the gateway config and
//!   passed explicitly to the engine and resolver constructors.
//! - [`AccessDecisionInput`]: the permission view of one chunk's metadata.
//!   Derived per query, never mutated.
//! - [`AccessDecision`]: allow/deny with the reason, used for logging and
//!   metrics labels.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::permission::AccessLevel;
use super::principals::normalize_principals;

pub const AUTHORIZED_USERS_FIELD: &str = "authorized_users";
pub const AUTHORIZED_GROUPS_FIELD: &str = "authorized_groups";
pub const ACCESS_LEVEL_FIELD: &str = "access_level";

/// Default SharePoint site roles that every organization member holds.
pub const DEFAULT_SITE_GROUPS: [&str; 3] = ["demo Owners", "demo Members", "demo Visitors"];
pub const DEFAULT_SITE_GROUP_PREFIX: &str = "demo ";
pub const DEFAULT_OPAQUE_GROUP_MIN_LEN: usize = 30;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessPolicy {
    /// Lowercased organization email domains.
    org_domains: Vec<String>,
    /// Site-local group names resolved without a directory call.
    site_groups: Vec<String>,
    /// Naming prefix of site-local groups.
    site_group_prefix: String,
    /// Names longer than this (and not site-local) are treated as opaque
    /// directory identifiers.
    opaque_group_min_len: usize,
}

impl AccessPolicy {
    pub fn new(org_domains: impl IntoIterator<Item = impl AsRef<str>>) -> Self {
        Self {
            org_domains: normalize_domains(org_domains),
            site_groups: DEFAULT_SITE_GROUPS.iter().map(|g| g.to_string()).collect(),
            site_group_prefix: DEFAULT_SITE_GROUP_PREFIX.to_string(),
            opaque_group_min_len: DEFAULT_OPAQUE_GROUP_MIN_LEN,
        }
    }

    /// Parse a comma-separated domain list (`"acme.com, Acme.co.uk,"`).
    pub fn from_domain_list(domains: &str) -> Self {
        Self::new(domains.split(','))
    }

    pub fn with_site_groups(mut self, groups: Vec<String>) -> Self {
        self.site_groups = groups;
        self
    }

    pub fn with_site_group_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.site_group_prefix = prefix.into();
        self
    }

    pub fn with_opaque_group_min_len(mut self, len: usize) -> Self {
        self.opaque_group_min_len = len;
        self
    }

    pub fn org_domains(&self) -> &[String] {
        &self.org_domains
    }

    pub fn site_groups(&self) -> &[String] {
        &self.site_groups
    }

    /// True iff the email's domain is one of the organization domains.
    pub fn is_org_member(&self, user_email: &str) -> bool {
        match email_domain(user_email) {
            Some(domain) => self.org_domains.iter().any(|d| *d == domain),
            None => false,
        }
    }

    /// Exact (case-sensitive) match against the fast-path site groups.
    pub fn is_site_group(&self, group: &str) -> bool {
        self.site_groups.iter().any(|g| g == group)
    }

    /// Whether a group identifier can be looked up in the directory: it is an
    /// email-like identity, or a long opaque id outside the site naming.
    pub fn is_directory_resolvable(&self, group: &str) -> bool {
        group.contains('@')
            || (group.chars().count() > self.opaque_group_min_len
                && !group.starts_with(&self.site_group_prefix))
    }
}

impl Default for AccessPolicy {
    fn default() -> Self {
        Self::new(Vec::<String>::new())
    }
}

/// Lowercased text between the first and second `@`, `None` when there is no `@`.
pub fn email_domain(user_email: &str) -> Option<String> {
    user_email
        .split('@')
        .nth(1)
        .map(|domain| domain.trim().to_lowercase())
}

fn normalize_domains(domains: impl IntoIterator<Item = impl AsRef<str>>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for domain in domains {
        let domain = domain.as_ref().trim().to_lowercase();
        if !domain.is_empty() && !out.contains(&domain) {
            out.push(domain);
        }
    }
    out
}

/// Permission view of one chunk, as seen by the decision engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessDecisionInput {
    pub access_level: AccessLevel,
    pub authorized_users: Vec<String>,
    pub authorized_groups: Vec<String>,
}

impl AccessDecisionInput {
    /// `None` when the metadata carries none of the permission fields, i.e.
    /// the chunk was indexed before permissions were recorded.
    pub fn from_metadata(metadata: &Map<String, Value>) -> Option<Self> {
        let has_any = [
            AUTHORIZED_USERS_FIELD,
            AUTHORIZED_GROUPS_FIELD,
            ACCESS_LEVEL_FIELD,
        ]
        .iter()
        .any(|field| metadata.contains_key(*field));

        if !has_any {
            return None;
        }

        let access_level = metadata
            .get(ACCESS_LEVEL_FIELD)
            .and_then(Value::as_str)
            .map(AccessLevel::parse_lenient)
            .unwrap_or_default();

        Some(Self {
            access_level,
            authorized_users: normalize_principals(metadata.get(AUTHORIZED_USERS_FIELD)),
            authorized_groups: normalize_principals(metadata.get(AUTHORIZED_GROUPS_FIELD)),
        })
    }

    /// Case-insensitive direct user match.
    pub fn grants_user(&self, user_email: &str) -> bool {
        let wanted = user_email.trim().to_lowercase();
        self.authorized_users
            .iter()
            .any(|user| user.to_lowercase() == wanted)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllowReason {
    DevMode,
    Public,
    OrganizationDomain,
    DirectUser,
    GroupMembership,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    MissingIdentity,
    NoPermissionMetadata,
    OutsideOrganization,
    NotAuthorized,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    Allow(AllowReason),
    Deny(DenyReason),
}

impl AccessDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, AccessDecision::Allow(_))
    }

    pub fn outcome(&self) -> &'static str {
        match self {
            AccessDecision::Allow(_) => "allow",
            AccessDecision::Deny(_) => "deny",
        }
    }

    pub fn reason(&self) -> &'static str {
        match self {
            AccessDecision::Allow(AllowReason::DevMode) => "dev_mode",
            AccessDecision::Allow(AllowReason::Public) => "public",
            AccessDecision::Allow(AllowReason::OrganizationDomain) => "organization_domain",
            AccessDecision::Allow(AllowReason::DirectUser) => "direct_user",
            AccessDecision::Allow(AllowReason::GroupMembership) => "group_membership",
            AccessDecision::Deny(DenyReason::MissingIdentity) => "missing_identity",
            AccessDecision::Deny(DenyReason::NoPermissionMetadata) => "no_permission_metadata",
            AccessDecision::Deny(DenyReason::OutsideOrganization) => "outside_organization",
            AccessDecision::Deny(DenyReason::NotAuthorized) => "not_authorized",
        }
    }
}
