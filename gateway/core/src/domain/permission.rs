// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Permission Record (normalized per-document sharing state)
//!
//! A [`PermissionRecord`] is the flattened view of every sharing entry Graph
//! reports for one drive item. It is built fresh during indexing and written
//! onto every chunk of the document as [`PermissionFields`].
//!
//! ## Access level ordering
//!
//! ```text
//! Private < Restricted < Organization < Public
//! ```
//!
//! The record only exposes [`PermissionRecord::escalate`] for changing the
//! level, which takes the maximum of the current and requested level. A record
//! can therefore never be downgraded while it is being aggregated.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Coarse visibility classification of a document.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum AccessLevel {
    /// Nobody was specified.
    #[default]
    Private,
    /// Specific users or groups were granted access.
    Restricted,
    /// Anyone in the organization holding a link.
    Organization,
    /// Anyone holding a link, including anonymous users.
    Public,
}

impl AccessLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessLevel::Private => "private",
            AccessLevel::Restricted => "restricted",
            AccessLevel::Organization => "organization",
            AccessLevel::Public => "public",
        }
    }

    /// Parse a stored level. Unknown or empty values fall back to `Private`,
    /// which routes the decision through explicit user/group matching.
    pub fn parse_lenient(value: &str) -> Self {
        value.parse().unwrap_or(AccessLevel::Private)
    }
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown access level: {0}")]
pub struct UnknownAccessLevel(pub String);

impl FromStr for AccessLevel {
    type Err = UnknownAccessLevel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "private" => Ok(AccessLevel::Private),
            "restricted" => Ok(AccessLevel::Restricted),
            "organization" => Ok(AccessLevel::Organization),
            "public" => Ok(AccessLevel::Public),
            other => Err(UnknownAccessLevel(other.to_string())),
        }
    }
}

/// A sharing link recorded from a permission entry, kept in source order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharingLink {
    #[serde(rename = "type", default)]
    pub link_type: String,
    #[serde(default)]
    pub scope: String,
    #[serde(rename = "webUrl", default)]
    pub web_url: String,
    /// Id of the application that created the link, empty when absent.
    #[serde(default)]
    pub application: String,
}

impl SharingLink {
    /// The access level this link's scope grants on its own, if any.
    pub fn granted_level(&self) -> Option<AccessLevel> {
        match self.scope.as_str() {
            "anonymous" => Some(AccessLevel::Public),
            "organization" => Some(AccessLevel::Organization),
            _ => None,
        }
    }
}

/// Normalized aggregation of all sharing entries for one document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionRecord {
    users: BTreeSet<String>,
    groups: BTreeSet<String>,
    access_level: AccessLevel,
    inheritance: bool,
    sharing_links: Vec<SharingLink>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    applications: BTreeSet<String>,
    #[serde(default)]
    raw_entry_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl PermissionRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// The record returned when the permission source itself could not be
    /// read: private, nobody granted, with the failure attached.
    pub fn unavailable(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::default()
        }
    }

    pub fn users(&self) -> &BTreeSet<String> {
        &self.users
    }

    pub fn groups(&self) -> &BTreeSet<String> {
        &self.groups
    }

    pub fn access_level(&self) -> AccessLevel {
        self.access_level
    }

    pub fn inheritance(&self) -> bool {
        self.inheritance
    }

    pub fn sharing_links(&self) -> &[SharingLink] {
        &self.sharing_links
    }

    pub fn applications(&self) -> &BTreeSet<String> {
        &self.applications
    }

    pub fn raw_entry_count(&self) -> usize {
        self.raw_entry_count
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Raise the access level to at least `level`.
    pub fn escalate(&mut self, level: AccessLevel) {
        self.access_level = self.access_level.max(level);
    }

    /// Add a user email; it is trimmed and lowercased. Empty values are ignored.
    pub fn add_user(&mut self, email: &str) {
        let email = email.trim().to_lowercase();
        if !email.is_empty() {
            self.users.insert(email);
        }
    }

    /// Add a group identifier verbatim (trimmed). Empty values are ignored.
    pub fn add_group(&mut self, group: &str) {
        let group = group.trim();
        if !group.is_empty() {
            self.groups.insert(group.to_string());
        }
    }

    pub fn add_application(&mut self, application: &str) {
        if !application.is_empty() {
            self.applications.insert(application.to_string());
        }
    }

    /// Record a sharing link and escalate by its scope.
    pub fn add_sharing_link(&mut self, link: SharingLink) {
        if let Some(level) = link.granted_level() {
            self.escalate(level);
        }
        self.sharing_links.push(link);
    }

    /// Inheritance is monotonic: once set it is never cleared.
    pub fn mark_inherited(&mut self) {
        self.inheritance = true;
    }

    pub fn count_entry(&mut self) {
        self.raw_entry_count += 1;
    }

    /// Distinguish "nobody specified" from "specific people specified".
    pub fn finalize(&mut self) {
        if self.access_level == AccessLevel::Private
            && (!self.users.is_empty() || !self.groups.is_empty())
        {
            self.escalate(AccessLevel::Restricted);
        }
    }

    /// The flat fields repeated on every indexed chunk of the document.
    pub fn to_fields(&self) -> PermissionFields {
        PermissionFields {
            authorized_users: self.users.iter().cloned().collect(),
            authorized_groups: self.groups.iter().cloned().collect(),
            access_level: self.access_level,
        }
    }
}

/// Permission metadata as stored alongside each chunk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionFields {
    pub authorized_users: Vec<String>,
    pub authorized_groups: Vec<String>,
    pub access_level: AccessLevel,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_level_ordering() {
        assert!(AccessLevel::Public > AccessLevel::Organization);
        assert!(AccessLevel::Organization > AccessLevel::Restricted);
        assert!(AccessLevel::Restricted > AccessLevel::Private);
    }

    #[test]
    fn test_escalate_never_downgrades() {
        let mut record = PermissionRecord::new();
        record.escalate(AccessLevel::Public);
        record.escalate(AccessLevel::Organization);
        assert_eq!(record.access_level(), AccessLevel::Public);
    }

    #[test]
    fn test_finalize_marks_restricted_only_when_principals_present() {
        let mut empty = PermissionRecord::new();
        empty.finalize();
        assert_eq!(empty.access_level(), AccessLevel::Private);

        let mut shared = PermissionRecord::new();
        shared.add_group("Finance Team");
        shared.finalize();
        assert_eq!(shared.access_level(), AccessLevel::Restricted);
    }

    #[test]
    fn test_finalize_keeps_link_level() {
        let mut record = PermissionRecord::new();
        record.add_user("a@acme.com");
        record.add_sharing_link(SharingLink {
            scope: "organization".to_string(),
            ..Default::default()
        });
        record.finalize();
        assert_eq!(record.access_level(), AccessLevel::Organization);
    }

    #[test]
    fn test_add_user_normalizes_and_dedupes() {
        let mut record = PermissionRecord::new();
        record.add_user("  Alice@Acme.com ");
        record.add_user("alice@acme.com");
        record.add_user("   ");
        assert_eq!(record.users().len(), 1);
        assert!(record.users().contains("alice@acme.com"));
    }

    #[test]
    fn test_parse_lenient() {
        assert_eq!(AccessLevel::parse_lenient("Public"), AccessLevel::Public);
        assert_eq!(AccessLevel::parse_lenient(" organization "), AccessLevel::Organization);
        assert_eq!(AccessLevel::parse_lenient("shared"), AccessLevel::Private);
        assert_eq!(AccessLevel::parse_lenient(""), AccessLevel::Private);
    }

    #[test]
    fn test_unavailable_record_serializes_error() {
        let record = PermissionRecord::unavailable("permissions endpoint unreachable");
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["access_level"], "private");
        assert_eq!(json["users"], serde_json::json!([]));
        assert_eq!(json["groups"], serde_json::json!([]));
        assert_eq!(json["error"], "permissions endpoint unreachable");
    }
}
