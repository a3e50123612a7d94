// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Graph Permission
//!
//! Wire shapes of the Microsoft Graph `permission` resource as returned by
//! `GET /drives/{drive-id}/items/{item-id}/permissions`.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Raw input of the permission aggregator. Every field is
//!   optional and unknown fields are ignored.

use serde::{Deserialize, Serialize};

/// One raw sharing permission entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPermission {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roles: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<RawSharingLink>,

    #[serde(rename = "grantedToV2", default, skip_serializing_if = "Option::is_none")]
    pub granted_to_v2: Option<IdentitySet>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub granted_to: Option<IdentitySet>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub granted_to_identities: Option<Vec<IdentitySet>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inherited_from: Option<serde_json::Value>,
}

impl RawPermission {
    /// All identity sets this entry grants, in `grantedToV2`, `grantedTo`,
    /// `grantedToIdentities` order.
    pub fn granted_entities(&self) -> impl Iterator<Item = &IdentitySet> {
        self.granted_to_v2
            .iter()
            .chain(self.granted_to.iter())
            .chain(self.granted_to_identities.iter().flatten())
    }

    /// `inheritedFrom` counts only when it carries a value.
    pub fn is_inherited(&self) -> bool {
        match &self.inherited_from {
            None | Some(serde_json::Value::Null) => false,
            Some(serde_json::Value::Object(map)) => !map.is_empty(),
            Some(serde_json::Value::String(s)) => !s.is_empty(),
            Some(_) => true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSharingLink {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub link_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application: Option<Identity>,
}

/// A Graph `identitySet` / `sharePointIdentitySet`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentitySet {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<Identity>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site_group: Option<SiteGroupIdentity>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<Identity>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application: Option<Identity>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteGroupIdentity {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub login_name: Option<String>,
}

impl SiteGroupIdentity {
    /// Display name, then login name, then id; empty strings are skipped.
    pub fn preferred_name(&self) -> Option<&str> {
        [&self.display_name, &self.login_name, &self.id]
            .into_iter()
            .filter_map(|v| v.as_deref())
            .find(|v| !v.is_empty())
    }
}

/// Envelope of the permissions listing (`{"value": [...]}`).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PermissionListing {
    #[serde(default)]
    pub value: Vec<RawPermission>,
}

/// Non-empty string helper shared by the identity accessors.
pub(crate) fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}
