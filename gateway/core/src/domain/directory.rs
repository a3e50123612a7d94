// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Directory
//!
//! Directory and permission source ports with their error types.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Ports for the organizational directory (group membership,
//!   group details) and the raw permission source. Implemented in
//!   `infrastructure/graph_client`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::graph_permission::RawPermission;

/// A directory group as returned by `/groups/{id}` and `/users/{id}/memberOf`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryGroup {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mail: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_principal_name: Option<String>,
}

impl DirectoryGroup {
    /// Mail address, else user principal name; lowercased.
    pub fn resolved_email(&self) -> Option<String> {
        [&self.mail, &self.user_principal_name]
            .into_iter()
            .filter_map(|v| v.as_deref())
            .map(str::trim)
            .find(|v| !v.is_empty())
            .map(str::to_lowercase)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Directory returned HTTP {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("Malformed response: {0}")]
    Malformed(String),
}

/// Organizational directory queried for group membership.
#[async_trait]
pub trait DirectoryClient: Send + Sync {
    /// Acquire (or reuse) an access token for the directory API.
    async fn get_token(&self) -> Result<String, DirectoryError>;

    /// Groups the user is a direct member of.
    async fn list_member_of(&self, user_email: &str) -> Result<Vec<DirectoryGroup>, DirectoryError>;

    /// Group details by id.
    async fn get_group(&self, group_id: &str) -> Result<DirectoryGroup, DirectoryError>;
}

#[derive(Debug, thiserror::Error)]
pub enum PermissionSourceError {
    #[error("Permission source unavailable: {0}")]
    Unavailable(#[from] DirectoryError),

    #[error("Invalid document reference: {0}")]
    InvalidReference(String),
}

/// Source of raw sharing entries for one drive item.
#[async_trait]
pub trait PermissionSource: Send + Sync {
    async fn get_permissions(
        &self,
        drive_id: &str,
        item_id: &str,
    ) -> Result<Vec<RawPermission>, PermissionSourceError>;
}
