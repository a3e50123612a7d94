// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Graph Client
//!
//! Microsoft Graph REST client for directory lookups and drive item permissions.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure Layer
//! - **Purpose:** Microsoft Graph adapter implementing both
//!   [`DirectoryClient`] and [`PermissionSource`] over one `reqwest` client.
//!   App-only token via the OAuth2 client-credentials flow, cached until
//!   shortly before expiry.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::domain::directory::{
    DirectoryClient, DirectoryError, DirectoryGroup, PermissionSource, PermissionSourceError,
};
use crate::domain::gateway_config::GraphConfig;
use crate::domain::graph_permission::RawPermission;

pub const GRAPH_SCOPE: &str = "https://graph.microsoft.com/.default";
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);
const MAX_PAGES: usize = 50;
const MAX_TOKEN_LIFETIME: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone)]
pub struct GraphCredentials {
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: String,
    pub base_url: String,
    pub authority_url: String,
}

impl GraphCredentials {
    /// Build from configuration, resolving `env:VAR` secrets.
    pub fn from_config(config: &GraphConfig) -> anyhow::Result<Self> {
        if config.tenant_id.is_empty() || config.client_id.is_empty() {
            anyhow::bail!("spec.graph.tenant_id and spec.graph.client_id are required");
        }
        let client_secret = super::resolve_secret(&config.client_secret)?;
        if client_secret.is_empty() {
            anyhow::bail!("spec.graph.client_secret is required");
        }
        Ok(Self {
            tenant_id: config.tenant_id.clone(),
            client_id: config.client_id.clone(),
            client_secret,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            authority_url: config.authority_url.trim_end_matches('/').to_string(),
        })
    }
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

#[derive(Deserialize)]
#[serde(bound(deserialize = "T: DeserializeOwned"))]
struct Page<T> {
    #[serde(default)]
    value: Vec<T>,
    #[serde(rename = "@odata.nextLink", default)]
    next_link: Option<String>,
}

pub struct GraphClient {
    http: reqwest::Client,
    credentials: GraphCredentials,
    token: Mutex<Option<CachedToken>>,
}

impl GraphClient {
    pub fn new(credentials: GraphCredentials) -> Self {
        Self {
            http: reqwest::Client::new(),
            credentials,
            token: Mutex::new(None),
        }
    }

    fn token_url(&self) -> String {
        format!(
            "{}/{}/oauth2/v2.0/token",
            self.credentials.authority_url, self.credentials.tenant_id
        )
    }

    /// `base_url` extended with `segments`, each percent-encoded as a single path segment.
    fn resource_url(&self, segments: &[&str]) -> Result<String, DirectoryError> {
        let mut url = reqwest::Url::parse(&self.credentials.base_url)
            .map_err(|e| DirectoryError::Malformed(format!("Invalid Graph base URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| DirectoryError::Malformed("Graph base URL cannot carry a path".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url.into())
    }

    fn cached_token(&self) -> Option<String> {
        let guard = self.token.lock();
        guard
            .as_ref()
            .filter(|t| Instant::now() + TOKEN_REFRESH_MARGIN < t.expires_at)
            .map(|t| t.access_token.clone())
    }

    async fn request_token(&self) -> Result<CachedToken, DirectoryError> {
        let params = [
            ("grant_type", "client_credentials"),
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
            ("scope", GRAPH_SCOPE),
        ];

        let response = self
            .http
            .post(self.token_url())
            .form(&params)
            .send()
            .await
            .map_err(|e| DirectoryError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(DirectoryError::Authentication(format!("HTTP {}: {}", status, body)));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| DirectoryError::Malformed(format!("Invalid token response: {}", e)))?;

        info!(expires_in = token.expires_in, "Acquired Graph access token");
        let now = Instant::now();
        let lifetime = Duration::from_secs(token.expires_in).min(MAX_TOKEN_LIFETIME);
        Ok(CachedToken {
            access_token: token.access_token,
            expires_at: now.checked_add(lifetime).unwrap_or(now),
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, DirectoryError> {
        let token = self.get_token().await?;
        debug!(url, "Graph GET");

        let response = self
            .http
            .get(url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| DirectoryError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(match status.as_u16() {
                401 | 403 => DirectoryError::Authentication(body),
                404 => DirectoryError::NotFound(url.to_string()),
                code => DirectoryError::Upstream { status: code, body },
            });
        }

        response
            .json()
            .await
            .map_err(|e| DirectoryError::Malformed(e.to_string()))
    }

    /// Follow `@odata.nextLink` until exhausted.
    async fn get_paged<T: DeserializeOwned>(&self, url: String) -> Result<Vec<T>, DirectoryError> {
        let mut items = Vec::new();
        let mut next = Some(url);
        let mut pages = 0;

        while let Some(url) = next.take() {
            let page: Page<T> = self.get_json(&url).await?;
            items.extend(page.value);
            pages += 1;
            if pages >= MAX_PAGES {
                break;
            }
            next = page.next_link;
        }

        Ok(items)
    }
}

#[async_trait]
impl DirectoryClient for GraphClient {
    async fn get_token(&self) -> Result<String, DirectoryError> {
        if let Some(token) = self.cached_token() {
            return Ok(token);
        }

        let token = self.request_token().await?;
        let access_token = token.access_token.clone();
        *self.token.lock() = Some(token);
        Ok(access_token)
    }

    async fn list_member_of(&self, user_email: &str) -> Result<Vec<DirectoryGroup>, DirectoryError> {
        let url = self.resource_url(&["users", user_email.trim(), "memberOf"])?;
        self.get_paged(url).await
    }

    async fn get_group(&self, group_id: &str) -> Result<DirectoryGroup, DirectoryError> {
        let url = self.resource_url(&["groups", group_id])?;
        self.get_json(&url).await
    }
}

#[async_trait]
impl PermissionSource for GraphClient {
    async fn get_permissions(
        &self,
        drive_id: &str,
        item_id: &str,
    ) -> Result<Vec<RawPermission>, PermissionSourceError> {
        if drive_id.trim().is_empty() || item_id.trim().is_empty() {
            return Err(PermissionSourceError::InvalidReference(format!(
                "drive '{}' item '{}'",
                drive_id, item_id
            )));
        }

        let url = self.resource_url(&["drives", drive_id, "items", item_id, "permissions"])?;
        Ok(self.get_paged(url).await?)
    }
}
