// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Auth
//!
//! Provides request identity extraction for the HTTP API.
//!
//! # Architecture
//!
//! - **Layer:** Presentation Layer
//! - **Purpose:** Turns SharePoint context headers, development headers or a
//!   bearer token into a [`UserContext`]. Tokens are issued and verified by
//!   the SharePoint host; only their claims are read here.

use axum::http::{header::AUTHORIZATION, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, warn};

use crate::domain::user::{UserContext, DEV_USER_EMAIL};

pub const DEV_MODE_HEADER: &str = "x-dev-mode";
pub const USER_EMAIL_HEADER: &str = "x-user-email";
pub const USER_NAME_HEADER: &str = "x-user-name";
pub const SHAREPOINT_USER_HEADER: &str = "x-sharepoint-user";
pub const SHAREPOINT_DISPLAY_NAME_HEADER: &str = "x-sharepoint-displayname";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("Invalid dev mode email format")]
    InvalidDevEmail,

    #[error("Invalid authentication token: {0}")]
    InvalidToken(String),

    #[error("Authentication required. No valid SharePoint context or token found.")]
    MissingIdentity,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        (StatusCode::UNAUTHORIZED, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
struct IdentityClaims {
    email: Option<String>,
    upn: Option<String>,
    unique_name: Option<String>,
    preferred_username: Option<String>,
    name: Option<String>,
    given_name: Option<String>,
    family_name: Option<String>,
    exp: Option<i64>,
}

impl IdentityClaims {
    fn email(&self) -> Option<&str> {
        [&self.email, &self.upn, &self.unique_name, &self.preferred_username]
            .into_iter()
            .find_map(|claim| non_blank(claim.as_deref()))
    }

    fn name(&self) -> Option<&str> {
        [&self.name, &self.given_name, &self.family_name]
            .into_iter()
            .find_map(|claim| non_blank(claim.as_deref()))
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    non_blank(headers.get(name).and_then(|v| v.to_str().ok()))
}

/// Read the identity claims of a bearer token. The signature is not checked;
/// an expired `exp` is rejected.
fn decode_claims(token: &str) -> Result<IdentityClaims, AuthError> {
    let claims = jsonwebtoken::dangerous::insecure_decode::<IdentityClaims>(token)
        .map_err(|e| AuthError::InvalidToken(e.to_string()))?
        .claims;

    match claims.exp {
        Some(exp) if exp < chrono::Utc::now().timestamp() => {
            Err(AuthError::InvalidToken("token has expired".to_string()))
        }
        _ => Ok(claims),
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    header(headers, AUTHORIZATION.as_str())
        .and_then(|value| value.strip_prefix("Bearer ").or_else(|| value.strip_prefix("bearer ")))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Resolve the caller of a request.
///
/// Dev mode applies only when the deployment allows it and the request asks
/// for it with `X-Dev-Mode: true`.
pub fn user_from_headers(headers: &HeaderMap, dev_mode_allowed: bool) -> Result<UserContext, AuthError> {
    let dev_requested = header(headers, DEV_MODE_HEADER)
        .map(|v| v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);

    if dev_mode_allowed && dev_requested {
        let email = header(headers, USER_EMAIL_HEADER).unwrap_or(DEV_USER_EMAIL);
        if !email.contains('@') {
            warn!(email, "Rejected dev mode request with invalid email");
            return Err(AuthError::InvalidDevEmail);
        }
        let name = header(headers, USER_NAME_HEADER).unwrap_or("Developer");
        debug!(email, "Dev mode authentication");
        return Ok(UserContext::new(email, Some(name), true));
    }

    let mut email = header(headers, SHAREPOINT_USER_HEADER)
        .map(|claim| claim.rsplit('|').next().unwrap_or(claim).to_string())
        .filter(|e| !e.trim().is_empty())
        .or_else(|| header(headers, USER_EMAIL_HEADER).map(str::to_string));

    let mut name = header(headers, USER_NAME_HEADER)
        .or_else(|| header(headers, SHAREPOINT_DISPLAY_NAME_HEADER))
        .map(str::to_string);

    if email.is_none() {
        if let Some(token) = bearer_token(headers) {
            let claims = decode_claims(token).map_err(|e| {
                warn!(error = %e, "Bearer token rejected");
                e
            })?;
            email = claims.email().map(str::to_string);
            if let Some(claimed) = claims.name() {
                name = Some(claimed.to_string());
            }
        }
    }

    match email {
        Some(email) => Ok(UserContext::new(&email, name.as_deref(), false)),
        None => Err(AuthError::MissingIdentity),
    }
}
