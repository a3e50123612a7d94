// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use axum::{
    extract::{FromRequestParts, State},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use super::auth::{user_from_headers, AuthError};
use crate::application::{
    AccessDecisionEngine, ChatService, FilteredRetrievalService, MembershipScope, PermissionAggregator,
    SourceReference,
};
use crate::domain::directory::PermissionSource;
use crate::domain::document::SearchHit;
use crate::domain::user::UserContext;

pub struct AppState {
    /// Absent when no LLM provider is configured
    pub chat: Option<Arc<ChatService>>,
    pub retrieval: Arc<FilteredRetrievalService>,
    pub engine: Arc<AccessDecisionEngine>,
    pub aggregator: Arc<PermissionAggregator>,
    pub permission_source: Option<Arc<dyn PermissionSource>>,
    pub default_drive_id: Option<String>,
    pub default_results: usize,
    /// Largest `n` accepted by `/api/search`
    pub max_results: usize,
    /// Deployment half of the dev mode gate
    pub dev_mode_allowed: bool,
}

pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/auth/me", get(current_user))
        .route("/api/chat", post(chat))
        .route("/api/search", post(search))
        .route("/api/permissions/check", post(check_permission))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// The authenticated caller of a request.
pub struct CurrentUser(pub UserContext);

impl FromRequestParts<Arc<AppState>> for CurrentUser {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        user_from_headers(&parts.headers, state.dev_mode_allowed).map(CurrentUser)
    }
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn current_user(CurrentUser(user): CurrentUser) -> impl IntoResponse {
    Json(json!({
        "email": user.email,
        "name": user.name,
        "authenticated": true,
        "dev_mode": user.dev_mode,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub thread_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub thread_id: String,
    pub response: String,
    pub sources: Vec<SourceReference>,
}

async fn chat(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Json(payload): Json<ChatRequest>,
) -> Response {
    if payload.message.trim().is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "Message cannot be empty");
    }

    let Some(chat) = state.chat.as_ref() else {
        return error_response(StatusCode::SERVICE_UNAVAILABLE, "No language model configured");
    };

    match chat.answer(&payload.message, &user, payload.thread_id).await {
        Ok(answer) => Json(ChatResponse {
            thread_id: answer.thread_id,
            response: answer.content,
            sources: answer.sources,
        })
        .into_response(),
        Err(e) => {
            warn!(user = %user.email, error = %e, "Chat request failed");
            error_response(StatusCode::BAD_GATEWAY, format!("Failed to generate response: {}", e))
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default)]
    pub n: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<SearchHit>,
}

async fn search(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Json(payload): Json<SearchRequest>,
) -> Response {
    if payload.query.trim().is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "Query cannot be empty");
    }

    let n = payload.n.unwrap_or(state.default_results);
    if n > state.max_results {
        return error_response(
            StatusCode::BAD_REQUEST,
            format!("n cannot exceed {}", state.max_results),
        );
    }

    let results = state
        .retrieval
        .search(
            &payload.query,
            n,
            Some(&user.email),
            user.dev_mode,
        )
        .await;

    Json(SearchResponse { results }).into_response()
}

#[derive(Debug, Deserialize)]
pub struct PermissionCheckRequest {
    pub user_email: String,
    pub document_id: String,
    #[serde(default)]
    pub drive_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PermissionCheckResponse {
    pub has_access: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl PermissionCheckResponse {
    fn denied(reason: impl Into<String>) -> Self {
        Self {
            has_access: false,
            reason: Some(reason.into()),
        }
    }
}

async fn check_permission(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Json(payload): Json<PermissionCheckRequest>,
) -> Response {
    let target = payload.user_email.trim().to_lowercase();
    if !user.dev_mode && target != user.email {
        return error_response(
            StatusCode::FORBIDDEN,
            "You can only check permissions for your own account",
        );
    }

    let drive_id = payload
        .drive_id
        .filter(|d| !d.trim().is_empty())
        .or_else(|| state.default_drive_id.clone());

    let (Some(source), Some(drive_id)) = (state.permission_source.as_ref(), drive_id) else {
        return Json(PermissionCheckResponse::denied("Permission source not configured")).into_response();
    };

    let record = state
        .aggregator
        .fetch_document_permissions(source.as_ref(), &drive_id, &payload.document_id)
        .await;
    if let Some(error) = record.error() {
        return Json(PermissionCheckResponse::denied(format!("Error checking permissions: {}", error)))
            .into_response();
    }

    let metadata = match serde_json::to_value(record.to_fields()) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    };

    // Evaluated for the target user as stored, never with the dev bypass.
    let mut scope = MembershipScope::new();
    let decision = state.engine.decide(&metadata, &target, false, &mut scope).await;
    info!(
        caller = %user.email,
        target = %target,
        document_id = %payload.document_id,
        outcome = decision.outcome(),
        "Permission check"
    );

    Json(PermissionCheckResponse {
        has_access: decision.is_allowed(),
        reason: Some(decision.reason().to_string()),
    })
    .into_response()
}
