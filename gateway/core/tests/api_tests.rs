// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! HTTP API tests, driving the axum router with `tower::ServiceExt::oneshot`.

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use docgate_core::application::{
    AccessDecisionEngine, ChatService, FilteredRetrievalService, PermissionAggregator,
};
use docgate_core::domain::access::AccessPolicy;
use docgate_core::domain::directory::{DirectoryError, PermissionSource, PermissionSourceError};
use docgate_core::domain::document::{DocumentChunk, VectorStore};
use docgate_core::domain::graph_permission::RawPermission;
use docgate_core::domain::llm::{
    ChatPrompt, FinishReason, GenerationOptions, GenerationResponse, LLMError, LLMProvider, TokenUsage,
};
use docgate_core::infrastructure::InMemoryVectorStore;
use docgate_core::presentation::api::{app, AppState};
use http_body_util::BodyExt;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tower::ServiceExt;

const ANSWER: &str = "According to the Handbook, employees get 25 vacation days.\n\n\
## Sources Used\n\
- Handbook.docx (URL: https://org.sharepoint.com/Handbook.docx, ID: handbook)\n\
- Salaries.xlsx (URL: https://org.sharepoint.com/Salaries.xlsx, ID: salaries)\n";

struct ScriptedLlm;

#[async_trait]
impl LLMProvider for ScriptedLlm {
    async fn generate(
        &self,
        _prompt: &ChatPrompt,
        _options: &GenerationOptions,
    ) -> Result<GenerationResponse, LLMError> {
        Ok(GenerationResponse {
            text: ANSWER.to_string(),
            usage: TokenUsage::default(),
            provider: "scripted".to_string(),
            model: "scripted".to_string(),
            finish_reason: FinishReason::Stop,
        })
    }

    async fn health_check(&self) -> Result<(), LLMError> {
        Ok(())
    }
}

/// Every item is shared with the organization, except `broken`.
struct OrgSharedSource;

#[async_trait]
impl PermissionSource for OrgSharedSource {
    async fn get_permissions(
        &self,
        _drive_id: &str,
        item_id: &str,
    ) -> Result<Vec<RawPermission>, PermissionSourceError> {
        if item_id == "broken" {
            return Err(DirectoryError::Network("timed out".to_string()).into());
        }
        Ok(serde_json::from_value(json!([{"link": {"type": "view", "scope": "organization"}}])).unwrap())
    }
}

fn chunk(document_id: &str, name: &str, text: &str, permissions: Value) -> DocumentChunk {
    let mut metadata: Map<String, Value> = permissions.as_object().cloned().unwrap_or_default();
    metadata.insert("documentId".to_string(), json!(document_id));
    metadata.insert("documentName".to_string(), json!(name));
    metadata.insert(
        "webUrl".to_string(),
        json!(format!("https://org.sharepoint.com/{name}")),
    );
    DocumentChunk::new(document_id, text, metadata)
}

async fn router(with_source: bool) -> Router {
    let store = Arc::new(InMemoryVectorStore::new());
    store
        .add_chunks(vec![
            chunk(
                "handbook",
                "Handbook.docx",
                "Employees get 25 vacation days per year.",
                json!({"access_level": "organization", "authorized_users": [], "authorized_groups": []}),
            ),
            chunk(
                "salaries",
                "Salaries.xlsx",
                "Vacation payout rules and salary bands.",
                json!({"access_level": "restricted", "authorized_users": ["hr@org.com"]}),
            ),
        ])
        .await
        .unwrap();

    let policy = Arc::new(AccessPolicy::new(["org.com"]));
    let engine = Arc::new(AccessDecisionEngine::new(policy.clone(), None));
    let retrieval = Arc::new(FilteredRetrievalService::new(store, engine.clone()));
    let chat = Arc::new(ChatService::new(retrieval.clone(), Arc::new(ScriptedLlm), 10));
    let permission_source: Option<Arc<dyn PermissionSource>> = if with_source {
        Some(Arc::new(OrgSharedSource))
    } else {
        None
    };

    app(Arc::new(AppState {
        chat: Some(chat),
        retrieval,
        engine,
        aggregator: Arc::new(PermissionAggregator::new(None)),
        permission_source,
        default_drive_id: Some("drive-1".to_string()),
        default_results: 10,
        max_results: 50,
        dev_mode_allowed: false,
    }))
}

fn post(uri: &str, user: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .header("x-user-email", user)
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health() {
    let response = router(false)
        .await
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["status"], "healthy");
}

#[tokio::test]
async fn test_auth_me_requires_identity() {
    let app = router(false).await;

    let anonymous = app
        .clone()
        .oneshot(Request::builder().uri("/api/auth/me").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);

    // The deployment does not allow dev mode, so the header is ignored.
    let identified = app
        .oneshot(
            Request::builder()
                .uri("/api/auth/me")
                .header("x-user-email", "Alice@Org.com")
                .header("x-dev-mode", "true")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(identified.status(), StatusCode::OK);
    let body = json_body(identified).await;
    assert_eq!(body["email"], "alice@org.com");
    assert_eq!(body["dev_mode"], false);
}

#[tokio::test]
async fn test_chat_rejects_empty_message() {
    let response = router(false)
        .await
        .oneshot(post("/api/chat", "alice@org.com", json!({"message": "   "})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_chat_only_cites_permitted_documents() {
    let response = router(false)
        .await
        .oneshot(post("/api/chat", "alice@org.com", json!({"message": "How many vacation days?"})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert!(body["threadId"].as_str().is_some_and(|id| !id.is_empty()));
    assert!(!body["response"].as_str().unwrap().contains("## Sources Used"));

    let sources = body["sources"].as_array().unwrap();
    assert_eq!(sources.len(), 1);
    assert_eq!(sources[0]["id"], "handbook");
}

#[tokio::test]
async fn test_search_hides_acl_fields() {
    let response = router(false)
        .await
        .oneshot(post("/api/search", "hr@org.com", json!({"query": "vacation", "n": 5})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 2);
    for hit in results {
        assert!(hit["metadata"].get("authorized_users").is_none());
        assert!(hit["metadata"].get("access_level").is_some());
    }
}

#[tokio::test]
async fn test_search_rejects_result_count_above_limit() {
    let response = router(false)
        .await
        .oneshot(post("/api/search", "hr@org.com", json!({"query": "vacation", "n": 1u64 << 40})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["error"], "n cannot exceed 50");
}

#[tokio::test]
async fn test_search_accepts_result_count_at_limit() {
    let response = router(false)
        .await
        .oneshot(post("/api/search", "hr@org.com", json!({"query": "vacation", "n": 50})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["results"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_permission_check_for_another_user_is_forbidden() {
    let response = router(true)
        .await
        .oneshot(post(
            "/api/permissions/check",
            "alice@org.com",
            json!({"user_email": "bob@org.com", "document_id": "handbook"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_permission_check_own_account() {
    let app = router(true).await;

    let allowed = app
        .clone()
        .oneshot(post(
            "/api/permissions/check",
            "alice@org.com",
            json!({"user_email": "ALICE@org.com", "document_id": "handbook"}),
        ))
        .await
        .unwrap();
    assert_eq!(allowed.status(), StatusCode::OK);
    let body = json_body(allowed).await;
    assert_eq!(body["has_access"], true);
    assert_eq!(body["reason"], "organization_domain");

    let failing = app
        .oneshot(post(
            "/api/permissions/check",
            "alice@org.com",
            json!({"user_email": "alice@org.com", "document_id": "broken"}),
        ))
        .await
        .unwrap();
    let body = json_body(failing).await;
    assert_eq!(body["has_access"], false);
    assert!(body["reason"].as_str().unwrap().starts_with("Error checking permissions"));
}

#[tokio::test]
async fn test_permission_check_without_source() {
    let response = router(false)
        .await
        .oneshot(post(
            "/api/permissions/check",
            "alice@org.com",
            json!({"user_email": "alice@org.com", "document_id": "handbook"}),
        ))
        .await
        .unwrap();

    let body = json_body(response).await;
    assert_eq!(body["has_access"], false);
}
