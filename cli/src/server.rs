// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! HTTP server bootstrap
//!
//! Wires configuration into the permission core services and serves the
//! axum router until Ctrl+C or SIGTERM.

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{info, warn};

use docgate_core::application::{
    AccessDecisionEngine, ChatService, DocumentIndexingService, FilteredRetrievalService,
    PermissionAggregator,
};
use docgate_core::domain::directory::{DirectoryClient, PermissionSource};
use docgate_core::domain::document::SourceDocument;
use docgate_core::domain::gateway_config::{GatewayConfigManifest, MetricsConfig};
use docgate_core::infrastructure::llm::ProviderRegistry;
use docgate_core::infrastructure::{GraphClient, GraphCredentials, InMemoryVectorStore};
use docgate_core::presentation::api::{app, AppState};

/// Initialize tracing subscriber for logging
pub fn init_logging(level: &str, json: bool) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    if json {
        builder.json().init();
    } else {
        builder.compact().init();
    }

    Ok(())
}

fn install_metrics_exporter(metrics: &MetricsConfig) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], metrics.port));
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .context("Failed to install Prometheus exporter")?;
    info!("Prometheus metrics exposed on {}", addr);
    Ok(())
}

/// Read a JSON array of documents to index at startup.
pub fn load_documents(path: &Path) -> Result<Vec<SourceDocument>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read documents from {:?}", path))?;
    serde_json::from_str(&content).with_context(|| format!("Invalid documents file {:?}", path))
}

pub async fn start_server(
    config_path: Option<PathBuf>,
    host: Option<String>,
    port: Option<u16>,
    documents: Option<PathBuf>,
) -> Result<()> {
    let config = GatewayConfigManifest::load_or_default(config_path)
        .context("Failed to load configuration")?;
    config.validate().context("Configuration validation failed")?;
    let spec = &config.spec;

    info!("Configuration loaded: name={}", config.metadata.name);

    if let Some(metrics) = spec.observability.as_ref().and_then(|o| o.metrics.as_ref()) {
        if metrics.enabled {
            install_metrics_exporter(metrics)?;
        }
    }

    let graph = if spec.graph.is_configured() {
        let credentials =
            GraphCredentials::from_config(&spec.graph).context("Failed to load Graph credentials")?;
        Some(Arc::new(GraphClient::new(credentials)))
    } else {
        warn!("Graph credentials not configured - group lookups and permission fetches disabled");
        None
    };
    let directory = graph.clone().map(|g| g as Arc<dyn DirectoryClient>);
    let permission_source = graph.map(|g| g as Arc<dyn PermissionSource>);

    if spec.access.dev_mode {
        warn!("Dev mode is allowed for this deployment - requests may bypass permission checks");
    }

    let policy = Arc::new(spec.access.to_policy());
    info!("Organization domains: {}", policy.org_domains().join(", "));

    let store = Arc::new(InMemoryVectorStore::new());
    let aggregator = Arc::new(PermissionAggregator::new(directory.clone()));
    let engine = Arc::new(AccessDecisionEngine::new(policy, directory));
    let retrieval = Arc::new(
        FilteredRetrievalService::new(store.clone(), engine.clone())
            .with_overfetch_factor(spec.retrieval.overfetch_factor),
    );

    if let Some(path) = documents {
        let indexing = DocumentIndexingService::new(store, aggregator.clone(), permission_source.clone())
            .with_chunking(spec.indexing.chunk_size, spec.indexing.chunk_overlap);
        for document in load_documents(&path)? {
            let report = indexing.reindex_document(&document).await?;
            info!(
                "Indexed {} ({} chunks, {})",
                report.document_id, report.chunks_indexed, report.access_level
            );
        }
    }

    let registry = Arc::new(
        ProviderRegistry::from_config(spec).context("Failed to initialize LLM providers")?,
    );
    let chat_alias = &spec.llm_selection.chat_alias;
    let chat = if registry.has_alias(chat_alias) {
        Some(Arc::new(ChatService::new(
            retrieval.clone(),
            registry.alias_handle(chat_alias),
            spec.retrieval.default_results,
        )))
    } else {
        warn!("Model alias '{}' not configured - /api/chat disabled", chat_alias);
        None
    };

    let state = Arc::new(AppState {
        chat,
        retrieval,
        engine,
        aggregator,
        permission_source,
        default_drive_id: spec.graph.drive_id.clone(),
        default_results: spec.retrieval.default_results,
        max_results: spec.retrieval.max_results,
        dev_mode_allowed: spec.access.dev_mode,
    });

    let addr = format!(
        "{}:{}",
        host.unwrap_or_else(|| spec.network.bind_address.clone()),
        port.unwrap_or(spec.network.port)
    );
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("DocGate listening on {}", addr);

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("DocGate shutting down");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_documents() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"id": "d1", "name": "Handbook.docx", "webUrl": "https://x/h", "driveId": "b!1", "content": "text"}}]"#
        )
        .unwrap();

        let documents = load_documents(file.path()).unwrap();
        assert_eq!(documents.len(), 1);
        assert_eq!(documents[0].drive_id.as_deref(), Some("b!1"));
    }

    #[test]
    fn test_load_documents_rejects_invalid_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(load_documents(file.path()).is_err());
    }
}
