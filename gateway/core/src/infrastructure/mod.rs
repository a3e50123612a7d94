// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod embedding;
pub mod graph_client;
pub mod llm;
pub mod vector_store;

pub use embedding::HashingEmbedder;
pub use graph_client::{GraphClient, GraphCredentials};
pub use vector_store::InMemoryVectorStore;

/// Resolve a configured secret (supports "env:VAR_NAME" syntax).
pub fn resolve_secret(value: &Option<String>) -> anyhow::Result<String> {
    match value {
        Some(v) => match v.strip_prefix("env:") {
            Some(var_name) => std::env::var(var_name)
                .map_err(|_| anyhow::anyhow!("Environment variable not set: {}", var_name)),
            None => Ok(v.clone()),
        },
        None => Ok(String::new()),
    }
}
