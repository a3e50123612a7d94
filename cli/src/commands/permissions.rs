// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Offline permission inspection
//!
//! Commands: aggregate, check

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use docgate_core::application::{AccessDecisionEngine, MembershipScope, PermissionAggregator};
use docgate_core::domain::directory::DirectoryClient;
use docgate_core::domain::gateway_config::GatewayConfigManifest;
use docgate_core::domain::graph_permission::{PermissionListing, RawPermission};
use docgate_core::infrastructure::{GraphClient, GraphCredentials};

#[derive(Subcommand)]
pub enum PermissionsCommand {
    /// Aggregate a Graph permissions response into a permission record
    Aggregate {
        /// JSON file: `{"value": [...]}` or a bare array of permission entries
        #[arg(short, long, value_name = "FILE")]
        file: PathBuf,
    },

    /// Evaluate access to stored chunk metadata for a user
    Check {
        /// JSON file holding chunk metadata (or a chunk with a `metadata` field)
        #[arg(short, long, value_name = "FILE")]
        metadata: PathBuf,

        /// User email to evaluate
        #[arg(short, long)]
        user: String,

        /// Evaluate with the dev mode bypass
        #[arg(long)]
        dev: bool,
    },
}

pub async fn handle_command(command: PermissionsCommand, config_override: Option<PathBuf>) -> Result<()> {
    match command {
        PermissionsCommand::Aggregate { file } => aggregate(&file).await,
        PermissionsCommand::Check { metadata, user, dev } => {
            check(config_override, &metadata, &user, dev).await
        }
    }
}

fn read_json(path: &Path) -> Result<Value> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;
    serde_json::from_str(&content).with_context(|| format!("Invalid JSON in {:?}", path))
}

/// Permission entries from a Graph listing object or a bare array.
pub fn parse_permission_entries(value: Value) -> Result<Vec<RawPermission>> {
    match value {
        Value::Array(_) => serde_json::from_value(value).context("Invalid permission entries"),
        Value::Object(_) => {
            let listing: PermissionListing =
                serde_json::from_value(value).context("Invalid permissions listing")?;
            Ok(listing.value)
        }
        _ => anyhow::bail!("Expected a permissions listing object or an array of entries"),
    }
}

/// Chunk metadata, unwrapping a whole chunk when given one.
pub fn parse_chunk_metadata(value: Value) -> Result<Map<String, Value>> {
    match value {
        Value::Object(mut map) => match map.remove("metadata") {
            Some(Value::Object(metadata)) => Ok(metadata),
            Some(other) => {
                map.insert("metadata".to_string(), other);
                Ok(map)
            }
            None => Ok(map),
        },
        _ => anyhow::bail!("Expected a JSON object with chunk metadata"),
    }
}

async fn aggregate(file: &Path) -> Result<()> {
    let entries = parse_permission_entries(read_json(file)?)?;

    // Group ids are not resolved offline.
    let record = PermissionAggregator::new(None).aggregate(&entries).await;

    println!(
        "{}",
        serde_json::to_string_pretty(&record).context("Failed to render permission record")?
    );
    Ok(())
}

async fn check(config_override: Option<PathBuf>, metadata: &Path, user: &str, dev: bool) -> Result<()> {
    let config = GatewayConfigManifest::load_or_default(config_override)
        .context("Failed to load configuration")?;
    let metadata = parse_chunk_metadata(read_json(metadata)?)?;

    let directory: Option<Arc<dyn DirectoryClient>> = if config.spec.graph.is_configured() {
        let credentials = GraphCredentials::from_config(&config.spec.graph)
            .context("Failed to load Graph credentials")?;
        Some(Arc::new(GraphClient::new(credentials)))
    } else {
        None
    };

    let engine = AccessDecisionEngine::new(Arc::new(config.spec.access.to_policy()), directory);
    let mut scope = MembershipScope::new();
    let decision = engine.decide(&metadata, user, dev, &mut scope).await;

    let outcome = if decision.is_allowed() {
        "ALLOW".green().bold()
    } else {
        "DENY".red().bold()
    };
    println!("{} {} ({})", outcome, user, decision.reason());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_listing_and_bare_array() {
        let listing = json!({"value": [{"link": {"scope": "anonymous"}}], "@odata.context": "x"});
        let bare = json!([{"link": {"scope": "anonymous"}}, {"roles": ["read"]}]);

        assert_eq!(parse_permission_entries(listing).unwrap().len(), 1);
        assert_eq!(parse_permission_entries(bare).unwrap().len(), 2);
        assert!(parse_permission_entries(json!("nope")).is_err());
    }

    #[test]
    fn test_parse_chunk_metadata() {
        let chunk = json!({
            "id": "c1",
            "text": "hello",
            "metadata": {"access_level": "organization"}
        });
        let metadata = parse_chunk_metadata(chunk).unwrap();
        assert_eq!(metadata.get("access_level"), Some(&json!("organization")));
        assert!(!metadata.contains_key("text"));

        let flat = parse_chunk_metadata(json!({"authorized_users": ["a@b.com"]})).unwrap();
        assert!(flat.contains_key("authorized_users"));

        assert!(parse_chunk_metadata(json!([1, 2])).is_err());
    }

    #[tokio::test]
    async fn test_aggregate_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("permissions.json");
        std::fs::write(&path, r#"{"value": [{"grantedToV2": {"user": {"email": "a@acme.com"}}}]}"#).unwrap();

        aggregate(&path).await.unwrap();
    }
}
