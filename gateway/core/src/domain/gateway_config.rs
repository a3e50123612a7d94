// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Gateway Configuration Types
//
// Defines the configuration schema for a DocGate deployment:
// - Kubernetes-style manifest format (apiVersion/kind/metadata/spec)
// - Organization access policy (org domains, dev-mode gate, site groups)
// - Microsoft Graph application credentials
// - Retrieval and indexing tuning
// - LLM provider configuration (BYOLLM) with model aliases
// - Network and observability settings

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use super::access::{
    AccessPolicy, DEFAULT_OPAQUE_GROUP_MIN_LEN, DEFAULT_SITE_GROUPS, DEFAULT_SITE_GROUP_PREFIX,
};

pub const API_VERSION: &str = "100monkeys.ai/v1";
pub const KIND: &str = "GatewayConfig";

/// Top-level Kubernetes-style gateway configuration manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfigManifest {
    /// API version (must be "100monkeys.ai/v1")
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Resource kind (must be "GatewayConfig")
    pub kind: String,

    pub metadata: ManifestMetadata,

    pub spec: GatewayConfigSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestMetadata {
    /// Human-readable deployment name
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,
}

/// Gateway configuration specification (content under spec:)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GatewayConfigSpec {
    #[serde(default)]
    pub access: AccessConfig,

    #[serde(default)]
    pub graph: GraphConfig,

    #[serde(default)]
    pub retrieval: RetrievalConfig,

    #[serde(default)]
    pub indexing: IndexingConfig,

    /// LLM provider configurations
    #[serde(default)]
    pub llm_providers: Vec<LLMProviderConfig>,

    #[serde(default)]
    pub llm_selection: LLMSelection,

    #[serde(default)]
    pub network: NetworkConfig,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub observability: Option<ObservabilityConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessConfig {
    /// Organization email domains. Accepts a YAML list or a comma-separated
    /// string; entries are trimmed and lowercased, empty ones dropped.
    #[serde(default = "default_org_domains", deserialize_with = "deserialize_domains")]
    pub org_domains: Vec<String>,

    /// Deployment-level half of the dev-mode gate. Requests must also send
    /// `X-Dev-Mode: true`.
    #[serde(default)]
    pub dev_mode: bool,

    /// Site-local group names every organization member belongs to
    #[serde(default = "default_site_groups")]
    pub site_groups: Vec<String>,

    /// Naming prefix of site-local groups (never looked up in the directory)
    #[serde(default = "default_site_group_prefix")]
    pub site_group_prefix: String,

    /// Group names longer than this are treated as opaque directory ids
    #[serde(default = "default_opaque_group_min_len")]
    pub opaque_group_min_len: usize,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            org_domains: default_org_domains(),
            dev_mode: false,
            site_groups: default_site_groups(),
            site_group_prefix: default_site_group_prefix(),
            opaque_group_min_len: default_opaque_group_min_len(),
        }
    }
}

impl AccessConfig {
    /// Runtime policy handed to the access decision engine and resolver.
    pub fn to_policy(&self) -> AccessPolicy {
        AccessPolicy::new(&self.org_domains)
            .with_site_groups(self.site_groups.clone())
            .with_site_group_prefix(self.site_group_prefix.clone())
            .with_opaque_group_min_len(self.opaque_group_min_len)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphConfig {
    #[serde(default)]
    pub tenant_id: String,

    #[serde(default)]
    pub client_id: String,

    /// Client secret (supports "env:VAR_NAME" for environment variables)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,

    #[serde(default = "default_graph_base_url")]
    pub base_url: String,

    #[serde(default = "default_authority_url")]
    pub authority_url: String,

    /// Default drive for permission checks that do not name one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub drive_id: Option<String>,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            tenant_id: String::new(),
            client_id: String::new(),
            client_secret: None,
            base_url: default_graph_base_url(),
            authority_url: default_authority_url(),
            drive_id: None,
        }
    }
}

impl GraphConfig {
    /// Whether application credentials are present at all.
    pub fn is_configured(&self) -> bool {
        !self.tenant_id.is_empty() && !self.client_id.is_empty() && self.client_secret.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Candidates fetched per requested result before permission filtering
    #[serde(default = "default_overfetch_factor")]
    pub overfetch_factor: usize,

    /// Results used to ground a chat answer
    #[serde(default = "default_results")]
    pub default_results: usize,

    /// Upper bound on `n` accepted by the search endpoint
    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            overfetch_factor: default_overfetch_factor(),
            default_results: default_results(),
            max_results: default_max_results(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMProviderConfig {
    /// Unique provider name (e.g., "azure-gpt4o", "anthropic")
    pub name: String,

    /// Provider type
    #[serde(rename = "type")]
    pub provider_type: String, // "openai", "azure-openai", "anthropic", "openai-compatible"

    /// API endpoint URL
    pub endpoint: String,

    /// API key (supports "env:VAR_NAME" for environment variables)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Azure OpenAI API version query parameter
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,

    #[serde(default = "default_true")]
    pub enabled: bool,

    pub models: Vec<ModelConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Model alias used by the gateway (e.g., "default", "chat")
    pub alias: String,

    /// Model identifier (or Azure deployment name) for the provider API
    pub model: String,

    #[serde(default)]
    pub capabilities: Vec<String>,

    #[serde(default = "default_context_window")]
    pub context_window: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMSelection {
    /// Alias used for chat answers
    #[serde(default = "default_chat_alias")]
    pub chat_alias: String,

    /// Fallback provider if primary fails
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_provider: Option<String>,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,
}

impl Default for LLMSelection {
    fn default() -> Self {
        Self {
            chat_alias: default_chat_alias(),
            fallback_provider: None,
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Network bind address (e.g. "0.0.0.0" or "127.0.0.1")
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// HTTP API port
    #[serde(default = "default_api_port")]
    pub port: u16,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_api_port(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<MetricsConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (e.g., "info", "debug", "trace")
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format ("json" or "text")
    #[serde(default = "default_log_format")]
    pub format: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_metrics_port")]
    pub port: u16,

    #[serde(default = "default_metrics_path")]
    pub path: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DomainList {
    List(Vec<String>),
    Csv(String),
}

fn deserialize_domains<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let domains = match DomainList::deserialize(deserializer)? {
        DomainList::List(items) => items,
        DomainList::Csv(raw) => raw.split(',').map(str::to_string).collect(),
    };
    Ok(normalize_domain_list(domains))
}

/// Trim, lowercase and drop empty domain entries, keeping first occurrence order.
pub fn normalize_domain_list(domains: impl IntoIterator<Item = String>) -> Vec<String> {
    AccessPolicy::new(domains).org_domains().to_vec()
}

// Default value functions
fn default_true() -> bool {
    true
}

fn default_org_domains() -> Vec<String> {
    vec![
        "microweb.global".to_string(),
        "microwebglobal.onmicrosoft.com".to_string(),
    ]
}

fn default_site_groups() -> Vec<String> {
    DEFAULT_SITE_GROUPS.iter().map(|g| g.to_string()).collect()
}

fn default_site_group_prefix() -> String {
    DEFAULT_SITE_GROUP_PREFIX.to_string()
}

fn default_opaque_group_min_len() -> usize {
    DEFAULT_OPAQUE_GROUP_MIN_LEN
}

fn default_graph_base_url() -> String {
    "https://graph.microsoft.com/v1.0".to_string()
}

fn default_authority_url() -> String {
    "https://login.microsoftonline.com".to_string()
}

fn default_overfetch_factor() -> usize {
    3
}

fn default_results() -> usize {
    10
}

fn default_max_results() -> usize {
    100
}

fn default_chunk_size() -> usize {
    1000
}

fn default_chunk_overlap() -> usize {
    200
}

fn default_context_window() -> u32 {
    128_000
}

fn default_chat_alias() -> String {
    "default".to_string()
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay() -> u64 {
    1000
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_api_port() -> u16 {
    8000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

fn default_metrics_port() -> u16 {
    9090
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

impl Default for GatewayConfigManifest {
    fn default() -> Self {
        let hostname = hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "docgate".to_string());

        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: ManifestMetadata {
                name: hostname,
                version: Some("1.0.0".to_string()),
                labels: None,
            },
            spec: GatewayConfigSpec::default(),
        }
    }
}

impl GatewayConfigManifest {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to YAML file
    pub fn to_yaml_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Discover configuration file using precedence order
    /// 1. DOCGATE_CONFIG_PATH environment variable
    /// 2. ./docgate-config.yaml (working directory)
    /// 3. ~/.docgate/config.yaml (user home)
    /// 4. /etc/docgate/config.yaml (system, Unix) or C:\ProgramData\DocGate\config.yaml (Windows)
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("DOCGATE_CONFIG_PATH") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from("./docgate-config.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".docgate").join("config.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        #[cfg(unix)]
        let system_config = PathBuf::from("/etc/docgate/config.yaml");
        #[cfg(windows)]
        let system_config = PathBuf::from("C:\\ProgramData\\DocGate\\config.yaml");

        if system_config.exists() {
            return Some(system_config);
        }

        None
    }

    /// Load configuration with discovery, fallback to default
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        // Explicit CLI path fails if missing/invalid
        if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            let mut config = Self::from_yaml_file(&path)
                .map_err(|e| anyhow::anyhow!("Failed to load config at {:?}: {}", path, e))?;
            config.apply_env_overrides();
            return Ok(config);
        }

        if let Some(config_path) = Self::discover_config() {
            tracing::info!("Loading configuration from discovered path: {:?}", config_path);
            let mut config = Self::from_yaml_file(config_path)?;
            config.apply_env_overrides();
            Ok(config)
        } else {
            tracing::warn!("No configuration file found in standard locations. Using defaults.");
            let mut config = Self::default();
            config.apply_env_overrides();
            Ok(config)
        }
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("DOCGATE_ORG_DOMAINS") {
            let domains = normalize_domain_list(val.split(',').map(str::to_string));
            tracing::info!("Environment override: DOCGATE_ORG_DOMAINS={}", domains.join(","));
            self.spec.access.org_domains = domains;
        }

        if let Ok(val) = std::env::var("DOCGATE_DEV_MODE") {
            match parse_bool_flag(&val) {
                Some(enabled) => {
                    tracing::info!("Environment override: DOCGATE_DEV_MODE={}", enabled);
                    self.spec.access.dev_mode = enabled;
                }
                None => {
                    tracing::warn!(
                        "Invalid value for DOCGATE_DEV_MODE: '{}'. Expected true/false. Ignoring.",
                        val
                    );
                }
            }
        }

        if let Ok(val) = std::env::var("DOCGATE_PORT") {
            match val.parse::<u16>() {
                Ok(port) => {
                    tracing::info!("Environment override: DOCGATE_PORT={}", port);
                    self.spec.network.port = port;
                }
                Err(_) => {
                    tracing::warn!("Invalid value for DOCGATE_PORT: '{}'. Ignoring.", val);
                }
            }
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_version != API_VERSION {
            anyhow::bail!(
                "Invalid apiVersion: '{}'. Must be '{}'",
                self.api_version,
                API_VERSION
            );
        }

        if self.kind != KIND {
            anyhow::bail!("Invalid kind: '{}'. Must be '{}'", self.kind, KIND);
        }

        if self.metadata.name.is_empty() {
            anyhow::bail!("metadata.name cannot be empty");
        }

        if self.spec.retrieval.overfetch_factor == 0 {
            anyhow::bail!("spec.retrieval.overfetch_factor must be at least 1");
        }

        if self.spec.retrieval.default_results > self.spec.retrieval.max_results {
            anyhow::bail!("spec.retrieval.default_results cannot exceed spec.retrieval.max_results");
        }

        if self.spec.indexing.chunk_size == 0 {
            anyhow::bail!("spec.indexing.chunk_size must be at least 1");
        }

        if self.spec.indexing.chunk_overlap >= self.spec.indexing.chunk_size {
            anyhow::bail!(
                "spec.indexing.chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.spec.indexing.chunk_overlap,
                self.spec.indexing.chunk_size
            );
        }

        for provider in &self.spec.llm_providers {
            if provider.name.is_empty() {
                anyhow::bail!("LLM provider name cannot be empty");
            }

            if provider.endpoint.is_empty() {
                anyhow::bail!("LLM provider endpoint cannot be empty for: {}", provider.name);
            }

            if provider.models.is_empty() {
                anyhow::bail!("LLM provider must have at least one model: {}", provider.name);
            }

            for model in &provider.models {
                if model.alias.is_empty() {
                    anyhow::bail!("Model alias cannot be empty in provider: {}", provider.name);
                }

                if model.model.is_empty() {
                    anyhow::bail!("Model identifier cannot be empty for alias: {}", model.alias);
                }
            }
        }

        if let Some(fallback_provider) = &self.spec.llm_selection.fallback_provider {
            if !self.spec.llm_providers.iter().any(|p| &p.name == fallback_provider) {
                anyhow::bail!("Fallback provider '{}' not found in llm_providers", fallback_provider);
            }
        }

        Ok(())
    }
}

/// Accepts true/false, 1/0, yes/no, on/off (case-insensitive).
pub fn parse_bool_flag(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
