// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// LLM Provider Registry - Model Alias Resolution and Provider Management
//
// Resolves model aliases to configured providers, with retries (exponential
// backoff) and an optional fallback provider.

use crate::domain::gateway_config::{GatewayConfigSpec, LLMProviderConfig, ModelConfig};
use crate::domain::llm::{ChatPrompt, GenerationOptions, GenerationResponse, LLMError, LLMProvider};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

use super::anthropic::AnthropicAdapter;
use super::openai::OpenAIAdapter;
use crate::infrastructure::resolve_secret;

const DEFAULT_AZURE_API_VERSION: &str = "2024-06-01";

/// Registry for managing LLM providers and resolving model aliases
pub struct ProviderRegistry {
    /// provider name -> alias -> adapter bound to that alias' model
    providers: HashMap<String, HashMap<String, Arc<dyn LLMProvider>>>,
    /// alias -> (provider_name, model_config)
    alias_map: HashMap<String, (String, ModelConfig)>,
    fallback_provider: Option<String>,
    max_retries: u32,
    retry_delay_ms: u64,
}

impl ProviderRegistry {
    /// Create provider registry from gateway configuration
    pub fn from_config(spec: &GatewayConfigSpec) -> anyhow::Result<Self> {
        let mut providers = HashMap::new();
        let mut alias_map = HashMap::new();

        info!("Initializing LLM provider registry");

        for provider_config in &spec.llm_providers {
            if !provider_config.enabled {
                info!("Provider '{}' disabled, skipping", provider_config.name);
                continue;
            }

            let mut adapters = HashMap::new();
            for model_config in &provider_config.models {
                match Self::create_provider(provider_config, model_config) {
                    Ok(adapter) => {
                        info!(
                            "Mapping alias '{}' -> {} ({})",
                            model_config.alias, model_config.model, provider_config.name
                        );
                        adapters.insert(model_config.alias.clone(), adapter);
                        alias_map.insert(
                            model_config.alias.clone(),
                            (provider_config.name.clone(), model_config.clone()),
                        );
                    }
                    Err(e) => {
                        warn!(
                            "Failed to initialize provider '{}' for alias '{}': {}",
                            provider_config.name, model_config.alias, e
                        );
                    }
                }
            }

            if !adapters.is_empty() {
                providers.insert(provider_config.name.clone(), adapters);
            }
        }

        if providers.is_empty() {
            warn!("No LLM providers configured - chat answers will not be available");
        }

        Ok(Self {
            providers,
            alias_map,
            fallback_provider: spec.llm_selection.fallback_provider.clone(),
            max_retries: spec.llm_selection.max_retries.max(1),
            retry_delay_ms: spec.llm_selection.retry_delay_ms,
        })
    }

    fn create_provider(
        config: &LLMProviderConfig,
        model: &ModelConfig,
    ) -> anyhow::Result<Arc<dyn LLMProvider>> {
        let api_key = resolve_secret(&config.api_key)?;
        let model_name = model.model.clone();

        let provider: Arc<dyn LLMProvider> = match config.provider_type.as_str() {
            "openai" | "openai-compatible" => {
                Arc::new(OpenAIAdapter::new(config.endpoint.clone(), api_key, model_name))
            }
            "azure-openai" => Arc::new(OpenAIAdapter::azure(
                config.endpoint.clone(),
                api_key,
                model_name,
                config
                    .api_version
                    .clone()
                    .unwrap_or_else(|| DEFAULT_AZURE_API_VERSION.to_string()),
            )),
            "anthropic" => Arc::new(AnthropicAdapter::new(config.endpoint.clone(), api_key, model_name)),
            _ => anyhow::bail!("Unsupported provider type: {}", config.provider_type),
        };

        Ok(provider)
    }

    fn fallback(&self) -> Option<&Arc<dyn LLMProvider>> {
        let name = self.fallback_provider.as_ref()?;
        self.providers.get(name)?.values().next()
    }

    /// Generate text using a model alias, retrying with exponential backoff
    /// and trying the fallback provider on the final attempt.
    pub async fn generate(
        &self,
        alias: &str,
        prompt: &ChatPrompt,
        options: &GenerationOptions,
    ) -> Result<GenerationResponse, LLMError> {
        let (provider_name, _model_config) = self
            .alias_map
            .get(alias)
            .ok_or_else(|| LLMError::ModelNotFound(format!("Model alias '{}' not found", alias)))?;

        let provider = self
            .providers
            .get(provider_name)
            .and_then(|adapters| adapters.get(alias))
            .ok_or_else(|| LLMError::Provider(format!("Provider '{}' not found", provider_name)))?;

        let mut last_error = None;

        for attempt in 0..self.max_retries {
            match provider.generate(prompt, options).await {
                Ok(response) => {
                    info!("Generation successful on attempt {}", attempt + 1);
                    return Ok(response);
                }
                Err(e) => {
                    warn!(
                        "Generation failed (attempt {}/{}): {:?}",
                        attempt + 1,
                        self.max_retries,
                        e
                    );
                    last_error = Some(e);

                    if attempt + 1 == self.max_retries {
                        if let Some(fallback) = self.fallback() {
                            info!("Trying fallback provider: {:?}", self.fallback_provider);
                            return fallback.generate(prompt, options).await;
                        }
                        break;
                    }

                    tokio::time::sleep(tokio::time::Duration::from_millis(
                        self.retry_delay_ms * 2_u64.pow(attempt),
                    ))
                    .await;
                }
            }
        }

        Err(last_error.unwrap_or_else(|| LLMError::Provider("Unknown error".into())))
    }

    /// Check health of every configured adapter
    pub async fn health_check_all(&self) -> HashMap<String, Result<(), LLMError>> {
        let mut results = HashMap::new();

        for (name, adapters) in &self.providers {
            for (alias, adapter) in adapters {
                info!("Health checking provider: {} ({})", name, alias);
                results.insert(format!("{}/{}", name, alias), adapter.health_check().await);
            }
        }

        results
    }

    pub fn available_aliases(&self) -> Vec<String> {
        self.alias_map.keys().cloned().collect()
    }

    pub fn has_alias(&self, alias: &str) -> bool {
        self.alias_map.contains_key(alias)
    }

    /// A provider handle bound to one alias, for services that take an
    /// [`LLMProvider`].
    pub fn alias_handle(self: &Arc<Self>, alias: &str) -> Arc<dyn LLMProvider> {
        Arc::new(AliasedModel {
            registry: Arc::clone(self),
            alias: alias.to_string(),
        })
    }
}

struct AliasedModel {
    registry: Arc<ProviderRegistry>,
    alias: String,
}

#[async_trait]
impl LLMProvider for AliasedModel {
    async fn generate(
        &self,
        prompt: &ChatPrompt,
        options: &GenerationOptions,
    ) -> Result<GenerationResponse, LLMError> {
        self.registry.generate(&self.alias, prompt, options).await
    }

    async fn health_check(&self) -> Result<(), LLMError> {
        let (provider_name, _) = self
            .registry
            .alias_map
            .get(&self.alias)
            .ok_or_else(|| LLMError::ModelNotFound(self.alias.clone()))?;
        match self
            .registry
            .providers
            .get(provider_name)
            .and_then(|adapters| adapters.get(&self.alias))
        {
            Some(adapter) => adapter.health_check().await,
            None => Err(LLMError::Provider(format!("Provider '{}' not found", provider_name))),
        }
    }
}
