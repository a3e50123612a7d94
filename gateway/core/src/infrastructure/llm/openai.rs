// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// OpenAI LLM Provider Adapter
//
// Anti-Corruption Layer for the OpenAI chat completions API.
// Also serves Azure OpenAI deployments and OpenAI-compatible servers.

use crate::domain::llm::{
    ChatPrompt, FinishReason, GenerationOptions, GenerationResponse, LLMError, LLMProvider, TokenUsage,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Flavor {
    OpenAI,
    Azure { api_version: String },
}

pub struct OpenAIAdapter {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    flavor: Flavor,
}

#[derive(Serialize)]
struct OpenAIRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<String>,
    messages: Vec<OpenAIMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<Vec<String>>,
}

#[derive(Serialize, Deserialize)]
struct OpenAIMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
    #[serde(default)]
    usage: Option<OpenAIUsage>,
}

#[derive(Deserialize)]
struct OpenAIChoice {
    message: OpenAIMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct OpenAIUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

impl OpenAIAdapter {
    pub fn new(endpoint: String, api_key: String, model: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
            api_key,
            model,
            flavor: Flavor::OpenAI,
        }
    }

    /// Azure OpenAI: `model` is the deployment name.
    pub fn azure(endpoint: String, api_key: String, deployment: String, api_version: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
            api_key,
            model: deployment,
            flavor: Flavor::Azure { api_version },
        }
    }

    fn provider_name(&self) -> &'static str {
        match self.flavor {
            Flavor::OpenAI => "openai",
            Flavor::Azure { .. } => "azure-openai",
        }
    }

    fn url(&self, path: &str) -> String {
        let base = self.endpoint.trim_end_matches('/');
        match &self.flavor {
            Flavor::OpenAI => format!("{}/{}", base, path),
            Flavor::Azure { api_version } => format!(
                "{}/openai/deployments/{}/{}?api-version={}",
                base, self.model, path, api_version
            ),
        }
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.flavor {
            Flavor::OpenAI if self.api_key.is_empty() => request,
            Flavor::OpenAI => request.bearer_auth(&self.api_key),
            Flavor::Azure { .. } => request.header("api-key", &self.api_key),
        }
    }
}

#[async_trait]
impl LLMProvider for OpenAIAdapter {
    async fn generate(
        &self,
        prompt: &ChatPrompt,
        options: &GenerationOptions,
    ) -> Result<GenerationResponse, LLMError> {
        let request = OpenAIRequest {
            // Azure routes by deployment in the URL.
            model: match self.flavor {
                Flavor::OpenAI => Some(self.model.clone()),
                Flavor::Azure { .. } => None,
            },
            messages: vec![
                OpenAIMessage {
                    role: "system".to_string(),
                    content: Some(prompt.system.clone()),
                },
                OpenAIMessage {
                    role: "user".to_string(),
                    content: Some(prompt.user.clone()),
                },
            ],
            max_tokens: options.max_tokens,
            temperature: options.temperature,
            stop: options.stop_sequences.clone(),
        };

        let response = self
            .authorize(self.client.post(self.url("chat/completions")))
            .json(&request)
            .send()
            .await
            .map_err(|e| LLMError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let error_text = response.text().await.unwrap_or_default();
            return Err(LLMError::from_status(status, error_text, &self.model));
        }

        let openai_response: OpenAIResponse = response
            .json()
            .await
            .map_err(|e| LLMError::Provider(format!("Failed to parse response: {}", e)))?;

        let choice = openai_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LLMError::Provider("No response from model".into()))?;

        let usage = openai_response
            .usage
            .map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            })
            .unwrap_or_default();

        Ok(GenerationResponse {
            text: choice.message.content.unwrap_or_default(),
            usage,
            provider: self.provider_name().to_string(),
            model: self.model.clone(),
            finish_reason: FinishReason::from_openai(choice.finish_reason.as_deref()),
        })
    }

    async fn health_check(&self) -> Result<(), LLMError> {
        let response = self
            .authorize(self.client.get(self.url("models")))
            .send()
            .await
            .map_err(|e| LLMError::Network(e.to_string()))?;

        // Azure deployments do not expose /models; any non-auth answer means reachable.
        let status = response.status();
        if status.is_success() || (matches!(self.flavor, Flavor::Azure { .. }) && status == 404) {
            Ok(())
        } else if status == 401 || status == 403 {
            Err(LLMError::Authentication("Invalid API key".into()))
        } else {
            Err(LLMError::Network(format!("HTTP {}", status)))
        }
    }
}
