// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Chat Answer Service
//!
//! Answers a question from the documents the user is permitted to see.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Retrieve permitted chunks, ground the model on them, and
//!   return the answer with the documents it cites.
//!
//! Cited sources are only returned when they were among the permitted hits of
//! this turn, so a model that invents or remembers a document id cannot leak
//! it to the caller.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::info;

use super::retrieval::FilteredRetrievalService;
use crate::domain::document::SearchHit;
use crate::domain::llm::{ChatPrompt, GenerationOptions, LLMProvider};
use crate::domain::user::UserContext;

pub const SOURCES_HEADING: &str = "## Sources Used";
pub const NO_INFORMATION_ANSWER: &str =
    "I don't have information about that in the available documents.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceReference {
    pub name: String,
    pub url: String,
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatAnswer {
    pub thread_id: String,
    pub content: String,
    pub sources: Vec<SourceReference>,
}

pub struct ChatService {
    retrieval: Arc<FilteredRetrievalService>,
    llm: Arc<dyn LLMProvider>,
    results: usize,
    options: GenerationOptions,
}

impl ChatService {
    pub fn new(retrieval: Arc<FilteredRetrievalService>, llm: Arc<dyn LLMProvider>, results: usize) -> Self {
        Self {
            retrieval,
            llm,
            results,
            options: GenerationOptions::default(),
        }
    }

    pub async fn answer(
        &self,
        question: &str,
        user: &UserContext,
        thread_id: Option<String>,
    ) -> Result<ChatAnswer> {
        let thread_id = thread_id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let hits = self
            .retrieval
            .search(question, self.results, Some(&user.email), user.dev_mode)
            .await;

        let prompt = ChatPrompt::new(build_system_prompt(&hits, user), build_user_message(question, user));
        let response = self
            .llm
            .generate(&prompt, &self.options)
            .await
            .context("Failed to generate answer")?;

        let permitted: HashSet<&str> = hits.iter().map(|h| h.document_id.as_str()).collect();
        let sources: Vec<SourceReference> = parse_sources(&response.text)
            .into_iter()
            .filter(|s| permitted.contains(s.id.as_str()))
            .collect();

        info!(
            thread_id = %thread_id,
            user = %user.email,
            documents = hits.len(),
            sources = sources.len(),
            model = %response.model,
            tokens = response.usage.total_tokens,
            "Answered chat message"
        );

        Ok(ChatAnswer {
            thread_id,
            content: strip_sources_section(&response.text),
            sources,
        })
    }
}

fn build_system_prompt(hits: &[SearchHit], user: &UserContext) -> String {
    let mut system = String::from(
        "You are an assistant that answers questions using ONLY the company documents provided below.\n\n\
         Rules:\n\
         1. Answer only from the documents below. If they do not contain the answer, reply exactly: \"",
    );
    system.push_str(NO_INFORMATION_ANSWER);
    system.push_str(
        "\"\n\
         2. Write a natural, conversational answer and mention documents by name (e.g. \"According to the Annual Report...\").\n\
         3. Do not put URLs or IDs in the main answer.\n\
         4. If the question is unrelated to the documents, reply: \"I'm designed to provide information only from company documents.\"\n\n\
         After the answer, add a sources section listing every document you used, exactly in this format:\n\n",
    );
    system.push_str(SOURCES_HEADING);
    system.push_str("\n- [documentName] (URL: [webUrl], ID: [docId])\n\n");

    if !user.dev_mode {
        system.push_str(&format!("You are helping {} ({}). ", user.name, user.email));
    }
    system.push_str(&format!(
        "Current time: {}.\n",
        chrono::Utc::now().format("%Y-%m-%d %H:%M UTC")
    ));

    if !user.dev_mode {
        system.push_str(
            "\nIMPORTANT: Only documents this user is permitted to view are provided. If they ask about \
             anything else, tell them you do not have access to that information due to permission restrictions.\n",
        );
    }

    system.push_str("\n# Documents\n");
    if hits.is_empty() {
        system.push_str("(no documents found)\n");
    }
    for hit in hits {
        system.push_str(&format!(
            "\nDocument: {}\nURL: {}\nID: {}\nContent:\n{}\n---\n",
            hit.document_name(),
            hit.web_url(),
            hit.document_id,
            hit.text
        ));
    }

    system
}

fn build_user_message(question: &str, user: &UserContext) -> String {
    if !user.dev_mode && !user.name.is_empty() {
        format!("[Query from {}] {}", user.name, question)
    } else {
        question.to_string()
    }
}

/// Parse `- name (URL: url, ID: id)` lines under the sources heading.
pub fn parse_sources(answer: &str) -> Vec<SourceReference> {
    let Some((_, section)) = answer.split_once(SOURCES_HEADING) else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    let mut sources = Vec::new();

    for line in section.lines() {
        let line = line.trim();
        if line.starts_with('#') {
            break;
        }
        let Some(entry) = line.strip_prefix("- ").or_else(|| line.strip_prefix("* ")) else {
            continue;
        };
        let Some((name, rest)) = entry.rsplit_once(" (URL: ") else {
            continue;
        };
        let rest = rest.trim_end().trim_end_matches(')');
        let Some((url, id)) = rest.rsplit_once(", ID: ") else {
            continue;
        };

        let source = SourceReference {
            name: unbracket(name),
            url: unbracket(url),
            id: unbracket(id),
        };
        if !source.id.is_empty() && seen.insert(source.id.clone()) {
            sources.push(source);
        }
    }

    sources
}

fn unbracket(value: &str) -> String {
    let value = value.trim();
    value
        .strip_prefix('[')
        .and_then(|v| v.strip_suffix(']'))
        .unwrap_or(value)
        .trim()
        .to_string()
}

fn strip_sources_section(answer: &str) -> String {
    match answer.split_once(SOURCES_HEADING) {
        Some((content, _)) => content.trim_end().to_string(),
        None => answer.trim_end().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::access_control::AccessDecisionEngine;
    use crate::domain::access::AccessPolicy;
    use crate::domain::document::{DocumentChunk, ScoredChunk, VectorStore, VectorStoreError};
    use crate::domain::llm::{FinishReason, GenerationResponse, LLMError, TokenUsage};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::json;

    struct OneDocStore;

    #[async_trait]
    impl VectorStore for OneDocStore {
        async fn similarity_search(&self, _query: &str, _k: usize) -> Result<Vec<ScoredChunk>, VectorStoreError> {
            let metadata = json!({
                "documentId": "doc-1",
                "documentName": "Handbook.pdf",
                "webUrl": "https://acme.sharepoint.com/Handbook.pdf",
                "access_level": "organization"
            });
            Ok(vec![ScoredChunk {
                chunk: DocumentChunk::new("doc-1", "Vacation is 25 days.", metadata.as_object().cloned().unwrap()),
                score: 0.8,
            }])
        }

        async fn add_chunks(&self, _chunks: Vec<DocumentChunk>) -> Result<(), VectorStoreError> {
            Ok(())
        }

        async fn delete_document(&self, _document_id: &str) -> Result<usize, VectorStoreError> {
            Ok(0)
        }

        async fn count(&self) -> Result<usize, VectorStoreError> {
            Ok(1)
        }
    }

    struct ScriptedLlm {
        reply: String,
        last_prompt: Mutex<Option<ChatPrompt>>,
    }

    #[async_trait]
    impl LLMProvider for ScriptedLlm {
        async fn generate(
            &self,
            prompt: &ChatPrompt,
            _options: &GenerationOptions,
        ) -> Result<GenerationResponse, LLMError> {
            *self.last_prompt.lock() = Some(prompt.clone());
            Ok(GenerationResponse {
                text: self.reply.clone(),
                usage: TokenUsage::default(),
                provider: "scripted".to_string(),
                model: "test".to_string(),
                finish_reason: FinishReason::Stop,
            })
        }

        async fn health_check(&self) -> Result<(), LLMError> {
            Ok(())
        }
    }

    fn service(reply: &str) -> (ChatService, Arc<ScriptedLlm>) {
        let engine = AccessDecisionEngine::new(Arc::new(AccessPolicy::from_domain_list("acme.com")), None);
        let retrieval = FilteredRetrievalService::new(Arc::new(OneDocStore), Arc::new(engine));
        let llm = Arc::new(ScriptedLlm {
            reply: reply.to_string(),
            last_prompt: Mutex::new(None),
        });
        (ChatService::new(Arc::new(retrieval), llm.clone(), 10), llm)
    }

    #[test]
    fn test_parse_sources() {
        let answer = "Vacation is 25 days.\n\n## Sources Used\n\
                      - Handbook.pdf (URL: https://acme.sharepoint.com/Handbook.pdf, ID: doc-1)\n\
                      - [Policy (2026).docx] (URL: [https://acme.sharepoint.com/p], ID: [doc-2])\n\
                      - Handbook.pdf (URL: https://acme.sharepoint.com/Handbook.pdf, ID: doc-1)\n\
                      - not a source line\n";
        let sources = parse_sources(answer);

        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0].name, "Handbook.pdf");
        assert_eq!(sources[0].id, "doc-1");
        assert_eq!(sources[1].name, "Policy (2026).docx");
        assert_eq!(sources[1].url, "https://acme.sharepoint.com/p");
        assert_eq!(sources[1].id, "doc-2");
    }

    #[test]
    fn test_parse_sources_without_section() {
        assert!(parse_sources("No sources here").is_empty());
    }

    #[tokio::test]
    async fn test_answer_keeps_only_permitted_sources() {
        let reply = "Vacation is 25 days.\n\n## Sources Used\n\
                     - Handbook.pdf (URL: https://acme.sharepoint.com/Handbook.pdf, ID: doc-1)\n\
                     - Salaries.xlsx (URL: https://acme.sharepoint.com/Salaries.xlsx, ID: doc-9)\n";
        let (service, _) = service(reply);
        let user = UserContext::new("bob@acme.com", Some("Bob"), false);

        let answer = service.answer("How much vacation?", &user, None).await.unwrap();

        assert_eq!(answer.content, "Vacation is 25 days.");
        assert_eq!(answer.sources.len(), 1);
        assert_eq!(answer.sources[0].id, "doc-1");
        assert!(uuid::Uuid::parse_str(&answer.thread_id).is_ok());
    }

    #[tokio::test]
    async fn test_prompt_carries_user_and_permission_warning() {
        let (service, llm) = service("I don't know.");
        let user = UserContext::new("bob@acme.com", Some("Bob"), false);
        service.answer("Vacation?", &user, Some("thread-7".to_string())).await.unwrap();

        let prompt = llm.last_prompt.lock().clone().unwrap();
        assert_eq!(prompt.user, "[Query from Bob] Vacation?");
        assert!(prompt.system.contains("permission restrictions"));
        assert!(prompt.system.contains("Handbook.pdf"));
        assert!(prompt.system.contains(SOURCES_HEADING));
    }

    #[tokio::test]
    async fn test_outsider_gets_empty_context() {
        let (service, llm) = service(NO_INFORMATION_ANSWER);
        let user = UserContext::new("eve@partner.com", Some("Eve"), false);
        let answer = service.answer("Vacation?", &user, None).await.unwrap();

        let prompt = llm.last_prompt.lock().clone().unwrap();
        assert!(!prompt.system.contains("Vacation is 25 days."));
        assert!(prompt.system.contains("(no documents found)"));
        assert!(answer.sources.is_empty());
    }

    #[tokio::test]
    async fn test_dev_mode_prompt_has_no_user_prefix() {
        let (service, llm) = service("ok");
        service.answer("Vacation?", &UserContext::dev(), None).await.unwrap();

        let prompt = llm.last_prompt.lock().clone().unwrap();
        assert_eq!(prompt.user, "Vacation?");
        assert!(!prompt.system.contains("permission restrictions"));
    }
}
