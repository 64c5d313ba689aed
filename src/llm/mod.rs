//! Embedding and chat capability consumed by the core.
//!
//! [`AiProvider`] is the seam between the orchestrator/RAG pipeline and a
//! model backend. [`provider::HttpProvider`] talks to Ollama or an
//! OpenAI-compatible API; tests substitute scripted providers.

pub mod chat;
pub mod chat_stream;
pub mod embeddings;
pub mod provider;

use std::fmt::Write;
use std::pin::Pin;

use anyhow::Result;
use async_trait::async_trait;
use futures_util::stream::Stream;
use serde::{Deserialize, Serialize};

/// Token fragments from a streaming chat call. Ends when the provider signals completion.
pub type ChatStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// A single chat turn (system, user or assistant)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[async_trait]
pub trait AiProvider: Send + Sync {
    /// Chat model identifier
    fn model_name(&self) -> &str;

    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// One vector per input, in input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    async fn chat(&self, system_prompt: &str, user_prompt: &str, context: &[String])
        -> Result<String>;

    async fn chat_stream(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        context: &[String],
    ) -> Result<ChatStream>;
}

/// Attach a bearer token when one is configured.
pub(crate) fn with_bearer(req: reqwest::RequestBuilder, token: Option<&str>) -> reqwest::RequestBuilder {
    match token {
        Some(t) if !t.is_empty() => req.header("Authorization", format!("Bearer {t}")),
        _ => req,
    }
}

/// Fold context chunks into the user turn so smaller models attend to them.
pub fn build_user_prompt(user_prompt: &str, context: &[String]) -> String {
    if context.is_empty() {
        return user_prompt.to_string();
    }

    let mut ctx = String::new();
    for (i, chunk) in context.iter().enumerate() {
        let _ = write!(ctx, "\n--- Context chunk {} ---\n{}\n", i + 1, chunk);
    }
    format!("Relevant code context:\n{ctx}\n\nQuestion: {user_prompt}")
}

pub fn build_messages(system_prompt: &str, user_prompt: &str, context: &[String]) -> Vec<ChatMessage> {
    vec![
        ChatMessage {
            role: "system".to_string(),
            content: system_prompt.to_string(),
        },
        ChatMessage {
            role: "user".to_string(),
            content: build_user_prompt(user_prompt, context),
        },
    ]
}
