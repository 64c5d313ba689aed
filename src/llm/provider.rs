use anyhow::{Context, Result};
use async_trait::async_trait;

use super::{build_messages, chat, chat_stream, embeddings, AiProvider, ChatStream};
use crate::config::LlmConfig;

/// [`AiProvider`] backed by Ollama or an OpenAI-compatible HTTP API.
#[derive(Clone)]
pub struct HttpProvider {
    client: reqwest::Client,
    config: LlmConfig,
}

impl HttpProvider {
    pub fn new(client: reqwest::Client, config: LlmConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl AiProvider for HttpProvider {
    fn model_name(&self) -> &str {
        &self.config.chat.model
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let vector = embeddings::embed_single(
            &self.client,
            &self.config.provider,
            &self.config.embed,
            text,
        )
        .await?;
        check_dimension(&vector, self.config.embedding_dim)?;
        Ok(vector)
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let vectors =
            embeddings::embed_batch(&self.client, &self.config.provider, &self.config.embed, texts)
                .await?;
        for v in &vectors {
            check_dimension(v, self.config.embedding_dim)?;
        }
        Ok(vectors)
    }

    async fn chat(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        context: &[String],
    ) -> Result<String> {
        let messages = build_messages(system_prompt, user_prompt, context);
        chat::complete_chat(&self.client, &self.config.provider, &self.config.chat, messages)
            .await
            .with_context(|| format!("chat with {} failed", self.config.chat.model))
    }

    async fn chat_stream(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        context: &[String],
    ) -> Result<ChatStream> {
        let messages = build_messages(system_prompt, user_prompt, context);
        chat_stream::stream_chat(&self.client, &self.config.provider, &self.config.chat, messages)
            .await
    }
}

/// A dimension of 0 disables the check.
fn check_dimension(vector: &[f32], expected: usize) -> Result<()> {
    if expected != 0 && vector.len() != expected {
        anyhow::bail!(
            "Embedding dimension mismatch: expected {expected}, got {}",
            vector.len()
        );
    }
    Ok(())
}
