use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{with_bearer, ChatMessage};
use crate::config::EndpointConfig;

/// Long analysis prompts over 60k chars of code can take minutes on local models.
const CHAT_TIMEOUT_SECS: u64 = 600;

/// Non-streaming chat completion. Returns the full assistant message.
pub async fn complete_chat(
    client: &reqwest::Client,
    provider: &str,
    endpoint: &EndpointConfig,
    messages: Vec<ChatMessage>,
) -> Result<String> {
    match provider {
        "ollama" => chat_ollama(client, endpoint, messages).await,
        "openai" => chat_openai(client, endpoint, messages).await,
        other => anyhow::bail!("Unsupported LLM provider for chat: {other}"),
    }
}

// ─── Ollama ──────────────────────────────────────────────

#[derive(Serialize)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
}

#[derive(Deserialize)]
struct OllamaChatResponse {
    message: ChatMessage,
}

async fn chat_ollama(
    client: &reqwest::Client,
    endpoint: &EndpointConfig,
    messages: Vec<ChatMessage>,
) -> Result<String> {
    let url = format!("{}/api/chat", endpoint.base_url);

    let req = OllamaChatRequest {
        model: endpoint.model.clone(),
        messages,
        stream: false,
    };

    let resp = with_bearer(client.post(&url), endpoint.token.as_deref())
        .timeout(Duration::from_secs(CHAT_TIMEOUT_SECS))
        .json(&req)
        .send()
        .await
        .context("Failed to call Ollama chat API")?;

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        anyhow::bail!("Ollama chat API returned {status}: {body}");
    }

    let body: OllamaChatResponse = resp
        .json()
        .await
        .context("Failed to parse Ollama chat response")?;

    Ok(body.message.content)
}

// ─── OpenAI-compatible ───────────────────────────────────

#[derive(Serialize)]
struct OpenAiChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
}

#[derive(Deserialize)]
struct OpenAiChatResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
}

#[derive(Deserialize)]
struct OpenAiMessage {
    content: Option<String>,
}

async fn chat_openai(
    client: &reqwest::Client,
    endpoint: &EndpointConfig,
    messages: Vec<ChatMessage>,
) -> Result<String> {
    let url = format!("{}/v1/chat/completions", endpoint.base_url);

    let req = OpenAiChatRequest {
        model: endpoint.model.clone(),
        messages,
    };

    let resp = with_bearer(client.post(&url), endpoint.token.as_deref())
        .timeout(Duration::from_secs(CHAT_TIMEOUT_SECS))
        .json(&req)
        .send()
        .await
        .context("Failed to call OpenAI chat API")?;

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        anyhow::bail!("OpenAI chat API returned {status}: {body}");
    }

    let body: OpenAiChatResponse = resp
        .json()
        .await
        .context("Failed to parse OpenAI chat response")?;

    parse_openai_content(body)
}

fn parse_openai_content(body: OpenAiChatResponse) -> Result<String> {
    body.choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .context("OpenAI chat response had no content")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ollama_response() {
        let raw = r#"{"model":"qwen3","message":{"role":"assistant","content":"Score: 7/10"},"done":true}"#;
        let parsed: OllamaChatResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.message.content, "Score: 7/10");
    }

    #[test]
    fn test_parse_openai_response() {
        let raw = r#"{"choices":[{"message":{"role":"assistant","content":"hello"}}]}"#;
        let parsed: OpenAiChatResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parse_openai_content(parsed).unwrap(), "hello");
    }

    #[test]
    fn test_parse_openai_empty_choices_is_error() {
        let parsed: OpenAiChatResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(parse_openai_content(parsed).is_err());
    }
}
