use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::with_bearer;
use crate::config::EndpointConfig;

/// Maximum characters sent per text to the embedding API.
/// bge-m3 and nomic-embed-text take 8 192 tokens; dense content (minified JS,
/// JSON blobs) can run ~2.3 tokens/char, so 3 000 chars stays under the limit.
const MAX_EMBED_CHARS: usize = 3_000;

/// Upper bound for one embed request, connection to last byte.
const EMBED_TIMEOUT: Duration = Duration::from_secs(120);

/// Truncate `text` to at most `MAX_EMBED_CHARS`, splitting on a UTF-8 char boundary.
fn truncate_for_embedding(text: &str) -> &str {
    if text.len() <= MAX_EMBED_CHARS {
        return text;
    }
    let mut end = MAX_EMBED_CHARS;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

/// Generate embeddings for a batch of texts. The result is parallel with `texts`.
pub async fn embed_batch(
    client: &reqwest::Client,
    provider: &str,
    endpoint: &EndpointConfig,
    texts: &[String],
) -> Result<Vec<Vec<f32>>> {
    if texts.is_empty() {
        return Ok(Vec::new());
    }

    let truncated: Vec<String> = texts
        .iter()
        .map(|t| truncate_for_embedding(t).to_string())
        .collect();

    let backend = EmbedBackend::from_provider(provider)?;
    let mut embeddings = Vec::with_capacity(texts.len());
    for batch in truncated.chunks(backend.batch_size()) {
        embeddings.extend(post_batch(client, backend, endpoint, batch).await?);
    }

    if embeddings.len() != texts.len() {
        anyhow::bail!(
            "Embedding API returned {} vectors for {} inputs",
            embeddings.len(),
            texts.len()
        );
    }

    Ok(embeddings)
}

/// Generate embedding for a single text.
pub async fn embed_single(
    client: &reqwest::Client,
    provider: &str,
    endpoint: &EndpointConfig,
    text: &str,
) -> Result<Vec<f32>> {
    let results = embed_batch(client, provider, endpoint, &[text.to_string()]).await?;
    results.into_iter().next().context("No embedding returned")
}

#[derive(Debug, Clone, Copy)]
enum EmbedBackend {
    Ollama,
    OpenAi,
}

impl EmbedBackend {
    fn from_provider(provider: &str) -> Result<Self> {
        match provider {
            "ollama" => Ok(Self::Ollama),
            "openai" => Ok(Self::OpenAi),
            other => anyhow::bail!("Unknown LLM provider: {other}"),
        }
    }

    /// Inputs per HTTP request
    fn batch_size(self) -> usize {
        match self {
            Self::Ollama => 32,
            Self::OpenAi => 64,
        }
    }

    fn path(self) -> &'static str {
        match self {
            Self::Ollama => "/api/embed",
            Self::OpenAi => "/v1/embeddings",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Ollama => "Ollama",
            Self::OpenAi => "OpenAI",
        }
    }
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
    /// Ollama only: truncate over-long inputs instead of returning 400
    #[serde(skip_serializing_if = "Option::is_none")]
    truncate: Option<bool>,
}

#[derive(Deserialize)]
struct OllamaEmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[derive(Deserialize)]
struct OpenAiEmbedResponse {
    data: Vec<OpenAiEmbedData>,
}

#[derive(Deserialize)]
struct OpenAiEmbedData {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

/// Rows are not guaranteed to come back in input order; `index` is authoritative.
fn openai_vectors(mut body: OpenAiEmbedResponse) -> Vec<Vec<f32>> {
    body.data.sort_by_key(|d| d.index);
    body.data.into_iter().map(|d| d.embedding).collect()
}

async fn post_batch(
    client: &reqwest::Client,
    backend: EmbedBackend,
    endpoint: &EndpointConfig,
    batch: &[String],
) -> Result<Vec<Vec<f32>>> {
    let url = format!("{}{}", endpoint.base_url, backend.path());
    let req = EmbedRequest {
        model: &endpoint.model,
        input: batch,
        truncate: matches!(backend, EmbedBackend::Ollama).then_some(true),
    };

    let resp = with_bearer(client.post(&url), endpoint.token.as_deref())
        .timeout(EMBED_TIMEOUT)
        .json(&req)
        .send()
        .await
        .with_context(|| format!("Failed to call {} embed API", backend.label()))?;

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        anyhow::bail!("{} embed API returned {status}: {body}", backend.label());
    }

    let context = || format!("Failed to parse {} embed response", backend.label());
    Ok(match backend {
        EmbedBackend::Ollama => resp.json::<OllamaEmbedResponse>().await.with_context(context)?.embeddings,
        EmbedBackend::OpenAi => openai_vectors(resp.json().await.with_context(context)?),
    })
}
