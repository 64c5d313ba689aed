use anyhow::{Context, Result};
use futures_util::stream::{self, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{with_bearer, ChatMessage, ChatStream};
use crate::config::EndpointConfig;

/// RAG answers are short; a stalled stream past this is treated as dead.
const STREAM_TIMEOUT_SECS: u64 = 300;

/// Wire format of a streaming backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dialect {
    /// NDJSON objects from `/api/chat`
    Ollama,
    /// `data:` lines from `/v1/chat/completions`
    OpenAi,
}

impl Dialect {
    fn from_provider(provider: &str) -> Result<Self> {
        match provider {
            "ollama" => Ok(Self::Ollama),
            "openai" => Ok(Self::OpenAi),
            other => anyhow::bail!("Unsupported LLM provider for chat: {other}"),
        }
    }

    fn path(self) -> &'static str {
        match self {
            Self::Ollama => "/api/chat",
            Self::OpenAi => "/v1/chat/completions",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Ollama => "Ollama",
            Self::OpenAi => "OpenAI",
        }
    }

    fn parse(self, line: &str) -> Frame {
        match self {
            Self::Ollama => parse_ollama_line(line),
            Self::OpenAi => parse_openai_line(line),
        }
    }
}

/// One decoded line of a chat stream.
#[derive(Debug)]
enum Frame {
    Delta(String),
    /// Blank line, keep-alive, role-only or empty delta
    Skip,
    Done,
    Invalid(anyhow::Error),
}

/// Both backends accept the same request body when streaming.
#[derive(Serialize)]
struct StreamRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
}

/// Stream chat completions from Ollama or an OpenAI-compatible API.
///
/// Yields content deltas in provider order. The stream ends at the done
/// marker, or when the connection closes without one. A malformed line is
/// yielded as an error and streaming continues.
pub async fn stream_chat(
    client: &reqwest::Client,
    provider: &str,
    endpoint: &EndpointConfig,
    messages: Vec<ChatMessage>,
) -> Result<ChatStream> {
    let dialect = Dialect::from_provider(provider)?;
    let url = format!("{}{}", endpoint.base_url, dialect.path());
    let req = StreamRequest {
        model: endpoint.model.clone(),
        messages,
        stream: true,
    };

    let resp = with_bearer(client.post(&url), endpoint.token.as_deref())
        .timeout(Duration::from_secs(STREAM_TIMEOUT_SECS))
        .json(&req)
        .send()
        .await
        .with_context(|| format!("Failed to connect to {} for chat streaming", dialect.label()))?;

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        anyhow::bail!("{} chat API returned {status}: {body}", dialect.label());
    }

    Ok(Box::pin(decode_frames(dialect, stream_lines(resp.bytes_stream()))))
}

/// Turn raw lines into content deltas, stopping at the done marker.
fn decode_frames(
    dialect: Dialect,
    lines: impl Stream<Item = Result<String>> + Send + 'static,
) -> impl Stream<Item = Result<String>> + Send {
    stream::unfold(Some(Box::pin(lines)), move |state| async move {
        let mut lines = state?;
        loop {
            let line = match lines.next().await? {
                Ok(line) => line,
                Err(e) => return Some((Err(e), Some(lines))),
            };
            match dialect.parse(&line) {
                Frame::Delta(content) => return Some((Ok(content), Some(lines))),
                Frame::Skip => continue,
                Frame::Done => return None,
                Frame::Invalid(e) => return Some((Err(e), Some(lines))),
            }
        }
    })
}

#[derive(Deserialize)]
struct OllamaStreamChunk {
    #[serde(default)]
    message: Option<ChatMessage>,
    #[serde(default)]
    done: bool,
}

fn parse_ollama_line(line: &str) -> Frame {
    let line = line.trim();
    if line.is_empty() {
        return Frame::Skip;
    }

    match serde_json::from_str::<OllamaStreamChunk>(line) {
        // The final object may still carry a last fragment
        Ok(chunk) => match (chunk.message.map(|m| m.content), chunk.done) {
            (Some(content), _) if !content.is_empty() => Frame::Delta(content),
            (_, true) => Frame::Done,
            _ => Frame::Skip,
        },
        Err(e) => Frame::Invalid(anyhow::anyhow!("Failed to parse Ollama chunk: {e}")),
    }
}

#[derive(Deserialize)]
struct OpenAiStreamChunk {
    #[serde(default)]
    choices: Vec<OpenAiStreamChoice>,
}

#[derive(Deserialize)]
struct OpenAiStreamChoice {
    #[serde(default)]
    delta: OpenAiStreamDelta,
}

#[derive(Deserialize, Default)]
struct OpenAiStreamDelta {
    content: Option<String>,
}

fn parse_openai_line(line: &str) -> Frame {
    let Some(data) = line.trim().strip_prefix("data:") else {
        // event:, id: and comment lines carry no content
        return Frame::Skip;
    };
    let data = data.trim();
    if data == "[DONE]" {
        return Frame::Done;
    }

    match serde_json::from_str::<OpenAiStreamChunk>(data) {
        Ok(chunk) => chunk
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.delta.content)
            .filter(|c| !c.is_empty())
            .map_or(Frame::Skip, Frame::Delta),
        Err(e) => Frame::Invalid(anyhow::anyhow!("Failed to parse OpenAI chunk: {e}")),
    }
}

/// Split a byte stream into non-blank lines. Bytes are buffered until a
/// newline so multi-byte characters split across reads stay intact.
fn stream_lines(
    byte_stream: impl Stream<Item = reqwest::Result<bytes::Bytes>> + Send + 'static,
) -> impl Stream<Item = Result<String>> + Send {
    stream::unfold(
        (Box::pin(byte_stream), Vec::<u8>::new(), false),
        |(mut bytes_in, mut pending, mut ended)| async move {
            loop {
                if let Some(pos) = pending.iter().position(|&b| b == b'\n') {
                    let raw: Vec<u8> = pending.drain(..=pos).collect();
                    let line = String::from_utf8_lossy(&raw[..raw.len() - 1]).into_owned();
                    if line.trim().is_empty() {
                        continue;
                    }
                    return Some((Ok(line), (bytes_in, pending, ended)));
                }

                if ended {
                    if pending.iter().all(u8::is_ascii_whitespace) {
                        return None;
                    }
                    let line = String::from_utf8_lossy(&std::mem::take(&mut pending)).into_owned();
                    return Some((Ok(line), (bytes_in, pending, ended)));
                }

                match bytes_in.next().await {
                    Some(Ok(chunk)) => pending.extend_from_slice(&chunk),
                    Some(Err(e)) => {
                        return Some((
                            Err(anyhow::anyhow!("Stream read error: {e}")),
                            (bytes_in, pending, ended),
                        ))
                    }
                    None => ended = true,
                }
            }
        },
    )
}
