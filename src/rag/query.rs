use futures_util::StreamExt;
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::{AnalyzerError, Result};
use crate::llm::AiProvider;
use crate::models::{RagQueryResponse, SimilarChunk, SourceRef};
use crate::store::VectorStore;

/// Answer used when the repository has no indexed chunks to draw from.
pub const NO_RESULTS_ANSWER: &str = "No relevant code found for this query.";

/// Chunks retrieved per question.
pub const TOP_K: usize = 10;

const SYSTEM_PROMPT: &str = "You are an expert code analyst answering questions about one codebase from the code context provided.
Be precise, name the specific files and functions involved, and include short code examples when they help.
Always cite the source file of any code you refer to.";

/// Buffered fragments between the provider task and the consumer.
const FRAGMENT_BUFFER: usize = 32;

/// A streamed answer: the sources up front, then text fragments until the provider finishes.
pub struct RagStream {
    pub sources: Vec<SourceRef>,
    pub fragments: mpsc::Receiver<Result<String>>,
}

#[derive(Clone)]
pub struct RagQueryService {
    provider: Arc<dyn AiProvider>,
    store: Arc<dyn VectorStore>,
}

impl RagQueryService {
    pub fn new(provider: Arc<dyn AiProvider>, store: Arc<dyn VectorStore>) -> Self {
        Self { provider, store }
    }

    /// Embed the question and fetch the closest chunks of `repo_id`.
    async fn retrieve(&self, repo_id: Uuid, question: &str) -> Result<Vec<SimilarChunk>> {
        if question.trim().is_empty() {
            return Err(AnalyzerError::Validation("question is empty".to_string()));
        }

        let query = self
            .provider
            .embed(question)
            .await
            .map_err(|e| AnalyzerError::provider(e.context("embed query")))?;

        self.store.search_similar(repo_id, &query, TOP_K).await
    }

    pub async fn query(&self, repo_id: Uuid, question: &str) -> Result<RagQueryResponse> {
        tracing::info!(repo_id = %repo_id, "RAG query");
        let chunks = self.retrieve(repo_id, question).await?;

        if chunks.is_empty() {
            return Ok(RagQueryResponse {
                answer: NO_RESULTS_ANSWER.to_string(),
                sources: Vec::new(),
            });
        }

        let context = build_context(&chunks);
        let answer = self
            .provider
            .chat(SYSTEM_PROMPT, question, &context)
            .await
            .map_err(|e| AnalyzerError::provider(e.context("chat")))?;

        Ok(RagQueryResponse {
            answer,
            sources: chunks.iter().map(SourceRef::from).collect(),
        })
    }

    /// Like [`query`](Self::query), but the answer arrives as fragments from a background task.
    ///
    /// The task stops when the provider finishes or the receiver is dropped.
    pub async fn query_stream(&self, repo_id: Uuid, question: &str) -> Result<RagStream> {
        tracing::info!(repo_id = %repo_id, "RAG streaming query");
        let chunks = self.retrieve(repo_id, question).await?;
        let (tx, rx) = mpsc::channel(FRAGMENT_BUFFER);

        if chunks.is_empty() {
            // Capacity is at least one, so this cannot fail on a fresh channel.
            let _ = tx.try_send(Ok(NO_RESULTS_ANSWER.to_string()));
            return Ok(RagStream {
                sources: Vec::new(),
                fragments: rx,
            });
        }

        let context = build_context(&chunks);
        let mut stream = self
            .provider
            .chat_stream(SYSTEM_PROMPT, question, &context)
            .await
            .map_err(|e| AnalyzerError::provider(e.context("chat stream")))?;

        tokio::spawn(async move {
            while let Some(item) = stream.next().await {
                let item = item.map_err(AnalyzerError::provider);
                if tx.send(item).await.is_err() {
                    tracing::debug!("RAG stream receiver dropped");
                    break;
                }
            }
        });

        Ok(RagStream {
            sources: chunks.iter().map(SourceRef::from).collect(),
            fragments: rx,
        })
    }
}

/// One context block per retrieved chunk, in ranking order.
pub fn build_context(chunks: &[SimilarChunk]) -> Vec<String> {
    chunks
        .iter()
        .map(|c| {
            format!(
                "// File: {} (similarity: {:.2})\n{}",
                c.file_path, c.similarity, c.content
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_format() {
        let chunk = SimilarChunk {
            repo_id: Uuid::new_v4(),
            snapshot_id: Uuid::new_v4(),
            file_path: "src/auth.rs".into(),
            chunk_index: 2,
            content: "fn login() {}".into(),
            language: "rust".into(),
            similarity: 0.876,
        };
        assert_eq!(
            build_context(&[chunk]),
            vec!["// File: src/auth.rs (similarity: 0.88)\nfn login() {}".to_string()]
        );
    }
}
