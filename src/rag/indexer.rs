use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::chunking::{chunk_code, detect_language};
use crate::error::{AnalyzerError, Result};
use crate::llm::AiProvider;
use crate::models::CodeChunk;
use crate::store::VectorStore;

/// Outcome of one indexing run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexStats {
    pub files_indexed: usize,
    /// Files that produced no chunks
    pub files_empty: usize,
    pub files_failed: usize,
    pub chunks_stored: usize,
}

/// Chunks, embeds and stores files, one file at a time.
#[derive(Clone)]
pub struct RagIndexer {
    provider: Arc<dyn AiProvider>,
    store: Arc<dyn VectorStore>,
    chunk_tokens: usize,
}

impl RagIndexer {
    pub fn new(provider: Arc<dyn AiProvider>, store: Arc<dyn VectorStore>, chunk_tokens: usize) -> Self {
        Self {
            provider,
            store,
            chunk_tokens,
        }
    }

    /// Index `files` (path -> content) into `snapshot_id`.
    ///
    /// Each file is embedded with one batch call and stored as one atomic
    /// batch. A failing file is logged and skipped. The call only errors
    /// when every non-empty file failed.
    pub async fn index_chunks(
        &self,
        repo_id: Uuid,
        snapshot_id: Uuid,
        files: &BTreeMap<String, String>,
    ) -> Result<IndexStats> {
        tracing::info!(repo_id = %repo_id, snapshot_id = %snapshot_id, files = files.len(), "Indexing chunks");

        let mut stats = IndexStats::default();
        let mut last_error = None;

        for (path, content) in files {
            let chunks = chunk_code(content, self.chunk_tokens);
            if chunks.is_empty() {
                stats.files_empty += 1;
                continue;
            }

            match self.index_file(repo_id, snapshot_id, path, chunks).await {
                Ok(stored) => {
                    stats.files_indexed += 1;
                    stats.chunks_stored += stored;
                }
                Err(e) => {
                    tracing::error!(file = %path, error = %e, "Indexing file failed");
                    stats.files_failed += 1;
                    last_error = Some(e);
                }
            }
        }

        tracing::info!(
            repo_id = %repo_id,
            indexed = stats.files_indexed,
            failed = stats.files_failed,
            chunks = stats.chunks_stored,
            "Indexing finished"
        );

        match last_error {
            Some(e) if stats.files_indexed == 0 => Err(e),
            _ => Ok(stats),
        }
    }

    async fn index_file(
        &self,
        repo_id: Uuid,
        snapshot_id: Uuid,
        path: &str,
        chunks: Vec<String>,
    ) -> Result<usize> {
        let vectors = self
            .provider
            .embed_batch(&chunks)
            .await
            .map_err(AnalyzerError::provider)?;

        if vectors.len() != chunks.len() {
            return Err(AnalyzerError::Provider(format!(
                "{} vectors returned for {} chunks of {path}",
                vectors.len(),
                chunks.len()
            )));
        }

        let language = detect_language(path);
        let rows: Vec<CodeChunk> = chunks
            .into_iter()
            .zip(vectors)
            .enumerate()
            .map(|(chunk_index, (content, embedding))| CodeChunk {
                repo_id,
                snapshot_id,
                file_path: path.to_string(),
                chunk_index,
                content,
                language: language.to_string(),
                embedding,
            })
            .collect();

        let count = rows.len();
        self.store.store(rows).await?;
        tracing::debug!(file = %path, chunks = count, "File indexed");
        Ok(count)
    }
}
