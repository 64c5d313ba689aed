use anyhow::Context;
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use super::VectorStore;
use crate::error::{AnalyzerError, Result};
use crate::models::{CodeChunk, SimilarChunk, Snapshot};

#[derive(Debug, Default)]
struct VectorData {
    snapshots: Vec<Snapshot>,
    entries: Vec<CodeChunk>,
}

/// One line of the on-disk log. Replaying every line in order rebuilds the store.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum LogRecord {
    Snapshot { snapshot: Snapshot },
    Chunks { chunks: Vec<CodeChunk> },
    DeleteRepo { repo_id: Uuid },
}

impl VectorData {
    fn apply(&mut self, record: LogRecord) -> usize {
        match record {
            LogRecord::Snapshot { snapshot } => {
                self.snapshots.push(snapshot);
                0
            }
            LogRecord::Chunks { chunks } => {
                let n = chunks.len();
                self.entries.extend(chunks);
                n
            }
            LogRecord::DeleteRepo { repo_id } => {
                let before = self.entries.len();
                self.entries.retain(|e| e.repo_id != repo_id);
                self.snapshots.retain(|s| s.repo_id != repo_id);
                before - self.entries.len()
            }
        }
    }

    /// Every chunk must reference a known snapshot of its own repository.
    fn check_owners(&self, chunks: &[CodeChunk]) -> Result<()> {
        for chunk in chunks {
            let owner = self
                .snapshots
                .iter()
                .find(|s| s.id == chunk.snapshot_id)
                .map(|s| s.repo_id);
            match owner {
                None => {
                    return Err(AnalyzerError::Storage(format!(
                        "unknown snapshot {} for {}",
                        chunk.snapshot_id, chunk.file_path
                    )))
                }
                Some(repo_id) if repo_id != chunk.repo_id => {
                    return Err(AnalyzerError::Storage(format!(
                        "snapshot {} does not belong to repository {}",
                        chunk.snapshot_id, chunk.repo_id
                    )))
                }
                Some(_) => {}
            }
        }
        Ok(())
    }
}

/// In-memory vector store with cosine similarity search.
///
/// When opened on a directory, every mutation is appended to `vectors.jsonl`
/// as one line before it becomes visible in memory, so a batch is either
/// fully durable or absent. Searches only wait for the in-memory apply,
/// never for disk I/O.
pub struct MemoryVectorStore {
    data: RwLock<VectorData>,
    log_path: Option<PathBuf>,
    /// Serializes mutations so log order matches apply order.
    writer: tokio::sync::Mutex<()>,
}

impl MemoryVectorStore {
    /// A store that lives only as long as the process.
    pub fn in_memory() -> Self {
        Self {
            data: RwLock::new(VectorData::default()),
            log_path: None,
            writer: tokio::sync::Mutex::new(()),
        }
    }

    pub fn open_or_create(vector_dir: &Path) -> anyhow::Result<Self> {
        std::fs::create_dir_all(vector_dir)
            .with_context(|| format!("Failed to create {}", vector_dir.display()))?;
        let log_path = vector_dir.join("vectors.jsonl");

        let mut data = VectorData::default();
        if log_path.exists() {
            let raw = std::fs::read_to_string(&log_path).context("Failed to read vector log")?;
            for (n, line) in raw.lines().enumerate() {
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<LogRecord>(line) {
                    Ok(record) => {
                        data.apply(record);
                    }
                    // A torn final line from a crash mid-append is dropped
                    Err(e) => tracing::warn!(line = n + 1, error = %e, "Skipping unreadable vector log line"),
                }
            }
        }

        tracing::info!(
            entries = data.entries.len(),
            snapshots = data.snapshots.len(),
            "Vector store loaded"
        );

        Ok(Self {
            data: RwLock::new(data),
            log_path: Some(log_path),
            writer: tokio::sync::Mutex::new(()),
        })
    }

    pub fn entry_count(&self) -> usize {
        self.data.read().entries.len()
    }

    /// Get counts grouped by repo_id.
    pub fn repo_counts(&self) -> HashMap<Uuid, usize> {
        let data = self.data.read();
        let mut counts = HashMap::new();
        for e in data.entries.iter() {
            *counts.entry(e.repo_id).or_insert(0) += 1;
        }
        counts
    }

    /// Append one record to the log off the async workers. Callers hold `writer`.
    async fn append(&self, record: &LogRecord) -> anyhow::Result<()> {
        let Some(path) = self.log_path.clone() else {
            return Ok(());
        };
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        tokio::task::spawn_blocking(move || -> anyhow::Result<()> {
            let mut file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .with_context(|| format!("Failed to open {}", path.display()))?;
            file.write_all(&line)
                .with_context(|| format!("Failed to append to {}", path.display()))?;
            file.sync_data()?;
            Ok(())
        })
        .await
        .context("Vector log writer task failed")?
    }

    /// Make `record` durable, then visible. Returns the number of rows it added or removed.
    async fn commit(&self, record: LogRecord) -> Result<usize> {
        self.append(&record).await.map_err(AnalyzerError::storage)?;
        Ok(self.data.write().apply(record))
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn create_snapshot(&self, repo_id: Uuid, label: &str) -> Result<Snapshot> {
        let snapshot = Snapshot {
            id: Uuid::new_v4(),
            repo_id,
            label: label.to_string(),
            created_at: Utc::now(),
        };

        let _writer = self.writer.lock().await;
        self.commit(LogRecord::Snapshot {
            snapshot: snapshot.clone(),
        })
        .await?;
        Ok(snapshot)
    }

    async fn store(&self, chunks: Vec<CodeChunk>) -> Result<()> {
        if chunks.is_empty() {
            return Ok(());
        }

        let _writer = self.writer.lock().await;
        self.data.read().check_owners(&chunks)?;
        self.commit(LogRecord::Chunks { chunks }).await?;
        Ok(())
    }

    async fn search_similar(
        &self,
        repo_id: Uuid,
        query: &[f32],
        limit: usize,
    ) -> Result<Vec<SimilarChunk>> {
        let data = self.data.read();

        let mut scored: Vec<(f32, &CodeChunk)> = data
            .entries
            .iter()
            .filter(|e| e.repo_id == repo_id)
            .map(|e| (similarity(query, &e.embedding), e))
            .collect();

        // Stable sort keeps insertion order for equal scores
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);

        Ok(scored
            .into_iter()
            .map(|(score, e)| SimilarChunk {
                repo_id: e.repo_id,
                snapshot_id: e.snapshot_id,
                file_path: e.file_path.clone(),
                chunk_index: e.chunk_index,
                content: e.content.clone(),
                language: e.language.clone(),
                similarity: score,
            })
            .collect())
    }

    async fn delete_repo(&self, repo_id: Uuid) -> Result<usize> {
        let _writer = self.writer.lock().await;
        self.commit(LogRecord::DeleteRepo { repo_id }).await
    }
}

/// 1 - cosine distance, clamped to [0, 1].
fn similarity(a: &[f32], b: &[f32]) -> f32 {
    cosine_similarity(a, b).clamp(0.0, 1.0)
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        0.0
    } else {
        dot / denom
    }
}
