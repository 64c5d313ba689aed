use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A registered repository checkout
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Repo {
    pub id: Uuid,
    pub name: String,
    pub local_path: String,
    /// Target language for translated reports ("en" or empty = none)
    #[serde(default)]
    pub report_language: Option<String>,
    pub added_at: DateTime<Utc>,
}

/// Lifecycle of an analysis job. `Complete` and `Error` are absorbing.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Running,
    Complete,
    Error,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Complete | JobStatus::Error)
    }

    /// Only `Running` may move; it may stay running or end.
    pub fn can_transition_to(self, _next: JobStatus) -> bool {
        !self.is_terminal()
    }

    /// SSE event name for a snapshot in this state.
    pub fn event_name(self) -> &'static str {
        match self {
            JobStatus::Running => "progress",
            JobStatus::Complete => "complete",
            JobStatus::Error => "error",
        }
    }
}

/// Value snapshot of one analysis job, as returned by polling and pushed to subscribers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Job {
    pub id: Uuid,
    pub repo_id: Uuid,
    pub status: JobStatus,
    pub progress: usize,
    pub total: usize,
    #[serde(rename = "current_strategy")]
    pub current: String,
    #[serde(rename = "completed_strategies")]
    pub completed: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

/// Scopes the chunks of one indexing run of one repository.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Snapshot {
    pub id: Uuid,
    pub repo_id: Uuid,
    pub label: String,
    pub created_at: DateTime<Utc>,
}

/// An embedded slice of a file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CodeChunk {
    pub repo_id: Uuid,
    pub snapshot_id: Uuid,
    pub file_path: String,
    pub chunk_index: usize,
    pub content: String,
    pub language: String,
    pub embedding: Vec<f32>,
}

/// A stored chunk ranked against a query vector.
#[derive(Debug, Clone, Serialize)]
pub struct SimilarChunk {
    pub repo_id: Uuid,
    pub snapshot_id: Uuid,
    pub file_path: String,
    pub chunk_index: usize,
    pub content: String,
    pub language: String,
    /// 1 - cosine distance, clamped to [0, 1]
    pub similarity: f32,
}

/// Everything a strategy needs to analyze a repository.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AnalysisRequest {
    pub repo_id: Uuid,
    pub repo_name: String,
    pub file_tree: Vec<String>,
    /// `=== path ===\n<content>` excerpts, in walk order
    pub excerpts: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

/// Output of a single strategy run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub strategy: String,
    pub summary: String,
    pub score: f64,
    #[serde(default)]
    pub details: serde_json::Value,
}

/// Persisted per-strategy outcome; failures are stored as reports too.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyReport {
    pub repo_id: Uuid,
    pub strategy: String,
    pub summary: String,
    pub details: serde_json::Value,
    pub score: f64,
    /// Translated summary, empty when not requested or translation failed
    #[serde(default)]
    pub translated: String,
    pub failed: bool,
    pub created_at: DateTime<Utc>,
}

/// Register-repo request
#[derive(Debug, Clone, Deserialize)]
pub struct AddRepoRequest {
    pub name: String,
    pub local_path: String,
    pub report_language: Option<String>,
}

/// Run-analysis request
#[derive(Debug, Clone, Deserialize)]
pub struct RunAnalysisRequest {
    pub repo_id: Uuid,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunAnalysisResponse {
    pub job_id: Uuid,
    pub strategies: Vec<String>,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct StrategyInfo {
    pub name: String,
    pub description: String,
}

/// RAG question
#[derive(Debug, Clone, Deserialize)]
pub struct RagQueryRequest {
    pub repo_id: Uuid,
    pub question: String,
}

/// Source reference returned with RAG answers
#[derive(Debug, Clone, Serialize)]
pub struct SourceRef {
    pub file_path: String,
    pub content: String,
    pub similarity: f32,
    pub chunk_index: usize,
}

impl From<&SimilarChunk> for SourceRef {
    fn from(c: &SimilarChunk) -> Self {
        Self {
            file_path: c.file_path.clone(),
            content: c.content.clone(),
            similarity: c.similarity,
            chunk_index: c.chunk_index,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RagQueryResponse {
    pub answer: String,
    pub sources: Vec<SourceRef>,
}
