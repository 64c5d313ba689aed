//! Durable storage seams: embedded chunks and strategy reports.

pub mod reports;
pub mod vector;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{CodeChunk, SimilarChunk, Snapshot, StrategyReport};

pub use reports::JsonReportStore;
pub use vector::MemoryVectorStore;

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Open a new snapshot that scopes one indexing run of `repo_id`.
    async fn create_snapshot(&self, repo_id: Uuid, label: &str) -> Result<Snapshot>;

    /// Persist a batch atomically: every row is written or none is.
    async fn store(&self, chunks: Vec<CodeChunk>) -> Result<()>;

    /// Up to `limit` chunks of `repo_id`, most similar first.
    async fn search_similar(
        &self,
        repo_id: Uuid,
        query: &[f32],
        limit: usize,
    ) -> Result<Vec<SimilarChunk>>;

    /// Drop every snapshot and chunk of `repo_id`. Returns the number of chunks removed.
    async fn delete_repo(&self, repo_id: Uuid) -> Result<usize>;
}

#[async_trait]
pub trait ReportStore: Send + Sync {
    /// Save a report, replacing any earlier one for the same repository and strategy.
    async fn save(&self, report: StrategyReport) -> Result<()>;

    /// Reports for `repo_id`, oldest first.
    async fn list(&self, repo_id: Uuid) -> Result<Vec<StrategyReport>>;

    /// Drop every report of `repo_id`. Returns how many were removed.
    async fn delete_repo(&self, repo_id: Uuid) -> Result<usize>;
}
