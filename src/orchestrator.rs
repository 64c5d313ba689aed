//! Runs every registered strategy for a repository as one background job.

use chrono::Utc;
use futures_util::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::analysis::{needs_translation, translate_report, StrategyEngine};
use crate::config::AnalysisConfig;
use crate::error::{AnalyzerError, Result};
use crate::jobs::JobTracker;
use crate::llm::AiProvider;
use crate::models::{AnalysisRequest, AnalysisResult, JobStatus, Repo, StrategyReport};
use crate::rag::RagIndexer;
use crate::repo::RepoSource;
use crate::store::{ReportStore, VectorStore};

/// Handle to a started (or reused) analysis job.
#[derive(Debug)]
pub struct AnalysisRun {
    pub job_id: Uuid,
    /// True when an already running job was returned instead of a new one.
    pub reused: bool,
    /// The strategy loop. `None` when reused.
    pub task: Option<JoinHandle<()>>,
    /// The RAG indexing run, if indexing is enabled.
    pub indexing: Option<JoinHandle<()>>,
}

#[derive(Clone)]
pub struct Orchestrator {
    engine: StrategyEngine,
    tracker: Arc<JobTracker>,
    repos: Arc<dyn RepoSource>,
    reports: Arc<dyn ReportStore>,
    vectors: Arc<dyn VectorStore>,
    indexer: RagIndexer,
    provider: Arc<dyn AiProvider>,
    config: AnalysisConfig,
}

impl Orchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        engine: StrategyEngine,
        tracker: Arc<JobTracker>,
        repos: Arc<dyn RepoSource>,
        reports: Arc<dyn ReportStore>,
        vectors: Arc<dyn VectorStore>,
        provider: Arc<dyn AiProvider>,
        config: AnalysisConfig,
    ) -> Self {
        let indexer = RagIndexer::new(provider.clone(), vectors.clone(), config.chunk_tokens);
        Self {
            engine,
            tracker,
            repos,
            reports,
            vectors,
            indexer,
            provider,
            config,
        }
    }

    pub fn engine(&self) -> &StrategyEngine {
        &self.engine
    }

    pub fn tracker(&self) -> &Arc<JobTracker> {
        &self.tracker
    }

    /// Build the request, create the job and launch it in the background.
    ///
    /// Returns as soon as the job exists. If the request cannot be built no
    /// job is created and the error is returned.
    pub async fn start_analysis(&self, repo_id: Uuid) -> Result<AnalysisRun> {
        if self.config.single_flight {
            if let Some(job) = self.tracker.running_job_for_repo(repo_id) {
                tracing::info!(job_id = %job.id, repo_id = %repo_id, "Reusing running analysis job");
                return Ok(AnalysisRun {
                    job_id: job.id,
                    reused: true,
                    task: None,
                    indexing: None,
                });
            }
        }

        if self.engine.is_empty() {
            return Err(AnalyzerError::Configuration(
                "no analysis strategies registered".to_string(),
            ));
        }

        let repo = self.repos.repo(repo_id).await?;
        let request = self.repos.analysis_request(repo_id).await?;

        let job_id = Uuid::new_v4();
        self.tracker.create_job(job_id, repo_id, self.engine.len());
        tracing::info!(job_id = %job_id, repo = %repo.name, strategies = self.engine.len(), "Analysis job started");

        let indexing = self.config.rag_indexing.then(|| {
            let this = self.clone();
            tokio::spawn(async move { this.index_repository(repo_id, job_id).await })
        });

        let this = self.clone();
        let task = tokio::spawn(async move {
            let tracker = this.tracker.clone();
            let run = AssertUnwindSafe(this.run_job(job_id, repo, request)).catch_unwind();
            if run.await.is_err() {
                tracing::error!(job_id = %job_id, "Analysis task panicked");
                if let Err(e) = tracker.fail_job(job_id, "analysis task panicked") {
                    tracing::error!(job_id = %job_id, error = %e, "Could not mark job failed");
                }
            }
        });

        Ok(AnalysisRun {
            job_id,
            reused: false,
            task: Some(task),
            indexing,
        })
    }

    async fn run_job(&self, job_id: Uuid, repo: Repo, request: AnalysisRequest) {
        let names = self.engine.names();
        let total = names.len();

        for (i, name) in names.iter().enumerate() {
            tracing::info!(job_id = %job_id, strategy = %name, progress = %format!("{}/{}", i + 1, total), "Running strategy");

            let report = match self.run_with_retries(job_id, i, name, &request).await {
                Ok(result) => self.success_report(&repo, result).await,
                Err((attempts, e)) => {
                    tracing::error!(job_id = %job_id, strategy = %name, attempts, error = %e, "Strategy failed after retries");
                    failure_report(repo.id, name, attempts, &e)
                }
            };

            if let Err(e) = self.reports.save(report).await {
                tracing::error!(job_id = %job_id, strategy = %name, error = %e, "Failed to save report");
            }

            self.mark(job_id, name, i + 1, JobStatus::Running);
        }

        self.mark(job_id, "", total, JobStatus::Complete);
        tracing::info!(job_id = %job_id, "Analysis job complete");
    }

    /// Attempt one strategy up to `max_attempts` times. Each attempt is announced as running.
    async fn run_with_retries(
        &self,
        job_id: Uuid,
        index: usize,
        name: &str,
        request: &AnalysisRequest,
    ) -> std::result::Result<AnalysisResult, (usize, AnalyzerError)> {
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            self.mark(job_id, name, index, JobStatus::Running);

            match self.engine.run(name, request).await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    tracing::warn!(job_id = %job_id, strategy = %name, attempt, max = max_attempts, error = %e, "Strategy attempt failed");
                    if attempt >= max_attempts {
                        return Err((attempt, e));
                    }
                    tokio::time::sleep(self.config.retry_delay).await;
                }
            }
        }
    }

    async fn success_report(&self, repo: &Repo, result: AnalysisResult) -> StrategyReport {
        let translated = match repo.report_language.as_deref() {
            Some(lang) if needs_translation(Some(lang)) => {
                translate_report(self.provider.as_ref(), &result.summary, lang).await
            }
            _ => String::new(),
        };

        StrategyReport {
            repo_id: repo.id,
            strategy: result.strategy,
            summary: result.summary,
            details: result.details,
            score: result.score,
            translated,
            failed: false,
            created_at: Utc::now(),
        }
    }

    fn mark(&self, job_id: Uuid, strategy: &str, progress: usize, status: JobStatus) {
        if let Err(e) = self.tracker.update_job(job_id, strategy, progress, status) {
            tracing::error!(job_id = %job_id, error = %e, "Job update failed");
        }
    }

    /// Snapshot the repository's indexable files and embed them. Failures are only logged.
    async fn index_repository(&self, repo_id: Uuid, job_id: Uuid) {
        let label = format!("analysis-{}", &job_id.simple().to_string()[..8]);

        let snapshot = match self.vectors.create_snapshot(repo_id, &label).await {
            Ok(s) => s,
            Err(e) => {
                tracing::error!(repo_id = %repo_id, error = %e, "Create snapshot for RAG failed");
                return;
            }
        };

        let files = match self.repos.index_files(repo_id).await {
            Ok(files) => files,
            Err(e) => {
                tracing::error!(repo_id = %repo_id, error = %e, "Collecting files for RAG failed");
                return;
            }
        };
        if files.is_empty() {
            tracing::info!(repo_id = %repo_id, "Nothing to index");
            return;
        }

        match self.indexer.index_chunks(repo_id, snapshot.id, &files).await {
            Ok(stats) => {
                tracing::info!(repo_id = %repo_id, snapshot_id = %snapshot.id, files = stats.files_indexed, chunks = stats.chunks_stored, "RAG indexing complete")
            }
            Err(e) => tracing::error!(repo_id = %repo_id, error = %e, "RAG indexing failed"),
        }
    }
}

/// Report stored in place of a result when every attempt failed.
pub fn failure_report(
    repo_id: Uuid,
    strategy: &str,
    attempts: usize,
    err: &AnalyzerError,
) -> StrategyReport {
    StrategyReport {
        repo_id,
        strategy: strategy.to_string(),
        summary: format!(
            "## ⚠️ Analysis Failed\n\nThe **{strategy}** strategy could not be completed after {attempts} attempts.\n\n**Error:** `{err}`\n\nRe-run the analysis to try again."
        ),
        details: serde_json::json!({}),
        score: 0.0,
        translated: String::new(),
        failed: true,
        created_at: Utc::now(),
    }
}
