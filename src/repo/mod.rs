//! Registered repositories and the content the analyzer reads from them.

pub mod walk;

use anyhow::Context;
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::config::ContentLimits;
use crate::error::{AnalyzerError, Result};
use crate::models::{AddRepoRequest, AnalysisRequest, Repo};

/// Source of repository metadata and content for the orchestrator.
#[async_trait]
pub trait RepoSource: Send + Sync {
    async fn repo(&self, repo_id: Uuid) -> Result<Repo>;

    /// File tree and bounded excerpts for the strategies.
    async fn analysis_request(&self, repo_id: Uuid) -> Result<AnalysisRequest>;

    /// Files eligible for the RAG index, keyed by relative path.
    async fn index_files(&self, repo_id: Uuid) -> Result<BTreeMap<String, String>>;
}

/// Catalog of local checkouts, persisted as `repos.json`.
pub struct RepoCatalog {
    repos: RwLock<Vec<Repo>>,
    persist_path: Option<PathBuf>,
    limits: ContentLimits,
}

impl RepoCatalog {
    pub fn in_memory(limits: ContentLimits) -> Self {
        Self {
            repos: RwLock::new(Vec::new()),
            persist_path: None,
            limits,
        }
    }

    pub fn open_or_create(path: &Path, limits: ContentLimits) -> anyhow::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let repos = if path.exists() {
            let data = std::fs::read_to_string(path).context("Failed to read repo catalog")?;
            serde_json::from_str(&data).unwrap_or_default()
        } else {
            Vec::new()
        };

        Ok(Self {
            repos: RwLock::new(repos),
            persist_path: Some(path.to_path_buf()),
            limits,
        })
    }

    pub fn list(&self) -> Vec<Repo> {
        self.repos.read().clone()
    }

    pub fn get(&self, repo_id: Uuid) -> Option<Repo> {
        self.repos.read().iter().find(|r| r.id == repo_id).cloned()
    }

    /// Register a checkout that already exists on disk.
    pub fn add(&self, req: AddRepoRequest) -> Result<Repo> {
        let name = req.name.trim().to_string();
        if name.is_empty() {
            return Err(AnalyzerError::Validation("name is required".to_string()));
        }
        let local_path = req.local_path.trim().to_string();
        if !Path::new(&local_path).is_dir() {
            return Err(AnalyzerError::Validation(format!(
                "{local_path} is not a directory"
            )));
        }

        let mut repos = self.repos.write();
        if repos.iter().any(|r| r.local_path == local_path) {
            return Err(AnalyzerError::Validation(format!(
                "{local_path} is already registered"
            )));
        }

        let repo = Repo {
            id: Uuid::new_v4(),
            name,
            local_path,
            report_language: req
                .report_language
                .map(|l| l.trim().to_string())
                .filter(|l| !l.is_empty()),
            added_at: Utc::now(),
        };
        repos.push(repo.clone());
        self.persist(&repos).map_err(AnalyzerError::storage)?;

        tracing::info!(repo_id = %repo.id, name = %repo.name, "Repository registered");
        Ok(repo)
    }

    /// Atomic write via temp file + rename.
    fn persist(&self, repos: &[Repo]) -> anyhow::Result<()> {
        let Some(path) = &self.persist_path else {
            return Ok(());
        };
        let data = serde_json::to_string_pretty(repos)?;
        let tmp_path = path.with_extension("json.tmp");
        std::fs::write(&tmp_path, &data).context("Failed to write repo catalog")?;
        std::fs::rename(&tmp_path, path).context("Failed to replace repo catalog")?;
        Ok(())
    }

    fn checkout(&self, repo_id: Uuid) -> Result<(Repo, PathBuf)> {
        let repo = self
            .get(repo_id)
            .ok_or_else(|| AnalyzerError::NotFound(format!("repository {repo_id}")))?;
        let root = PathBuf::from(&repo.local_path);
        if !root.is_dir() {
            return Err(AnalyzerError::Validation(format!(
                "checkout {} is missing",
                root.display()
            )));
        }
        Ok((repo, root))
    }
}

#[async_trait]
impl RepoSource for RepoCatalog {
    async fn repo(&self, repo_id: Uuid) -> Result<Repo> {
        self.get(repo_id)
            .ok_or_else(|| AnalyzerError::NotFound(format!("repository {repo_id}")))
    }

    async fn analysis_request(&self, repo_id: Uuid) -> Result<AnalysisRequest> {
        let (repo, root) = self.checkout(repo_id)?;
        let limits = self.limits.clone();
        tokio::task::spawn_blocking(move || walk::build_analysis_request(&root, &repo, &limits))
            .await
            .map_err(|e| AnalyzerError::Storage(format!("walk task failed: {e}")))
    }

    async fn index_files(&self, repo_id: Uuid) -> Result<BTreeMap<String, String>> {
        let (_, root) = self.checkout(repo_id)?;
        let limits = self.limits.clone();
        tokio::task::spawn_blocking(move || walk::collect_index_files(&root, &limits))
            .await
            .map_err(|e| AnalyzerError::Storage(format!("walk task failed: {e}")))
    }
}
