use std::sync::Arc;
use std::time::Duration;

use crate::analysis::StrategyEngine;
use crate::config::Config;
use crate::jobs::JobTracker;
use crate::llm::provider::HttpProvider;
use crate::llm::AiProvider;
use crate::orchestrator::Orchestrator;
use crate::rag::RagQueryService;
use crate::repo::{RepoCatalog, RepoSource};
use crate::store::{JsonReportStore, MemoryVectorStore, ReportStore, VectorStore};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub repos: Arc<RepoCatalog>,
    pub tracker: Arc<JobTracker>,
    pub reports: Arc<dyn ReportStore>,
    pub vectors: Arc<dyn VectorStore>,
    pub orchestrator: Orchestrator,
    pub rag: RagQueryService,
}

impl AppState {
    /// Wire the HTTP provider and the on-disk stores under `config.data_dir`.
    pub fn new(config: Config) -> anyhow::Result<Self> {
        std::fs::create_dir_all(&config.data_dir)?;

        let http_client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(120))
            .build()?;
        let provider: Arc<dyn AiProvider> =
            Arc::new(HttpProvider::new(http_client, config.llm.clone()));

        let repos = Arc::new(RepoCatalog::open_or_create(
            &config.catalog_path(),
            config.content.clone(),
        )?);
        let vector_store = MemoryVectorStore::open_or_create(&config.vector_dir())?;
        for (repo_id, count) in vector_store.repo_counts() {
            let name = repos.get(repo_id).map(|r| r.name).unwrap_or_default();
            tracing::info!(repo_id = %repo_id, repo = %name, chunks = count, "Indexed chunks loaded");
        }
        let vectors: Arc<dyn VectorStore> = Arc::new(vector_store);
        let reports: Arc<dyn ReportStore> =
            Arc::new(JsonReportStore::open_or_create(&config.reports_path())?);

        Ok(Self::with_components(config, provider, repos, vectors, reports))
    }

    /// Assemble state from already built components.
    pub fn with_components(
        config: Config,
        provider: Arc<dyn AiProvider>,
        repos: Arc<RepoCatalog>,
        vectors: Arc<dyn VectorStore>,
        reports: Arc<dyn ReportStore>,
    ) -> Self {
        let tracker = Arc::new(JobTracker::new());
        let engine = StrategyEngine::with_defaults(provider.clone());
        let orchestrator = Orchestrator::new(
            engine,
            tracker.clone(),
            repos.clone() as Arc<dyn RepoSource>,
            reports.clone(),
            vectors.clone(),
            provider.clone(),
            config.analysis.clone(),
        );
        let rag = RagQueryService::new(provider, vectors.clone());

        Self {
            config,
            repos,
            tracker,
            reports,
            vectors,
            orchestrator,
            rag,
        }
    }
}
