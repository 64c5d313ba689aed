//! End-to-end analysis runs with scripted strategies and providers.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;
use uuid::Uuid;

use common::{catalog, register, test_analysis_config, write_sample_checkout, ScriptedProvider};
use repo_analyzer::analysis::{Strategy, StrategyEngine};
use repo_analyzer::config::AnalysisConfig;
use repo_analyzer::error::{AnalyzerError, Result};
use repo_analyzer::jobs::{JobTracker, SUBSCRIBER_BUFFER};
use repo_analyzer::llm::AiProvider;
use repo_analyzer::models::{AnalysisRequest, AnalysisResult, Job, JobStatus};
use repo_analyzer::orchestrator::Orchestrator;
use repo_analyzer::repo::RepoCatalog;
use repo_analyzer::store::{JsonReportStore, MemoryVectorStore, ReportStore};

struct Harness {
    orchestrator: Orchestrator,
    tracker: Arc<JobTracker>,
    reports: Arc<JsonReportStore>,
    vectors: Arc<MemoryVectorStore>,
}

fn harness(
    engine: StrategyEngine,
    tracker: Arc<JobTracker>,
    repos: Arc<RepoCatalog>,
    provider: Arc<dyn AiProvider>,
    config: AnalysisConfig,
) -> Harness {
    let reports = Arc::new(JsonReportStore::in_memory());
    let vectors = Arc::new(MemoryVectorStore::in_memory());
    let orchestrator = Orchestrator::new(
        engine,
        tracker.clone(),
        repos,
        reports.clone(),
        vectors.clone(),
        provider,
        config,
    );
    Harness {
        orchestrator,
        tracker,
        reports,
        vectors,
    }
}

fn ok_result(name: &str) -> AnalysisResult {
    AnalysisResult {
        strategy: name.to_string(),
        summary: format!("{name} looks fine. Score: 8/10"),
        score: 8.0,
        details: serde_json::json!({}),
    }
}

/// Fails a fixed number of times, recording the job as seen during each attempt.
struct FlakyStrategy {
    tracker: Arc<JobTracker>,
    failures_left: AtomicUsize,
    seen: Mutex<Vec<Job>>,
}

#[async_trait]
impl Strategy for FlakyStrategy {
    fn name(&self) -> &str {
        "flaky"
    }

    fn description(&self) -> &str {
        "Fails before succeeding"
    }

    async fn analyze(&self, req: &AnalysisRequest) -> Result<AnalysisResult> {
        if let Some(job) = self.tracker.jobs_for_repo(req.repo_id).pop() {
            self.seen.lock().push(job);
        }
        let left = self.failures_left.load(Ordering::SeqCst);
        if left > 0 {
            self.failures_left.store(left - 1, Ordering::SeqCst);
            return Err(AnalyzerError::Provider("model overloaded".to_string()));
        }
        Ok(ok_result("flaky"))
    }
}

/// Blocks until released.
struct GateStrategy {
    gate: Arc<Notify>,
}

#[async_trait]
impl Strategy for GateStrategy {
    fn name(&self) -> &str {
        "gate"
    }

    fn description(&self) -> &str {
        "Waits for the test to release it"
    }

    async fn analyze(&self, _req: &AnalysisRequest) -> Result<AnalysisResult> {
        self.gate.notified().await;
        Ok(ok_result("gate"))
    }
}

#[tokio::test]
async fn test_retry_marks_each_attempt_running() {
    let dir = tempfile::tempdir().unwrap();
    write_sample_checkout(dir.path());
    let repos = catalog();
    let repo = register(&repos, dir.path(), None);

    let tracker = Arc::new(JobTracker::new());
    let flaky = Arc::new(FlakyStrategy {
        tracker: tracker.clone(),
        failures_left: AtomicUsize::new(2),
        seen: Mutex::new(Vec::new()),
    });
    let engine = StrategyEngine::new(vec![flaky.clone() as Arc<dyn Strategy>]);
    let h = harness(
        engine,
        tracker,
        repos,
        Arc::new(ScriptedProvider::answering("unused")),
        test_analysis_config(),
    );

    let run = h.orchestrator.start_analysis(repo.id).await.unwrap();
    run.task.unwrap().await.unwrap();

    let seen = flaky.seen.lock().clone();
    assert_eq!(seen.len(), 3);
    for job in &seen {
        assert_eq!(job.status, JobStatus::Running);
        assert_eq!(job.current, "flaky");
        assert_eq!(job.progress, 0);
    }

    let job = h.tracker.get_job(run.job_id).unwrap();
    assert_eq!(job.status, JobStatus::Complete);
    assert_eq!(job.progress, 1);
    assert_eq!(job.completed, vec!["flaky".to_string()]);

    let reports = h.reports.list(repo.id).await.unwrap();
    assert_eq!(reports.len(), 1);
    assert!(!reports[0].failed);
    assert_eq!(reports[0].score, 8.0);
}

#[tokio::test]
async fn test_all_strategies_failing_still_completes_job() {
    let dir = tempfile::tempdir().unwrap();
    write_sample_checkout(dir.path());
    let repos = catalog();
    let repo = register(&repos, dir.path(), None);

    let provider = Arc::new(ScriptedProvider::with_script(|_, _| {
        anyhow::bail!("connection refused")
    }));
    let engine = StrategyEngine::with_defaults(provider.clone());
    let h = harness(
        engine,
        Arc::new(JobTracker::new()),
        repos,
        provider.clone(),
        test_analysis_config(),
    );

    let run = h.orchestrator.start_analysis(repo.id).await.unwrap();
    run.task.unwrap().await.unwrap();

    let job = h.tracker.get_job(run.job_id).unwrap();
    assert_eq!(job.status, JobStatus::Complete);
    assert_eq!(job.total, 5);
    assert_eq!(job.progress, 5);
    assert!(job.error.is_none());

    let reports = h.reports.list(repo.id).await.unwrap();
    assert_eq!(reports.len(), 5);
    for report in &reports {
        assert!(report.failed);
        assert_eq!(report.score, 0.0);
        assert!(report.summary.contains("after 3 attempts"));
        assert!(report.summary.contains("connection refused"));
    }
    assert_eq!(provider.chat_count(), 15);
}

#[tokio::test]
async fn test_subscriber_sees_terminal_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    write_sample_checkout(dir.path());
    let repos = catalog();
    let repo = register(&repos, dir.path(), None);

    let provider = Arc::new(ScriptedProvider::answering("All good. Score: 9/10"));
    let h = harness(
        StrategyEngine::with_defaults(provider.clone()),
        Arc::new(JobTracker::new()),
        repos,
        provider,
        test_analysis_config(),
    );

    let run = h.orchestrator.start_analysis(repo.id).await.unwrap();
    let mut sub = h.tracker.subscribe(run.job_id).unwrap();

    let mut last = None;
    let mut progress_seen = Vec::new();
    while let Some(job) = sub.recv().await {
        progress_seen.push(job.progress);
        last = Some(job);
    }

    let last = last.unwrap();
    assert_eq!(last.status, JobStatus::Complete);
    assert_eq!(last.progress, 5);
    assert_eq!(last.completed.len(), 5);
    assert!(progress_seen.windows(2).all(|w| w[0] <= w[1]));

    let reports = h.reports.list(repo.id).await.unwrap();
    assert!(reports.iter().all(|r| r.score == 9.0));
}

#[tokio::test]
async fn test_slow_subscriber_does_not_block_job() {
    let dir = tempfile::tempdir().unwrap();
    write_sample_checkout(dir.path());
    let repos = catalog();
    let repo = register(&repos, dir.path(), None);

    let provider = Arc::new(ScriptedProvider::answering("Score: 5/10"));
    let h = harness(
        StrategyEngine::with_defaults(provider.clone()),
        Arc::new(JobTracker::new()),
        repos,
        provider,
        test_analysis_config(),
    );

    let run = h.orchestrator.start_analysis(repo.id).await.unwrap();
    let mut sub = h.tracker.subscribe(run.job_id).unwrap();

    // Nobody reads until the job is done
    run.task.unwrap().await.unwrap();
    assert_eq!(
        h.tracker.get_job(run.job_id).unwrap().status,
        JobStatus::Complete
    );

    let mut received = Vec::new();
    while let Some(job) = sub.recv().await {
        received.push(job);
    }
    assert!(received.len() <= SUBSCRIBER_BUFFER + 1);
    assert_eq!(received.last().unwrap().status, JobStatus::Complete);
}

#[tokio::test]
async fn test_single_flight_reuses_running_job() {
    let dir = tempfile::tempdir().unwrap();
    write_sample_checkout(dir.path());
    let repos = catalog();
    let repo = register(&repos, dir.path(), None);

    let gate = Arc::new(Notify::new());
    let engine = StrategyEngine::new(vec![
        Arc::new(GateStrategy { gate: gate.clone() }) as Arc<dyn Strategy>
    ]);
    let config = AnalysisConfig {
        single_flight: true,
        ..test_analysis_config()
    };
    let h = harness(
        engine,
        Arc::new(JobTracker::new()),
        repos,
        Arc::new(ScriptedProvider::answering("unused")),
        config,
    );

    let first = h.orchestrator.start_analysis(repo.id).await.unwrap();
    let second = h.orchestrator.start_analysis(repo.id).await.unwrap();
    assert!(!first.reused);
    assert!(second.reused);
    assert_eq!(first.job_id, second.job_id);
    assert!(second.task.is_none());
    assert_eq!(h.tracker.jobs_for_repo(repo.id).len(), 1);

    gate.notify_one();
    first.task.unwrap().await.unwrap();

    let third = h.orchestrator.start_analysis(repo.id).await.unwrap();
    assert!(!third.reused);
    assert_ne!(third.job_id, first.job_id);
    gate.notify_one();
    third.task.unwrap().await.unwrap();
}

#[tokio::test]
async fn test_without_single_flight_jobs_run_side_by_side() {
    let dir = tempfile::tempdir().unwrap();
    write_sample_checkout(dir.path());
    let repos = catalog();
    let repo = register(&repos, dir.path(), None);

    let provider = Arc::new(ScriptedProvider::answering("Score: 6/10"));
    let h = harness(
        StrategyEngine::with_defaults(provider.clone()),
        Arc::new(JobTracker::new()),
        repos,
        provider,
        test_analysis_config(),
    );

    let a = h.orchestrator.start_analysis(repo.id).await.unwrap();
    let b = h.orchestrator.start_analysis(repo.id).await.unwrap();
    assert_ne!(a.job_id, b.job_id);
    a.task.unwrap().await.unwrap();
    b.task.unwrap().await.unwrap();

    // Later saves replace earlier ones per strategy
    assert_eq!(h.reports.list(repo.id).await.unwrap().len(), 5);
}

#[tokio::test]
async fn test_reports_are_translated_for_report_language() {
    let dir = tempfile::tempdir().unwrap();
    write_sample_checkout(dir.path());
    let repos = catalog();
    let repo = register(&repos, dir.path(), Some("es"));

    let provider = Arc::new(ScriptedProvider::with_script(|system, _| {
        if system.starts_with("Translate") {
            Ok("TRADUCIDO".to_string())
        } else {
            Ok("Solid design. Score: 7/10".to_string())
        }
    }));
    let h = harness(
        StrategyEngine::with_defaults(provider.clone()),
        Arc::new(JobTracker::new()),
        repos,
        provider.clone(),
        test_analysis_config(),
    );

    let run = h.orchestrator.start_analysis(repo.id).await.unwrap();
    run.task.unwrap().await.unwrap();

    let reports = h.reports.list(repo.id).await.unwrap();
    assert_eq!(reports.len(), 5);
    for report in &reports {
        assert_eq!(report.translated, "TRADUCIDO");
        assert_eq!(report.summary, "Solid design. Score: 7/10");
        assert_eq!(report.score, 7.0);
    }

    let translations = provider
        .chat_calls
        .lock()
        .iter()
        .filter(|(system, _)| system.contains("to Spanish"))
        .count();
    assert_eq!(translations, 5);
}

#[tokio::test]
async fn test_unknown_repo_creates_no_job() {
    let tracker = Arc::new(JobTracker::new());
    let provider = Arc::new(ScriptedProvider::answering("unused"));
    let h = harness(
        StrategyEngine::with_defaults(provider.clone()),
        tracker,
        catalog(),
        provider,
        test_analysis_config(),
    );

    let missing = Uuid::new_v4();
    let err = h.orchestrator.start_analysis(missing).await.unwrap_err();
    assert!(matches!(err, AnalyzerError::NotFound(_)));
    assert!(h.tracker.jobs_for_repo(missing).is_empty());
}

#[tokio::test]
async fn test_empty_engine_is_a_configuration_error() {
    let dir = tempfile::tempdir().unwrap();
    write_sample_checkout(dir.path());
    let repos = catalog();
    let repo = register(&repos, dir.path(), None);

    let h = harness(
        StrategyEngine::new(Vec::new()),
        Arc::new(JobTracker::new()),
        repos,
        Arc::new(ScriptedProvider::answering("unused")),
        test_analysis_config(),
    );

    let err = h.orchestrator.start_analysis(repo.id).await.unwrap_err();
    assert!(matches!(err, AnalyzerError::Configuration(_)));
    assert!(h.tracker.jobs_for_repo(repo.id).is_empty());
}

#[tokio::test]
async fn test_indexing_runs_alongside_analysis() {
    let dir = tempfile::tempdir().unwrap();
    write_sample_checkout(dir.path());
    let repos = catalog();
    let repo = register(&repos, dir.path(), None);

    let provider = Arc::new(ScriptedProvider::answering("Score: 4/10"));
    let config = AnalysisConfig {
        rag_indexing: true,
        ..test_analysis_config()
    };
    let h = harness(
        StrategyEngine::with_defaults(provider.clone()),
        Arc::new(JobTracker::new()),
        repos,
        provider.clone(),
        config,
    );

    let run = h.orchestrator.start_analysis(repo.id).await.unwrap();
    run.indexing.unwrap().await.unwrap();
    run.task.unwrap().await.unwrap();

    assert!(h.vectors.entry_count() >= 3);
    assert!(provider.embed_batch_calls.load(Ordering::SeqCst) >= 3);
}
