//! In-memory analysis job tracker with push subscriptions.
//!
//! One mutex guards both the job map and every subscriber list, so a
//! snapshot taken during an update is exactly what each subscriber of
//! that update receives. Sends never block: a full subscriber buffer drops
//! the intermediate snapshot for that subscriber only.
//!
//! The terminal snapshot is delivered to every subscriber. After trying to
//! push it, the tracker drops all senders of the job, and a
//! [`Subscription`] whose channel closes before a terminal snapshot arrived
//! reads the final state back from the tracker once.

use chrono::Utc;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use uuid::Uuid;

use crate::error::{AnalyzerError, Result};
use crate::models::{Job, JobStatus};

/// Per-subscriber buffer of pending snapshots.
pub const SUBSCRIBER_BUFFER: usize = 10;

struct Subscriber {
    id: u64,
    tx: mpsc::Sender<Job>,
}

#[derive(Default)]
struct Inner {
    jobs: HashMap<Uuid, Job>,
    subs: HashMap<Uuid, Vec<Subscriber>>,
    next_sub_id: u64,
}

#[derive(Default)]
pub struct JobTracker {
    inner: Mutex<Inner>,
}

impl JobTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a fresh running job. Ids are expected to be unique; a reused id replaces the old job.
    pub fn create_job(&self, id: Uuid, repo_id: Uuid, total: usize) -> Job {
        let job = Job {
            id,
            repo_id,
            status: JobStatus::Running,
            progress: 0,
            total,
            current: String::new(),
            completed: Vec::new(),
            error: None,
            started_at: Utc::now(),
            completed_at: None,
        };

        let mut inner = self.inner.lock();
        if inner.jobs.insert(id, job.clone()).is_some() {
            tracing::warn!(job_id = %id, "Job id reused, previous job replaced");
        }
        tracing::debug!(job_id = %id, repo_id = %repo_id, total, "Job created");
        job
    }

    /// Apply one progress update and push the resulting snapshot to subscribers.
    ///
    /// Progress is clamped to `[previous, total]`. `strategy` joins the
    /// completed list when the update is not an error, names a strategy and
    /// advances progress. Updates to a finished job are ignored and return
    /// its unchanged snapshot.
    pub fn update_job(
        &self,
        id: Uuid,
        strategy: &str,
        progress: usize,
        status: JobStatus,
    ) -> Result<Job> {
        self.apply(id, strategy, progress, status, None)
    }

    /// End a job in the error state with a message.
    pub fn fail_job(&self, id: Uuid, message: &str) -> Result<Job> {
        let progress = self.get_job(id)?.progress;
        self.apply(id, "", progress, JobStatus::Error, Some(message))
    }

    fn apply(
        &self,
        id: Uuid,
        strategy: &str,
        progress: usize,
        status: JobStatus,
        error: Option<&str>,
    ) -> Result<Job> {
        let mut inner = self.inner.lock();

        let job = inner
            .jobs
            .get_mut(&id)
            .ok_or_else(|| AnalyzerError::NotFound(format!("job {id}")))?;

        if !job.status.can_transition_to(status) {
            tracing::debug!(job_id = %id, status = ?job.status, "Update on finished job ignored");
            return Ok(job.clone());
        }

        let previous = job.progress;
        let progress = progress.max(previous).min(job.total);

        job.progress = progress;
        job.status = status;
        if status != JobStatus::Error && !strategy.is_empty() && progress > previous {
            job.completed.push(strategy.to_string());
        }
        if let Some(message) = error {
            job.error = Some(message.to_string());
        }
        if status.is_terminal() {
            job.current.clear();
            job.completed_at = Some(Utc::now());
        } else {
            job.current = strategy.to_string();
        }

        let snapshot = job.clone();

        if status.is_terminal() {
            // Dropping the senders closes every channel after the final snapshot.
            if let Some(subs) = inner.subs.remove(&id) {
                for sub in &subs {
                    if sub.tx.try_send(snapshot.clone()).is_err() {
                        tracing::debug!(job_id = %id, subscriber = sub.id, "Terminal push deferred to fallback read");
                    }
                }
            }
        } else if let Some(subs) = inner.subs.get_mut(&id) {
            subs.retain(|sub| match sub.tx.try_send(snapshot.clone()) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => {
                    tracing::debug!(job_id = %id, subscriber = sub.id, "Subscriber buffer full, update dropped");
                    true
                }
                Err(TrySendError::Closed(_)) => false,
            });
        }

        Ok(snapshot)
    }

    pub fn get_job(&self, id: Uuid) -> Result<Job> {
        self.inner
            .lock()
            .jobs
            .get(&id)
            .cloned()
            .ok_or_else(|| AnalyzerError::NotFound(format!("job {id}")))
    }

    /// Jobs of one repository, oldest first.
    pub fn jobs_for_repo(&self, repo_id: Uuid) -> Vec<Job> {
        let mut jobs: Vec<Job> = self
            .inner
            .lock()
            .jobs
            .values()
            .filter(|j| j.repo_id == repo_id)
            .cloned()
            .collect();
        jobs.sort_by_key(|j| j.started_at);
        jobs
    }

    /// Most recently started running job of a repository.
    pub fn running_job_for_repo(&self, repo_id: Uuid) -> Option<Job> {
        self.jobs_for_repo(repo_id)
            .into_iter()
            .rev()
            .find(|j| j.status == JobStatus::Running)
    }

    /// Register a new subscriber. A finished job yields its final snapshot immediately.
    pub fn subscribe(self: &Arc<Self>, id: Uuid) -> Result<Subscription> {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_BUFFER);
        let mut inner = self.inner.lock();

        let job = inner
            .jobs
            .get(&id)
            .cloned()
            .ok_or_else(|| AnalyzerError::NotFound(format!("job {id}")))?;

        inner.next_sub_id += 1;
        let sub_id = inner.next_sub_id;

        if job.status.is_terminal() {
            // Buffer is empty, so this cannot fail; the sender drops right after.
            let _ = tx.try_send(job);
        } else {
            inner
                .subs
                .entry(id)
                .or_default()
                .push(Subscriber { id: sub_id, tx });
        }

        Ok(Subscription {
            job_id: id,
            sub_id,
            rx,
            tracker: Arc::clone(self),
            finished: false,
        })
    }

    /// Detach a subscriber, closing its channel. Returns false if it was already gone.
    pub fn unsubscribe(&self, id: Uuid, sub_id: u64) -> bool {
        let mut inner = self.inner.lock();
        let Some(subs) = inner.subs.get_mut(&id) else {
            return false;
        };
        let before = subs.len();
        subs.retain(|s| s.id != sub_id);
        let removed = subs.len() != before;
        if subs.is_empty() {
            inner.subs.remove(&id);
        }
        removed
    }

    pub fn subscriber_count(&self, id: Uuid) -> usize {
        self.inner.lock().subs.get(&id).map_or(0, Vec::len)
    }
}

/// A live feed of job snapshots. Dropping it unsubscribes.
pub struct Subscription {
    job_id: Uuid,
    sub_id: u64,
    rx: mpsc::Receiver<Job>,
    tracker: Arc<JobTracker>,
    finished: bool,
}

impl Subscription {
    pub fn job_id(&self) -> Uuid {
        self.job_id
    }

    pub fn id(&self) -> u64 {
        self.sub_id
    }

    /// Next snapshot. After the terminal snapshot has been yielded, returns `None`.
    pub async fn recv(&mut self) -> Option<Job> {
        if self.finished {
            return None;
        }

        match self.rx.recv().await {
            Some(job) => {
                if job.status.is_terminal() {
                    self.finished = true;
                }
                Some(job)
            }
            None => {
                self.finished = true;
                match self.tracker.get_job(self.job_id) {
                    Ok(job) if job.status.is_terminal() => Some(job),
                    _ => None,
                }
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.tracker.unsubscribe(self.job_id, self.sub_id);
    }
}
