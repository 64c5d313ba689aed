use anyhow::Context;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use super::ReportStore;
use crate::error::{AnalyzerError, Result};
use crate::models::StrategyReport;

/// Latest report per (repository, strategy), optionally mirrored to a JSON file.
pub struct JsonReportStore {
    reports: RwLock<Vec<StrategyReport>>,
    persist_path: Option<PathBuf>,
}

impl JsonReportStore {
    pub fn in_memory() -> Self {
        Self {
            reports: RwLock::new(Vec::new()),
            persist_path: None,
        }
    }

    pub fn open_or_create(path: &Path) -> anyhow::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let reports = if path.exists() {
            let raw = std::fs::read_to_string(path).context("Failed to read reports")?;
            serde_json::from_str(&raw).unwrap_or_default()
        } else {
            Vec::new()
        };

        Ok(Self {
            reports: RwLock::new(reports),
            persist_path: Some(path.to_path_buf()),
        })
    }

    fn persist(&self, reports: &[StrategyReport]) -> anyhow::Result<()> {
        let Some(path) = &self.persist_path else {
            return Ok(());
        };
        let raw = serde_json::to_string_pretty(reports)?;
        let tmp_path = path.with_extension("json.tmp");
        std::fs::write(&tmp_path, raw)?;
        std::fs::rename(&tmp_path, path)?;
        Ok(())
    }
}

#[async_trait]
impl ReportStore for JsonReportStore {
    async fn save(&self, report: StrategyReport) -> Result<()> {
        let mut reports = self.reports.write();
        reports.retain(|r| !(r.repo_id == report.repo_id && r.strategy == report.strategy));
        reports.push(report);
        self.persist(&reports)
            .context("Failed to persist reports")
            .map_err(AnalyzerError::storage)
    }

    async fn list(&self, repo_id: Uuid) -> Result<Vec<StrategyReport>> {
        Ok(self
            .reports
            .read()
            .iter()
            .filter(|r| r.repo_id == repo_id)
            .cloned()
            .collect())
    }

    async fn delete_repo(&self, repo_id: Uuid) -> Result<usize> {
        let mut reports = self.reports.write();
        let kept: Vec<StrategyReport> = reports
            .iter()
            .filter(|r| r.repo_id != repo_id)
            .cloned()
            .collect();
        let removed = reports.len() - kept.len();
        if removed == 0 {
            return Ok(0);
        }
        self.persist(&kept)
            .context("Failed to persist reports")
            .map_err(AnalyzerError::storage)?;
        *reports = kept;
        Ok(removed)
    }
}
