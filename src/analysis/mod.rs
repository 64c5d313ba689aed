//! Strategy engine: named, independent analyses over one repository request.

pub mod score;
pub mod strategies;

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::{AnalyzerError, Result};
use crate::llm::AiProvider;
use crate::models::{AnalysisRequest, AnalysisResult, StrategyInfo};

pub use score::extract_score;

#[async_trait]
pub trait Strategy: Send + Sync {
    /// Unique registry key, e.g. "architecture"
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    async fn analyze(&self, req: &AnalysisRequest) -> Result<AnalysisResult>;
}

/// Ordered strategy registry. Order drives progress reporting.
#[derive(Clone)]
pub struct StrategyEngine {
    strategies: Vec<Arc<dyn Strategy>>,
}

impl StrategyEngine {
    /// Later registrations with a name already taken are ignored.
    pub fn new(strategies: Vec<Arc<dyn Strategy>>) -> Self {
        let mut unique: Vec<Arc<dyn Strategy>> = Vec::with_capacity(strategies.len());
        for s in strategies {
            if unique.iter().any(|u| u.name() == s.name()) {
                tracing::warn!(strategy = s.name(), "Duplicate strategy ignored");
                continue;
            }
            unique.push(s);
        }
        Self { strategies: unique }
    }

    /// The five prompt strategies, in their standard order.
    pub fn with_defaults(provider: Arc<dyn AiProvider>) -> Self {
        let strategies = strategies::DEFAULT_STRATEGIES
            .into_iter()
            .map(|def| {
                Arc::new(strategies::PromptStrategy::new(def, provider.clone())) as Arc<dyn Strategy>
            })
            .collect();
        Self::new(strategies)
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.strategies.iter().map(|s| s.name().to_string()).collect()
    }

    pub fn infos(&self) -> Vec<StrategyInfo> {
        self.strategies
            .iter()
            .map(|s| StrategyInfo {
                name: s.name().to_string(),
                description: s.description().to_string(),
            })
            .collect()
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn Strategy>> {
        self.strategies
            .iter()
            .find(|s| s.name() == name)
            .cloned()
            .ok_or_else(|| AnalyzerError::Configuration(format!("unknown strategy: {name}")))
    }

    /// Run one strategy by name.
    pub async fn run(&self, name: &str, req: &AnalysisRequest) -> Result<AnalysisResult> {
        let strategy = self.get(name)?;
        tracing::info!(strategy = name, repo_id = %req.repo_id, "Running analysis strategy");
        strategy.analyze(req).await
    }
}

const LANGUAGE_NAMES: &[(&str, &str)] = &[
    ("es", "Spanish"),
    ("pt", "Portuguese"),
    ("fr", "French"),
    ("de", "German"),
    ("it", "Italian"),
    ("ja", "Japanese"),
    ("ko", "Korean"),
    ("zh", "Chinese"),
];

/// Whether reports for this language need a translation pass.
pub fn needs_translation(language: Option<&str>) -> bool {
    matches!(language, Some(l) if !l.is_empty() && l != "en")
}

/// Translate a Markdown report. Returns an empty string when the call fails.
pub async fn translate_report(provider: &dyn AiProvider, markdown: &str, language: &str) -> String {
    let language_name = LANGUAGE_NAMES
        .iter()
        .find(|(code, _)| *code == language)
        .map(|(_, name)| *name)
        .unwrap_or(language);

    let system_prompt = format!(
        "Translate the following technical report to {language_name}.\n\
         Keep Markdown formatting, Mermaid diagrams, code blocks and technical terms unchanged.\n\
         Translate only the natural language text and add no commentary."
    );

    match provider.chat(&system_prompt, markdown, &[]).await {
        Ok(translated) => translated,
        Err(e) => {
            tracing::error!(language, error = %e, "Report translation failed");
            String::new()
        }
    }
}
