//! Scripted in-process provider and fixtures shared by the integration tests.

#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream;
use parking_lot::Mutex;

use repo_analyzer::config::{AnalysisConfig, ContentLimits};
use repo_analyzer::llm::{AiProvider, ChatStream};
use repo_analyzer::models::{AddRepoRequest, Repo};
use repo_analyzer::repo::RepoCatalog;

pub const EMBED_DIM: usize = 8;

type ChatScript = Box<dyn Fn(&str, &str) -> anyhow::Result<String> + Send + Sync>;

/// Deterministic provider: embeddings are byte histograms, chat answers come from a script.
pub struct ScriptedProvider {
    chat_script: ChatScript,
    /// `embed_batch` fails for any batch containing this marker
    fail_embed_marker: Option<String>,
    /// `embed` (the query-time call) always fails
    fail_query_embed: bool,
    stream_fragments: Vec<String>,
    pub embed_batch_calls: AtomicUsize,
    pub chat_calls: Mutex<Vec<(String, String)>>,
    pub chat_stream_calls: AtomicUsize,
}

impl ScriptedProvider {
    pub fn answering(answer: &'static str) -> Self {
        Self::with_script(move |_, _| Ok(answer.to_string()))
    }

    pub fn with_script(
        script: impl Fn(&str, &str) -> anyhow::Result<String> + Send + Sync + 'static,
    ) -> Self {
        Self {
            chat_script: Box::new(script),
            fail_embed_marker: None,
            fail_query_embed: false,
            stream_fragments: vec!["The answer".to_string(), " is here.".to_string()],
            embed_batch_calls: AtomicUsize::new(0),
            chat_calls: Mutex::new(Vec::new()),
            chat_stream_calls: AtomicUsize::new(0),
        }
    }

    pub fn failing_embeddings_for(mut self, marker: &str) -> Self {
        self.fail_embed_marker = Some(marker.to_string());
        self
    }

    pub fn failing_query_embeddings(mut self) -> Self {
        self.fail_query_embed = true;
        self
    }

    pub fn chat_count(&self) -> usize {
        self.chat_calls.lock().len()
    }
}

pub fn histogram(text: &str) -> Vec<f32> {
    let mut v = vec![0.0f32; EMBED_DIM];
    for b in text.bytes() {
        v[(b as usize) % EMBED_DIM] += 1.0;
    }
    v
}

#[async_trait]
impl AiProvider for ScriptedProvider {
    fn model_name(&self) -> &str {
        "scripted"
    }

    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        if self.fail_query_embed {
            anyhow::bail!("embedding endpoint unavailable");
        }
        Ok(histogram(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        self.embed_batch_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(marker) = &self.fail_embed_marker {
            if texts.iter().any(|t| t.contains(marker.as_str())) {
                anyhow::bail!("embedding backend rejected batch");
            }
        }
        Ok(texts.iter().map(|t| histogram(t)).collect())
    }

    async fn chat(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        _context: &[String],
    ) -> anyhow::Result<String> {
        self.chat_calls
            .lock()
            .push((system_prompt.to_string(), user_prompt.to_string()));
        (self.chat_script)(system_prompt, user_prompt)
    }

    async fn chat_stream(
        &self,
        _system_prompt: &str,
        _user_prompt: &str,
        _context: &[String],
    ) -> anyhow::Result<ChatStream> {
        self.chat_stream_calls.fetch_add(1, Ordering::SeqCst);
        let items: Vec<anyhow::Result<String>> =
            self.stream_fragments.iter().cloned().map(Ok).collect();
        Ok(Box::pin(stream::iter(items)))
    }
}

/// Fast-retry analysis settings for tests.
pub fn test_analysis_config() -> AnalysisConfig {
    AnalysisConfig {
        retry_delay: Duration::ZERO,
        rag_indexing: false,
        ..AnalysisConfig::default()
    }
}

/// A small checkout with a couple of source files.
pub fn write_sample_checkout(root: &Path) {
    std::fs::create_dir_all(root.join("src")).unwrap();
    std::fs::write(
        root.join("src/main.rs"),
        "fn main() {\n    let token = std::env::var(\"TOKEN\");\n    println!(\"{token:?}\");\n}\n",
    )
    .unwrap();
    std::fs::write(
        root.join("src/auth.rs"),
        "pub fn login(user: &str, password: &str) -> bool {\n    user == \"admin\" && password == \"secret\"\n}\n",
    )
    .unwrap();
    std::fs::write(root.join("README.md"), "# Demo\n\nA demo service.\n").unwrap();
}

pub fn register(catalog: &RepoCatalog, root: &Path, language: Option<&str>) -> Repo {
    catalog
        .add(AddRepoRequest {
            name: "demo".to_string(),
            local_path: root.to_string_lossy().to_string(),
            report_language: language.map(|l| l.to_string()),
        })
        .unwrap()
}

pub fn catalog() -> Arc<RepoCatalog> {
    Arc::new(RepoCatalog::in_memory(ContentLimits::default()))
}
