use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Where the repo catalog, vectors and reports are stored
    pub data_dir: PathBuf,
    /// Server bind address
    pub bind_addr: String,
    /// LLM provider configuration
    pub llm: LlmConfig,
    /// Analysis job behaviour
    pub analysis: AnalysisConfig,
    /// Limits used when turning a checkout into requests and index input
    pub content: ContentLimits,
}

/// One HTTP endpoint of the provider. Chat and embeddings may live on
/// different hosts with different credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    pub base_url: String,
    pub model: String,
    /// Bearer token (Ollama Cloud or an OpenAI-compatible gateway)
    pub token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// "ollama" or "openai"
    pub provider: String,
    pub chat: EndpointConfig,
    pub embed: EndpointConfig,
    /// Embedding vector dimension
    pub embedding_dim: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Total attempts per strategy (initial + retries)
    pub max_attempts: usize,
    /// Sleep between attempts
    pub retry_delay: Duration,
    /// Reuse a running job for the same repository instead of starting another
    pub single_flight: bool,
    /// Build the vector index alongside the strategy loop
    pub rag_indexing: bool,
    /// Close a job stream after this long without an event
    pub stream_idle_timeout: Duration,
    /// Whitespace tokens per RAG chunk
    pub chunk_tokens: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentLimits {
    pub max_excerpts: usize,
    pub max_excerpt_file_bytes: u64,
    pub max_excerpt_total_chars: usize,
    pub max_index_file_bytes: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            bind_addr: "127.0.0.1:3001".to_string(),
            llm: LlmConfig::default(),
            analysis: AnalysisConfig::default(),
            content: ContentLimits::default(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            chat: EndpointConfig {
                base_url: "http://localhost:11434".to_string(),
                model: "qwen3".to_string(),
                token: None,
            },
            embed: EndpointConfig {
                base_url: "http://localhost:11434".to_string(),
                model: "bge-m3".to_string(),
                token: None,
            },
            embedding_dim: 1024,
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_delay: Duration::from_secs(5),
            single_flight: false,
            rag_indexing: true,
            stream_idle_timeout: Duration::from_secs(300),
            chunk_tokens: 512,
        }
    }
}

impl Default for ContentLimits {
    fn default() -> Self {
        Self {
            max_excerpts: 30,
            max_excerpt_file_bytes: 8_000,
            max_excerpt_total_chars: 60_000,
            max_index_file_bytes: 50_000,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(dir) = std::env::var("ANALYZER_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Ok(addr) = std::env::var("ANALYZER_BIND_ADDR") {
            config.bind_addr = addr;
        }

        // LLM_BASE_URL sets both endpoints; the per-capability vars win.
        if let Ok(provider) = std::env::var("LLM_PROVIDER") {
            config.llm.provider = provider;
        }
        if let Ok(url) = std::env::var("LLM_BASE_URL") {
            config.llm.chat.base_url = url.clone();
            config.llm.embed.base_url = url;
        }
        if let Ok(url) = std::env::var("LLM_CHAT_URL") {
            config.llm.chat.base_url = url;
        }
        if let Ok(url) = std::env::var("LLM_EMBED_URL") {
            config.llm.embed.base_url = url;
        }
        if let Ok(model) = std::env::var("LLM_CHAT_MODEL") {
            config.llm.chat.model = model;
        }
        if let Ok(model) = std::env::var("LLM_EMBEDDING_MODEL") {
            config.llm.embed.model = model;
        }
        if let Ok(key) = std::env::var("LLM_API_KEY") {
            config.llm.chat.token = Some(key.clone());
            config.llm.embed.token = Some(key);
        }
        if let Ok(token) = std::env::var("LLM_CHAT_TOKEN") {
            config.llm.chat.token = Some(token);
        }
        if let Ok(token) = std::env::var("LLM_EMBED_TOKEN") {
            config.llm.embed.token = Some(token);
        }
        if let Ok(dim) = std::env::var("LLM_EMBEDDING_DIM") {
            if let Ok(d) = dim.parse() {
                config.llm.embedding_dim = d;
            }
        }

        if let Ok(val) = std::env::var("ANALYZER_MAX_ATTEMPTS") {
            if let Ok(v) = val.parse::<usize>() {
                config.analysis.max_attempts = v.max(1);
            }
        }
        if let Ok(val) = std::env::var("ANALYZER_RETRY_DELAY_SECS") {
            if let Ok(v) = val.parse() {
                config.analysis.retry_delay = Duration::from_secs(v);
            }
        }
        if let Ok(val) = std::env::var("ANALYZER_SINGLE_FLIGHT") {
            config.analysis.single_flight = parse_flag(&val);
        }
        if let Ok(val) = std::env::var("ANALYZER_RAG_INDEXING") {
            config.analysis.rag_indexing = parse_flag(&val);
        }
        if let Ok(val) = std::env::var("ANALYZER_STREAM_IDLE_SECS") {
            if let Ok(v) = val.parse() {
                config.analysis.stream_idle_timeout = Duration::from_secs(v);
            }
        }
        if let Ok(val) = std::env::var("ANALYZER_CHUNK_TOKENS") {
            if let Ok(v) = val.parse::<usize>() {
                config.analysis.chunk_tokens = v.max(1);
            }
        }
        if let Ok(val) = std::env::var("ANALYZER_MAX_INDEX_FILE_BYTES") {
            if let Ok(v) = val.parse() {
                config.content.max_index_file_bytes = v;
            }
        }

        config
    }

    pub fn vector_dir(&self) -> PathBuf {
        self.data_dir.join("vectors")
    }

    pub fn reports_path(&self) -> PathBuf {
        self.data_dir.join("reports.json")
    }

    pub fn catalog_path(&self) -> PathBuf {
        self.data_dir.join("repos.json")
    }
}

fn parse_flag(val: &str) -> bool {
    matches!(
        val.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
