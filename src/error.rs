use axum::http::StatusCode;

/// Error taxonomy shared by the job tracker, orchestrator, RAG pipeline and stores.
#[derive(Debug, thiserror::Error)]
pub enum AnalyzerError {
    /// Unknown strategy name or an unusable provider setting.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// Embedding or chat call failure.
    #[error("provider error: {0}")]
    Provider(String),
    /// Vector, report or catalog read/write failure.
    #[error("storage error: {0}")]
    Storage(String),
    /// Unknown job, repository or snapshot id.
    #[error("{0} not found")]
    NotFound(String),
    /// Malformed or unserviceable request.
    #[error("invalid request: {0}")]
    Validation(String),
}

pub type Result<T, E = AnalyzerError> = std::result::Result<T, E>;

impl AnalyzerError {
    /// Wrap an `anyhow` chain from a provider call, keeping the full context.
    pub fn provider(err: anyhow::Error) -> Self {
        Self::Provider(format!("{err:#}"))
    }

    pub fn storage(err: anyhow::Error) -> Self {
        Self::Storage(format!("{err:#}"))
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AnalyzerError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AnalyzerError::Provider(_) => StatusCode::BAD_GATEWAY,
            AnalyzerError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AnalyzerError::NotFound(_) => StatusCode::NOT_FOUND,
            AnalyzerError::Validation(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl From<AnalyzerError> for (StatusCode, String) {
    fn from(err: AnalyzerError) -> Self {
        (err.status_code(), err.to_string())
    }
}
