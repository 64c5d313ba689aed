use axum::routing::{get, post};
use axum::Router;
use tracing_subscriber::EnvFilter;

use repo_analyzer::api;
use repo_analyzer::config::Config;
use repo_analyzer::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env();
    tracing::info!("Data directory: {}", config.data_dir.display());
    tracing::info!(
        "LLM provider: {} (chat {} @ {}, embed {} @ {})",
        config.llm.provider,
        config.llm.chat.model,
        config.llm.chat.base_url,
        config.llm.embed.model,
        config.llm.embed.base_url
    );
    if config.analysis.single_flight {
        tracing::info!("Single-flight analysis enabled");
    }

    let state = AppState::new(config.clone())?;

    let app = Router::new()
        .route("/api/health", get(api::health))
        .route("/api/repos", get(api::repos::list_repos))
        .route("/api/repos", post(api::repos::add_repo))
        .route(
            "/api/repos/{id}/reports",
            get(api::repos::list_reports).delete(api::repos::delete_reports),
        )
        .route("/api/analysis/strategies", get(api::analysis::list_strategies))
        .route("/api/analysis/run", post(api::analysis::run_analysis))
        .route("/api/jobs/{id}", get(api::jobs::get_job))
        .route("/api/jobs/{id}/stream", get(api::jobs::stream_job))
        .route("/api/rag/query", post(api::rag::query))
        .route("/api/rag/stream", post(api::rag::stream))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}
