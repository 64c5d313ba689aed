//! # repo-analyzer
//!
//! A Rust web service that runs AI analyses over locally checked-out
//! repositories as background jobs, streams their progress live, and answers
//! questions about the code through a retrieval-augmented (RAG) pipeline.
//!
//! ## Architecture
//!
//! ```text
//!   POST /api/analysis/run
//!            │
//!            ▼
//!   ┌─────────────────┐  create   ┌──────────────┐  snapshots  ┌──────────────┐
//!   │  Orchestrator   │──────────▶│  JobTracker  │────────────▶│ SSE streams  │
//!   └───────┬─────────┘  update   └──────────────┘  (bounded)  └──────────────┘
//!           │
//!     ┌─────┴────────────────────────┐
//!     ▼ strategy loop                ▼ indexing task (concurrent)
//!   ┌─────────────────┐            ┌─────────────────────────────┐
//!   │ StrategyEngine  │            │ chunk → embed_batch → store │
//!   │ 5 × chat + retry│            │     (one batch per file)    │
//!   └───────┬─────────┘            └──────────────┬──────────────┘
//!           ▼                                     ▼
//!   ┌─────────────────┐            ┌─────────────────────────────┐
//!   │   ReportStore   │            │         VectorStore         │
//!   └─────────────────┘            └──────────────┬──────────────┘
//!                                                 │ search_similar (top 10)
//!                                  ┌──────────────┴──────────────┐
//!                                  │  RagQueryService → chat     │
//!                                  └─────────────────────────────┘
//! ```
//!
//! ## Module Overview
//!
//! - [`config`] - Environment-based configuration for server, data dir, LLM endpoints and job limits
//! - [`error`] - `AnalyzerError` taxonomy and its HTTP status mapping
//! - [`models`] - Shared data types: `Repo`, `Job`, `CodeChunk`, reports, request/response types
//! - [`jobs`] - Job state machine and non-blocking progress subscriptions
//! - [`orchestrator`] - Background strategy loop with retries, failure reports and RAG indexing
//! - [`analysis`] - Strategy trait, ordered engine, the five prompt strategies, score extraction
//! - [`chunking`] - Line-window chunker with three-line overlap, language detection
//! - [`rag`] - Per-file indexer and the query service (blocking and streaming)
//! - [`llm`] - `AiProvider` trait and the Ollama / OpenAI-compatible HTTP provider
//! - [`store`] - Vector and report stores with JSON persistence
//! - [`repo`] - Repository catalog, file walking, analysis request building
//! - [`api`] - Axum HTTP handlers, including the SSE endpoints
//! - [`state`] - Shared application state wiring the components together

pub mod analysis;
pub mod api;
pub mod chunking;
pub mod config;
pub mod error;
pub mod jobs;
pub mod llm;
pub mod models;
pub mod orchestrator;
pub mod rag;
pub mod repo;
pub mod state;
pub mod store;
