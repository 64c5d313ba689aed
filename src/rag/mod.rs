//! Retrieval-augmented answers over indexed repository code.

pub mod indexer;
pub mod query;

pub use indexer::{IndexStats, RagIndexer};
pub use query::{RagQueryService, RagStream, NO_RESULTS_ANSWER};
