//! Runtime pipelines: wires extraction, merge, persistence and similarity
//! into the corpus-maintenance and search flows.
//!
//! Progress is reported as [`PipelineEvent`]s over an optional channel; the
//! caller decides how to present them.

pub mod orchestrator;
pub mod types;

pub use orchestrator::{initialize_corpus, list_documents, Pipeline};
pub use types::*;
