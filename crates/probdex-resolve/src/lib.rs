//! Similarity engine: scores a query problem against unit-scoped candidates
//! and ranks the best matches.
//!
//! Four signals feed the weighted score: concept overlap, logic-flow text
//! similarity, pattern/pitfall text similarity, and difficulty proximity. A
//! recurring logic narrative short-circuits scoring entirely.

pub mod engine;
pub mod text;
pub mod tfidf;
pub mod types;

pub use engine::SimilarityEngine;
pub use types::*;
