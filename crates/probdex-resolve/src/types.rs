//! Similarity types.

use serde::{Deserialize, Serialize};

use probdex_store::Candidate;

/// Default number of recommendations.
pub const DEFAULT_TOP_K: usize = probdex_core::config::DEFAULT_TOP_K;

/// Maximum points each signal contributes. The defaults sum to 100.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Weights {
    pub concepts: f64,
    pub logic: f64,
    pub pattern: f64,
    pub difficulty: f64,
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            concepts: 30.0,
            logic: 40.0,
            pattern: 20.0,
            difficulty: 10.0,
        }
    }
}

impl Weights {
    pub fn total(&self) -> f64 {
        self.concepts + self.logic + self.pattern + self.difficulty
    }
}

/// Per-signal points, each rounded to one decimal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    pub exact_match: bool,
    pub concept: f64,
    pub logic: f64,
    pub pattern: f64,
    pub difficulty: f64,
}

/// A ranked candidate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub candidate: Candidate,
    /// Total score rounded to two decimals.
    pub score: f64,
    pub details: ScoreBreakdown,
}

impl Recommendation {
    pub fn id(&self) -> i64 {
        self.candidate.id
    }

    pub fn is_exact_match(&self) -> bool {
        self.details.exact_match
    }
}
