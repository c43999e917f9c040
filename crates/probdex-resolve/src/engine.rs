//! Weighted similarity scoring with an exact-match fast path.

use std::cmp::Ordering;

use tracing::{debug, info};

use crate::text::{jaccard, normalize_text};
use crate::tfidf::cosine_similarity;
use crate::types::*;
use probdex_core::Analysis;
use probdex_store::Candidate;

/// Difficulty gap at which proximity reaches zero.
const DIFFICULTY_SPAN: f64 = 4.0;

/// Scores query analyses against candidates and ranks them.
#[derive(Debug, Clone, Default)]
pub struct SimilarityEngine {
    weights: Weights,
}

impl SimilarityEngine {
    pub fn new(weights: Weights) -> Self {
        Self { weights }
    }

    /// Score one candidate. Never fails; degenerate inputs contribute 0.
    pub fn score(&self, query: &Analysis, candidate: &Candidate) -> (f64, ScoreBreakdown) {
        let concept = jaccard(&query.core_concepts, &candidate.core_concepts) * self.weights.concepts;
        let logic = cosine_similarity(&query.logic_flow, &candidate.logic_flow) * self.weights.logic;

        let query_goal = join_tags(&query.pattern_type, &query.pitfalls);
        let candidate_goal = join_tags(&candidate.pattern_type, &candidate.pitfalls);
        let pattern = cosine_similarity(&query_goal, &candidate_goal) * self.weights.pattern;

        let difficulty = self.difficulty_points(query.difficulty, candidate.difficulty);

        let total = round_to(concept + logic + pattern + difficulty, 2);
        let details = ScoreBreakdown {
            exact_match: false,
            concept: round_to(concept, 1),
            logic: round_to(logic, 1),
            pattern: round_to(pattern, 1),
            difficulty: round_to(difficulty, 1),
        };
        (total, details)
    }

    /// Linear proximity: full weight at gap 0, zero from gap 4 on.
    /// Unknown difficulty on either side contributes nothing.
    fn difficulty_points(&self, query: Option<u8>, candidate: Option<u8>) -> f64 {
        match (query, candidate) {
            (Some(a), Some(b)) => {
                let gap = (a as f64 - b as f64).abs();
                ((DIFFICULTY_SPAN - gap) / DIFFICULTY_SPAN).max(0.0) * self.weights.difficulty
            }
            _ => 0.0,
        }
    }

    /// First candidate whose normalized logic flow contains, or is contained
    /// in, the normalized query narrative.
    pub fn find_exact_match<'a>(&self, query: &Analysis, candidates: &'a [Candidate]) -> Option<&'a Candidate> {
        let needle = normalize_text(&query.logic_flow);
        if needle.is_empty() {
            return None;
        }
        candidates.iter().find(|candidate| {
            let hay = normalize_text(&candidate.logic_flow);
            // An empty narrative is contained in every query, so it never counts as exact.
            !hay.is_empty() && (hay.contains(&needle) || needle.contains(&hay))
        })
    }

    /// Rank `candidates` against `query` and keep the best `top_k`.
    ///
    /// An exact match returns that candidate alone with full marks. Ties keep
    /// their input order.
    pub fn recommend(&self, query: &Analysis, candidates: &[Candidate], top_k: usize) -> Vec<Recommendation> {
        if let Some(candidate) = self.find_exact_match(query, candidates) {
            info!("Exact logic match found: problem {}", candidate.id);
            return vec![Recommendation {
                candidate: candidate.clone(),
                score: round_to(self.weights.total(), 2),
                details: ScoreBreakdown {
                    exact_match: true,
                    concept: self.weights.concepts,
                    logic: self.weights.logic,
                    pattern: self.weights.pattern,
                    difficulty: self.weights.difficulty,
                },
            }];
        }

        let mut results: Vec<Recommendation> = candidates
            .iter()
            .map(|candidate| {
                let (score, details) = self.score(query, candidate);
                Recommendation {
                    candidate: candidate.clone(),
                    score,
                    details,
                }
            })
            .collect();

        results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        results.truncate(top_k);

        debug!(
            "Ranked {} candidates, kept {} (best {:?})",
            candidates.len(),
            results.len(),
            results.first().map(|r| r.score)
        );
        results
    }
}

fn join_tags(pattern: &[String], pitfalls: &[String]) -> String {
    pattern
        .iter()
        .chain(pitfalls)
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(" ")
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn query(logic: &str, difficulty: Option<u8>) -> Analysis {
        Analysis {
            core_concepts: strings(&["도함수", "극값"]),
            logic_flow: logic.into(),
            pattern_type: strings(&["그래프 추론"]),
            pitfalls: strings(&["부호 판정 누락"]),
            difficulty,
        }
    }

    fn candidate(id: i64, logic: &str, difficulty: Option<u8>) -> Candidate {
        Candidate {
            id,
            pattern_type: strings(&["그래프 추론"]),
            logic_flow: logic.into(),
            pitfalls: strings(&["부호 판정 누락"]),
            difficulty,
            core_concepts: strings(&["도함수", "극값"]),
            image_path: None,
            source_text: format!("problem {}", id),
        }
    }

    #[test]
    fn test_identical_inputs_score_full_marks() {
        let engine = SimilarityEngine::default();
        let (score, details) = engine.score(
            &query("differentiate then check sign changes", Some(3)),
            &candidate(1, "differentiate then check sign changes", Some(3)),
        );
        assert_eq!(score, 100.0);
        assert_eq!(details.concept, 30.0);
        assert_eq!(details.logic, 40.0);
        assert_eq!(details.pattern, 20.0);
        assert_eq!(details.difficulty, 10.0);
        assert!(!details.exact_match);
    }

    #[test]
    fn test_difficulty_proximity() {
        let engine = SimilarityEngine::default();
        assert_eq!(engine.difficulty_points(Some(3), Some(3)), 10.0);
        assert_eq!(engine.difficulty_points(Some(3), Some(4)), 7.5);
        assert_eq!(engine.difficulty_points(Some(2), Some(4)), 5.0);
        assert_eq!(engine.difficulty_points(Some(1), Some(5)), 0.0);
        assert_eq!(engine.difficulty_points(None, Some(3)), 0.0);
        assert_eq!(engine.difficulty_points(Some(3), None), 0.0);
    }

    #[test]
    fn test_exact_match_short_circuits() {
        let engine = SimilarityEngine::default();
        let candidates = vec![
            candidate(1, "completely different path", Some(1)),
            candidate(2, "f'(x) = 0 을 풀고 증감표를 그린다", None),
            candidate(3, "f'(x)=0을 풀고 증감표를 그린다", Some(3)),
        ];
        let results = engine.recommend(&query("f'(x)=0을 풀고 증감표를", Some(5)), &candidates, 4);

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id(), 2);
        assert_eq!(results[0].score, 100.0);
        assert!(results[0].is_exact_match());
        assert_eq!(results[0].details.logic, 40.0);
        assert_eq!(results[0].details.difficulty, 10.0);
    }

    #[test]
    fn test_blank_narratives_never_exact_match() {
        let engine = SimilarityEngine::default();
        let candidates = vec![candidate(1, "", Some(2)), candidate(2, "???", Some(2))];

        assert!(engine.find_exact_match(&query("some logic", Some(2)), &candidates).is_none());
        assert!(engine.find_exact_match(&query("!!", Some(2)), &candidates).is_none());
    }

    #[test]
    fn test_ranking_is_stable_with_ties() {
        let engine = SimilarityEngine::default();
        let candidates: Vec<Candidate> = (1..=6)
            .map(|id| candidate(id, "integrate by parts twice", Some(2)))
            .chain(std::iter::once(candidate(7, "integrate by parts once", Some(3))))
            .collect();
        let q = query("substitute and integrate by parts", Some(3));

        let results = engine.recommend(&q, &candidates, 4);
        assert_eq!(results.len(), 4);
        assert_eq!(results[0].id(), 7);
        assert_eq!(
            results[1..].iter().map(Recommendation::id).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        assert!(results.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[test]
    fn test_degenerate_candidates_score_zero() {
        let engine = SimilarityEngine::default();
        let empty = Candidate::default();
        let (score, details) = engine.score(&Analysis::default(), &empty);
        assert_eq!(score, 0.0);
        assert_eq!(details, ScoreBreakdown::default());
        assert!(engine.recommend(&query("x y", Some(1)), &[], 4).is_empty());
    }

    #[test]
    fn test_rounding() {
        assert_eq!(round_to(12.345678, 2), 12.35);
        assert_eq!(round_to(7.46, 1), 7.5);
        assert_eq!(round_to(33.33333, 1), 33.3);
    }
}
