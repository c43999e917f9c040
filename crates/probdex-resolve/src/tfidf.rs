//! Pairwise TF-IDF cosine similarity.
//!
//! The corpus is exactly the two texts being compared. Term weights are raw
//! counts times smoothed IDF `ln((1 + n) / (1 + df)) + 1`, and each vector is
//! L2-normalized before the dot product.

use std::collections::{BTreeMap, HashMap};

use crate::text::tokenize;

/// TF-IDF weights fitted on a small document set.
#[derive(Debug, Clone)]
pub struct TfidfIndex {
    doc_freq: HashMap<String, usize>,
    total_docs: usize,
}

impl TfidfIndex {
    /// Fit document frequencies on `documents`.
    pub fn new(documents: &[&str]) -> Self {
        let mut doc_freq: HashMap<String, usize> = HashMap::new();
        for doc in documents {
            let mut seen: Vec<String> = tokenize(doc);
            seen.sort();
            seen.dedup();
            for token in seen {
                *doc_freq.entry(token).or_insert(0) += 1;
            }
        }
        Self {
            doc_freq,
            total_docs: documents.len(),
        }
    }

    /// Smoothed inverse document frequency of a fitted term.
    pub fn idf(&self, term: &str) -> Option<f64> {
        self.doc_freq.get(term).map(|&df| {
            ((1.0 + self.total_docs as f64) / (1.0 + df as f64)).ln() + 1.0
        })
    }

    pub fn vocabulary_len(&self) -> usize {
        self.doc_freq.len()
    }

    /// L2-normalized TF-IDF vector of `text`. Empty when no token is known.
    pub fn vectorize(&self, text: &str) -> BTreeMap<String, f64> {
        let mut counts: BTreeMap<String, f64> = BTreeMap::new();
        for token in tokenize(text) {
            *counts.entry(token).or_insert(0.0) += 1.0;
        }

        let mut vector: BTreeMap<String, f64> = counts
            .into_iter()
            .filter_map(|(term, tf)| self.idf(&term).map(|idf| (term, tf * idf)))
            .collect();

        let norm = vector.values().map(|w| w * w).sum::<f64>().sqrt();
        if norm > 0.0 {
            for weight in vector.values_mut() {
                *weight /= norm;
            }
        } else {
            vector.clear();
        }
        vector
    }
}

/// Cosine similarity of two texts in `[0, 1]`.
///
/// 0 when either text is blank or the pair shares no vocabulary.
pub fn cosine_similarity(a: &str, b: &str) -> f64 {
    if a.trim().is_empty() || b.trim().is_empty() {
        return 0.0;
    }

    let index = TfidfIndex::new(&[a, b]);
    if index.vocabulary_len() == 0 {
        return 0.0;
    }

    let va = index.vectorize(a);
    let vb = index.vectorize(b);
    let dot: f64 = va
        .iter()
        .filter_map(|(term, wa)| vb.get(term).map(|wb| wa * wb))
        .sum();
    dot.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_texts() {
        let text = "도함수를 구하고 부호 변화를 조사한다";
        assert!((cosine_similarity(text, text) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_disjoint_texts() {
        assert_eq!(cosine_similarity("alpha beta", "gamma delta"), 0.0);
    }

    #[test]
    fn test_blank_or_tokenless() {
        assert_eq!(cosine_similarity("", "alpha"), 0.0);
        assert_eq!(cosine_similarity("   ", "alpha"), 0.0);
        assert_eq!(cosine_similarity("a b", "c d"), 0.0);
        assert_eq!(cosine_similarity("a b", "alpha"), 0.0);
    }

    #[test]
    fn test_smoothed_idf_weights() {
        let index = TfidfIndex::new(&["shared only", "shared"]);
        assert_eq!(index.idf("shared"), Some(1.0));
        let only = index.idf("only").unwrap();
        assert!((only - ((3.0_f64 / 2.0).ln() + 1.0)).abs() < 1e-12);
        assert_eq!(index.idf("missing"), None);
    }

    #[test]
    fn test_partial_overlap() {
        // Two terms each; "shared" has idf 1, the others ln(1.5) + 1.
        let unique = (1.5_f64).ln() + 1.0;
        let expected = 1.0 / (1.0 + unique * unique);
        let score = cosine_similarity("shared left", "shared right");
        assert!((score - expected).abs() < 1e-9, "score {}", score);
    }
}
