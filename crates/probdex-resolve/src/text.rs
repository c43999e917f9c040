//! Text normalization and tokenization.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;

static TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\w\w+\b").unwrap());

/// Normalize a narrative for exact-match comparison.
///
/// Removes doubled then single backslashes (markup escapes), then keeps only
/// Hangul syllables and ASCII letters and digits.
pub fn normalize_text(text: &str) -> String {
    text.replace("\\\\", "")
        .replace('\\', "")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || ('가'..='힣').contains(c))
        .collect()
}

/// Lowercased tokens of two or more word characters.
pub fn tokenize(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    TOKEN
        .find_iter(&lower)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Jaccard overlap of two tag lists. 0 when both are empty.
pub fn jaccard(a: &[String], b: &[String]) -> f64 {
    let a: HashSet<&str> = a.iter().map(String::as_str).collect();
    let b: HashSet<&str> = b.iter().map(String::as_str).collect();
    let union = a.union(&b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(&b).count() as f64 / union as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_normalize_text() {
        assert_eq!(normalize_text(r"f(x) = \\frac{1}{2} x^2"), "fxfrac12x2");
        assert_eq!(normalize_text("도함수를 구한다 -> 극값!"), "도함수를구한다극값");
        assert_eq!(normalize_text("ㄱㄴ αβ"), "");
    }

    #[test]
    fn test_tokenize() {
        assert_eq!(tokenize("Find the MAX of f"), vec!["find", "the", "max", "of"]);
        assert_eq!(tokenize("도함수의 부호 x"), vec!["도함수의", "부호"]);
        assert!(tokenize("a b c").is_empty());
    }

    #[test]
    fn test_jaccard() {
        assert_eq!(jaccard(&[], &[]), 0.0);
        assert_eq!(jaccard(&tags(&["a", "b"]), &tags(&["b", "c"])), 1.0 / 3.0);
        assert_eq!(jaccard(&tags(&["a", "a"]), &tags(&["a"])), 1.0);
        assert_eq!(jaccard(&tags(&["a"]), &[]), 0.0);
    }
}
