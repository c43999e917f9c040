//! Subject normalization and derived problem IDs.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use tracing::warn;

use crate::taxonomy::{Taxonomy, CALCULUS, GEOMETRY, MATH_1, MATH_2, STATISTICS, UNCATEGORIZED};

/// Spelling and typography variants of subject names.
static SUBJECT_VARIANTS: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    let math_1 = [
        "수학1", "수학 1", "수학 Ⅰ", "수학Ⅰ", "수학 I", "수학I", "수학 i", "수학i", "수1",
        "수 1", "수Ⅰ", "수 Ⅰ", "수 I", "수I",
    ];
    let math_2 = [
        "수학2", "수학 2", "수학 Ⅱ", "수학Ⅱ", "수학 II", "수학II", "수학 ii", "수학ii", "수2",
        "수 2", "수Ⅱ", "수 Ⅱ", "수 II", "수II",
    ];
    let others = [
        ("미적", CALCULUS),
        ("미적분", CALCULUS),
        ("확통", STATISTICS),
        ("확률과 통계", STATISTICS),
        ("기벡", GEOMETRY),
        ("기하", GEOMETRY),
        ("기하와 벡터", GEOMETRY),
        (UNCATEGORIZED, UNCATEGORIZED),
        ("분류불가", UNCATEGORIZED),
    ];

    let mut map = HashMap::new();
    for v in math_1 {
        map.insert(v, MATH_1);
    }
    for v in math_2 {
        map.insert(v, MATH_2);
    }
    map.extend(others);
    map
});

/// Canonicalize a subject name.
///
/// Known variants map to their canonical subject. Anything else falls back to
/// its lowercased form with all whitespace removed.
pub fn normalize_subject(name: &str) -> String {
    let trimmed = name.trim();
    match SUBJECT_VARIANTS.get(trimmed) {
        Some(canonical) => canonical.to_string(),
        None => trimmed
            .chars()
            .filter(|c| !c.is_whitespace())
            .flat_map(char::to_lowercase)
            .collect(),
    }
}

/// Parse an exam month. `"csat"` is the November exam.
pub fn parse_month(month: &str) -> Option<u32> {
    let month = month.trim();
    if month.eq_ignore_ascii_case("csat") {
        return Some(11);
    }
    month.parse::<u32>().ok().filter(|m| (1..=12).contains(m))
}

/// Derive the composite problem ID `{year}{month:02}{number:02}{subject_code}`.
///
/// Returns `None` (and logs) when an input cannot be coerced: non-positive
/// year, unparseable month, negative number, or an ID that overflows `i64`.
pub fn generate_problem_id(
    taxonomy: &Taxonomy,
    year: i64,
    month: &str,
    number: i64,
    subject: &str,
) -> Option<i64> {
    let month_num = parse_month(month);
    let id = match month_num {
        Some(m) if year > 0 && number >= 0 => {
            let code = taxonomy.subject_code(subject);
            format!("{}{:02}{:02}{}", year, m, number, code)
                .parse::<i64>()
                .ok()
        }
        _ => None,
    };

    if id.is_none() {
        warn!(
            "Problem ID generation failed (year: {}, month: {}, number: {}, subject: {})",
            year, month, number, subject
        );
    }
    id
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_known_variants() {
        for v in ["수학 Ⅰ", "수I", "수학i", " 수 1 "] {
            assert_eq!(normalize_subject(v), MATH_1, "variant {:?}", v);
        }
        for v in ["수학II", "수 Ⅱ", "수2"] {
            assert_eq!(normalize_subject(v), MATH_2, "variant {:?}", v);
        }
        assert_eq!(normalize_subject("확통"), STATISTICS);
        assert_eq!(normalize_subject("기하와 벡터"), GEOMETRY);
        assert_eq!(normalize_subject("미적"), CALCULUS);
    }

    #[test]
    fn test_normalize_is_total() {
        assert_eq!(normalize_subject("Physics I"), "physicsi");
        assert_eq!(normalize_subject("분류불가"), UNCATEGORIZED);
        assert_eq!(normalize_subject(""), "");
    }

    #[test]
    fn test_problem_id_is_deterministic() {
        let taxonomy = Taxonomy::standard();
        let first = generate_problem_id(&taxonomy, 2024, "06", 24, MATH_1);
        let second = generate_problem_id(&taxonomy, 2024, "06", 24, MATH_1);
        assert_eq!(first, Some(2024062401));
        assert_eq!(first, second);
    }

    #[test]
    fn test_problem_id_month_forms() {
        let taxonomy = Taxonomy::standard();
        assert_eq!(generate_problem_id(&taxonomy, 2023, "9", 5, CALCULUS), Some(2023090503));
        assert_eq!(
            generate_problem_id(&taxonomy, 2025, "csat", 30, STATISTICS),
            Some(2025113005)
        );
        assert_eq!(generate_problem_id(&taxonomy, 2025, "11", 1, "물리"), Some(2025110100));
    }

    #[test]
    fn test_problem_id_invalid_inputs() {
        let taxonomy = Taxonomy::standard();
        assert_eq!(generate_problem_id(&taxonomy, 2024, "june", 3, MATH_1), None);
        assert_eq!(generate_problem_id(&taxonomy, 2024, "06", -1, MATH_1), None);
        assert_eq!(generate_problem_id(&taxonomy, 0, "06", 1, MATH_1), None);
        assert_eq!(generate_problem_id(&taxonomy, 2024, "13", 1, MATH_1), None);
    }
}
