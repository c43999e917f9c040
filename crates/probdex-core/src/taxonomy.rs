//! Subject/unit master data and subject folding.
//!
//! The taxonomy is closed: every stored problem carries a (subject, unit)
//! pair drawn from it. It is built once at startup and shared by reference.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

pub const MATH_1: &str = "수학1";
pub const MATH_2: &str = "수학2";
pub const CALCULUS: &str = "미적분";
pub const GEOMETRY: &str = "기하";
pub const STATISTICS: &str = "확률과 통계";
/// Fallback subject and unit for pages that cannot be classified.
pub const UNCATEGORIZED: &str = "분류 불가";
/// Skeleton bucket shared by the common-section subjects.
pub const COMMON: &str = "공통";

/// Code used in derived IDs for subjects outside the taxonomy.
pub const UNKNOWN_SUBJECT_CODE: &str = "00";

/// One subject with its ID code and ordered unit list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectEntry {
    pub name: String,
    pub code: String,
    pub units: Vec<String>,
}

/// Immutable two-level subject → units taxonomy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Taxonomy {
    subjects: Vec<SubjectEntry>,
}

impl Taxonomy {
    /// Build a taxonomy from `(subject, code, units)` triples.
    pub fn new(entries: &[(&str, &str, &[&str])]) -> Self {
        let subjects = entries
            .iter()
            .map(|(name, code, units)| SubjectEntry {
                name: name.to_string(),
                code: code.to_string(),
                units: units.iter().map(|u| u.to_string()).collect(),
            })
            .collect();
        Self { subjects }
    }

    /// The CSAT mathematics taxonomy.
    pub fn standard() -> Self {
        Self::new(&[
            (MATH_1, "01", &["지수함수와 로그함수", "삼각함수", "수열"]),
            (MATH_2, "02", &["함수의 극한과 연속", "미분", "적분"]),
            (CALCULUS, "03", &["수열의 극한", "미분법", "적분법"]),
            (GEOMETRY, "04", &["이차곡선", "평면벡터", "공간도형과 공간좌표"]),
            (STATISTICS, "05", &["경우의 수", "확률", "통계"]),
            (UNCATEGORIZED, "99", &[UNCATEGORIZED]),
        ])
    }

    pub fn subjects(&self) -> &[SubjectEntry] {
        &self.subjects
    }

    pub fn subject_names(&self) -> impl Iterator<Item = &str> {
        self.subjects.iter().map(|s| s.name.as_str())
    }

    pub fn get(&self, subject: &str) -> Option<&SubjectEntry> {
        self.subjects.iter().find(|s| s.name == subject)
    }

    /// Valid units of a subject, in taxonomy order.
    pub fn units(&self, subject: &str) -> Option<&[String]> {
        self.get(subject).map(|s| s.units.as_slice())
    }

    /// Whether `(subject, unit)` is a valid pairing.
    pub fn contains(&self, subject: &str, unit: &str) -> bool {
        self.units(subject)
            .map(|units| units.iter().any(|u| u == unit))
            .unwrap_or(false)
    }

    /// Two-digit subject code, `"00"` for unknown subjects.
    pub fn subject_code(&self, subject: &str) -> &str {
        self.get(subject)
            .map(|s| s.code.as_str())
            .unwrap_or(UNKNOWN_SUBJECT_CODE)
    }
}

impl Default for Taxonomy {
    fn default() -> Self {
        Self::standard()
    }
}

/// Maps subject-specific names onto a shared skeleton bucket.
///
/// Skeleton rows for the common exam section are catalogued before the model
/// has decided between math-1 and math-2, so both fold into one bucket when
/// building merge keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectFold {
    pub bucket: String,
    pub members: BTreeSet<String>,
}

impl SubjectFold {
    pub fn new(bucket: impl Into<String>, members: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            bucket: bucket.into(),
            members: members.into_iter().map(Into::into).collect(),
        }
    }

    /// Fold a subject; subjects outside the member set pass through.
    pub fn fold<'a>(&'a self, subject: &'a str) -> &'a str {
        if self.members.contains(subject) {
            &self.bucket
        } else {
            subject
        }
    }
}

impl Default for SubjectFold {
    fn default() -> Self {
        Self::new(COMMON, [MATH_1, MATH_2])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_taxonomy_pairs() {
        let taxonomy = Taxonomy::standard();
        assert!(taxonomy.contains(MATH_1, "삼각함수"));
        assert!(taxonomy.contains(UNCATEGORIZED, UNCATEGORIZED));
        assert!(!taxonomy.contains(MATH_1, "미분법"));
        assert!(!taxonomy.contains(COMMON, "삼각함수"));
        assert_eq!(taxonomy.units(GEOMETRY).unwrap().len(), 3);
    }

    #[test]
    fn test_subject_codes() {
        let taxonomy = Taxonomy::standard();
        assert_eq!(taxonomy.subject_code(MATH_1), "01");
        assert_eq!(taxonomy.subject_code(STATISTICS), "05");
        assert_eq!(taxonomy.subject_code(UNCATEGORIZED), "99");
        assert_eq!(taxonomy.subject_code("물리"), "00");
    }

    #[test]
    fn test_fold_default_members() {
        let fold = SubjectFold::default();
        assert_eq!(fold.fold(MATH_1), COMMON);
        assert_eq!(fold.fold(MATH_2), COMMON);
        assert_eq!(fold.fold(CALCULUS), CALCULUS);
        assert_eq!(fold.fold(COMMON), COMMON);
    }

    #[test]
    fn test_fold_is_configurable() {
        let fold = SubjectFold::new("선택", [CALCULUS, GEOMETRY]);
        assert_eq!(fold.fold(GEOMETRY), "선택");
        assert_eq!(fold.fold(MATH_1), MATH_1);
    }
}
