//! Merge engine: reconcile extracted rows into the skeleton dataset.
//!
//! Skeleton rows and extracted rows share a secondary key of
//! (year, month, number, folded subject). Folding lets a common-section
//! skeleton row (`공통`) match an extracted row whose subject is already
//! resolved to 수학1 or 수학2.

use std::collections::HashMap;

use serde::Serialize;
use tracing::{debug, info, warn};

use probdex_core::identity::parse_month;
use probdex_core::{DatasetRow, SubjectFold};

/// Secondary merge key. The folded subject never leaves this module.
type MergeKey = (i64, u32, i64, String);

/// Counts from one merge pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    pub updated: usize,
    pub inserted: usize,
    pub skipped: usize,
}

/// Reconciles extracted rows against the canonical dataset.
pub struct MergeEngine {
    fold: SubjectFold,
}

impl MergeEngine {
    pub fn new(fold: SubjectFold) -> Self {
        Self { fold }
    }

    fn key(&self, row: &DatasetRow) -> Option<MergeKey> {
        let year = row.year?;
        let month = parse_month(row.month.as_deref()?)?;
        let number = row.number?;
        let subject = row.subject_name.as_deref()?.trim();
        if subject.is_empty() {
            return None;
        }
        Some((year, month, number, self.fold.fold(subject).to_string()))
    }

    /// Merge `extracted` into `dataset` in place.
    ///
    /// Matching rows get `problem_id`, `subject_name`, `unit_name` and
    /// `ai_analysis` overwritten; every other field keeps its skeleton value.
    /// Unmatched rows are appended. Merging the same input twice changes
    /// nothing the second time.
    pub fn merge(&self, dataset: &mut Vec<DatasetRow>, extracted: &[DatasetRow]) -> MergeReport {
        let mut index: HashMap<MergeKey, Vec<usize>> = HashMap::new();
        for (i, row) in dataset.iter().enumerate() {
            if let Some(key) = self.key(row) {
                index.entry(key).or_default().push(i);
            }
        }

        let mut report = MergeReport::default();
        for row in extracted {
            let Some(key) = self.key(row) else {
                warn!(
                    "Skipping extracted row missing a key field (year={:?}, month={:?}, number={:?}, subject={:?})",
                    row.year, row.month, row.number, row.subject_name
                );
                report.skipped += 1;
                continue;
            };

            match index.get(&key) {
                Some(positions) => {
                    for &i in positions {
                        let target = &mut dataset[i];
                        target.problem_id = row.problem_id;
                        target.subject_name = row.subject_name.clone();
                        target.unit_name = row.unit_name.clone();
                        target.ai_analysis = row.ai_analysis.clone();
                    }
                    report.updated += 1;
                }
                None => {
                    debug!("No skeleton row for {:?}, appending", key);
                    index.entry(key).or_default().push(dataset.len());
                    dataset.push(row.clone());
                    report.inserted += 1;
                }
            }
        }

        info!(
            "Merge complete: {} updated, {} inserted, {} skipped",
            report.updated, report.inserted, report.skipped
        );
        report
    }
}

impl Default for MergeEngine {
    fn default() -> Self {
        Self::new(SubjectFold::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use probdex_core::taxonomy::{CALCULUS, COMMON, MATH_1};
    use probdex_core::Analysis;

    fn skeleton(year: i64, month: &str, number: i64, subject: &str) -> DatasetRow {
        DatasetRow {
            source_data: Some(format!("{}학년도 {}월 {} {}번", year, month, subject, number)),
            subject_name: Some(subject.into()),
            year: Some(year),
            month: Some(month.into()),
            number: Some(number),
            problem_image_path: Some(format!("kice_{}_{}_common_p8.png", year, month)),
            ..Default::default()
        }
    }

    fn extracted(year: i64, month: &str, number: i64, subject: &str, unit: &str, id: i64) -> DatasetRow {
        DatasetRow {
            problem_id: Some(id),
            subject_name: Some(subject.into()),
            unit_name: Some(unit.into()),
            year: Some(year),
            month: Some(month.into()),
            number: Some(number),
            ai_analysis: Some(Analysis {
                core_concepts: vec!["등차수열".into()],
                logic_flow: "합을 구한다".into(),
                difficulty: Some(3),
                ..Default::default()
            }),
            problem_image_path: Some("ignored.png".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_common_skeleton_receives_math_1_row() {
        let engine = MergeEngine::default();
        let mut dataset = vec![skeleton(2024, "06", 24, COMMON)];
        let ai = vec![extracted(2024, "06", 24, MATH_1, "수열", 2024062401)];

        let report = engine.merge(&mut dataset, &ai);

        assert_eq!(report, MergeReport { updated: 1, inserted: 0, skipped: 0 });
        assert_eq!(dataset.len(), 1);
        let row = &dataset[0];
        assert_eq!(row.problem_id, Some(2024062401));
        assert_eq!(row.subject_name.as_deref(), Some(MATH_1));
        assert_eq!(row.unit_name.as_deref(), Some("수열"));
        assert!(row.has_usable_analysis());
        assert_eq!(row.source_data.as_deref(), Some("2024학년도 06월 공통 24번"));
        assert_eq!(row.problem_image_path.as_deref(), Some("kice_2024_06_common_p8.png"));
    }

    #[test]
    fn test_merge_is_idempotent() {
        let engine = MergeEngine::default();
        let mut dataset = vec![skeleton(2024, "06", 24, COMMON), skeleton(2024, "06", 25, CALCULUS)];
        let ai = vec![
            extracted(2024, "06", 24, MATH_1, "수열", 2024062401),
            extracted(2024, "06", 25, CALCULUS, "미분법", 2024062503),
            extracted(2024, "09", 30, CALCULUS, "적분법", 2024093003),
        ];

        let first = engine.merge(&mut dataset, &ai);
        let snapshot = dataset.clone();
        let second = engine.merge(&mut dataset, &ai);

        assert_eq!(first.inserted, 1);
        assert_eq!(second.inserted, 0);
        assert_eq!(second.updated, 3);
        assert_eq!(dataset, snapshot);
    }

    #[test]
    fn test_month_forms_match() {
        let engine = MergeEngine::default();
        let mut dataset = vec![skeleton(2023, "09", 5, COMMON)];
        let report = engine.merge(&mut dataset, &[extracted(2023, "9", 5, MATH_1, "삼각함수", 2023090501)]);
        assert_eq!(report.updated, 1);
    }

    #[test]
    fn test_other_subjects_do_not_fold() {
        let engine = MergeEngine::default();
        let mut dataset = vec![skeleton(2024, "06", 24, COMMON)];
        let report = engine.merge(&mut dataset, &[extracted(2024, "06", 24, CALCULUS, "미분법", 2024062403)]);

        assert_eq!(report.inserted, 1);
        assert_eq!(dataset.len(), 2);
        assert!(dataset[0].problem_id.is_none());
    }

    #[test]
    fn test_rows_missing_keys_are_skipped() {
        let engine = MergeEngine::default();
        let mut dataset = vec![skeleton(2024, "06", 24, COMMON)];
        let mut no_number = extracted(2024, "06", 24, MATH_1, "수열", 1);
        no_number.number = None;
        let mut bad_month = extracted(2024, "06", 24, MATH_1, "수열", 1);
        bad_month.month = Some("spring".into());

        let report = engine.merge(&mut dataset, &[no_number, bad_month]);
        assert_eq!(report.skipped, 2);
        assert!(dataset[0].problem_id.is_none());
    }

    #[test]
    fn test_configured_fold() {
        let engine = MergeEngine::new(SubjectFold::new("선택", [CALCULUS]));
        let mut dataset = vec![skeleton(2024, "06", 28, "선택")];
        let report = engine.merge(&mut dataset, &[extracted(2024, "06", 28, CALCULUS, "적분법", 2024062803)]);
        assert_eq!(report.updated, 1);
        assert_eq!(dataset[0].subject_name.as_deref(), Some(CALCULUS));
    }
}
