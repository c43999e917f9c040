//! Strict decoding of model responses.
//!
//! The response must be exactly `{"problems": [...]}` with known fields only.
//! Fields the system computes itself (`year`, `month`, `problem_id`) are a
//! decode failure, not something to ignore.

use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::types::CallError;
use probdex_core::model::difficulty_from_level;
use probdex_core::{normalize_subject, Analysis, Error, ExtractedProblem, Result, Taxonomy};

/// Keys the model must never emit.
pub const SYSTEM_FIELDS: &[&str] = &["year", "month", "problem_id"];

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct WirePage {
    problems: Vec<WireProblem>,
}

/// One problem as emitted by the model.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WireProblem {
    pub subject_name: String,
    pub unit_name: String,
    pub number: i64,
    #[serde(default)]
    pub problem_text: Option<String>,
    #[serde(default)]
    pub ai_analysis: Option<WireAnalysis>,
}

/// Analysis block. Optional as a whole, but every field is required once present.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WireAnalysis {
    pub core_concepts: Vec<String>,
    pub logic_flow: String,
    pub pattern_type: Vec<String>,
    pub pitfalls: Vec<String>,
    pub difficulty_level: i64,
}

impl From<WireAnalysis> for Analysis {
    fn from(wire: WireAnalysis) -> Self {
        Analysis {
            core_concepts: wire.core_concepts,
            logic_flow: wire.logic_flow,
            pattern_type: wire.pattern_type,
            pitfalls: wire.pitfalls,
            difficulty: difficulty_from_level(wire.difficulty_level),
        }
    }
}

/// Decode the raw text of one page response.
pub fn decode_page(text: &str) -> std::result::Result<Vec<WireProblem>, CallError> {
    let value: Value = serde_json::from_str(text.trim())
        .map_err(|e| CallError::Malformed(format!("not JSON: {}", e)))?;

    if let Some(problems) = value.get("problems").and_then(Value::as_array) {
        for (i, problem) in problems.iter().enumerate() {
            if let Some(key) = SYSTEM_FIELDS.iter().find(|k| problem.get(**k).is_some()) {
                return Err(CallError::Malformed(format!(
                    "record {} carries system field '{}'",
                    i, key
                )));
            }
        }
    }

    let page: WirePage = serde_json::from_value(value)
        .map_err(|e| CallError::Malformed(format!("schema mismatch: {}", e)))?;
    Ok(page.problems)
}

/// Where a batch of records came from, for log context.
#[derive(Debug, Clone, Copy)]
pub struct RecordContext<'a> {
    pub document: &'a str,
    pub page: u32,
    pub image_name: Option<&'a str>,
}

/// Normalize the subject of one record and check its (subject, unit) pair
/// against the taxonomy.
pub fn validate_record(
    record: WireProblem,
    taxonomy: &Taxonomy,
    context: RecordContext<'_>,
) -> Result<ExtractedProblem> {
    let subject = normalize_subject(&record.subject_name);
    let unit = record.unit_name.trim().to_string();
    if !taxonomy.contains(&subject, &unit) {
        return Err(Error::Validation(format!(
            "problem {} has unknown pairing {} > {}",
            record.number, record.subject_name, record.unit_name
        )));
    }
    Ok(ExtractedProblem {
        subject_name: subject,
        unit_name: unit,
        number: record.number,
        problem_text: record.problem_text,
        analysis: record.ai_analysis.map(Analysis::from),
        year: None,
        month: None,
        problem_id: None,
        page: Some(context.page),
        source_image: context.image_name.map(String::from),
    })
}

/// Keep only records that pass [`validate_record`]. Rejected records are
/// logged and dropped.
pub fn validate_records(
    records: Vec<WireProblem>,
    taxonomy: &Taxonomy,
    context: RecordContext<'_>,
) -> Vec<ExtractedProblem> {
    records
        .into_iter()
        .filter_map(|record| match validate_record(record, taxonomy, context) {
            Ok(problem) => Some(problem),
            Err(e) => {
                warn!("{} page {}: rejecting record: {}", context.document, context.page, e);
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use probdex_core::taxonomy::{MATH_1, UNCATEGORIZED};

    const PAGE: &str = r#"{
        "problems": [
            {
                "subject_name": "수학 I",
                "unit_name": "수열",
                "number": 24,
                "problem_text": "등차수열 ... [3점]",
                "ai_analysis": {
                    "core_concepts": ["등차수열의 합"],
                    "logic_flow": "공차를 구한다",
                    "pattern_type": [],
                    "pitfalls": [],
                    "difficulty_level": 0
                }
            },
            {"subject_name": "수학1", "unit_name": "미분법", "number": 25},
            {"subject_name": "분류불가", "unit_name": "분류 불가", "number": 0}
        ]
    }"#;

    fn context() -> RecordContext<'static> {
        RecordContext {
            document: "kice_2024_06_common.pdf",
            page: 8,
            image_name: Some("kice_2024_06_common_p8.png"),
        }
    }

    #[test]
    fn test_decode_and_validate() {
        let records = decode_page(PAGE).unwrap();
        assert_eq!(records.len(), 3);

        let problems = validate_records(records, &Taxonomy::standard(), context());
        assert_eq!(problems.len(), 2);

        assert_eq!(problems[0].subject_name, MATH_1);
        assert_eq!(problems[0].page, Some(8));
        assert_eq!(problems[0].source_image.as_deref(), Some("kice_2024_06_common_p8.png"));
        let analysis = problems[0].analysis.as_ref().unwrap();
        assert_eq!(analysis.difficulty, None);
        assert!(!analysis.is_usable());

        assert_eq!(problems[1].subject_name, UNCATEGORIZED);
        assert!(problems[1].analysis.is_none());
    }

    #[test]
    fn test_unknown_pairing_is_validation_error() {
        let record = WireProblem {
            subject_name: "기하".into(),
            unit_name: "수열".into(),
            number: 29,
            problem_text: None,
            ai_analysis: None,
        };
        let err = validate_record(record, &Taxonomy::standard(), context()).unwrap_err();
        assert!(matches!(err, Error::Validation(ref m) if m.contains("기하 > 수열")));
    }

    #[test]
    fn test_incomplete_analysis_rejected() {
        for missing in ["logic_flow", "difficulty_level", "core_concepts"] {
            let mut analysis = serde_json::json!({
                "core_concepts": ["극값"],
                "logic_flow": "도함수를 구한다",
                "pattern_type": [],
                "pitfalls": [],
                "difficulty_level": 3
            });
            analysis.as_object_mut().unwrap().remove(missing);
            let text = serde_json::json!({
                "problems": [{"subject_name": "수학2", "unit_name": "미분", "number": 9, "ai_analysis": analysis}]
            })
            .to_string();
            let err = decode_page(&text).unwrap_err();
            assert!(matches!(err, CallError::Malformed(ref m) if m.contains(missing)), "{}", missing);
        }
    }

    #[test]
    fn test_system_fields_rejected() {
        for field in ["\"year\": 2024", "\"month\": \"06\"", "\"problem_id\": 1"] {
            let text = format!(
                r#"{{"problems": [{{"subject_name": "기하", "unit_name": "평면벡터", "number": 1, {}}}]}}"#,
                field
            );
            let err = decode_page(&text).unwrap_err();
            assert!(matches!(err, CallError::Malformed(ref m) if m.contains("system field")), "{}", field);
        }
    }

    #[test]
    fn test_shape_violations() {
        assert!(decode_page("not json").is_err());
        assert!(decode_page(r#"{"items": []}"#).is_err());
        assert!(decode_page(r#"{"problems": [{"subject_name": "기하", "unit_name": "x", "number": "3"}]}"#).is_err());
        assert!(decode_page(r#"{"problems": [{"subject_name": "기하", "unit_name": "x", "number": 3, "extra": 1}]}"#).is_err());
        assert!(decode_page(r#"{"problems": []}"#).unwrap().is_empty());
        assert!(decode_page("```json\n{}\n```").is_err());
    }
}
