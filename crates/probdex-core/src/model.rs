//! Problem, analysis and dataset row types shared across crates.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Structured analysis the model attaches to a problem.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    #[serde(default)]
    pub core_concepts: Vec<String>,
    #[serde(default)]
    pub logic_flow: String,
    #[serde(default)]
    pub pattern_type: Vec<String>,
    #[serde(default)]
    pub pitfalls: Vec<String>,
    /// 1..=5 when known. Stored and transmitted as `difficulty_level`, with 0
    /// meaning "could not be determined".
    #[serde(rename = "difficulty_level", default, with = "difficulty_level")]
    pub difficulty: Option<u8>,
}

impl Analysis {
    /// Whether this analysis is complete enough to skip re-extraction.
    pub fn is_usable(&self) -> bool {
        self.difficulty.is_some()
            && !self.logic_flow.trim().is_empty()
            && !self.core_concepts.is_empty()
    }

    /// Difficulty as stored: 0 when unknown.
    pub fn difficulty_level(&self) -> u8 {
        self.difficulty.unwrap_or(0)
    }
}

/// Accepts an integer difficulty; only 1..=5 is a known value.
pub fn difficulty_from_level(level: i64) -> Option<u8> {
    if (1..=5).contains(&level) {
        Some(level as u8)
    } else {
        None
    }
}

mod difficulty_level {
    use super::*;

    pub fn serialize<S: Serializer>(value: &Option<u8>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(value.unwrap_or(0))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u8>, D::Error> {
        let level = super::lenient_i64(deserializer)?;
        Ok(level.and_then(difficulty_from_level))
    }
}

/// A problem record returned by the extraction orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedProblem {
    pub subject_name: String,
    pub unit_name: String,
    pub number: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub problem_text: Option<String>,
    #[serde(rename = "ai_analysis", default)]
    pub analysis: Option<Analysis>,
    /// Injected from the document name, never taken from the model.
    #[serde(default)]
    pub year: Option<i64>,
    #[serde(default)]
    pub month: Option<String>,
    #[serde(default)]
    pub problem_id: Option<i64>,
    /// Page the record was extracted from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    /// Page image file name, when the page came from an image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_image: Option<String>,
}

impl ExtractedProblem {
    /// Citation used when no skeleton source text exists.
    pub fn source_citation(&self) -> String {
        format!(
            "{} {} {} {}번",
            self.year.map(|y| y.to_string()).unwrap_or_default(),
            self.month.as_deref().unwrap_or(""),
            self.subject_name,
            self.number
        )
    }

    pub fn difficulty(&self) -> Option<u8> {
        self.analysis.as_ref().and_then(|a| a.difficulty)
    }
}

/// One row of the canonical dataset file.
///
/// Rows start life as skeletons catalogued from page images and are filled in
/// by merging extraction results.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatasetRow {
    #[serde(default, deserialize_with = "lenient_i64")]
    pub problem_id: Option<i64>,
    #[serde(default)]
    pub source_data: Option<String>,
    #[serde(default)]
    pub subject_name: Option<String>,
    #[serde(default)]
    pub unit_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub year: Option<i64>,
    #[serde(default, deserialize_with = "lenient_month")]
    pub month: Option<String>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub number: Option<i64>,
    #[serde(default, deserialize_with = "lenient_analysis")]
    pub ai_analysis: Option<Analysis>,
    #[serde(default)]
    pub problem_image_path: Option<String>,
}

impl DatasetRow {
    /// Build a row carrying an extraction result.
    pub fn from_extracted(problem: &ExtractedProblem) -> Self {
        Self {
            problem_id: problem.problem_id,
            source_data: None,
            subject_name: Some(problem.subject_name.clone()),
            unit_name: Some(problem.unit_name.clone()),
            year: problem.year,
            month: problem.month.clone(),
            number: Some(problem.number),
            ai_analysis: problem.analysis.clone(),
            problem_image_path: problem.source_image.clone(),
        }
    }

    pub fn has_usable_analysis(&self) -> bool {
        self.ai_analysis
            .as_ref()
            .map(Analysis::is_usable)
            .unwrap_or(false)
    }
}

/// Integers written by spreadsheet round-trips may arrive as floats or strings.
fn lenient_i64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && f.is_finite())
                .map(|f| f as i64)
        }),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

fn lenient_month<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        serde_json::Value::Number(n) => n
            .as_f64()
            .filter(|f| f.fract() == 0.0)
            .map(|f| format!("{:02}", f as i64)),
        _ => None,
    })
}

/// Analysis blobs may be stored inline or as an encoded JSON string.
fn lenient_analysis<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Analysis>, D::Error> {
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Object(_) => serde_json::from_value(value).ok(),
        serde_json::Value::String(s) => serde_json::from_str(&s).ok(),
        _ => None,
    })
}
