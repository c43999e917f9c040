//! Data types for stored problems, search candidates and sync reports.

use serde::{Deserialize, Serialize};

use probdex_core::{Analysis, DatasetRow, ExtractedProblem};

/// A fully formed problem payload ready to upsert.
///
/// Records without a derived ID are only written to a session store, where
/// SQLite assigns the key.
#[derive(Debug, Clone, PartialEq)]
pub struct ProblemRecord {
    pub problem_id: Option<i64>,
    pub source_text: String,
    pub year: Option<i64>,
    pub month: Option<String>,
    pub number: Option<i64>,
    pub image_path: Option<String>,
    pub analysis: Option<Analysis>,
}

impl ProblemRecord {
    /// Build from a dataset row. Rows without a derived ID are not storable.
    pub fn from_dataset_row(row: &DatasetRow) -> Option<Self> {
        Some(Self {
            problem_id: Some(row.problem_id?),
            source_text: row.source_data.clone().unwrap_or_default(),
            year: row.year,
            month: row.month.clone(),
            number: row.number,
            image_path: row.problem_image_path.clone(),
            analysis: row.ai_analysis.clone(),
        })
    }

    pub fn from_extracted(problem: &ExtractedProblem) -> Self {
        Self {
            problem_id: problem.problem_id,
            source_text: problem.source_citation(),
            year: problem.year,
            month: problem.month.clone(),
            number: Some(problem.number),
            image_path: problem.source_image.clone(),
            analysis: problem.analysis.clone(),
        }
    }

    pub fn concepts(&self) -> &[String] {
        self.analysis
            .as_ref()
            .map(|a| a.core_concepts.as_slice())
            .unwrap_or(&[])
    }
}

/// A problem row read back from the database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredProblem {
    pub problem_id: i64,
    pub source_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub month: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_id: Option<i64>,
    pub pattern_type: Vec<String>,
    pub logic_flow: String,
    pub pitfalls: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<u8>,
}

/// Search-time projection of a stored problem.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: i64,
    pub pattern_type: Vec<String>,
    pub logic_flow: String,
    pub pitfalls: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<u8>,
    pub core_concepts: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_path: Option<String>,
    pub source_text: String,
}

/// Outcome of a batch write.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncReport {
    pub stored: usize,
    /// Rows with no derived ID. Session saves store these under an assigned key instead.
    pub skipped_no_id: usize,
    /// Rows with no resolvable unit (only counted when a unit is required).
    pub skipped_no_unit: usize,
    pub failed: usize,
}

/// Store statistics.
#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    pub total_problems: i64,
    pub total_concepts: i64,
    pub total_subjects: i64,
    pub total_units: i64,
    pub db_path: String,
    pub db_size_mb: f64,
}
