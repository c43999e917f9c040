//! Pipeline reports and progress events.

use serde::Serialize;

use probdex_core::ExtractedProblem;
use probdex_extract::{ExtractionOutcome, PageFailure};
use probdex_ingest::MergeReport;
use probdex_resolve::Recommendation;
use probdex_store::SyncReport;

/// Progress notification emitted while a pipeline runs.
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    /// Corpus store reset to an empty, seeded schema.
    StoreReset { db_path: String },
    /// New skeleton rows added from page images.
    Catalogued { rows: usize },
    DocumentStarted {
        document: String,
        index: usize,
        total: usize,
        skipped_pages: usize,
    },
    DocumentFinished(DocumentReport),
    Merged(MergeReport),
    Synced(SyncReport),
    /// Ranked matches for one extracted user problem.
    Matched(ProblemMatches),
}

/// Result of extracting one document.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentReport {
    pub document: String,
    /// Outcome label, see `ExtractionOutcome::label`.
    pub outcome: &'static str,
    pub problems: usize,
    #[serde(rename = "failedPages")]
    pub failed_pages: Vec<u32>,
}

impl DocumentReport {
    pub fn from_outcome(document: &str, outcome: &ExtractionOutcome) -> Self {
        Self {
            document: document.to_string(),
            outcome: outcome.label(),
            problems: outcome.problems().len(),
            failed_pages: outcome.failed_pages().iter().map(|f: &PageFailure| f.page).collect(),
        }
    }
}

/// Result of `--init`.
#[derive(Debug, Clone, Serialize)]
pub struct InitReport {
    #[serde(rename = "skeletonRows")]
    pub skeleton_rows: usize,
    pub images: usize,
    #[serde(rename = "finishedAt")]
    pub finished_at: String,
}

/// Result of one corpus maintenance run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CorpusReport {
    #[serde(rename = "startedAt")]
    pub started_at: String,
    #[serde(rename = "finishedAt")]
    pub finished_at: String,
    /// Skeleton rows added for newly seen page images.
    pub catalogued: usize,
    pub documents: Vec<DocumentReport>,
    pub merge: MergeReport,
    pub sync: SyncReport,
    /// Whether the run stopped early on cancellation.
    pub cancelled: bool,
}

/// Matches for one problem extracted from a user document.
#[derive(Debug, Clone, Serialize)]
pub struct ProblemMatches {
    pub problem: ExtractedProblem,
    /// Corpus problems in the same subject and unit.
    pub candidates: usize,
    pub recommendations: Vec<Recommendation>,
}

impl ProblemMatches {
    pub fn best(&self) -> Option<&Recommendation> {
        self.recommendations.first()
    }

    pub fn runners_up(&self) -> &[Recommendation] {
        self.recommendations.get(1..).unwrap_or(&[])
    }
}

/// Result of one search session.
#[derive(Debug, Clone, Serialize)]
pub struct SearchReport {
    pub document: String,
    pub extraction: DocumentReport,
    /// Writes to the per-session store.
    pub stored: SyncReport,
    pub matches: Vec<ProblemMatches>,
    #[serde(rename = "finishedAt")]
    pub finished_at: String,
}
