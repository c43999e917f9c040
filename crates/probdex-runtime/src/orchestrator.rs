//! Pipeline orchestrator: corpus initialization, corpus maintenance and
//! per-session search.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;
use tracing::{error, info, warn};

use probdex_core::naming::file_stem;
use probdex_core::{DatasetRow, Error, ProbdexConfig, Result, Taxonomy};
use probdex_extract::{CancellationToken, Extractor, ImageDirPageSource};
use probdex_ingest::{analyzed_pages, catalogue_images, list_page_images, load_dataset, save_dataset, MergeEngine};
use probdex_resolve::SimilarityEngine;
use probdex_store::ProblemStore;

use crate::types::*;

/// PDF file names in `dir`, sorted.
pub fn list_documents(dir: &Path) -> Result<Vec<String>> {
    if !dir.is_dir() {
        return Err(Error::NotFound(format!("Document directory {}", dir.display())));
    }
    let mut names: Vec<String> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_file())
        .filter_map(|entry| entry.file_name().to_str().map(String::from))
        .filter(|name| name.to_lowercase().ends_with(".pdf"))
        .collect();
    names.sort();
    Ok(names)
}

/// Reset the corpus store and write a fresh skeleton dataset. Needs no
/// extraction backend.
pub fn initialize_corpus(config: &ProbdexConfig, taxonomy: Arc<Taxonomy>) -> Result<InitReport> {
    let paths = &config.data_paths;

    let store = ProblemStore::open(&paths.corpus_db, taxonomy)?;
    store.reset()?;

    let images = list_page_images(&paths.problem_images)?;
    let rows = catalogue_images(&[], images.iter().map(String::as_str));
    save_dataset(&paths.dataset_file, &rows)?;

    info!(
        "Corpus initialized: {} skeleton rows from {} images",
        rows.len(),
        images.len()
    );
    Ok(InitReport {
        skeleton_rows: rows.len(),
        images: images.len(),
        finished_at: chrono::Utc::now().to_rfc3339(),
    })
}

/// Runs the ProbDex flows against one data directory.
pub struct Pipeline {
    config: ProbdexConfig,
    taxonomy: Arc<Taxonomy>,
    extractor: Extractor,
    engine: SimilarityEngine,
    events: Option<UnboundedSender<PipelineEvent>>,
    cancel: CancellationToken,
}

impl Pipeline {
    pub fn new(config: ProbdexConfig, taxonomy: Arc<Taxonomy>, extractor: Extractor) -> Self {
        Self {
            config,
            taxonomy,
            extractor,
            engine: SimilarityEngine::default(),
            events: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Send progress events to `sender`.
    pub fn with_events(mut self, sender: UnboundedSender<PipelineEvent>) -> Self {
        self.events = Some(sender);
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn config(&self) -> &ProbdexConfig {
        &self.config
    }

    fn emit(&self, event: PipelineEvent) {
        if let Some(sender) = &self.events {
            // A dropped receiver only means nobody is listening.
            let _ = sender.send(event);
        }
    }

    fn open_corpus(&self) -> Result<ProblemStore> {
        ProblemStore::open(&self.config.data_paths.corpus_db, self.taxonomy.clone())
    }

    // ---- Corpus ----

    /// Reset the corpus store and rebuild the dataset skeleton from every page
    /// image. Existing analyses in the dataset are discarded.
    pub fn initialize_corpus(&self) -> Result<InitReport> {
        let report = initialize_corpus(&self.config, self.taxonomy.clone())?;
        self.emit(PipelineEvent::StoreReset {
            db_path: self.config.data_paths.corpus_db.display().to_string(),
        });
        self.emit(PipelineEvent::Catalogued {
            rows: report.skeleton_rows,
        });
        Ok(report)
    }

    /// Catalogue new page images, extract every processed document (skipping
    /// pages that already carry a usable analysis), merge into the dataset and
    /// sync the corpus store.
    ///
    /// The dataset is saved after every document so an interrupted run
    /// resumes where it stopped.
    pub async fn maintain_corpus(&self) -> Result<CorpusReport> {
        let paths = &self.config.data_paths;
        let mut report = CorpusReport {
            started_at: chrono::Utc::now().to_rfc3339(),
            ..Default::default()
        };

        let mut dataset = load_dataset(&paths.dataset_file)?;
        let images = list_page_images(&paths.problem_images)?;
        let new_rows = catalogue_images(&dataset, images.iter().map(String::as_str));
        report.catalogued = new_rows.len();
        if !new_rows.is_empty() {
            dataset.extend(new_rows);
            save_dataset(&paths.dataset_file, &dataset)?;
        }
        self.emit(PipelineEvent::Catalogued {
            rows: report.catalogued,
        });

        let skip_map = analyzed_pages(&dataset);
        let documents = list_documents(&paths.processed_pdfs)?;
        if documents.is_empty() {
            warn!("No documents to analyze in {}", paths.processed_pdfs.display());
        }

        let source = ImageDirPageSource::new(&paths.problem_images);
        let merger = MergeEngine::new(self.config.fold.clone());

        for (index, document) in documents.iter().enumerate() {
            if self.cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }

            let skip = skip_map.get(file_stem(document)).cloned().unwrap_or_default();
            self.emit(PipelineEvent::DocumentStarted {
                document: document.clone(),
                index: index + 1,
                total: documents.len(),
                skipped_pages: skip.len(),
            });

            let outcome = match self.extractor.extract(document, &source, &skip, &self.cancel).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!("{}: extraction aborted: {}", document, e);
                    let failed = DocumentReport {
                        document: document.clone(),
                        outcome: "failed",
                        problems: 0,
                        failed_pages: Vec::new(),
                    };
                    self.emit(PipelineEvent::DocumentFinished(failed.clone()));
                    report.documents.push(failed);
                    continue;
                }
            };

            let extracted: Vec<DatasetRow> = outcome.problems().iter().map(DatasetRow::from_extracted).collect();
            if !extracted.is_empty() {
                let merged = merger.merge(&mut dataset, &extracted);
                report.merge.updated += merged.updated;
                report.merge.inserted += merged.inserted;
                report.merge.skipped += merged.skipped;
                save_dataset(&paths.dataset_file, &dataset)?;
            }

            let document_report = DocumentReport::from_outcome(document, &outcome);
            self.emit(PipelineEvent::DocumentFinished(document_report.clone()));
            report.documents.push(document_report);

            if outcome.is_cancelled() {
                report.cancelled = true;
                break;
            }
        }
        self.emit(PipelineEvent::Merged(report.merge.clone()));

        let store = self.open_corpus()?;
        report.sync = store.sync_dataset(&dataset)?;
        self.emit(PipelineEvent::Synced(report.sync.clone()));

        report.finished_at = chrono::Utc::now().to_rfc3339();
        info!(
            "Corpus run finished: {} documents, {} rows stored{}",
            report.documents.len(),
            report.sync.stored,
            if report.cancelled { " (cancelled)" } else { "" }
        );
        Ok(report)
    }

    // ---- Search ----

    /// PDF names waiting in the user folder.
    pub fn user_documents(&self) -> Result<Vec<String>> {
        list_documents(&self.config.data_paths.user_pdfs)
    }

    /// Extract a user document into a fresh session store and rank corpus
    /// problems from the same unit against each extracted problem.
    pub async fn search(&self, file: &str) -> Result<SearchReport> {
        let paths = &self.config.data_paths;
        let input = paths.user_pdfs.join(file);
        if !input.is_file() {
            return Err(Error::NotFound(format!("Input file {}", input.display())));
        }

        let session = ProblemStore::open(&paths.user_db, self.taxonomy.clone())?;
        session.reset()?;

        let source = ImageDirPageSource::new(&paths.user_images);
        let outcome = self
            .extractor
            .extract(file, &source, &BTreeSet::new(), &self.cancel)
            .await?;
        let extraction = DocumentReport::from_outcome(file, &outcome);
        self.emit(PipelineEvent::DocumentFinished(extraction.clone()));

        let problems = outcome.into_problems();
        if problems.is_empty() {
            return Err(Error::Extraction(format!(
                "No problems extracted from {} ({})",
                file, extraction.outcome
            )));
        }

        let stored = session.save_extracted(&problems)?;

        let corpus = self.open_corpus()?;
        let mut matches = Vec::with_capacity(problems.len());
        for problem in problems {
            let candidates = corpus.candidates_by_unit(&problem.subject_name, &problem.unit_name)?;
            let recommendations = if candidates.is_empty() {
                info!(
                    "{} #{}: no corpus problems in {} > {}",
                    file, problem.number, problem.subject_name, problem.unit_name
                );
                Vec::new()
            } else {
                let query = problem.analysis.clone().unwrap_or_default();
                self.engine.recommend(&query, &candidates, self.config.top_k)
            };

            let problem_matches = ProblemMatches {
                problem,
                candidates: candidates.len(),
                recommendations,
            };
            self.emit(PipelineEvent::Matched(problem_matches.clone()));
            matches.push(problem_matches);
        }

        Ok(SearchReport {
            document: file.to_string(),
            extraction,
            stored,
            matches,
            finished_at: chrono::Utc::now().to_rfc3339(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use async_trait::async_trait;
    use probdex_extract::{CallError, PageAnalyzer, PageBlob, RetryPolicy};
    use tempfile::TempDir;

    struct Unreachable;

    #[async_trait]
    impl PageAnalyzer for Unreachable {
        async fn analyze(&self, _page: &PageBlob, _instruction: &str) -> std::result::Result<String, CallError> {
            Err(CallError::Client {
                status: 403,
                message: "offline".into(),
            })
        }
    }

    fn test_pipeline() -> (Pipeline, TempDir) {
        let dir = TempDir::new().unwrap();
        let config = ProbdexConfig::from_env(dir.path()).unwrap();
        let taxonomy = Arc::new(Taxonomy::standard());
        let extractor = Extractor::new(
            Arc::new(Unreachable),
            taxonomy.clone(),
            RetryPolicy::immediate(1),
            Duration::from_secs(1),
        );
        (Pipeline::new(config, taxonomy, extractor), dir)
    }

    #[test]
    fn test_list_documents() {
        let dir = TempDir::new().unwrap();
        for name in ["b.pdf", "a.PDF", "notes.txt"] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }
        assert_eq!(list_documents(dir.path()).unwrap(), vec!["a.PDF", "b.pdf"]);
        assert!(list_documents(&dir.path().join("missing")).is_err());
    }

    #[test]
    fn test_initialize_corpus() {
        let (pipeline, _dir) = test_pipeline();
        let paths = &pipeline.config().data_paths;
        std::fs::write(paths.problem_images.join("kice_2024_06_common_p1.png"), b"").unwrap();
        std::fs::write(paths.problem_images.join("kice_2024_06_cal_split_p1.png"), b"").unwrap();

        let report = pipeline.initialize_corpus().unwrap();
        assert_eq!(report.images, 2);
        assert_eq!(report.skeleton_rows, 6);

        let dataset = load_dataset(&paths.dataset_file).unwrap();
        assert_eq!(dataset.len(), 6);
        assert!(dataset.iter().all(|row| row.ai_analysis.is_none()));
    }

    #[tokio::test]
    async fn test_search_missing_input() {
        let (pipeline, _dir) = test_pipeline();
        let err = pipeline.search("nope.pdf").await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_search_with_failed_extraction() {
        let (pipeline, _dir) = test_pipeline();
        let paths = &pipeline.config().data_paths;
        std::fs::write(paths.user_pdfs.join("mock.pdf"), b"").unwrap();
        std::fs::write(paths.user_images.join("mock_p1.png"), b"png").unwrap();

        let err = pipeline.search("mock.pdf").await.unwrap_err();
        assert!(matches!(err, Error::Extraction(ref m) if m.contains("failed")));
    }

    #[tokio::test]
    async fn test_maintain_corpus_with_cancelled_token() {
        let (pipeline, _dir) = test_pipeline();
        let paths = &pipeline.config().data_paths;
        std::fs::write(paths.processed_pdfs.join("kice_2024_06_common.pdf"), b"").unwrap();
        pipeline.cancellation().cancel();

        let report = pipeline.maintain_corpus().await.unwrap();
        assert!(report.cancelled);
        assert!(report.documents.is_empty());
        assert_eq!(report.sync.stored, 0);
    }
}
