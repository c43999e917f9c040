//! Extraction orchestrator: page-level retry, timeout and cancellation.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::analyzer::PageAnalyzer;
use crate::config::ExtractorConfig;
use crate::decode::{decode_page, validate_records, RecordContext};
use crate::prompt::build_instruction;
use crate::retry::RetryPolicy;
use crate::source::PageSource;
use crate::types::*;
use probdex_core::{generate_problem_id, DocumentMeta, ExtractedProblem, Result, Taxonomy};

/// How one page ended.
enum PageOutcome {
    Extracted(Vec<ExtractedProblem>),
    Failed(String),
    Cancelled,
}

/// Drives per-page extraction for whole documents.
pub struct Extractor {
    analyzer: Arc<dyn PageAnalyzer>,
    taxonomy: Arc<Taxonomy>,
    policy: RetryPolicy,
    call_timeout: Duration,
    concurrency: usize,
    instruction: String,
}

impl Extractor {
    pub fn new(
        analyzer: Arc<dyn PageAnalyzer>,
        taxonomy: Arc<Taxonomy>,
        policy: RetryPolicy,
        call_timeout: Duration,
    ) -> Self {
        let instruction = build_instruction(&taxonomy);
        Self {
            analyzer,
            taxonomy,
            policy,
            call_timeout,
            concurrency: 1,
            instruction,
        }
    }

    pub fn from_config(
        config: &ExtractorConfig,
        analyzer: Arc<dyn PageAnalyzer>,
        taxonomy: Arc<Taxonomy>,
    ) -> Self {
        Self::new(analyzer, taxonomy, config.retry_policy(), config.call_timeout())
            .with_concurrency(config.concurrency)
    }

    /// Pages extracted at once. Each page keeps its own retry state.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Extract every page of `document` not in `skip`.
    ///
    /// Year and month are taken from the document name and the derived ID is
    /// computed for every record. Errors only when the source cannot be read.
    pub async fn extract(
        &self,
        document: &str,
        source: &dyn PageSource,
        skip: &BTreeSet<u32>,
        cancel: &CancellationToken,
    ) -> Result<ExtractionOutcome> {
        let pages = source.pages(document)?;
        if pages.is_empty() {
            warn!("{}: no pages found", document);
            return Ok(ExtractionOutcome::NoPages);
        }

        let total = pages.len();
        let todo: Vec<PageBlob> = pages.into_iter().filter(|p| !skip.contains(&p.page)).collect();
        info!(
            "{}: extracting {} of {} pages ({} already analyzed)",
            document,
            todo.len(),
            total,
            total - todo.len()
        );

        let mut results: Vec<(u32, PageOutcome)> = stream::iter(todo)
            .map(|page| async move {
                let number = page.page;
                (number, self.extract_page(document, page, cancel).await)
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;
        results.sort_by_key(|(page, _)| *page);

        let meta = DocumentMeta::parse(document);
        if meta.is_none() {
            warn!("{}: name carries no year/month, problem IDs left empty", document);
        }

        let mut problems = Vec::new();
        let mut failed_pages = Vec::new();
        let mut succeeded = 0;
        let mut cancelled = false;
        for (page, outcome) in results {
            match outcome {
                PageOutcome::Extracted(mut page_problems) => {
                    succeeded += 1;
                    for problem in &mut page_problems {
                        self.inject_identity(problem, meta.as_ref());
                    }
                    problems.extend(page_problems);
                }
                PageOutcome::Failed(reason) => failed_pages.push(PageFailure { page, reason }),
                PageOutcome::Cancelled => cancelled = true,
            }
        }

        info!(
            "{}: {} problems from {} pages, {} pages failed",
            document,
            problems.len(),
            succeeded,
            failed_pages.len()
        );

        Ok(if cancelled {
            ExtractionOutcome::Cancelled {
                problems,
                failed_pages,
            }
        } else if failed_pages.is_empty() {
            ExtractionOutcome::Complete(problems)
        } else if succeeded == 0 {
            ExtractionOutcome::Failed { failed_pages }
        } else {
            ExtractionOutcome::Partial {
                problems,
                failed_pages,
            }
        })
    }

    fn inject_identity(&self, problem: &mut ExtractedProblem, meta: Option<&DocumentMeta>) {
        let Some(meta) = meta else {
            return;
        };
        problem.year = Some(meta.year);
        problem.month = Some(meta.month.clone());
        problem.problem_id = generate_problem_id(
            &self.taxonomy,
            meta.year,
            &meta.month,
            problem.number,
            &problem.subject_name,
        );
    }

    async fn extract_page(&self, document: &str, page: PageBlob, cancel: &CancellationToken) -> PageOutcome {
        let started = Instant::now();
        let mut attempt = 0;

        loop {
            if cancel.is_cancelled() {
                debug!("{} page {}: cancelled before attempt {}", document, page.page, attempt + 1);
                return PageOutcome::Cancelled;
            }
            attempt += 1;

            let result = match tokio::time::timeout(
                self.call_timeout,
                self.analyzer.analyze(&page, &self.instruction),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(CallError::Timeout(self.call_timeout)),
            }
            .and_then(|text| {
                if text.trim().is_empty() {
                    Err(CallError::Empty)
                } else {
                    Ok(text)
                }
            });

            let error = match result.and_then(|text| decode_page(&text)) {
                Ok(records) => {
                    let context = RecordContext {
                        document,
                        page: page.page,
                        image_name: page.image_name.as_deref(),
                    };
                    let problems = validate_records(records, &self.taxonomy, context);
                    info!(
                        "{} page {}: {} problems in {:.1}s",
                        document,
                        page.page,
                        problems.len(),
                        started.elapsed().as_secs_f64()
                    );
                    return PageOutcome::Extracted(problems);
                }
                Err(e) => e,
            };

            if !error.is_retryable() || attempt >= self.policy.max_attempts {
                warn!(
                    "{} page {}: giving up after attempt {}/{}: {}",
                    document, page.page, attempt, self.policy.max_attempts, error
                );
                return PageOutcome::Failed(error.to_string());
            }

            let delay = self.policy.delay_for(attempt - 1);
            warn!(
                "{} page {}: attempt {}/{} failed ({}), retrying in {:?}",
                document, page.page, attempt, self.policy.max_attempts, error, delay
            );
            tokio::select! {
                _ = cancel.cancelled() => return PageOutcome::Cancelled,
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}
