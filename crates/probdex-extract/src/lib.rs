//! ProbDex Extract: drives per-page extraction against a vision model.
//!
//! A [`PageSource`] supplies page images, a [`PageAnalyzer`] turns one page
//! into raw JSON text, and the [`Extractor`] wraps every call in a timeout,
//! a bounded retry policy and a cancellation check before decoding the text
//! strictly into problem records.

pub mod analyzer;
pub mod config;
pub mod decode;
pub mod gemini;
pub mod orchestrator;
pub mod prompt;
pub mod retry;
pub mod source;
pub mod types;

pub use analyzer::PageAnalyzer;
pub use config::{BackoffMode, ExtractorConfig};
pub use gemini::GeminiClient;
pub use orchestrator::Extractor;
pub use retry::{Backoff, RetryPolicy};
pub use source::{ImageDirPageSource, PageSource};
pub use types::*;
pub use tokio_util::sync::CancellationToken;
