//! Extraction types: page blobs, call errors and run outcomes.

use std::time::Duration;

use thiserror::Error;

use probdex_core::ExtractedProblem;

/// One page image handed to the analyzer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageBlob {
    /// 1-based page number.
    pub page: u32,
    pub bytes: Vec<u8>,
    pub mime_type: String,
    /// File name of the page image, recorded on every problem it yields.
    pub image_name: Option<String>,
}

/// Failure of a single analyzer call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CallError {
    #[error("rate limited (HTTP 429)")]
    RateLimited,

    #[error("server error (HTTP {0})")]
    Server(u16),

    #[error("request rejected (HTTP {status}): {message}")]
    Client { status: u16, message: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("call timed out after {0:?}")]
    Timeout(Duration),

    #[error("empty response")]
    Empty,

    #[error("malformed response: {0}")]
    Malformed(String),
}

impl CallError {
    /// Classify a non-success HTTP status.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        match status {
            429 => Self::RateLimited,
            s if s >= 500 => Self::Server(s),
            s => Self::Client {
                status: s,
                message: message.into(),
            },
        }
    }

    /// Whether another attempt may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited | Self::Server(_) | Self::Transport(_) | Self::Timeout(_) | Self::Empty
        )
    }
}

/// A page that produced no records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageFailure {
    pub page: u32,
    pub reason: String,
}

/// Result of extracting one document.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractionOutcome {
    /// Every attempted page succeeded.
    Complete(Vec<ExtractedProblem>),
    /// Some pages failed; the rest produced these problems.
    Partial {
        problems: Vec<ExtractedProblem>,
        failed_pages: Vec<PageFailure>,
    },
    /// The source had no pages at all.
    NoPages,
    /// Every attempted page failed.
    Failed { failed_pages: Vec<PageFailure> },
    /// The run was cancelled; holds whatever finished before that.
    Cancelled {
        problems: Vec<ExtractedProblem>,
        failed_pages: Vec<PageFailure>,
    },
}

impl ExtractionOutcome {
    pub fn problems(&self) -> &[ExtractedProblem] {
        match self {
            Self::Complete(problems)
            | Self::Partial { problems, .. }
            | Self::Cancelled { problems, .. } => problems,
            Self::NoPages | Self::Failed { .. } => &[],
        }
    }

    pub fn failed_pages(&self) -> &[PageFailure] {
        match self {
            Self::Partial { failed_pages, .. }
            | Self::Failed { failed_pages }
            | Self::Cancelled { failed_pages, .. } => failed_pages,
            Self::Complete(_) | Self::NoPages => &[],
        }
    }

    pub fn into_problems(self) -> Vec<ExtractedProblem> {
        match self {
            Self::Complete(problems)
            | Self::Partial { problems, .. }
            | Self::Cancelled { problems, .. } => problems,
            Self::NoPages | Self::Failed { .. } => Vec::new(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    /// Short label for logs and reports.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Complete(_) => "complete",
            Self::Partial { .. } => "partial",
            Self::NoPages => "no pages",
            Self::Failed { .. } => "failed",
            Self::Cancelled { .. } => "cancelled",
        }
    }
}
