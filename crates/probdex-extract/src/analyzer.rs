//! The external model seam.

use async_trait::async_trait;

use crate::types::{CallError, PageBlob};

/// Sends one page plus the system instruction to a model and returns the raw
/// response text.
///
/// Implementations classify their own failures; retry, timeout and
/// cancellation are applied by the caller.
#[async_trait]
pub trait PageAnalyzer: Send + Sync {
    async fn analyze(&self, page: &PageBlob, instruction: &str) -> Result<String, CallError>;
}
