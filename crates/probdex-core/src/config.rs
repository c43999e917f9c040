//! Configuration and data directory management.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::taxonomy::SubjectFold;

/// Default number of recommendations returned per query problem.
pub const DEFAULT_TOP_K: usize = 4;

/// Paths to all ProbDex data directories and files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataPaths {
    /// Root data directory (e.g., `assets/`).
    pub root: PathBuf,
    /// Split exam PDFs, one per subject section (`assets/processed_pdfs/`).
    pub processed_pdfs: PathBuf,
    /// Rasterized pages of the processed PDFs (`assets/problem_images/`).
    pub problem_images: PathBuf,
    /// PDFs submitted for search (`assets/user_problem_pdfs/`).
    pub user_pdfs: PathBuf,
    /// Rasterized pages of the user PDFs (`assets/user_problem_images/`).
    pub user_images: PathBuf,
    /// Canonical merged dataset (`assets/base_problems.json`).
    pub dataset_file: PathBuf,
    /// Durable corpus database (`assets/probdex.db`).
    pub corpus_db: PathBuf,
    /// Per-session search workspace (`assets/user_probdex.db`).
    pub user_db: PathBuf,
    /// LLM configuration (`assets/llm-config.json`).
    pub llm_config_file: PathBuf,
}

impl DataPaths {
    /// Create data paths from a root directory. Creates directories if needed.
    pub fn new(root: impl AsRef<Path>) -> std::io::Result<Self> {
        let root = root.as_ref().to_path_buf();
        let paths = Self {
            processed_pdfs: root.join("processed_pdfs"),
            problem_images: root.join("problem_images"),
            user_pdfs: root.join("user_problem_pdfs"),
            user_images: root.join("user_problem_images"),
            dataset_file: root.join("base_problems.json"),
            corpus_db: root.join("probdex.db"),
            user_db: root.join("user_probdex.db"),
            llm_config_file: root.join("llm-config.json"),
            root,
        };
        paths.ensure_dirs()?;
        Ok(paths)
    }

    /// Create all required directories.
    fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.processed_pdfs)?;
        std::fs::create_dir_all(&self.problem_images)?;
        std::fs::create_dir_all(&self.user_pdfs)?;
        std::fs::create_dir_all(&self.user_images)?;
        Ok(())
    }
}

/// Top-level ProbDex configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbdexConfig {
    /// Data directory paths.
    pub data_paths: DataPaths,
    /// Recommendations per query problem.
    pub top_k: usize,
    /// Pages extracted concurrently per document.
    pub concurrency: usize,
    /// Subjects folded into the shared skeleton bucket when merging.
    pub fold: SubjectFold,
}

impl ProbdexConfig {
    /// Create configuration from environment and defaults.
    pub fn from_env(data_dir: impl AsRef<Path>) -> std::io::Result<Self> {
        let top_k = std::env::var("PROBDEX_TOP_K")
            .ok()
            .and_then(|v| v.parse().ok())
            .filter(|k: &usize| *k > 0)
            .unwrap_or(DEFAULT_TOP_K);

        let concurrency = std::env::var("PROBDEX_CONCURRENCY")
            .ok()
            .and_then(|v| v.parse().ok())
            .filter(|n: &usize| *n > 0)
            .unwrap_or(1);

        let data_paths = DataPaths::new(data_dir)?;

        Ok(Self {
            data_paths,
            top_k,
            concurrency,
            fold: SubjectFold::default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_data_paths_create_directories() {
        let dir = TempDir::new().unwrap();
        let paths = DataPaths::new(dir.path().join("assets")).unwrap();

        assert!(paths.problem_images.is_dir());
        assert!(paths.user_images.is_dir());
        assert!(paths.processed_pdfs.is_dir());
        assert_eq!(paths.corpus_db, dir.path().join("assets/probdex.db"));
        assert!(!paths.dataset_file.exists());
    }
}
