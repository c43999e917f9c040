//! ProbDex Core: errors, configuration, taxonomy, identity, shared model types.

pub mod config;
pub mod error;
pub mod identity;
pub mod model;
pub mod naming;
pub mod taxonomy;

pub use config::{DataPaths, ProbdexConfig};
pub use error::{Error, Result};
pub use identity::{generate_problem_id, normalize_subject};
pub use model::{Analysis, DatasetRow, ExtractedProblem};
pub use naming::{DocumentMeta, PageImageName};
pub use taxonomy::{SubjectFold, Taxonomy};
