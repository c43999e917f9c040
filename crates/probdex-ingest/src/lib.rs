//! ProbDex Ingest: skeleton catalogue, dataset persistence, skip sets, merge.

pub mod catalog;
pub mod dataset;
pub mod merge;
pub mod progress;

pub use catalog::{catalogue_images, list_page_images, problems_on_page};
pub use dataset::{load_dataset, save_dataset};
pub use merge::{MergeEngine, MergeReport};
pub use progress::{analyzed_pages, SkipMap};
