//! ProbDex Store: SQLite persistence for problems, concept tags and the
//! subject/unit taxonomy.

pub mod schema;
pub mod sqlite;
pub mod types;

pub use sqlite::ProblemStore;
pub use types::*;
