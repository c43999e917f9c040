//! SQLite-backed problem store.
//!
//! Owns the only connection to a ProbDex database. Every write runs inside a
//! transaction that commits on success and rolls back on error; batch writes
//! isolate each record in its own savepoint.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use tracing::{debug, info, warn};

use crate::schema::{DROP_ORDER, EXPECTED_COLUMNS, INDEX_SQL, SCHEMA_SQL, TAG_SEPARATOR};
use crate::types::*;
use probdex_core::model::difficulty_from_level;
use probdex_core::taxonomy::UNCATEGORIZED;
use probdex_core::{normalize_subject, DatasetRow, Error, ExtractedProblem, Result, Taxonomy};

/// SQLite store for problems, concepts and the subject/unit taxonomy.
pub struct ProblemStore {
    conn: Mutex<Connection>,
    db_path: PathBuf,
    taxonomy: Arc<Taxonomy>,
}

impl ProblemStore {
    /// Open or create the store at `db_path`.
    ///
    /// Missing tables are created, missing columns added to older databases,
    /// and the taxonomy seeded.
    pub fn open(db_path: impl AsRef<Path>, taxonomy: Arc<Taxonomy>) -> Result<Self> {
        let db_path = db_path.as_ref().to_path_buf();
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| Error::Storage(e.to_string()))?;
        }

        let mut conn = Self::create_connection(&db_path)?;
        let tx = conn
            .transaction()
            .map_err(|e| Error::Database(e.to_string()))?;
        Self::init_schema(&tx)?;
        let added = Self::ensure_columns(&tx)?;
        Self::init_indexes(&tx)?;
        Self::seed_taxonomy(&tx, &taxonomy)?;
        tx.commit().map_err(|e| Error::Database(e.to_string()))?;

        let store = Self {
            conn: Mutex::new(conn),
            db_path,
            taxonomy,
        };

        let problem_count = store.count_problems()?;
        info!(
            "ProblemStore initialized: {} problems, {} columns added, path={}",
            problem_count,
            added,
            store.db_path.display()
        );

        Ok(store)
    }

    fn create_connection(db_path: &Path) -> Result<Connection> {
        let conn = Connection::open(db_path).map_err(|e| Error::Database(e.to_string()))?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA foreign_keys = ON;
             PRAGMA synchronous = NORMAL;",
        )
        .map_err(|e| Error::Database(e.to_string()))?;
        Ok(conn)
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(SCHEMA_SQL)
            .map_err(|e| Error::Database(format!("Schema init failed: {}", e)))?;
        Ok(())
    }

    fn init_indexes(conn: &Connection) -> Result<()> {
        conn.execute_batch(INDEX_SQL)
            .map_err(|e| Error::Database(format!("Index init failed: {}", e)))?;
        Ok(())
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub fn taxonomy(&self) -> &Taxonomy {
        &self.taxonomy
    }

    // ---------------------------------------------------------------
    // Schema Evolution & Reset
    // ---------------------------------------------------------------

    /// Add any expected column missing from an existing table.
    /// Returns the number of columns added.
    fn ensure_columns(conn: &Connection) -> Result<usize> {
        let mut added = 0;
        for (table, columns) in EXPECTED_COLUMNS {
            let existing = Self::column_names(conn, table)?;
            for (column, column_type) in columns.iter() {
                if existing.iter().any(|c| c == column) {
                    continue;
                }
                conn.execute_batch(&format!(
                    "ALTER TABLE {} ADD COLUMN {} {};",
                    table, column, column_type
                ))
                .map_err(|e| Error::Database(format!("Adding {}.{} failed: {}", table, column, e)))?;
                info!("Added missing column {}.{} ({})", table, column, column_type);
                added += 1;
            }
        }
        Ok(added)
    }

    fn column_names(conn: &Connection, table: &str) -> Result<Vec<String>> {
        // Table names come from EXPECTED_COLUMNS, never from input.
        let mut stmt = conn
            .prepare(&format!("PRAGMA table_info({})", table))
            .map_err(|e| Error::Database(e.to_string()))?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(1))
            .map_err(|e| Error::Database(e.to_string()))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(names)
    }

    /// Insert every taxonomy subject and unit that is not already present.
    fn seed_taxonomy(conn: &Connection, taxonomy: &Taxonomy) -> Result<()> {
        for subject in taxonomy.subjects() {
            conn.prepare_cached("INSERT OR IGNORE INTO subjects (subject_name) VALUES (?1)")
                .map_err(|e| Error::Database(e.to_string()))?
                .execute(params![subject.name])
                .map_err(|e| Error::Database(e.to_string()))?;
            let subject_id = Self::subject_id_in(conn, &subject.name)?.ok_or_else(|| {
                Error::Internal(format!("Subject '{}' missing after insert", subject.name))
            })?;

            for unit in &subject.units {
                conn.prepare_cached(
                    "INSERT INTO units (unit_name, subject_id)
                     SELECT ?1, ?2
                     WHERE NOT EXISTS (SELECT 1 FROM units WHERE unit_name = ?1 AND subject_id = ?2)",
                )
                .map_err(|e| Error::Database(e.to_string()))?
                .execute(params![unit, subject_id])
                .map_err(|e| Error::Database(e.to_string()))?;
            }
        }
        Ok(())
    }

    /// Drop every table, recreate the schema and reseed the taxonomy.
    pub fn reset(&self) -> Result<()> {
        let mut conn = self.conn.lock();
        conn.execute_batch("PRAGMA foreign_keys = OFF;")
            .map_err(|e| Error::Database(e.to_string()))?;

        let rebuilt = Self::rebuild(&mut conn, &self.taxonomy);

        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(|e| Error::Database(e.to_string()))?;
        rebuilt?;

        info!("Store reset: {}", self.db_path.display());
        Ok(())
    }

    fn rebuild(conn: &mut Connection, taxonomy: &Taxonomy) -> Result<()> {
        let tx = conn
            .transaction()
            .map_err(|e| Error::Database(e.to_string()))?;
        for table in DROP_ORDER {
            tx.execute_batch(&format!("DROP TABLE IF EXISTS {};", table))
                .map_err(|e| Error::Database(format!("Dropping {} failed: {}", table, e)))?;
        }
        Self::init_schema(&tx)?;
        Self::init_indexes(&tx)?;
        Self::seed_taxonomy(&tx, taxonomy)?;
        tx.commit().map_err(|e| Error::Database(e.to_string()))?;
        Ok(())
    }

    // ---------------------------------------------------------------
    // Subject / Unit Resolution
    // ---------------------------------------------------------------

    fn subject_id_in(conn: &Connection, subject_name: &str) -> Result<Option<i64>> {
        conn.prepare_cached("SELECT subject_id FROM subjects WHERE subject_name = ?1")
            .map_err(|e| Error::Database(e.to_string()))?
            .query_row(params![subject_name], |row| row.get(0))
            .optional()
            .map_err(|e| Error::Database(e.to_string()))
    }

    /// Normalize a subject name and return its ID, creating the row if needed.
    pub fn get_or_create_subject_id(&self, subject_name: &str) -> Result<i64> {
        let mut conn = self.conn.lock();
        let tx = conn
            .transaction()
            .map_err(|e| Error::Database(e.to_string()))?;
        let normalized = normalize_subject(subject_name);

        let id = match Self::subject_id_in(&tx, &normalized)? {
            Some(id) => id,
            None => {
                info!("New subject '{}', adding to master table", normalized);
                tx.prepare_cached("INSERT INTO subjects (subject_name) VALUES (?1)")
                    .map_err(|e| Error::Database(e.to_string()))?
                    .insert(params![normalized])
                    .map_err(|e| Error::Database(e.to_string()))?
            }
        };
        tx.commit().map_err(|e| Error::Database(e.to_string()))?;
        Ok(id)
    }

    fn find_unit_id_in(conn: &Connection, subject_name: &str, unit_name: &str) -> Result<Option<i64>> {
        if subject_name.trim().is_empty() || unit_name.trim().is_empty() {
            return Ok(None);
        }
        let Some(subject_id) = Self::subject_id_in(conn, &normalize_subject(subject_name))? else {
            return Ok(None);
        };
        conn.prepare_cached("SELECT unit_id FROM units WHERE unit_name = ?1 AND subject_id = ?2")
            .map_err(|e| Error::Database(e.to_string()))?
            .query_row(params![unit_name, subject_id], |row| row.get(0))
            .optional()
            .map_err(|e| Error::Database(e.to_string()))
    }

    /// Resolve `(subject, unit)` to a unit ID. `None` when either lookup misses.
    pub fn find_unit_id(&self, subject_name: &str, unit_name: &str) -> Result<Option<i64>> {
        let conn = self.conn.lock();
        Self::find_unit_id_in(&conn, subject_name, unit_name)
    }

    /// Unit lookup that falls back to the uncategorized unit of the subject,
    /// then to the uncategorized subject.
    fn find_unit_id_or_fallback(conn: &Connection, subject_name: &str, unit_name: &str) -> Result<Option<i64>> {
        if let Some(id) = Self::find_unit_id_in(conn, subject_name, unit_name)? {
            return Ok(Some(id));
        }
        if let Some(id) = Self::find_unit_id_in(conn, subject_name, UNCATEGORIZED)? {
            debug!("Unit '{}' of '{}' not found, using {}", unit_name, subject_name, UNCATEGORIZED);
            return Ok(Some(id));
        }
        Self::find_unit_id_in(conn, UNCATEGORIZED, UNCATEGORIZED)
    }

    // ---------------------------------------------------------------
    // Problem Writes
    // ---------------------------------------------------------------

    /// Insert or replace a row. A record with no ID gets the next rowid.
    /// Returns the key the row was stored under.
    fn upsert_in(conn: &Connection, record: &ProblemRecord, unit_id: Option<i64>) -> Result<i64> {
        let analysis = record.analysis.as_ref();
        let pattern = analysis.map(|a| a.pattern_type.join(TAG_SEPARATOR)).unwrap_or_default();
        let pitfalls = analysis.map(|a| a.pitfalls.join(TAG_SEPARATOR)).unwrap_or_default();
        let logic = analysis.map(|a| a.logic_flow.as_str()).unwrap_or("");
        let difficulty = analysis.map(|a| a.difficulty_level()).unwrap_or(0);

        conn.prepare_cached(
            "INSERT OR REPLACE INTO problems (
                problem_id, source_text, year, month, number,
                unit_id, problem_type, logic_structure, pitfalls,
                problem_image_path, difficulty_level
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        )
        .map_err(|e| Error::Database(e.to_string()))?
        .execute(params![
            record.problem_id,
            record.source_text,
            record.year,
            record.month,
            record.number,
            unit_id,
            pattern,
            logic,
            pitfalls,
            record.image_path,
            difficulty,
        ])
        .map_err(|e| Error::Database(e.to_string()))?;
        Ok(record.problem_id.unwrap_or_else(|| conn.last_insert_rowid()))
    }

    /// Insert or fully replace a problem row keyed by its derived ID.
    pub fn upsert_problem(&self, record: &ProblemRecord, unit_id: Option<i64>) -> Result<i64> {
        let mut conn = self.conn.lock();
        let tx = conn
            .transaction()
            .map_err(|e| Error::Database(e.to_string()))?;
        let problem_id = Self::upsert_in(&tx, record, unit_id)?;
        tx.commit().map_err(|e| Error::Database(e.to_string()))?;
        Ok(problem_id)
    }

    fn concept_id_or_create_in(conn: &Connection, name: &str) -> Result<i64> {
        let existing: Option<i64> = conn
            .prepare_cached("SELECT concept_id FROM concepts WHERE concept_name = ?1")
            .map_err(|e| Error::Database(e.to_string()))?
            .query_row(params![name], |row| row.get(0))
            .optional()
            .map_err(|e| Error::Database(e.to_string()))?;
        match existing {
            Some(id) => Ok(id),
            None => conn
                .prepare_cached("INSERT INTO concepts (concept_name) VALUES (?1)")
                .map_err(|e| Error::Database(e.to_string()))?
                .insert(params![name])
                .map_err(|e| Error::Database(e.to_string())),
        }
    }

    fn sync_concepts_in(conn: &Connection, problem_id: i64, concepts: &[String]) -> Result<usize> {
        conn.prepare_cached("DELETE FROM problem_concept_map WHERE problem_id = ?1")
            .map_err(|e| Error::Database(e.to_string()))?
            .execute(params![problem_id])
            .map_err(|e| Error::Database(e.to_string()))?;

        let mut linked = 0;
        for name in concepts {
            let name = name.trim();
            if name.is_empty() {
                continue;
            }
            let concept_id = Self::concept_id_or_create_in(conn, name)?;
            linked += conn
                .prepare_cached(
                    "INSERT OR IGNORE INTO problem_concept_map (problem_id, concept_id) VALUES (?1, ?2)",
                )
                .map_err(|e| Error::Database(e.to_string()))?
                .execute(params![problem_id, concept_id])
                .map_err(|e| Error::Database(e.to_string()))?;
        }
        Ok(linked)
    }

    /// Replace the concept associations of a problem.
    /// Returns the number of associations now linked.
    pub fn sync_concepts(&self, problem_id: i64, concepts: &[String]) -> Result<usize> {
        let mut conn = self.conn.lock();
        let tx = conn
            .transaction()
            .map_err(|e| Error::Database(e.to_string()))?;
        let linked = Self::sync_concepts_in(&tx, problem_id, concepts)?;
        tx.commit().map_err(|e| Error::Database(e.to_string()))?;
        Ok(linked)
    }

    /// Upsert a record and its concepts inside a savepoint. A failure rolls
    /// back only this record.
    fn store_in_savepoint(tx: &mut Transaction<'_>, record: &ProblemRecord, unit_id: Option<i64>) -> Result<i64> {
        let sp = tx.savepoint().map_err(|e| Error::Database(e.to_string()))?;
        let problem_id = Self::upsert_in(&sp, record, unit_id)?;
        Self::sync_concepts_in(&sp, problem_id, record.concepts())?;
        sp.commit().map_err(|e| Error::Database(e.to_string()))?;
        Ok(problem_id)
    }

    // ---------------------------------------------------------------
    // Batch Sync
    // ---------------------------------------------------------------

    /// Persist every dataset row that carries a derived ID.
    ///
    /// Rows whose unit cannot be resolved are stored without one.
    pub fn sync_dataset(&self, rows: &[DatasetRow]) -> Result<SyncReport> {
        let mut report = SyncReport::default();
        let mut conn = self.conn.lock();
        let mut tx = conn
            .transaction()
            .map_err(|e| Error::Database(e.to_string()))?;

        for (index, row) in rows.iter().enumerate() {
            let Some(record) = ProblemRecord::from_dataset_row(row) else {
                report.skipped_no_id += 1;
                continue;
            };
            let unit_id = Self::find_unit_id_in(
                &tx,
                row.subject_name.as_deref().unwrap_or(""),
                row.unit_name.as_deref().unwrap_or(""),
            )?;

            match Self::store_in_savepoint(&mut tx, &record, unit_id) {
                Ok(_) => report.stored += 1,
                Err(e) => {
                    report.failed += 1;
                    warn!("Row {} ({}) failed to sync: {}", index, record.source_text, e);
                }
            }
        }

        tx.commit().map_err(|e| Error::Database(e.to_string()))?;
        info!(
            "Dataset sync complete: stored={}, no_id={}, failed={}",
            report.stored, report.skipped_no_id, report.failed
        );
        Ok(report)
    }

    /// Persist freshly extracted problems, falling back to the uncategorized
    /// unit when the extracted unit does not resolve.
    ///
    /// Problems without a derived ID are stored under a key SQLite assigns.
    pub fn save_extracted(&self, problems: &[ExtractedProblem]) -> Result<SyncReport> {
        let mut report = SyncReport::default();
        let mut conn = self.conn.lock();
        let mut tx = conn
            .transaction()
            .map_err(|e| Error::Database(e.to_string()))?;

        for problem in problems {
            let record = ProblemRecord::from_extracted(problem);
            let Some(unit_id) =
                Self::find_unit_id_or_fallback(&tx, &problem.subject_name, &problem.unit_name)?
            else {
                warn!(
                    "Problem {} not saved: no unit for {} > {}",
                    problem.number, problem.subject_name, problem.unit_name
                );
                report.skipped_no_unit += 1;
                continue;
            };

            match Self::store_in_savepoint(&mut tx, &record, Some(unit_id)) {
                Ok(problem_id) => {
                    if record.problem_id.is_none() {
                        debug!("Problem {} has no derived ID, stored as {}", problem.number, problem_id);
                    }
                    report.stored += 1;
                }
                Err(e) => {
                    report.failed += 1;
                    warn!("Problem {} failed to save: {}", problem.number, e);
                }
            }
        }

        tx.commit().map_err(|e| Error::Database(e.to_string()))?;
        info!("Saved {} extracted problems to {}", report.stored, self.db_path.display());
        Ok(report)
    }

    // ---------------------------------------------------------------
    // Reads
    // ---------------------------------------------------------------

    fn concepts_in(conn: &Connection, problem_id: i64) -> Result<Vec<String>> {
        let mut stmt = conn
            .prepare_cached(
                "SELECT c.concept_name
                 FROM concepts c
                 JOIN problem_concept_map m ON c.concept_id = m.concept_id
                 WHERE m.problem_id = ?1
                 ORDER BY m.map_id",
            )
            .map_err(|e| Error::Database(e.to_string()))?;
        let names = stmt
            .query_map(params![problem_id], |row| row.get::<_, String>(0))
            .map_err(|e| Error::Database(e.to_string()))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(names)
    }

    /// Concept tags currently associated with a problem.
    pub fn concepts_for(&self, problem_id: i64) -> Result<Vec<String>> {
        let conn = self.conn.lock();
        Self::concepts_in(&conn, problem_id)
    }

    /// Every problem filed under exactly `(subject, unit)`, with its concepts.
    /// Empty when the unit is unknown.
    pub fn candidates_by_unit(&self, subject_name: &str, unit_name: &str) -> Result<Vec<Candidate>> {
        let conn = self.conn.lock();
        let Some(unit_id) = Self::find_unit_id_in(&conn, subject_name, unit_name)? else {
            debug!("No unit for {} > {}, no candidates", subject_name, unit_name);
            return Ok(Vec::new());
        };

        let mut stmt = conn
            .prepare_cached(
                "SELECT problem_id, problem_type, logic_structure, pitfalls,
                        difficulty_level, problem_image_path, source_text
                 FROM problems WHERE unit_id = ?1 ORDER BY problem_id",
            )
            .map_err(|e| Error::Database(e.to_string()))?;
        let mut candidates = stmt
            .query_map(params![unit_id], |row| Ok(Self::row_to_candidate(row)))
            .map_err(|e| Error::Database(e.to_string()))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| Error::Database(e.to_string()))?;

        for candidate in &mut candidates {
            candidate.core_concepts = Self::concepts_in(&conn, candidate.id)?;
        }
        Ok(candidates)
    }

    /// Get a problem by derived ID.
    pub fn get_problem(&self, problem_id: i64) -> Result<Option<StoredProblem>> {
        let conn = self.conn.lock();
        let row = conn
            .prepare_cached("SELECT * FROM problems WHERE problem_id = ?1")
            .map_err(|e| Error::Database(e.to_string()))?
            .query_row(params![problem_id], |row| Ok(Self::row_to_problem(row)))
            .optional()
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(row)
    }

    pub fn count_problems(&self) -> Result<i64> {
        let conn = self.conn.lock();
        conn.query_row("SELECT COUNT(*) FROM problems", [], |row| row.get(0))
            .map_err(|e| Error::Database(e.to_string()))
    }

    // ---------------------------------------------------------------
    // Stats
    // ---------------------------------------------------------------

    /// Get store statistics.
    pub fn get_stats(&self) -> Result<StoreStats> {
        let conn = self.conn.lock();
        let count = |table: &str| -> Result<i64> {
            conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))
                .map_err(|e| Error::Database(e.to_string()))
        };
        let total_problems = count("problems")?;
        let total_concepts = count("concepts")?;
        let total_subjects = count("subjects")?;
        let total_units = count("units")?;
        drop(conn);

        let db_size = std::fs::metadata(&self.db_path)
            .map(|m| m.len())
            .unwrap_or(0);

        Ok(StoreStats {
            total_problems,
            total_concepts,
            total_subjects,
            total_units,
            db_path: self.db_path.to_string_lossy().to_string(),
            db_size_mb: db_size as f64 / (1024.0 * 1024.0),
        })
    }

    // ---------------------------------------------------------------
    // Row Mapping Helpers
    // ---------------------------------------------------------------

    fn split_tags(joined: Option<String>) -> Vec<String> {
        joined
            .unwrap_or_default()
            .split(TAG_SEPARATOR)
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(String::from)
            .collect()
    }

    fn row_difficulty(row: &rusqlite::Row<'_>) -> Option<u8> {
        row.get::<_, Option<i64>>("difficulty_level")
            .ok()
            .flatten()
            .and_then(difficulty_from_level)
    }

    fn row_to_candidate(row: &rusqlite::Row<'_>) -> Candidate {
        Candidate {
            id: row.get("problem_id").unwrap_or(0),
            pattern_type: Self::split_tags(row.get("problem_type").ok().flatten()),
            logic_flow: row
                .get::<_, Option<String>>("logic_structure")
                .ok()
                .flatten()
                .unwrap_or_default(),
            pitfalls: Self::split_tags(row.get("pitfalls").ok().flatten()),
            difficulty: Self::row_difficulty(row),
            core_concepts: Vec::new(),
            image_path: row.get("problem_image_path").ok().flatten(),
            source_text: row.get("source_text").unwrap_or_default(),
        }
    }

    fn row_to_problem(row: &rusqlite::Row<'_>) -> StoredProblem {
        StoredProblem {
            problem_id: row.get("problem_id").unwrap_or(0),
            source_text: row.get("source_text").unwrap_or_default(),
            year: row.get("year").ok().flatten(),
            month: row.get("month").ok().flatten(),
            number: row.get("number").ok().flatten(),
            unit_id: row.get("unit_id").ok().flatten(),
            pattern_type: Self::split_tags(row.get("problem_type").ok().flatten()),
            logic_flow: row
                .get::<_, Option<String>>("logic_structure")
                .ok()
                .flatten()
                .unwrap_or_default(),
            pitfalls: Self::split_tags(row.get("pitfalls").ok().flatten()),
            image_path: row.get("problem_image_path").ok().flatten(),
            difficulty: Self::row_difficulty(row),
        }
    }
}
