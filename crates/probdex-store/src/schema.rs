//! Database schema SQL and the expected column sets used for evolution.

/// Core tables.
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS subjects (
    subject_id INTEGER PRIMARY KEY AUTOINCREMENT,
    subject_name TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS units (
    unit_id INTEGER PRIMARY KEY AUTOINCREMENT,
    unit_name TEXT NOT NULL,
    subject_id INTEGER NOT NULL REFERENCES subjects(subject_id),
    UNIQUE (subject_id, unit_name)
);

CREATE TABLE IF NOT EXISTS concepts (
    concept_id INTEGER PRIMARY KEY AUTOINCREMENT,
    concept_name TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS problems (
    problem_id INTEGER PRIMARY KEY,
    source_text TEXT NOT NULL,
    year INTEGER,
    month TEXT,
    number INTEGER,
    unit_id INTEGER REFERENCES units(unit_id),
    problem_type TEXT,
    logic_structure TEXT,
    pitfalls TEXT,
    problem_image_path TEXT,
    difficulty_level INTEGER
);

CREATE TABLE IF NOT EXISTS problem_concept_map (
    map_id INTEGER PRIMARY KEY AUTOINCREMENT,
    problem_id INTEGER NOT NULL REFERENCES problems(problem_id) ON DELETE CASCADE,
    concept_id INTEGER NOT NULL REFERENCES concepts(concept_id) ON DELETE CASCADE,
    UNIQUE (problem_id, concept_id)
);
"#;

/// Indexes over columns an older database may lack until evolution runs.
pub const INDEX_SQL: &str = r#"
CREATE INDEX IF NOT EXISTS idx_problems_unit ON problems(unit_id);
CREATE INDEX IF NOT EXISTS idx_concept_map_problem ON problem_concept_map(problem_id);
"#;

/// Drop order for a full reset: association table before its parents.
pub const DROP_ORDER: &[&str] = &[
    "problem_concept_map",
    "problems",
    "concepts",
    "units",
    "subjects",
];

/// Columns every table must carry, with the type used when adding them to an
/// older database.
pub const EXPECTED_COLUMNS: &[(&str, &[(&str, &str)])] = &[
    ("subjects", &[("subject_id", "INTEGER"), ("subject_name", "TEXT")]),
    (
        "units",
        &[("unit_id", "INTEGER"), ("unit_name", "TEXT"), ("subject_id", "INTEGER")],
    ),
    ("concepts", &[("concept_id", "INTEGER"), ("concept_name", "TEXT")]),
    (
        "problems",
        &[
            ("problem_id", "INTEGER"),
            ("source_text", "TEXT"),
            ("year", "INTEGER"),
            ("month", "TEXT"),
            ("number", "INTEGER"),
            ("unit_id", "INTEGER"),
            ("problem_type", "TEXT"),
            ("logic_structure", "TEXT"),
            ("pitfalls", "TEXT"),
            ("problem_image_path", "TEXT"),
            ("difficulty_level", "INTEGER"),
        ],
    ),
    (
        "problem_concept_map",
        &[("map_id", "INTEGER"), ("problem_id", "INTEGER"), ("concept_id", "INTEGER")],
    ),
];

/// Separator for tag lists stored in a single text column.
pub const TAG_SEPARATOR: &str = ", ";
