//! Filename conventions that carry exam metadata.
//!
//! Documents are named `kice_{year}_{month}_{subject}[_split].pdf` and their
//! rasterized pages `{stem}_p{page}.png`. These names are the only channel for
//! recovering year, month, subject and page after the fact.

use std::path::Path;

use crate::taxonomy::{CALCULUS, COMMON, GEOMETRY, STATISTICS};

/// Months with a published exam.
pub const EXAM_MONTHS: &[&str] = &["06", "09", "11"];

/// Map a filename subject part onto its skeleton subject.
pub fn subject_from_part(part: &str) -> Option<&'static str> {
    match part {
        "common" => Some(COMMON),
        "cal" => Some(CALCULUS),
        "geo" => Some(GEOMETRY),
        "sta" => Some(STATISTICS),
        _ => None,
    }
}

/// File name without directories or extension.
pub fn file_stem(name: &str) -> &str {
    let file = Path::new(name)
        .file_name()
        .and_then(|f| f.to_str())
        .unwrap_or(name);
    match file.rfind('.') {
        Some(idx) if idx > 0 => &file[..idx],
        _ => file,
    }
}

/// Metadata encoded in a document stem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentMeta {
    pub stem: String,
    pub year: i64,
    /// Normalized month: `"06"`, `"09"` or `"11"`.
    pub month: String,
    pub subject_part: Option<String>,
    pub split: bool,
}

impl DocumentMeta {
    /// Parse a document path, file name, or stem.
    pub fn parse(name: &str) -> Option<Self> {
        let stem = file_stem(name);
        let parts: Vec<&str> = stem.split('_').collect();
        if parts.len() < 3 || parts[0] != "kice" {
            return None;
        }

        let year: i64 = parts[1].parse().ok()?;
        let month = match parts[2] {
            "csat" => "11",
            m => m,
        };
        if !EXAM_MONTHS.contains(&month) {
            return None;
        }

        Some(Self {
            stem: stem.to_string(),
            year,
            month: month.to_string(),
            subject_part: parts.get(3).map(|s| s.to_string()),
            split: parts.get(4) == Some(&"split"),
        })
    }

    /// Skeleton subject of this document (`common` → 공통, `cal` → 미적분, ...).
    pub fn subject(&self) -> Option<&'static str> {
        self.subject_part.as_deref().and_then(subject_from_part)
    }
}

/// A page image reference `{stem}_p{page}.{ext}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PageImageName {
    pub stem: String,
    pub page: u32,
}

impl PageImageName {
    pub fn new(stem: impl Into<String>, page: u32) -> Self {
        Self {
            stem: stem.into(),
            page,
        }
    }

    /// Split at the last `_p`; the page is the integer before the first `.`.
    pub fn parse(name: &str) -> Option<Self> {
        let file = Path::new(name)
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or(name);
        let (stem, rest) = file.rsplit_once("_p")?;
        let page_str = rest.split('.').next()?;
        let page = page_str.parse().ok()?;
        if stem.is_empty() {
            return None;
        }
        Some(Self::new(stem, page))
    }

    pub fn file_name(&self, extension: &str) -> String {
        format!("{}_p{}.{}", self.stem, self.page, extension)
    }
}
