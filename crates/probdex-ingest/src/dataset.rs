//! Canonical dataset file: a pretty-printed JSON array of dataset rows.

use std::path::Path;

use tracing::{debug, info};

use probdex_core::{DatasetRow, Error, Result};

/// Load the dataset. A missing file is an empty dataset.
pub fn load_dataset(path: &Path) -> Result<Vec<DatasetRow>> {
    if !path.exists() {
        debug!("No dataset at {}, starting empty", path.display());
        return Ok(Vec::new());
    }
    let text = std::fs::read_to_string(path)?;
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }
    let rows: Vec<DatasetRow> = serde_json::from_str(&text)
        .map_err(|e| Error::Storage(format!("Dataset {} unreadable: {}", path.display(), e)))?;
    debug!("Loaded {} dataset rows from {}", rows.len(), path.display());
    Ok(rows)
}

/// Write the dataset through a temporary sibling file, then rename it over
/// the target.
pub fn save_dataset(path: &Path, rows: &[DatasetRow]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(rows)?;

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = std::path::PathBuf::from(tmp_name);

    std::fs::write(&tmp_path, json)?;
    if let Err(e) = std::fs::rename(&tmp_path, path) {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(e.into());
    }

    info!("Saved {} dataset rows to {}", rows.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use probdex_core::Analysis;
    use tempfile::TempDir;

    #[test]
    fn test_missing_dataset_is_empty() {
        let dir = TempDir::new().unwrap();
        assert!(load_dataset(&dir.path().join("base_problems.json")).unwrap().is_empty());
    }

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/base_problems.json");
        let rows = vec![DatasetRow {
            problem_id: Some(2024062401),
            subject_name: Some("수학1".into()),
            month: Some("06".into()),
            ai_analysis: Some(Analysis {
                core_concepts: vec!["등차수열".into()],
                logic_flow: "일반항을 구한다".into(),
                difficulty: Some(3),
                ..Default::default()
            }),
            ..Default::default()
        }];

        save_dataset(&path, &rows).unwrap();
        assert!(!dir.path().join("nested/base_problems.json.tmp").exists());

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("등차수열"), "dataset is written as UTF-8 text");
        assert_eq!(load_dataset(&path).unwrap(), rows);
    }

    #[test]
    fn test_corrupt_dataset_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("base_problems.json");
        std::fs::write(&path, "{not an array").unwrap();
        assert!(matches!(load_dataset(&path), Err(Error::Storage(_))));
    }
}
