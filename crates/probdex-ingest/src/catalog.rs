//! Skeleton catalogue: one placeholder row per problem, built from page
//! image names and the fixed exam layout.

use std::collections::HashSet;
use std::path::Path;

use tracing::{debug, info};

use probdex_core::taxonomy::COMMON;
use probdex_core::{DatasetRow, DocumentMeta, Error, PageImageName, Result};

/// Problem numbers printed on each page of the common section.
const COMMON_LAYOUT: &[&[i64]] = &[
    &[1, 2, 3, 4],
    &[5, 6, 7],
    &[8, 9, 10],
    &[11, 12],
    &[13, 14],
    &[15, 16, 17],
    &[18, 19, 20],
    &[21, 22],
];

/// Problem numbers on each page of an elective section.
const ELECTIVE_LAYOUT: &[&[i64]] = &[&[23, 24], &[25, 26], &[27, 28], &[29, 30]];

/// Problem numbers printed on `page` (1-based) of a section of `subject`.
pub fn problems_on_page(subject: &str, page: u32) -> Option<&'static [i64]> {
    let layout = if subject == COMMON {
        COMMON_LAYOUT
    } else {
        ELECTIVE_LAYOUT
    };
    let index = usize::try_from(page).ok()?.checked_sub(1)?;
    layout.get(index).copied()
}

/// PNG page images in `dir`, sorted by name.
pub fn list_page_images(dir: &Path) -> Result<Vec<String>> {
    if !dir.is_dir() {
        return Err(Error::NotFound(format!("Image directory {}", dir.display())));
    }
    let mut names: Vec<String> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_file())
        .filter_map(|entry| entry.file_name().to_str().map(String::from))
        .filter(|name| name.to_lowercase().ends_with(".png"))
        .collect();
    names.sort();
    Ok(names)
}

/// Build skeleton rows for every image not already referenced by `existing`.
pub fn catalogue_images<'a>(
    existing: &[DatasetRow],
    image_names: impl IntoIterator<Item = &'a str>,
) -> Vec<DatasetRow> {
    let registered: HashSet<&str> = existing
        .iter()
        .filter_map(|row| row.problem_image_path.as_deref())
        .collect();

    let mut rows = Vec::new();
    let mut images = 0;
    for name in image_names {
        if registered.contains(name) {
            continue;
        }
        let new_rows = skeleton_rows(name);
        if !new_rows.is_empty() {
            images += 1;
        }
        rows.extend(new_rows);
    }

    info!("Catalogued {} skeleton rows from {} new images", rows.len(), images);
    rows
}

fn skeleton_rows(image_name: &str) -> Vec<DatasetRow> {
    let Some(page) = PageImageName::parse(image_name) else {
        debug!("Not a page image name: {}", image_name);
        return Vec::new();
    };
    let Some(meta) = DocumentMeta::parse(&page.stem) else {
        debug!("Unrecognized document stem: {}", page.stem);
        return Vec::new();
    };
    let Some(subject) = meta.subject() else {
        debug!("Unknown subject part in {}", image_name);
        return Vec::new();
    };
    let Some(numbers) = problems_on_page(subject, page.page) else {
        debug!("No layout for {} page {}", subject, page.page);
        return Vec::new();
    };

    numbers
        .iter()
        .map(|&number| DatasetRow {
            problem_id: None,
            source_data: Some(format!(
                "{}학년도 {}월 {} {}번",
                meta.year, meta.month, subject, number
            )),
            subject_name: Some(subject.to_string()),
            unit_name: None,
            year: Some(meta.year),
            month: Some(meta.month.clone()),
            number: Some(number),
            ai_analysis: None,
            problem_image_path: Some(image_name.to_string()),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use probdex_core::taxonomy::{CALCULUS, STATISTICS};

    #[test]
    fn test_problems_on_page() {
        assert_eq!(problems_on_page(COMMON, 1), Some(&[1, 2, 3, 4][..]));
        assert_eq!(problems_on_page(COMMON, 8), Some(&[21, 22][..]));
        assert_eq!(problems_on_page(COMMON, 9), None);
        assert_eq!(problems_on_page(CALCULUS, 4), Some(&[29, 30][..]));
        assert_eq!(problems_on_page(STATISTICS, 5), None);
        assert_eq!(problems_on_page(CALCULUS, 0), None);
    }

    #[test]
    fn test_catalogue_builds_skeleton_rows() {
        let rows = catalogue_images(&[], ["kice_2024_06_common_p8.png", "kice_2025_csat_cal_split_p1.png"]);

        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0].number, Some(21));
        assert_eq!(rows[0].subject_name.as_deref(), Some(COMMON));
        assert_eq!(rows[0].source_data.as_deref(), Some("2024학년도 06월 공통 21번"));
        assert_eq!(rows[0].problem_image_path.as_deref(), Some("kice_2024_06_common_p8.png"));
        assert!(rows[0].problem_id.is_none());
        assert!(rows[0].unit_name.is_none());

        assert_eq!(rows[2].month.as_deref(), Some("11"));
        assert_eq!(rows[2].subject_name.as_deref(), Some(CALCULUS));
        assert_eq!(rows[3].number, Some(24));
    }

    #[test]
    fn test_catalogue_skips_registered_and_unknown() {
        let existing = catalogue_images(&[], ["kice_2024_06_common_p2.png"]);
        let rows = catalogue_images(
            &existing,
            [
                "kice_2024_06_common_p2.png",
                "kice_2024_06_common_p9.png",
                "kice_2024_06_bio_p1.png",
                "notes.png",
                "kice_2024_06_geo_split_p2.png",
            ],
        );

        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.problem_image_path.as_deref() == Some("kice_2024_06_geo_split_p2.png")));
    }

    #[test]
    fn test_list_page_images_sorted() {
        let dir = tempfile::TempDir::new().unwrap();
        for name in ["b_p2.png", "a_p1.PNG", "readme.txt"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        let names = list_page_images(dir.path()).unwrap();
        assert_eq!(names, vec!["a_p1.PNG", "b_p2.png"]);

        assert!(list_page_images(&dir.path().join("missing")).is_err());
    }
}
