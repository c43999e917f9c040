//! Page sources: where page bytes come from.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::types::PageBlob;
use probdex_core::naming::file_stem;
use probdex_core::{Error, PageImageName, Result};

/// Supplies the pages of a document, ordered by page number.
pub trait PageSource: Send + Sync {
    fn pages(&self, document: &str) -> Result<Vec<PageBlob>>;
}

/// Reads rasterized pages named `{stem}_p{page}.{png|jpg|jpeg}` from one
/// directory.
pub struct ImageDirPageSource {
    dir: PathBuf,
}

impl ImageDirPageSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

fn mime_for(name: &str) -> Option<&'static str> {
    let ext = Path::new(name).extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        _ => None,
    }
}

impl PageSource for ImageDirPageSource {
    fn pages(&self, document: &str) -> Result<Vec<PageBlob>> {
        if !self.dir.is_dir() {
            return Err(Error::NotFound(format!("Page directory {}", self.dir.display())));
        }
        let stem = file_stem(document);

        let mut pages = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let entry = entry?;
            let Some(name) = entry.file_name().to_str().map(String::from) else {
                continue;
            };
            let Some(mime) = mime_for(&name) else {
                continue;
            };
            match PageImageName::parse(&name) {
                Some(parsed) if parsed.stem == stem => {
                    pages.push(PageBlob {
                        page: parsed.page,
                        bytes: std::fs::read(entry.path())?,
                        mime_type: mime.to_string(),
                        image_name: Some(name),
                    });
                }
                _ => {}
            }
        }

        pages.sort_by_key(|p| p.page);
        debug!("Found {} page images for {} in {}", pages.len(), stem, self.dir.display());
        Ok(pages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_pages_for_document() {
        let dir = TempDir::new().unwrap();
        for name in [
            "kice_2024_06_common_p10.png",
            "kice_2024_06_common_p2.png",
            "kice_2024_06_common_p1.jpg",
            "kice_2024_06_common_split_p1.png",
            "kice_2024_06_common_p3.txt",
        ] {
            std::fs::write(dir.path().join(name), name.as_bytes()).unwrap();
        }

        let source = ImageDirPageSource::new(dir.path());
        let pages = source.pages("raw/kice_2024_06_common.pdf").unwrap();

        assert_eq!(pages.iter().map(|p| p.page).collect::<Vec<_>>(), vec![1, 2, 10]);
        assert_eq!(pages[0].mime_type, "image/jpeg");
        assert_eq!(pages[1].mime_type, "image/png");
        assert_eq!(pages[1].bytes, b"kice_2024_06_common_p2.png");
        assert_eq!(pages[2].image_name.as_deref(), Some("kice_2024_06_common_p10.png"));
    }

    #[test]
    fn test_unknown_document_has_no_pages() {
        let dir = TempDir::new().unwrap();
        let source = ImageDirPageSource::new(dir.path());
        assert!(source.pages("kice_2023_09_cal_split.pdf").unwrap().is_empty());
    }

    #[test]
    fn test_missing_directory() {
        let source = ImageDirPageSource::new("/nonexistent/probdex/pages");
        assert!(matches!(source.pages("x.pdf"), Err(Error::NotFound(_))));
    }
}
