//! Skip sets: pages whose problems already carry a usable analysis.

use std::collections::{BTreeSet, HashMap};

use tracing::debug;

use probdex_core::{DatasetRow, PageImageName};

/// Document stem → page numbers already analyzed.
pub type SkipMap = HashMap<String, BTreeSet<u32>>;

/// Derive the skip map from the persisted dataset.
///
/// A page is skipped only if some row referencing it has a usable analysis.
pub fn analyzed_pages(rows: &[DatasetRow]) -> SkipMap {
    let mut map = SkipMap::new();
    for row in rows.iter().filter(|r| r.has_usable_analysis()) {
        let Some(image) = row.problem_image_path.as_deref() else {
            continue;
        };
        match PageImageName::parse(image) {
            Some(name) => {
                map.entry(name.stem).or_default().insert(name.page);
            }
            None => debug!("Unparseable image reference: {}", image),
        }
    }
    map
}
