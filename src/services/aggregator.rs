use std::{collections::BTreeSet, path::PathBuf};

use crate::{dal::table_db::read_column, domain::column_matcher::ColumnMatcher};

/// Union of the identifier column across `paths`, deduplicated and sorted.
/// Files without a matching column, or that cannot be read, are skipped.
pub fn aggregate(paths: &[PathBuf], matcher: &ColumnMatcher) -> Vec<String> {
    let mut identifiers = BTreeSet::new();

    for path in paths {
        match read_column(path, matcher) {
            Ok(Some(values)) => {
                log::debug!("{} identifiers in {:?}", values.len(), path);
                identifiers.extend(values);
            }
            Ok(None) => log::warn!("No identifier column in {:?}, skipping", path),
            Err(e) => log::warn!("Could not read {:?}, skipping: {}", path, e),
        }
    }

    log::info!(
        "Aggregated {} unique identifiers from {} files",
        identifiers.len(),
        paths.len()
    );
    identifiers.into_iter().collect()
}
