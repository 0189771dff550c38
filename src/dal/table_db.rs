use std::{
    fs,
    path::{Path, PathBuf},
};

use itertools::Itertools;

use crate::{
    domain::{column_matcher::ColumnMatcher, result_row::TargetResultSet, target::Target},
    error::{CrawlError, Result, ScrapeError},
};

use super::is_bookkeeping_file;

/// Writes one target's rows to `{dir}/{target}.csv`, with the target itself
/// appended as `target_column`. Nothing is written for an empty set.
pub fn write_result_set(
    dir: &Path,
    set: &TargetResultSet,
    target_column: &str,
) -> Result<Option<PathBuf>> {
    if set.rows.is_empty() {
        return Ok(None);
    }

    let mut headers = set.headers();
    let add_target = !headers.iter().any(|h| h == target_column);
    if add_target {
        headers.push(target_column.to_string());
    }

    let path = dir.join(format!("{}.csv", set.target.file_stem()));
    let mut writer = csv::Writer::from_path(&path)?;
    writer.write_record(&headers)?;
    for row in &set.rows {
        writer.write_record(headers.iter().map(|h| match row.get(h) {
            Some(value) => value,
            None if h == target_column => set.target.value(),
            None => "",
        }))?;
    }
    writer.flush()?;

    log::info!("Saved {} rows to {:?}", set.count(), path);
    Ok(Some(path))
}

/// Non-empty trimmed values of the first column accepted by `matcher`, or
/// `None` when the file has no such column.
pub fn read_column(path: &Path, matcher: &ColumnMatcher) -> Result<Option<Vec<String>>> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
    let headers = reader.headers()?.clone();
    let Some(index) = matcher.position(headers.iter()) else {
        return Ok(None);
    };

    let mut values = vec![];
    for record in reader.records() {
        match record {
            Ok(record) => {
                if let Some(value) = record.get(index).map(str::trim) {
                    if !value.is_empty() {
                        values.push(value.to_string());
                    }
                }
            }
            Err(e) => log::warn!("Skipping unreadable line in {:?}: {}", path, e),
        }
    }
    Ok(Some(values))
}

/// A target universe from a reference CSV, first occurrence order kept.
pub fn read_targets(path: &Path, matcher: &ColumnMatcher) -> Result<Vec<Target>> {
    let values = read_column(path, matcher)?.ok_or_else(|| {
        ScrapeError::Parse(format!("{:?} has no column matching {:?}", path, matcher))
    })?;
    Ok(values.into_iter().unique().map(Target::new).collect())
}

/// Result CSVs in `dirs`, sorted by path. Missing directories are skipped.
pub fn csv_files_in(dirs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = vec![];
    for dir in dirs {
        if !dir.is_dir() {
            log::warn!("Input directory {:?} does not exist, skipping", dir);
            continue;
        }
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            let is_csv = path.extension().is_some_and(|ext| ext == "csv");
            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
            if path.is_file() && is_csv && !is_bookkeeping_file(name) {
                files.push(path);
            }
        }
    }
    files.sort();
    Ok(files)
}

pub fn write_registry(path: &Path, identifiers: &[String]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(["RN Number"])?;
    for identifier in identifiers {
        writer.write_record([identifier])?;
    }
    writer.flush()?;
    Ok(())
}

/// Saves the markup captured with a failed crawl as `error_{target}.html`.
pub fn dump_failure(dir: &Path, error: &CrawlError) -> Result<Option<PathBuf>> {
    let Some(page_source) = &error.page_source else {
        return Ok(None);
    };
    let path = dir.join(format!(
        "error_{}.html",
        Target::new(error.target.as_str()).file_stem()
    ));
    fs::write(&path, page_source)?;
    log::info!("Saved page source to {:?}", path);
    Ok(Some(path))
}
