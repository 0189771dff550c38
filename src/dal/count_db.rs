use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use crate::error::Result;

/// A two column CSV of counts keyed by target or identifier, rewritten whole
/// on every save.
pub struct CountLedger {
    path: PathBuf,
    key_column: String,
    count_column: String,
    counts: BTreeMap<String, usize>,
}

impl CountLedger {
    pub fn open(path: &Path, key_column: &str, count_column: &str) -> Result<Self> {
        let mut counts = BTreeMap::new();

        if path.exists() {
            let mut reader = csv::Reader::from_path(path)?;
            let headers = reader.headers()?.clone();
            let key_index = headers.iter().position(|h| h.trim() == key_column);
            let count_index = headers.iter().position(|h| h.trim() == count_column);

            if let (Some(key_index), Some(count_index)) = (key_index, count_index) {
                for record in reader.records() {
                    let record = match record {
                        Ok(record) => record,
                        Err(e) => {
                            log::warn!("Skipping unreadable line in {:?}: {}", path, e);
                            continue;
                        }
                    };
                    let key = record.get(key_index).unwrap_or_default().trim();
                    match record.get(count_index).unwrap_or_default().trim().parse() {
                        Ok(count) if !key.is_empty() => {
                            counts.insert(key.to_string(), count);
                        }
                        _ => log::warn!("Skipping malformed count line in {:?}", path),
                    }
                }
            } else {
                log::warn!(
                    "{:?} has no {} / {} columns, starting a fresh ledger",
                    path,
                    key_column,
                    count_column
                );
            }
        }

        Ok(CountLedger {
            path: path.to_path_buf(),
            key_column: key_column.to_string(),
            count_column: count_column.to_string(),
            counts,
        })
    }

    pub fn get(&self, key: &str) -> Option<usize> {
        self.counts.get(key).copied()
    }

    pub fn set(&mut self, key: &str, count: usize) {
        self.counts.insert(key.to_string(), count);
    }

    /// Adds to whatever an earlier session left, returning the new total.
    pub fn add(&mut self, key: &str, count: usize) -> usize {
        let total = self.counts.entry(key.to_string()).or_insert(0);
        *total += count;
        *total
    }

    pub fn save(&self) -> Result<()> {
        let tmp = self.path.with_extension("csv.tmp");
        let mut writer = csv::Writer::from_path(&tmp)?;
        writer.write_record([&self.key_column, &self.count_column])?;
        for (key, count) in &self.counts {
            writer.write_record([key.as_str(), count.to_string().as_str()])?;
        }
        writer.flush()?;
        drop(writer);

        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}
