use std::{
    collections::HashMap,
    fs::OpenOptions,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::{domain::download_record::DownloadRecord, error::Result};

#[derive(Debug, Serialize, Deserialize)]
struct DownloadLogEntry {
    #[serde(rename = "RN Number")]
    identifier: String,
    #[serde(rename = "File Name")]
    file_name: String,
}

/// Every stored document, one line per file.
pub struct DownloadLog {
    path: PathBuf,
    files_per_identifier: HashMap<String, usize>,
}

impl DownloadLog {
    pub fn open(path: &Path) -> Result<Self> {
        let mut files_per_identifier = HashMap::new();

        if path.exists() {
            let mut reader = csv::Reader::from_path(path)?;
            for entry in reader.deserialize::<DownloadLogEntry>() {
                match entry {
                    Ok(entry) => {
                        *files_per_identifier
                            .entry(entry.identifier.trim().to_string())
                            .or_insert(0) += 1
                    }
                    Err(e) => log::warn!("Skipping unreadable download log line: {}", e),
                }
            }
        }

        Ok(DownloadLog {
            path: path.to_path_buf(),
            files_per_identifier,
        })
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.files_per_identifier.contains_key(identifier.trim())
    }

    pub fn files_for(&self, identifier: &str) -> usize {
        self.files_per_identifier
            .get(identifier.trim())
            .copied()
            .unwrap_or_default()
    }

    pub fn append(&mut self, record: &DownloadRecord) -> Result<()> {
        let write_header = !self.path.exists();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(write_header)
            .from_writer(file);
        writer.serialize(DownloadLogEntry {
            identifier: record.identifier.clone(),
            file_name: record.file_name(),
        })?;
        writer.flush()?;

        *self
            .files_per_identifier
            .entry(record.identifier.clone())
            .or_insert(0) += 1;
        Ok(())
    }
}
