use std::{
    collections::{HashMap, HashSet},
    fs::OpenOptions,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::{
    domain::target::{Outcome, Target},
    error::Result,
};

use super::table_db::csv_files_in;

#[derive(Debug, Serialize, Deserialize)]
struct LogEntry {
    target: String,
    outcome: Outcome,
}

/// Append-only record of every target a job has finished with. A target in
/// the log is never searched again by that job.
pub struct ProcessedLog {
    path: PathBuf,
    entries: HashMap<String, Outcome>,
    existed: bool,
}

impl ProcessedLog {
    pub fn open(path: &Path) -> Result<Self> {
        let mut entries = HashMap::new();
        let existed = path.exists();

        if existed {
            let mut reader = csv::Reader::from_path(path)?;
            for entry in reader.deserialize::<LogEntry>() {
                match entry {
                    Ok(entry) => {
                        entries.insert(entry.target.trim().to_string(), entry.outcome);
                    }
                    Err(e) => log::warn!("Skipping unreadable processed log line: {}", e),
                }
            }
        }

        log::info!(
            "Loaded processed log {:?} with {} targets",
            path,
            entries.len()
        );
        Ok(ProcessedLog {
            path: path.to_path_buf(),
            entries,
            existed,
        })
    }

    /// True until the first entry is written to disk.
    pub fn is_new(&self) -> bool {
        !self.existed
    }

    pub fn contains(&self, target: &str) -> bool {
        self.entries.contains_key(target.trim())
    }

    pub fn outcome(&self, target: &str) -> Option<Outcome> {
        self.entries.get(target.trim()).copied()
    }

    pub fn targets(&self) -> HashSet<String> {
        self.entries.keys().cloned().collect()
    }

    /// Number of distinct targets logged so far.
    pub fn count(&self) -> usize {
        self.entries.len()
    }

    pub fn record(&mut self, target: &Target, outcome: Outcome) -> Result<()> {
        let write_header = !self.path.exists();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(write_header)
            .from_writer(file);
        writer.serialize(LogEntry {
            target: target.value().to_string(),
            outcome,
        })?;
        writer.flush()?;

        self.existed = true;
        self.entries.insert(target.value().to_string(), outcome);
        Ok(())
    }

    /// Seeds a brand new log from per-target output files already present in
    /// `dir`, so runs made before the log existed are not repeated. File stems
    /// are matched back to the universe target that produced them; a stem with
    /// no match is logged as is. Does nothing once the log has been written.
    pub fn migrate_from_outputs(&mut self, dir: &Path, universe: &[Target]) -> Result<usize> {
        if !self.is_new() {
            return Ok(0);
        }

        let by_stem: HashMap<String, &Target> =
            universe.iter().map(|t| (t.file_stem(), t)).collect();
        let mut migrated = 0;
        for file in csv_files_in(&[dir.to_path_buf()])? {
            let Some(stem) = file.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let target = match by_stem.get(stem) {
                Some(target) => (*target).clone(),
                None => Target::new(stem),
            };
            if self.contains(target.value()) {
                continue;
            }
            self.record(&target, Outcome::Migrated)?;
            migrated += 1;
        }

        log::info!("Migrated {} targets from existing output in {:?}", migrated, dir);
        Ok(migrated)
    }
}
