pub mod count_db;
pub mod download_log_db;
pub mod processed_log_db;
pub mod table_db;

/// Bookkeeping files kept next to per-target output; never treated as results.
pub const PROCESSED_LOG_FILE: &str = "processed_log.csv";
pub const RECORD_COUNTS_FILE: &str = "record_counts.csv";

pub fn is_bookkeeping_file(name: &str) -> bool {
    name == PROCESSED_LOG_FILE || name == RECORD_COUNTS_FILE
}
