use uuid::Uuid;

use super::target::sanitize_file_part;

/// A downloaded and validated permit document.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadRecord {
    pub identifier: String,
    pub document_number: String,
    pub date: String,
    pub token: String,
}

impl DownloadRecord {
    pub fn new(identifier: &str, document_number: &str, raw_date: &str) -> Self {
        DownloadRecord {
            identifier: identifier.trim().to_string(),
            document_number: document_number.trim().to_string(),
            date: dashed_date(raw_date),
            token: Uuid::new_v4().simple().to_string(),
        }
    }

    pub fn file_name(&self) -> String {
        format!(
            "{}_{}_{}_{}.pdf",
            sanitize_file_part(&self.identifier),
            sanitize_file_part(&self.document_number),
            sanitize_file_part(&self.date),
            self.token
        )
    }
}

/// "03/14/2019 10:22 AM" -> "03-14-2019"
fn dashed_date(raw: &str) -> String {
    raw.split_whitespace()
        .next()
        .unwrap_or_default()
        .replace('/', "-")
}
