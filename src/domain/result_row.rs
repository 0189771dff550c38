use super::target::{Outcome, Target};

/// One scraped table row: column name to cell text, in page order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultRow {
    cells: Vec<(String, String)>,
}

impl ResultRow {
    pub fn push(&mut self, column: impl Into<String>, value: impl Into<String>) {
        self.cells.push((column.into(), value.into()));
    }

    pub fn with(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.push(column, value);
        self
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.cells
            .iter()
            .find(|(c, _)| c == column)
            .map(|(_, v)| v.as_str())
    }

    /// Cell by position, for tables whose headers are unreliable.
    pub fn at(&self, index: usize) -> Option<&str> {
        self.cells.get(index).map(|(_, v)| v.as_str())
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.cells.iter().map(|(c, _)| c.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

impl<C: Into<String>, V: Into<String>> FromIterator<(C, V)> for ResultRow {
    fn from_iter<T: IntoIterator<Item = (C, V)>>(iter: T) -> Self {
        ResultRow {
            cells: iter
                .into_iter()
                .map(|(c, v)| (c.into(), v.into()))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CrawlStatus {
    Complete,
    /// Pagination stopped early; rows gathered so far are kept.
    Partial(String),
    NoResults,
    /// The search neither showed results nor said there were none in time.
    Indeterminate,
}

/// Everything accumulated for one target.
#[derive(Debug, Clone)]
pub struct TargetResultSet {
    pub target: Target,
    pub rows: Vec<ResultRow>,
    pub declared_total: Option<usize>,
    pub pages: usize,
    pub status: CrawlStatus,
}

impl TargetResultSet {
    pub fn empty(target: Target, status: CrawlStatus) -> Self {
        TargetResultSet {
            target,
            rows: vec![],
            declared_total: None,
            pages: 0,
            status,
        }
    }

    pub fn count(&self) -> usize {
        self.rows.len()
    }

    /// Column names across all rows, in first-seen order.
    pub fn headers(&self) -> Vec<String> {
        let mut headers: Vec<String> = vec![];
        for column in self.rows.iter().flat_map(|r| r.columns()) {
            if !headers.iter().any(|h| h == column) {
                headers.push(column.to_string());
            }
        }
        headers
    }

    pub fn outcome(&self) -> Outcome {
        match self.status {
            CrawlStatus::Complete => Outcome::Completed,
            CrawlStatus::Partial(_) => Outcome::Partial,
            CrawlStatus::NoResults => Outcome::NoResults,
            CrawlStatus::Indeterminate => Outcome::Indeterminate,
        }
    }
}
