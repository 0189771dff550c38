/// Picks the identifier column out of a CSV header row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnMatcher {
    /// Header contains the substring, case-sensitive. `Contains("RN")` is the
    /// registry rule.
    Contains(String),
    /// Header equals one of the names, ignoring case and treating `_` as a space.
    AnyOfIgnoreCase(Vec<String>),
}

impl ColumnMatcher {
    /// The identifier column of reference inputs, spelled either way.
    pub fn rn_number() -> Self {
        ColumnMatcher::named("RN Number")
    }

    pub fn named(column: &str) -> Self {
        ColumnMatcher::AnyOfIgnoreCase(vec![column.to_string()])
    }

    pub fn matches(&self, header: &str) -> bool {
        let header = header.trim();
        match self {
            ColumnMatcher::Contains(part) => header.contains(part.as_str()),
            ColumnMatcher::AnyOfIgnoreCase(names) => {
                let header = normalize(header);
                names.iter().any(|name| normalize(name) == header)
            }
        }
    }

    /// Index of the first header accepted by the matcher.
    pub fn position<'a>(&self, headers: impl IntoIterator<Item = &'a str>) -> Option<usize> {
        headers.into_iter().position(|h| self.matches(h))
    }
}

fn normalize(name: &str) -> String {
    name.trim().to_lowercase().replace('_', " ")
}
