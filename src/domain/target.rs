use std::fmt;

use serde::{Deserialize, Serialize};

const UNSAFE_FILE_CHARS: [char; 9] = ['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// One unit of search work: a county name, a ZIP code or an RN number.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Target {
    value: String,
}

impl Target {
    pub fn new(raw: impl Into<String>) -> Self {
        let value = raw.into().trim().to_string();
        Target { value }
    }

    /// Trimmed value, used for every comparison and for display.
    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn file_stem(&self) -> String {
        sanitize_file_part(&self.value)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

impl From<&str> for Target {
    fn from(value: &str) -> Self {
        Target::new(value)
    }
}

pub fn sanitize_file_part(value: &str) -> String {
    value.trim().replace(UNSAFE_FILE_CHARS, "-")
}

/// What happened to a target, as recorded in the processed log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Completed,
    Partial,
    NoResults,
    Indeterminate,
    Failed,
    Migrated,
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::Target;

    #[test]
    fn target_value_is_trimmed() {
        let target = Target::new(" 78701 ");

        assert_eq!(target.value(), "78701");
        assert_eq!(target, Target::new("78701  "));
    }

    #[test]
    fn padded_targets_hash_alike() {
        let set: HashSet<Target> = ["Harris", "Harris ", " Harris"]
            .into_iter()
            .map(Target::from)
            .collect();

        assert_eq!(set.len(), 1);
    }

    #[test]
    fn file_stem_replaces_path_separators() {
        assert_eq!(Target::new("Foo/Bar").file_stem(), "Foo-Bar");
        assert_eq!(Target::new("a:b*c").file_stem(), "a-b-c");
    }
}
