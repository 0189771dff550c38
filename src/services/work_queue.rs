use std::collections::HashSet;

use crate::domain::target::Target;

/// Targets still to do, in universe order: everything not in `processed`
/// and, when a checkpoint is given, not sorting below it.
pub fn pending(
    all_targets: &[Target],
    processed: &HashSet<String>,
    resume_from: Option<&str>,
) -> Vec<Target> {
    let threshold = resume_from.map(str::trim).filter(|t| !t.is_empty());

    all_targets
        .iter()
        .filter(|target| !processed.contains(target.value()))
        .filter(|target| threshold.map_or(true, |t| target.value() >= t))
        .cloned()
        .collect()
}
