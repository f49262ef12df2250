//! Line diffs between script versions

use similar::{ChangeTag, TextDiff};

/// Diff engine for comparing script text
pub struct DiffEngine;

impl DiffEngine {
    /// Unified diff between two texts
    pub fn unified_diff(old: &str, new: &str, context_lines: usize) -> String {
        TextDiff::from_lines(old, new)
            .unified_diff()
            .context_radius(context_lines)
            .header("previous", "current")
            .to_string()
    }

    /// Line-level changes, including unchanged lines
    pub fn changes(old: &str, new: &str) -> Vec<Change> {
        TextDiff::from_lines(old, new)
            .iter_all_changes()
            .map(|change| Change {
                tag: match change.tag() {
                    ChangeTag::Delete => ChangeType::Delete,
                    ChangeTag::Insert => ChangeType::Insert,
                    ChangeTag::Equal => ChangeType::Equal,
                },
                value: change.value().to_string(),
                old_index: change.old_index(),
                new_index: change.new_index(),
            })
            .collect()
    }

    /// Number of inserted and deleted lines
    pub fn stats(old: &str, new: &str) -> DiffStats {
        let mut stats = DiffStats::default();
        for change in TextDiff::from_lines(old, new).iter_all_changes() {
            match change.tag() {
                ChangeTag::Insert => stats.insertions += 1,
                ChangeTag::Delete => stats.deletions += 1,
                ChangeTag::Equal => {}
            }
        }
        stats
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangeType {
    Delete,
    Insert,
    Equal,
}

/// A single line of a diff
#[derive(Clone, Debug)]
pub struct Change {
    pub tag: ChangeType,
    pub value: String,
    pub old_index: Option<usize>,
    pub new_index: Option<usize>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DiffStats {
    pub insertions: usize,
    pub deletions: usize,
}

impl DiffStats {
    pub fn is_empty(&self) -> bool {
        self.insertions == 0 && self.deletions == 0
    }
}
