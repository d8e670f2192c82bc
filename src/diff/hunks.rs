//! Line-level diff hunks between two versions of a file, used to count
//! added/removed lines that fall inside a function's line range (§4.3 step
//! 5).

use similar::{ChangeTag, TextDiff};

/// 1-indexed line numbers inserted in `new_text` and deleted from
/// `old_text`, relative to each side's own numbering.
pub struct LineChanges {
    pub inserted_new_lines: Vec<u32>,
    pub deleted_old_lines: Vec<u32>,
}

pub fn line_changes(old_text: &str, new_text: &str) -> LineChanges {
    let diff = TextDiff::from_lines(old_text, new_text);
    let mut inserted_new_lines = Vec::new();
    let mut deleted_old_lines = Vec::new();

    for change in diff.iter_all_changes() {
        match change.tag() {
            ChangeTag::Insert => {
                if let Some(idx) = change.new_index() {
                    inserted_new_lines.push((idx + 1) as u32);
                }
            }
            ChangeTag::Delete => {
                if let Some(idx) = change.old_index() {
                    deleted_old_lines.push((idx + 1) as u32);
                }
            }
            ChangeTag::Equal => {}
        }
    }

    LineChanges {
        inserted_new_lines,
        deleted_old_lines,
    }
}

/// Count how many of `lines` fall within `[start, end]` inclusive.
pub fn count_in_range(lines: &[u32], start: u32, end: u32) -> u32 {
    lines.iter().filter(|&&l| l >= start && l <= end).count() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_inserted_and_deleted_lines() {
        let old = "a\nb\nc\n";
        let new = "a\nb2\nc\nd\n";
        let changes = line_changes(old, new);
        assert!(!changes.inserted_new_lines.is_empty());
        assert!(!changes.deleted_old_lines.is_empty());
    }

    #[test]
    fn range_count_is_inclusive() {
        assert_eq!(count_in_range(&[1, 2, 3, 4], 2, 3), 2);
        assert_eq!(count_in_range(&[], 1, 10), 0);
    }
}
