//! Operator selection state

use std::collections::BTreeSet;

/// What the operator currently has selected
///
/// Selections hold ids only and are never checkpointed. They are cleared
/// whenever the transactions or matches underneath them may have changed
/// identity (match creation, undo, snapshot restore).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    left: BTreeSet<String>,
    right: BTreeSet<String>,
    matches: BTreeSet<String>,
    comment_draft: String,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Toggle a left-side transaction, returning whether it is now selected
    pub fn toggle_left(&mut self, id: &str) -> bool {
        toggle(&mut self.left, id)
    }

    /// Toggle a right-side transaction, returning whether it is now selected
    pub fn toggle_right(&mut self, id: &str) -> bool {
        toggle(&mut self.right, id)
    }

    /// Toggle a match in the history view, returning whether it is now selected
    pub fn toggle_match(&mut self, id: &str) -> bool {
        toggle(&mut self.matches, id)
    }

    pub fn set_comment(&mut self, comment: impl Into<String>) {
        self.comment_draft = comment.into();
    }

    pub fn left_ids(&self) -> Vec<String> {
        self.left.iter().cloned().collect()
    }

    pub fn right_ids(&self) -> Vec<String> {
        self.right.iter().cloned().collect()
    }

    pub fn match_ids(&self) -> Vec<String> {
        self.matches.iter().cloned().collect()
    }

    pub fn comment(&self) -> &str {
        &self.comment_draft
    }

    /// Whether no transaction or match is selected
    pub fn is_empty(&self) -> bool {
        self.left.is_empty() && self.right.is_empty() && self.matches.is_empty()
    }

    /// Drop every selected id but keep the comment draft
    pub fn clear_items(&mut self) {
        self.left.clear();
        self.right.clear();
        self.matches.clear();
    }

    /// Drop every selected id and the comment draft
    pub fn clear(&mut self) {
        self.clear_items();
        self.comment_draft.clear();
    }
}

fn toggle(set: &mut BTreeSet<String>, id: &str) -> bool {
    if set.remove(id) {
        false
    } else {
        set.insert(id.to_string());
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toggle_and_clear() {
        let mut selection = Selection::new();
        assert!(selection.toggle_left("L1"));
        assert!(selection.toggle_right("R1"));
        assert!(selection.toggle_match("m1"));
        assert!(!selection.toggle_match("m1"));
        selection.set_comment("bank fee");

        assert_eq!(selection.left_ids(), vec!["L1".to_string()]);
        assert!(selection.match_ids().is_empty());

        selection.clear_items();
        assert!(selection.is_empty());
        assert_eq!(selection.comment(), "bank fee");

        selection.clear();
        assert_eq!(selection.comment(), "");
    }
}
