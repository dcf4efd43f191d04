//! Records of how the detail screen was reached, so "back" can restore the
//! list screen exactly as it was left.

use crate::models::GroupFilter;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationEntry {
    /// Filter the list screen showed when the user drilled in
    pub origin_filter: GroupFilter,
    pub group_id: String,
}

#[derive(Debug, Default)]
pub struct NavigationStack {
    entries: Vec<NavigationEntry>,
}

impl NavigationStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn drill_into(&mut self, origin_filter: GroupFilter, group_id: impl Into<String>) {
        self.entries.push(NavigationEntry {
            origin_filter,
            group_id: group_id.into(),
        });
    }

    /// Replace the top entry with a fresh one for `group_id`, keeping its
    /// origin filter. Used to re-enter the detail screen after an edit.
    pub fn reenter(&mut self, group_id: impl Into<String>) -> Option<&NavigationEntry> {
        let origin_filter = self.entries.pop()?.origin_filter;
        self.entries.push(NavigationEntry {
            origin_filter,
            group_id: group_id.into(),
        });
        self.entries.last()
    }

    pub fn go_back(&mut self) -> Option<NavigationEntry> {
        self.entries.pop()
    }

    /// The whole flow was closed from outside.
    pub fn dismiss(&mut self) {
        self.entries.clear();
    }

    pub fn depth(&self) -> usize {
        self.entries.len()
    }

    pub fn peek(&self) -> Option<&NavigationEntry> {
        self.entries.last()
    }
}
