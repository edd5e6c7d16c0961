// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Tri-state selection tracking.
//!
//! Every entry of a folder carries a three-way checkbox: checked, unchecked,
//! or partially checked for directories whose children disagree. Besides
//! the current value, each entry remembers the __baseline__ it had when it
//! was first loaded, so that a submission only has to consider what the
//! user actually touched.
//!
//! Entries are stored in an arena indexed by their folder-relative path,
//! because folders are loaded lazily one directory at a time and a
//! directory may be listed again with a different set of children.

use crate::{folder::node::Node, path::join};

use std::collections::{HashMap, HashSet};

/// Value of a tri-state checkbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CheckState {
    Unchecked,
    Partial,
    Checked,
}

impl CheckState {
    /// Selection state implied by reconciled daemon flags.
    pub fn of(node: &Node) -> Self {
        if node.partial {
            CheckState::Partial
        } else if node.ignored {
            CheckState::Unchecked
        } else {
            CheckState::Checked
        }
    }

    /// Checkbox marker used for listings.
    pub fn marker(self) -> &'static str {
        match self {
            CheckState::Unchecked => "[ ]",
            CheckState::Partial => "[-]",
            CheckState::Checked => "[x]",
        }
    }
}

/// Query contract for selection state.
///
/// Both queries return `/`-joined folder-relative paths, each path at most
/// once. A directory never implies its descendants.
pub trait SelectionTracker {
    /// List every path currently in `state`.
    fn paths_with_state(&self, state: CheckState) -> Vec<String>;

    /// List every path whose current state differs from its baseline.
    fn changed_paths(&self) -> Vec<String>;
}

#[derive(Debug, Clone)]
struct Entry {
    path: String,
    name: String,
    parent: Option<usize>,
    children: Vec<usize>,
    expanded: bool,
    node: Option<Node>,
    state: CheckState,
    baseline: CheckState,
}

/// Arena of tri-state selection entries.
///
/// The folder root is always present as the empty path. It never shows up
/// in query results.
///
/// # Invariant
///
/// - A loaded directory is partial if and only if its loaded children do
///   not all share one state.
/// - Every live entry is reachable from the root through `children`.
#[derive(Debug, Clone)]
pub struct SelectionTree {
    entries: Vec<Entry>,
    index: HashMap<String, usize>,
}

const ROOT: usize = 0;

impl Default for SelectionTree {
    fn default() -> Self {
        Self::new()
    }
}

impl SelectionTree {
    /// Construct tree holding only the folder root.
    pub fn new() -> Self {
        let root = Entry {
            path: String::new(),
            name: String::new(),
            parent: None,
            children: Vec::new(),
            expanded: false,
            node: None,
            state: CheckState::Checked,
            baseline: CheckState::Checked,
        };

        Self {
            entries: vec![root],
            index: HashMap::from([(String::new(), ROOT)]),
        }
    }

    /// Load listing of a directory's children.
    ///
    /// New entries take their baseline and current state from the node's
    /// flags, except that a pending check or uncheck of `parent` carries over
    /// to their current state. Entries that already exist keep both, so
    /// pending edits survive a reload, and only have their node data
    /// refreshed. Entries that are no longer listed are dropped together with
    /// their subtree.
    ///
    /// Afterwards `parent` and its ancestors are derived again from their
    /// children. Entries without pending edits take the derived state as
    /// their baseline too.
    ///
    /// # Errors
    ///
    /// - Return [`SelectionError::UnknownPath`] if `parent` is not loaded.
    pub fn insert_children(&mut self, parent: &str, nodes: &[Node]) -> Result<()> {
        let parent_idx = self.lookup(parent)?;

        let listed: HashSet<&str> = nodes.iter().map(|node| node.name.as_str()).collect();
        let stale: Vec<usize> = self.entries[parent_idx]
            .children
            .iter()
            .copied()
            .filter(|&idx| !listed.contains(self.entries[idx].name.as_str()))
            .collect();
        for idx in stale {
            self.detach(idx);
        }

        let parent_path = self.entries[parent_idx].path.clone();
        let inherited = {
            let parent = &self.entries[parent_idx];
            (parent.state != parent.baseline && parent.state != CheckState::Partial)
                .then_some(parent.state)
        };
        for node in nodes {
            let path = join(&parent_path, &node.name);
            if let Some(&idx) = self.index.get(&path) {
                self.entries[idx].node = Some(node.clone());
                continue;
            }

            let baseline = CheckState::of(node);
            let idx = self.entries.len();
            self.entries.push(Entry {
                path: path.clone(),
                name: node.name.clone(),
                parent: Some(parent_idx),
                children: Vec::new(),
                expanded: false,
                node: Some(node.clone()),
                state: inherited.unwrap_or(baseline),
                baseline,
            });
            self.index.insert(path, idx);
            self.entries[parent_idx].children.push(idx);
        }

        self.entries[parent_idx].expanded = true;
        self.derive_upwards(parent_idx, true);
        Ok(())
    }

    /// Check or uncheck an entry.
    ///
    /// The new state is pushed down to every loaded descendant, and every
    /// ancestor is derived again from its children.
    ///
    /// # Errors
    ///
    /// - Return [`SelectionError::UnknownPath`] if `path` is not loaded.
    pub fn set_checked(&mut self, path: &str, checked: bool) -> Result<()> {
        let idx = self.lookup(path)?;
        let state = if checked {
            CheckState::Checked
        } else {
            CheckState::Unchecked
        };

        let mut stack = vec![idx];
        while let Some(current) = stack.pop() {
            self.entries[current].state = state;
            stack.extend(self.entries[current].children.iter().copied());
        }

        if let Some(parent) = self.entries[idx].parent {
            self.derive_upwards(parent, false);
        }

        Ok(())
    }

    /// Accept current states as the new baseline.
    pub fn rebaseline(&mut self) {
        for idx in self.walk() {
            let entry = &mut self.entries[idx];
            entry.baseline = entry.state;
        }
    }

    pub fn contains(&self, path: &str) -> bool {
        self.index.contains_key(path)
    }

    /// Check if a directory's children have been loaded.
    pub fn is_expanded(&self, path: &str) -> bool {
        self.index
            .get(path)
            .is_some_and(|&idx| self.entries[idx].expanded)
    }

    pub fn state(&self, path: &str) -> Option<CheckState> {
        self.index.get(path).map(|&idx| self.entries[idx].state)
    }

    pub fn baseline(&self, path: &str) -> Option<CheckState> {
        self.index.get(path).map(|&idx| self.entries[idx].baseline)
    }

    pub fn node(&self, path: &str) -> Option<&Node> {
        self.index
            .get(path)
            .and_then(|&idx| self.entries[idx].node.as_ref())
    }

    /// List full paths of loaded children of `path` in listing order.
    pub fn children(&self, path: &str) -> Vec<&str> {
        self.index
            .get(path)
            .map(|&idx| {
                self.entries[idx]
                    .children
                    .iter()
                    .map(|&child| self.entries[child].path.as_str())
                    .collect()
            })
            .unwrap_or_default()
    }

    fn lookup(&self, path: &str) -> Result<usize> {
        self.index
            .get(path)
            .copied()
            .ok_or_else(|| SelectionError::UnknownPath(path.to_string()))
    }

    fn derive(&self, idx: usize) -> CheckState {
        let mut states = self.entries[idx]
            .children
            .iter()
            .map(|&child| self.entries[child].state);
        let Some(first) = states.next() else {
            return self.entries[idx].state;
        };

        if first != CheckState::Partial && states.all(|state| state == first) {
            first
        } else {
            CheckState::Partial
        }
    }

    // Derive `start` and every ancestor below the root from their children.
    // With `settle`, entries without pending edits move their baseline along.
    fn derive_upwards(&mut self, start: usize, settle: bool) {
        let mut cursor = Some(start);
        while let Some(current) = cursor {
            if current == ROOT {
                break;
            }

            let state = self.derive(current);
            let entry = &mut self.entries[current];
            if settle && entry.state == entry.baseline {
                entry.baseline = state;
            }
            entry.state = state;
            cursor = entry.parent;
        }
    }

    fn detach(&mut self, idx: usize) {
        if let Some(parent) = self.entries[idx].parent {
            self.entries[parent].children.retain(|&child| child != idx);
        }

        // INVARIANT: Arena slots stay allocated, only the index forgets them.
        let mut stack = vec![idx];
        while let Some(current) = stack.pop() {
            self.index.remove(&self.entries[current].path);
            stack.extend(self.entries[current].children.drain(..));
        }
    }

    // Pre-order walk of every live entry below the root.
    fn walk(&self) -> Vec<usize> {
        let mut order = Vec::new();
        let mut stack: Vec<usize> = self.entries[ROOT].children.iter().rev().copied().collect();
        while let Some(idx) = stack.pop() {
            order.push(idx);
            stack.extend(self.entries[idx].children.iter().rev().copied());
        }

        order
    }
}

impl SelectionTracker for SelectionTree {
    fn paths_with_state(&self, state: CheckState) -> Vec<String> {
        self.walk()
            .into_iter()
            .filter(|&idx| self.entries[idx].state == state)
            .map(|idx| self.entries[idx].path.clone())
            .collect()
    }

    fn changed_paths(&self) -> Vec<String> {
        self.walk()
            .into_iter()
            .filter(|&idx| self.entries[idx].state != self.entries[idx].baseline)
            .map(|idx| self.entries[idx].path.clone())
            .collect()
    }
}

/// Selection tracking error types.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SelectionError {
    /// Path has not been loaded into the selection tree.
    #[error("path {0:?} is not loaded")]
    UnknownPath(String),
}

/// Friendly result alias :3
pub type Result<T, E = SelectionError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::folder::{ignores::ChangeSet, node::NodeKind};
    use pretty_assertions::assert_eq;

    fn file(name: &str, ignored: bool) -> Node {
        let mut node = Node::new(name, NodeKind::File);
        node.ignored = ignored;
        node
    }

    fn dir(name: &str, ignored: bool, partial: bool) -> Node {
        let mut node = Node::new(name, NodeKind::Directory);
        node.ignored = ignored;
        node.partial = partial;
        node
    }

    fn sample() -> SelectionTree {
        let mut tree = SelectionTree::new();
        tree.insert_children(
            "",
            &[
                dir("docs", false, true),
                dir("music", true, false),
                file("todo.txt", false),
            ],
        )
        .unwrap();
        tree.insert_children(
            "docs",
            &[file("readme.txt", false), file("draft.txt", true)],
        )
        .unwrap();
        tree
    }

    #[test]
    fn baseline_follows_node_flags() {
        let tree = sample();

        assert_eq!(tree.state("docs"), Some(CheckState::Partial));
        assert_eq!(tree.state("music"), Some(CheckState::Unchecked));
        assert_eq!(tree.state("todo.txt"), Some(CheckState::Checked));
        assert_eq!(tree.state("docs/readme.txt"), Some(CheckState::Checked));
        assert_eq!(tree.baseline("docs/draft.txt"), Some(CheckState::Unchecked));
        assert!(tree.changed_paths().is_empty());
        assert!(tree.is_expanded("docs"));
        assert!(!tree.is_expanded("music"));
    }

    #[test]
    fn queries_walk_in_preorder() {
        let tree = sample();

        assert_eq!(
            tree.paths_with_state(CheckState::Checked),
            vec!["docs/readme.txt", "todo.txt"]
        );
        assert_eq!(tree.paths_with_state(CheckState::Partial), vec!["docs"]);
        assert_eq!(
            tree.paths_with_state(CheckState::Unchecked),
            vec!["docs/draft.txt", "music"]
        );
        assert_eq!(tree.children("docs"), vec!["docs/readme.txt", "docs/draft.txt"]);
    }

    #[test]
    fn checking_propagates_down_and_up() -> anyhow::Result<()> {
        let mut tree = sample();

        tree.set_checked("docs/draft.txt", true)?;
        assert_eq!(tree.state("docs"), Some(CheckState::Checked));
        assert_eq!(tree.changed_paths(), vec!["docs", "docs/draft.txt"]);

        tree.set_checked("docs", false)?;
        assert_eq!(tree.state("docs/readme.txt"), Some(CheckState::Unchecked));
        assert_eq!(tree.state("docs/draft.txt"), Some(CheckState::Unchecked));
        assert_eq!(tree.changed_paths(), vec!["docs", "docs/readme.txt"]);

        tree.set_checked("docs/draft.txt", true)?;
        assert_eq!(tree.state("docs"), Some(CheckState::Partial));

        Ok(())
    }

    #[test]
    fn partial_state_bubbles_through_ancestors() -> anyhow::Result<()> {
        let mut tree = SelectionTree::new();
        tree.insert_children("", &[dir("a", false, false)])?;
        tree.insert_children("a", &[dir("b", false, false), file("x", false)])?;
        tree.insert_children("a/b", &[file("c", false), file("d", false)])?;

        tree.set_checked("a/b/c", false)?;
        assert_eq!(tree.state("a/b"), Some(CheckState::Partial));
        assert_eq!(tree.state("a"), Some(CheckState::Partial));

        tree.set_checked("a/b/c", true)?;
        assert_eq!(tree.state("a"), Some(CheckState::Checked));
        assert!(tree.changed_paths().is_empty());

        Ok(())
    }

    #[test]
    fn unknown_path_is_rejected() {
        let mut tree = sample();
        assert_eq!(
            tree.set_checked("music/live", true),
            Err(SelectionError::UnknownPath("music/live".into()))
        );
        assert!(tree.insert_children("nope", &[]).is_err());
    }

    #[test]
    fn reload_keeps_pending_edits_and_drops_stale_entries() -> anyhow::Result<()> {
        let mut tree = sample();
        tree.set_checked("docs/draft.txt", true)?;

        let mut renamed = file("notes.txt", false);
        renamed.size = Some(3);
        tree.insert_children("docs", &[file("draft.txt", true), renamed])?;

        assert!(!tree.contains("docs/readme.txt"));
        assert_eq!(tree.state("docs/draft.txt"), Some(CheckState::Checked));
        assert_eq!(tree.node("docs/notes.txt").and_then(|n| n.size), Some(3));
        assert_eq!(tree.children("docs"), vec!["docs/draft.txt", "docs/notes.txt"]);
        assert!(!tree
            .paths_with_state(CheckState::Checked)
            .contains(&"docs/readme.txt".to_string()));

        Ok(())
    }

    #[test]
    fn expanding_checked_directory_carries_edit_to_children() -> anyhow::Result<()> {
        let mut tree = SelectionTree::new();
        tree.insert_children("", &[dir("music", true, false)])?;
        tree.set_checked("music", true)?;

        tree.insert_children("music", &[file("a.flac", true), file("b.flac", true)])?;
        assert_eq!(tree.state("music"), Some(CheckState::Checked));
        assert_eq!(tree.state("music/a.flac"), Some(CheckState::Checked));
        assert_eq!(tree.baseline("music/a.flac"), Some(CheckState::Unchecked));
        assert_eq!(
            tree.changed_paths(),
            vec!["music", "music/a.flac", "music/b.flac"]
        );

        tree.set_checked("music/a.flac", false)?;
        assert_eq!(tree.state("music"), Some(CheckState::Partial));
        assert_eq!(tree.changed_paths(), vec!["music", "music/b.flac"]);

        Ok(())
    }

    #[test]
    fn expanding_unedited_directory_keeps_daemon_states() -> anyhow::Result<()> {
        let mut tree = SelectionTree::new();
        tree.insert_children("", &[dir("music", true, false)])?;
        tree.insert_children("music", &[file("a.flac", true), file("b.flac", false)])?;

        assert_eq!(tree.state("music/a.flac"), Some(CheckState::Unchecked));
        assert_eq!(tree.state("music/b.flac"), Some(CheckState::Checked));
        assert_eq!(tree.state("music"), Some(CheckState::Partial));
        assert!(tree.changed_paths().is_empty());

        Ok(())
    }

    #[test]
    fn relisting_derives_directory_again() -> anyhow::Result<()> {
        let mut tree = sample();
        tree.insert_children("docs", &[file("readme.txt", false)])?;

        assert_eq!(tree.state("docs"), Some(CheckState::Checked));
        assert_eq!(tree.children("docs"), vec!["docs/readme.txt"]);
        assert!(tree.changed_paths().is_empty());

        Ok(())
    }

    #[test]
    fn relisting_keeps_pending_edit_on_ancestors() -> anyhow::Result<()> {
        let mut tree = SelectionTree::new();
        tree.insert_children("", &[dir("a", false, false)])?;
        tree.insert_children("a", &[dir("b", false, false), file("x", false)])?;
        tree.insert_children("a/b", &[file("c", false), file("d", false)])?;
        tree.set_checked("a/b/c", false)?;

        tree.insert_children("a/b", &[file("c", false)])?;
        assert_eq!(tree.state("a/b"), Some(CheckState::Unchecked));
        assert_eq!(tree.state("a"), Some(CheckState::Partial));
        assert_eq!(tree.changed_paths(), vec!["a", "a/b", "a/b/c"]);

        Ok(())
    }

    #[test]
    fn rebaseline_clears_changes() -> anyhow::Result<()> {
        let mut tree = sample();
        tree.set_checked("music", true)?;
        assert_eq!(tree.changed_paths(), vec!["music"]);

        tree.rebaseline();
        assert!(tree.changed_paths().is_empty());
        assert_eq!(tree.baseline("music"), Some(CheckState::Checked));

        Ok(())
    }

    #[test]
    fn fully_checking_partial_directory_end_to_end() -> anyhow::Result<()> {
        let mut tree = sample();
        tree.set_checked("docs", true)?;

        let change_set = ChangeSet::collect(
            &tree,
            ["docs/**", "!docs/readme.txt"].into_iter().collect(),
        );
        assert_eq!(change_set.changed, vec!["docs", "docs/draft.txt"]);
        assert_eq!(
            change_set.checked,
            vec!["docs", "docs/readme.txt", "docs/draft.txt", "todo.txt"]
        );

        assert_eq!(change_set.synthesize().into_vec(), vec!["!docs".to_string()]);

        Ok(())
    }

    #[test]
    fn selecting_one_file_of_excluded_directory() -> anyhow::Result<()> {
        let mut tree = SelectionTree::new();
        tree.insert_children("", &[dir("music", true, false)])?;
        tree.insert_children("music", &[file("a.flac", true), file("b.flac", true)])?;

        tree.set_checked("music/a.flac", true)?;
        assert_eq!(tree.state("music"), Some(CheckState::Partial));

        let change_set = ChangeSet::collect(&tree, ["music/**"].into_iter().collect());
        assert_eq!(
            change_set.synthesize().into_vec(),
            vec!["!music/a.flac", "music/**", "!music"]
        );

        Ok(())
    }
}
