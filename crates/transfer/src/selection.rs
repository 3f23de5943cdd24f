//! Selected and expanded entry paths.
//!
//! The store is keyed by full path rather than by tree node, so it survives a
//! rebuild of the [`EntryTree`] as long as paths are stable.

use std::collections::HashSet;
use std::fmt;

use crate::tree::EntryTree;

type Listener = Box<dyn FnMut(&[String]) + Send>;

/// Ordered set of paths: membership by hash, iteration by insertion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct PathSet {
    order: Vec<String>,
    members: HashSet<String>,
}

impl PathSet {
    fn toggle(&mut self, path: &str) -> bool {
        if self.members.remove(path) {
            self.order.retain(|p| p.as_str() != path);
            false
        } else {
            self.members.insert(path.to_string());
            self.order.push(path.to_string());
            true
        }
    }

    fn contains(&self, path: &str) -> bool {
        self.members.contains(path)
    }

    fn replace(&mut self, paths: Vec<String>) {
        self.members = paths.iter().cloned().collect();
        let mut seen = HashSet::with_capacity(paths.len());
        self.order = paths.into_iter().filter(|p| seen.insert(p.clone())).collect();
    }

    fn clear(&mut self) {
        self.order.clear();
        self.members.clear();
    }

    fn retain(&mut self, keep: impl Fn(&str) -> bool) {
        self.order.retain(|p| keep(p.as_str()));
        self.members.retain(|p| keep(p.as_str()));
    }
}

/// Selected leaf paths plus expanded directory paths.
///
/// Every change to the selection is reported to the registered listener with
/// the full selection in insertion order.
///
/// # Example
///
/// ```
/// use transfer::{ArchiveEntry, EntryTree, SelectionStore};
///
/// let tree = EntryTree::build(&[
///     ArchiveEntry::new("a/b.txt", 10, false),
///     ArchiveEntry::new("c.txt", 5, false),
/// ]);
///
/// let mut store = SelectionStore::new();
/// store.select_all(&tree);
/// assert_eq!(store.selected(), ["a/b.txt", "c.txt"]);
///
/// store.select_none();
/// assert!(store.selected().is_empty());
/// ```
#[derive(Default)]
pub struct SelectionStore {
    selected: PathSet,
    expanded: PathSet,
    listener: Option<Listener>,
}

impl SelectionStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the consumer of selection changes, replacing any previous one.
    pub fn on_change(&mut self, listener: impl FnMut(&[String]) + Send + 'static) {
        self.listener = Some(Box::new(listener));
    }

    /// Flip selection of a leaf path. Returns whether it is now selected.
    pub fn toggle_select(&mut self, path: &str) -> bool {
        let now = self.selected.toggle(path);
        self.emit();
        now
    }

    /// Flip expansion of a directory path. Returns whether it is now expanded.
    pub fn toggle_expand(&mut self, path: &str) -> bool {
        self.expanded.toggle(path)
    }

    /// Replace the selection with every leaf of `tree`.
    pub fn select_all(&mut self, tree: &EntryTree) {
        self.selected.replace(tree.leaf_paths());
        self.emit();
    }

    /// Clear the selection.
    pub fn select_none(&mut self) {
        self.selected.clear();
        self.emit();
    }

    /// Expand every directory of `tree`.
    pub fn expand_all(&mut self, tree: &EntryTree) {
        self.expanded.replace(tree.directory_paths());
    }

    /// Collapse every directory.
    pub fn collapse_all(&mut self) {
        self.expanded.clear();
    }

    /// Drop paths that no longer name a leaf (selection) or directory
    /// (expansion) of a rebuilt tree.
    pub fn retain_existing(&mut self, tree: &EntryTree) {
        let before = self.selected.order.len();
        self.selected.retain(|p| tree.is_leaf(p));
        self.expanded
            .retain(|p| tree.get(p).is_some_and(crate::tree::EntryTreeNode::is_directory));
        if self.selected.order.len() != before {
            self.emit();
        }
    }

    /// Selected paths in the order they were added.
    #[must_use]
    pub fn selected(&self) -> &[String] {
        &self.selected.order
    }

    /// Whether `path` is selected.
    #[must_use]
    pub fn is_selected(&self, path: &str) -> bool {
        self.selected.contains(path)
    }

    /// Whether `path` is expanded.
    #[must_use]
    pub fn is_expanded(&self, path: &str) -> bool {
        self.expanded.contains(path)
    }

    /// Number of selected paths.
    #[must_use]
    pub fn selected_count(&self) -> usize {
        self.selected.order.len()
    }

    fn emit(&mut self) {
        if let Some(listener) = self.listener.as_mut() {
            listener(&self.selected.order);
        }
    }
}

impl fmt::Debug for SelectionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelectionStore")
            .field("selected", &self.selected.order)
            .field("expanded", &self.expanded.order)
            .field("listener", &self.listener.is_some())
            .finish()
    }
}
