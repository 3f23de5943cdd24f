//! Archive entry tree.
//!
//! Turns the flat member list returned by a peek into a navigable tree. Nodes
//! live in an arena keyed by their full path; children are referenced by path
//! so there are no parent back-references to keep consistent.
//!
//! # Example
//!
//! ```
//! use transfer::{ArchiveEntry, EntryTree};
//!
//! let tree = EntryTree::build(&[
//!     ArchiveEntry::new("a/b.txt", 10, false),
//!     ArchiveEntry::new("a/", 0, true),
//!     ArchiveEntry::new("c.txt", 5, false),
//! ]);
//!
//! let roots: Vec<_> = tree.roots().map(|n| n.name()).collect();
//! assert_eq!(roots, ["a", "c.txt"]);
//! assert_eq!(tree.leaf_paths(), ["a/b.txt", "c.txt"]);
//! ```

use std::collections::HashMap;

use crate::types::ArchiveEntry;

/// One node of the entry tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryTreeNode {
    name: String,
    full_path: String,
    entry: Option<ArchiveEntry>,
    children: Vec<String>,
}

impl EntryTreeNode {
    fn new(name: &str, full_path: String) -> Self {
        Self {
            name: name.to_string(),
            full_path,
            entry: None,
            children: Vec::new(),
        }
    }

    /// Last path segment.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Slash-joined path from the root, without a trailing slash.
    #[must_use]
    pub fn full_path(&self) -> &str {
        &self.full_path
    }

    /// Archive member backing this node, if the listing named it.
    #[must_use]
    pub fn entry(&self) -> Option<&ArchiveEntry> {
        self.entry.as_ref()
    }

    /// Full paths of the children, in first-seen order.
    #[must_use]
    pub fn child_paths(&self) -> &[String] {
        &self.children
    }

    /// A node is a directory if it has children or its entry says so.
    #[must_use]
    pub fn is_directory(&self) -> bool {
        !self.children.is_empty() || self.entry.as_ref().is_some_and(|e| e.is_directory)
    }

    /// A leaf has no children and a non-directory entry.
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty() && self.entry.as_ref().is_some_and(|e| !e.is_directory)
    }

    /// Size of the backing entry, 0 when there is none.
    #[must_use]
    pub fn size_bytes(&self) -> u64 {
        self.entry.as_ref().map_or(0, |e| e.size_bytes)
    }
}

/// Hierarchical view over an archive listing.
///
/// Building is a pure function of the entry sequence: the same input always
/// produces an equal tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryTree {
    nodes: HashMap<String, EntryTreeNode>,
    roots: Vec<String>,
}

impl EntryTree {
    /// Build a tree from archive entries.
    ///
    /// Paths are split on `/`; empty segments (leading, trailing or doubled
    /// slashes) are ignored. When two entries normalize to the same path the
    /// later one replaces the earlier node's entry.
    #[must_use]
    pub fn build(entries: &[ArchiveEntry]) -> Self {
        let mut tree = Self::default();

        for entry in entries {
            let segments: Vec<&str> = entry.path.split('/').filter(|s| !s.is_empty()).collect();
            if segments.is_empty() {
                log::debug!("skipping archive entry with empty path {:?}", entry.path);
                continue;
            }

            let mut parent: Option<String> = None;
            for segment in &segments {
                let full_path = match &parent {
                    Some(p) => format!("{p}/{segment}"),
                    None => (*segment).to_string(),
                };

                if !tree.nodes.contains_key(&full_path) {
                    tree.nodes
                        .insert(full_path.clone(), EntryTreeNode::new(segment, full_path.clone()));
                    match &parent {
                        Some(p) => {
                            if let Some(parent_node) = tree.nodes.get_mut(p) {
                                parent_node.children.push(full_path.clone());
                            }
                        }
                        None => tree.roots.push(full_path.clone()),
                    }
                }

                parent = Some(full_path);
            }

            if let Some(node) = parent.and_then(|p| tree.nodes.get_mut(&p)) {
                node.entry = Some(entry.clone());
            }
        }

        tree
    }

    /// Look up a node by full path.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&EntryTreeNode> {
        self.nodes.get(path)
    }

    /// Top-level nodes in first-seen order.
    pub fn roots(&self) -> impl Iterator<Item = &EntryTreeNode> {
        self.roots.iter().filter_map(|p| self.nodes.get(p))
    }

    /// Children of a node in first-seen order.
    pub fn children<'a>(
        &'a self,
        node: &'a EntryTreeNode,
    ) -> impl Iterator<Item = &'a EntryTreeNode> + 'a {
        node.children.iter().filter_map(|p| self.nodes.get(p))
    }

    /// Every node with its depth, depth-first in sibling order.
    #[must_use]
    pub fn depth_first(&self) -> Vec<(usize, &EntryTreeNode)> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<(usize, &str)> =
            self.roots.iter().rev().map(|p| (0, p.as_str())).collect();

        while let Some((depth, path)) = stack.pop() {
            let Some(node) = self.nodes.get(path) else {
                continue;
            };
            out.push((depth, node));
            stack.extend(node.children.iter().rev().map(|c| (depth + 1, c.as_str())));
        }

        out
    }

    /// Full paths of all leaves, depth-first.
    #[must_use]
    pub fn leaf_paths(&self) -> Vec<String> {
        self.depth_first()
            .into_iter()
            .filter(|(_, n)| n.is_leaf())
            .map(|(_, n)| n.full_path.clone())
            .collect()
    }

    /// Full paths of all directories, depth-first.
    #[must_use]
    pub fn directory_paths(&self) -> Vec<String> {
        self.depth_first()
            .into_iter()
            .filter(|(_, n)| n.is_directory())
            .map(|(_, n)| n.full_path.clone())
            .collect()
    }

    /// Whether `path` names a leaf of this tree.
    #[must_use]
    pub fn is_leaf(&self, path: &str) -> bool {
        self.nodes.get(path).is_some_and(EntryTreeNode::is_leaf)
    }

    /// Number of leaves.
    #[must_use]
    pub fn leaf_count(&self) -> usize {
        self.nodes.values().filter(|n| n.is_leaf()).count()
    }

    /// Number of nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the tree has no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
