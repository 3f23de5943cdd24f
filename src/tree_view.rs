//! Terminal rendering of an archive entry tree.

use colored::Colorize;
use transfer::{EntryTree, EntryTreeNode, SelectionStore};

use crate::ui::format_size;

/// One visible line of the tree.
pub struct Row<'a> {
    pub depth: usize,
    pub node: &'a EntryTreeNode,
    pub expanded: bool,
    pub selected: bool,
}

/// Rows currently visible: roots, plus children of expanded directories.
pub fn visible_rows<'a>(tree: &'a EntryTree, selection: &SelectionStore) -> Vec<Row<'a>> {
    let mut rows = Vec::new();
    for root in tree.roots() {
        push_rows(tree, selection, root, 0, &mut rows);
    }
    rows
}

fn push_rows<'a>(
    tree: &'a EntryTree,
    selection: &SelectionStore,
    node: &'a EntryTreeNode,
    depth: usize,
    rows: &mut Vec<Row<'a>>,
) {
    let expanded = node.is_directory() && selection.is_expanded(node.full_path());
    rows.push(Row {
        depth,
        node,
        expanded,
        selected: selection.is_selected(node.full_path()),
    });
    if expanded {
        for child in tree.children(node) {
            push_rows(tree, selection, child, depth + 1, rows);
        }
    }
}

/// Marker column of a row: expansion arrow for directories, checkbox for files.
fn marker(row: &Row<'_>) -> &'static str {
    match (row.node.is_directory(), row.expanded, row.selected) {
        (true, true, _) => "▾",
        (true, false, _) => "▸",
        (false, _, true) => "[x]",
        (false, _, false) => "[ ]",
    }
}

/// Row text without colors.
pub fn plain(row: &Row<'_>) -> String {
    let indent = "  ".repeat(row.depth);
    if row.node.is_directory() {
        format!("{indent}{} {}/", marker(row), row.node.name())
    } else {
        format!(
            "{indent}{} {}  {}",
            marker(row),
            row.node.name(),
            format_size(row.node.size_bytes())
        )
    }
}

/// Print the visible rows: directories in bold blue, selected files in green.
pub fn print(tree: &EntryTree, selection: &SelectionStore) {
    for row in visible_rows(tree, selection) {
        let line = plain(&row);
        if row.node.is_directory() {
            println!("{}", line.blue().bold());
        } else if row.selected {
            println!("{}", line.green());
        } else {
            println!("{line}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use transfer::ArchiveEntry;

    fn tree() -> EntryTree {
        EntryTree::build(&[
            ArchiveEntry::new("a/b.txt", 10, false),
            ArchiveEntry::new("a/", 0, true),
            ArchiveEntry::new("c.txt", 5, false),
        ])
    }

    fn lines(tree: &EntryTree, selection: &SelectionStore) -> Vec<String> {
        visible_rows(tree, selection).iter().map(plain).collect()
    }

    #[test]
    fn test_collapsed_shows_roots() {
        let tree = tree();
        let selection = SelectionStore::new();
        assert_eq!(lines(&tree, &selection), ["▸ a/", "[ ] c.txt  5 B"]);
    }

    #[test]
    fn test_expanded_shows_children() {
        let tree = tree();
        let mut selection = SelectionStore::new();
        selection.expand_all(&tree);
        selection.toggle_select("a/b.txt");
        assert_eq!(
            lines(&tree, &selection),
            ["▾ a/", "  [x] b.txt  10 B", "[ ] c.txt  5 B"]
        );
    }

    #[test]
    fn test_empty_tree() {
        let tree = EntryTree::build(&[]);
        assert!(visible_rows(&tree, &SelectionStore::new()).is_empty());
    }
}
