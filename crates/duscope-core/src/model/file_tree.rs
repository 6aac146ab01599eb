/// Arena-backed file tree with bottom-up directory aggregation and
/// ancestor-chain delta propagation.
///
/// All nodes live in a single `Vec<FileNode>`. Relationships between nodes
/// use `NodeIndex` (a thin `u32` wrapper) rather than heap pointers. Nodes
/// removed from the tree stay in the arena as unreachable slots; indices
/// held by front ends therefore never dangle.
use super::file_node::{FileNode, InodeKey, NodeIndex};
use std::cmp::Ordering;
use std::path::PathBuf;

/// The aggregated quantities one node contributes to its ancestors.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Totals {
    pub size: u64,
    pub usage: u64,
    pub items: u64,
}

/// Field used to order siblings.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SortKey {
    ApparentSize,
    #[default]
    DiskUsage,
    Name,
    ItemCount,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SortOrder {
    #[default]
    Descending,
    Ascending,
}

/// The complete file tree produced by an analysis.
#[derive(Debug, Clone, Default)]
pub struct FileTree {
    /// Arena: every node ever created during this tree's lifetime.
    pub nodes: Vec<FileNode>,

    root: Option<NodeIndex>,
}

impl FileTree {
    /// Create an empty tree with pre-allocated capacity.
    pub fn with_capacity(estimated_nodes: usize) -> Self {
        Self {
            nodes: Vec::with_capacity(estimated_nodes),
            root: None,
        }
    }

    /// Allocate a new node in the arena and return its index.
    pub fn add_node(&mut self, node: FileNode) -> NodeIndex {
        let idx = NodeIndex::new(self.nodes.len());
        self.nodes.push(node);
        idx
    }

    /// Insert `node` as the tree root. Its name should be the full scan path.
    pub fn set_root(&mut self, node: FileNode) -> NodeIndex {
        let idx = self.add_node(node);
        self.root = Some(idx);
        idx
    }

    #[inline]
    pub fn root(&self) -> Option<NodeIndex> {
        self.root
    }

    /// Attach `child` as a child of `parent`, prepending to the sibling list.
    pub fn add_child(&mut self, parent: NodeIndex, child: NodeIndex) {
        let old_first = self.nodes[parent.idx()].first_child;
        self.nodes[child.idx()].next_sibling = old_first;
        self.nodes[child.idx()].parent = Some(parent);
        self.nodes[parent.idx()].first_child = Some(child);
    }

    /// Direct children of a node, in sibling-list order.
    pub fn children(&self, parent: NodeIndex) -> Vec<NodeIndex> {
        let mut children = Vec::new();
        let mut child = self.nodes[parent.idx()].first_child;
        while let Some(idx) = child {
            children.push(idx);
            child = self.nodes[idx.idx()].next_sibling;
        }
        children
    }

    /// Direct children ordered by `key`. Ties are broken by name ascending.
    pub fn children_sorted(&self, parent: NodeIndex, key: SortKey, order: SortOrder) -> Vec<NodeIndex> {
        let mut children = self.children(parent);
        children.sort_unstable_by(|&a, &b| self.compare(a, b, key, order));
        children
    }

    fn compare(&self, a: NodeIndex, b: NodeIndex, key: SortKey, order: SortOrder) -> Ordering {
        let x = &self.nodes[a.idx()];
        let y = &self.nodes[b.idx()];
        let primary = match key {
            SortKey::ApparentSize => x.size.cmp(&y.size),
            SortKey::DiskUsage => x.usage.cmp(&y.usage),
            SortKey::ItemCount => x.item_count.cmp(&y.item_count),
            SortKey::Name => x.name.cmp(&y.name),
        };
        let primary = match order {
            SortOrder::Ascending => primary,
            SortOrder::Descending => primary.reverse(),
        };
        primary.then_with(|| x.name.cmp(&y.name))
    }

    /// Re-link the sibling list of `parent` in sorted order without moving
    /// nodes in the arena.
    pub fn sort_children(&mut self, parent: NodeIndex, key: SortKey, order: SortOrder) {
        let sorted = self.children_sorted(parent, key, order);
        self.nodes[parent.idx()].first_child = sorted.first().copied();
        for pair in sorted.windows(2) {
            self.nodes[pair[0].idx()].next_sibling = Some(pair[1]);
        }
        if let Some(&last) = sorted.last() {
            self.nodes[last.idx()].next_sibling = None;
        }
    }

    /// [`sort_children`](Self::sort_children) for `from` and every directory below it.
    pub fn sort_recursive(&mut self, from: NodeIndex, key: SortKey, order: SortOrder) {
        let mut stack = vec![from];
        while let Some(dir) = stack.pop() {
            self.sort_children(dir, key, order);
            stack.extend(
                self.children(dir)
                    .into_iter()
                    .filter(|c| self.nodes[c.idx()].first_child.is_some()),
            );
        }
    }

    /// Find a direct child by name.
    pub fn find_child(&self, parent: NodeIndex, name: &str) -> Option<NodeIndex> {
        let mut child = self.nodes[parent.idx()].first_child;
        while let Some(idx) = child {
            if self.nodes[idx.idx()].name == name {
                return Some(idx);
            }
            child = self.nodes[idx.idx()].next_sibling;
        }
        None
    }

    /// Every node below `from` (excluding `from`), depth-first.
    pub fn descendants(&self, from: NodeIndex) -> Vec<NodeIndex> {
        let mut out = Vec::new();
        let mut stack = self.children(from);
        while let Some(idx) = stack.pop() {
            out.push(idx);
            stack.extend(self.children(idx));
        }
        out
    }

    /// Parent, grandparent, … up to the root.
    pub fn ancestors(&self, index: NodeIndex) -> impl Iterator<Item = NodeIndex> + '_ {
        std::iter::successors(self.nodes[index.idx()].parent, move |p| {
            self.nodes[p.idx()].parent
        })
    }

    /// Whether the node is still reachable from the root.
    pub fn is_attached(&self, index: NodeIndex) -> bool {
        let top = self.ancestors(index).last().unwrap_or(index);
        Some(top) == self.root
    }

    /// Reconstruct the full path for a node by walking up to the root.
    pub fn full_path(&self, index: NodeIndex) -> PathBuf {
        let mut segments = vec![self.nodes[index.idx()].name.as_str()];
        segments.extend(self.ancestors(index).map(|a| self.nodes[a.idx()].name.as_str()));
        segments.reverse();

        let mut path = PathBuf::new();
        for segment in segments {
            path.push(segment);
        }
        path
    }

    #[inline]
    pub fn totals(&self, index: NodeIndex) -> Totals {
        let node = &self.nodes[index.idx()];
        Totals {
            size: node.size,
            usage: node.usage,
            items: node.item_count,
        }
    }

    /// Compute a directory's totals from its direct children.
    ///
    /// Children must already be final. Item count includes the directory
    /// itself. Error and skip flags are folded in from the children.
    pub fn finalize_dir(&mut self, dir: NodeIndex) {
        let mut totals = Totals {
            items: 1,
            ..Totals::default()
        };
        let mut error_below = false;
        let mut skipped_below = false;

        let mut child = self.nodes[dir.idx()].first_child;
        while let Some(idx) = child {
            let node = &self.nodes[idx.idx()];
            totals.size += node.size;
            totals.usage += node.usage;
            totals.items += node.item_count;
            error_below |= node.flags.error || node.flags.error_below;
            skipped_below |= node.flags.is_skip();
            child = node.next_sibling;
        }

        let node = &mut self.nodes[dir.idx()];
        node.size = totals.size;
        node.usage = totals.usage;
        node.item_count = totals.items;
        node.flags.error_below = error_below;
        node.flags.skipped_below = skipped_below;
    }

    /// Apply a totals change to `start` and every ancestor above it.
    pub fn propagate(&mut self, start: NodeIndex, removed: Totals, added: Totals) {
        let mut current = Some(start);
        while let Some(idx) = current {
            let node = &mut self.nodes[idx.idx()];
            node.size = node.size.saturating_sub(removed.size) + added.size;
            node.usage = node.usage.saturating_sub(removed.usage) + added.usage;
            node.item_count = node.item_count.saturating_sub(removed.items) + added.items;
            current = node.parent;
        }
    }

    /// Recompute `error_below` / `skipped_below` on `start` and its ancestors
    /// after the children of `start` changed.
    pub fn refresh_flags_upward(&mut self, start: NodeIndex) {
        let mut current = Some(start);
        while let Some(idx) = current {
            let mut error_below = false;
            let mut skipped_below = false;
            for child in self.children(idx) {
                let flags = self.nodes[child.idx()].flags;
                error_below |= flags.error || flags.error_below;
                skipped_below |= flags.is_skip();
            }
            let node = &mut self.nodes[idx.idx()];
            node.flags.error_below = error_below;
            node.flags.skipped_below = skipped_below;
            current = node.parent;
        }
    }

    /// Unlink a node from its parent and subtract its totals from every
    /// ancestor. Returns the subtracted totals. The root cannot be detached;
    /// detaching it (or an already detached node) is a no-op.
    pub fn detach(&mut self, index: NodeIndex) -> Totals {
        let totals = self.totals(index);
        let Some(parent) = self.nodes[index.idx()].parent else {
            return Totals::default();
        };

        let next = self.nodes[index.idx()].next_sibling;
        if self.nodes[parent.idx()].first_child == Some(index) {
            self.nodes[parent.idx()].first_child = next;
        } else {
            let mut current = self.nodes[parent.idx()].first_child;
            while let Some(idx) = current {
                if self.nodes[idx.idx()].next_sibling == Some(index) {
                    self.nodes[idx.idx()].next_sibling = next;
                    break;
                }
                current = self.nodes[idx.idx()].next_sibling;
            }
        }
        self.nodes[index.idx()].parent = None;
        self.nodes[index.idx()].next_sibling = None;

        self.propagate(parent, totals, Totals::default());
        self.refresh_flags_upward(parent);
        totals
    }

    /// Drop every child of `dir` and reset it to an empty directory,
    /// without touching ancestors. Returns the totals it had before.
    pub(crate) fn clear_children(&mut self, dir: NodeIndex) -> Totals {
        let before = self.totals(dir);
        for child in self.children(dir) {
            let node = &mut self.nodes[child.idx()];
            node.parent = None;
            node.next_sibling = None;
        }
        let node = &mut self.nodes[dir.idx()];
        node.first_child = None;
        node.size = 0;
        node.usage = 0;
        node.item_count = 1;
        node.flags = Default::default();
        before
    }

    /// Dedup keys of every counted multiply-linked file reachable from the
    /// root, skipping the subtree under `excluded`.
    pub fn counted_inode_keys(&self, excluded: NodeIndex) -> Vec<InodeKey> {
        let Some(root) = self.root else {
            return Vec::new();
        };
        let mut keys = Vec::new();
        let mut stack = vec![root];
        while let Some(idx) = stack.pop() {
            if idx == excluded {
                continue;
            }
            let node = &self.nodes[idx.idx()];
            if !node.flags.hardlink_duplicate {
                keys.extend(node.inode_key());
            }
            stack.extend(self.children(idx));
        }
        keys
    }

    /// Get the node at the given index.
    #[inline]
    pub fn node(&self, index: NodeIndex) -> &FileNode {
        &self.nodes[index.idx()]
    }

    #[inline]
    pub fn node_mut(&mut self, index: NodeIndex) -> &mut FileNode {
        &mut self.nodes[index.idx()]
    }

    /// Number of arena slots, including detached ones.
    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// root -> a -> b -> leaf(100), plus root -> top(10) and a -> side(20).
    fn chain() -> (FileTree, [NodeIndex; 6]) {
        let mut tree = FileTree::with_capacity(8);
        let root = tree.set_root(FileNode::new_dir("/data"));
        let a = tree.add_node(FileNode::new_dir("a"));
        tree.add_child(root, a);
        let b = tree.add_node(FileNode::new_dir("b"));
        tree.add_child(a, b);
        let leaf = tree.add_node(FileNode::new_file("leaf", 100, 4096));
        tree.add_child(b, leaf);
        let top = tree.add_node(FileNode::new_file("top", 10, 4096));
        tree.add_child(root, top);
        let side = tree.add_node(FileNode::new_file("side", 20, 4096));
        tree.add_child(a, side);

        tree.finalize_dir(b);
        tree.finalize_dir(a);
        tree.finalize_dir(root);
        (tree, [root, a, b, leaf, top, side])
    }

    #[test]
    fn test_finalize_aggregates_bottom_up() {
        let (tree, [root, a, b, ..]) = chain();
        assert_eq!(tree.node(b).size, 100);
        assert_eq!(tree.node(b).item_count, 2);
        assert_eq!(tree.node(a).size, 120);
        assert_eq!(tree.node(a).item_count, 4);
        assert_eq!(tree.node(root).size, 130);
        assert_eq!(tree.node(root).usage, 3 * 4096);
        assert_eq!(tree.node(root).item_count, 6);
    }

    #[test]
    fn test_empty_dir_counts_itself() {
        let mut tree = FileTree::default();
        let root = tree.set_root(FileNode::new_dir("/empty"));
        tree.finalize_dir(root);
        assert_eq!(tree.totals(root), Totals { size: 0, usage: 0, items: 1 });
    }

    #[test]
    fn test_detach_propagates_to_every_ancestor() {
        let (mut tree, [root, a, b, leaf, ..]) = chain();
        let removed = tree.detach(leaf);

        assert_eq!(removed, Totals { size: 100, usage: 4096, items: 1 });
        assert_eq!(tree.node(b).size, 0);
        assert_eq!(tree.node(a).size, 20);
        assert_eq!(tree.node(root).size, 30);
        assert_eq!(tree.node(b).item_count, 1);
        assert_eq!(tree.node(a).item_count, 3);
        assert_eq!(tree.node(root).item_count, 5);
        assert!(tree.find_child(b, "leaf").is_none());
        assert!(!tree.is_attached(leaf));
    }

    #[test]
    fn test_detach_middle_sibling() {
        let mut tree = FileTree::default();
        let root = tree.set_root(FileNode::new_dir("/r"));
        let names = ["x", "y", "z"];
        for name in names {
            let idx = tree.add_node(FileNode::new_file(name, 1, 1));
            tree.add_child(root, idx);
        }
        tree.finalize_dir(root);

        let y = tree.find_child(root, "y").unwrap();
        tree.detach(y);
        let left: Vec<_> = tree
            .children(root)
            .into_iter()
            .map(|c| tree.node(c).name.to_string())
            .collect();
        assert_eq!(left, vec!["z", "x"]);
        assert_eq!(tree.node(root).size, 2);
    }

    #[test]
    fn test_detach_root_is_noop() {
        let (mut tree, [root, ..]) = chain();
        assert_eq!(tree.detach(root), Totals::default());
        assert_eq!(tree.node(root).size, 130);
    }

    #[test]
    fn test_error_flag_clears_after_detach() {
        let (mut tree, [root, a, b, ..]) = chain();
        let bad = tree.add_node(FileNode::new_error("bad", crate::model::EntryKind::File));
        tree.add_child(b, bad);
        tree.finalize_dir(b);
        tree.finalize_dir(a);
        tree.finalize_dir(root);
        assert!(tree.node(root).flags.error_below);

        tree.detach(bad);
        assert!(!tree.node(b).flags.error_below);
        assert!(!tree.node(root).flags.error_below);
    }

    #[test]
    fn test_full_path() {
        let (tree, [_, _, _, leaf, ..]) = chain();
        assert_eq!(tree.full_path(leaf), PathBuf::from("/data/a/b/leaf"));
    }

    #[test]
    fn test_children_sorted_by_each_key() {
        let (tree, [root, a, _, _, top, _]) = chain();
        assert_eq!(
            tree.children_sorted(root, SortKey::ApparentSize, SortOrder::Descending),
            vec![a, top]
        );
        assert_eq!(
            tree.children_sorted(root, SortKey::ApparentSize, SortOrder::Ascending),
            vec![top, a]
        );
        assert_eq!(
            tree.children_sorted(root, SortKey::Name, SortOrder::Ascending),
            vec![a, top]
        );
        assert_eq!(
            tree.children_sorted(root, SortKey::ItemCount, SortOrder::Descending),
            vec![a, top]
        );
    }

    #[test]
    fn test_sort_children_relinks() {
        let (mut tree, [root, a, _, _, top, _]) = chain();
        tree.sort_children(root, SortKey::Name, SortOrder::Descending);
        assert_eq!(tree.children(root), vec![top, a]);
        tree.sort_recursive(root, SortKey::ApparentSize, SortOrder::Descending);
        assert_eq!(tree.children(root), vec![a, top]);
    }

    #[test]
    fn test_counted_inode_keys_skip_subtree_and_duplicates() {
        let (mut tree, [_, a, b, leaf, top, side]) = chain();
        for (idx, inode) in [(leaf, 1), (top, 2), (side, 3)] {
            let node = tree.node_mut(idx);
            node.links = 2;
            node.inode = inode;
        }
        tree.node_mut(side).mark_hardlink_duplicate();

        let mut inodes: Vec<u64> = tree.counted_inode_keys(b).iter().map(|k| k.inode).collect();
        inodes.sort_unstable();
        assert_eq!(inodes, vec![2]);
        assert_eq!(tree.counted_inode_keys(a).len(), 1);
        assert_eq!(tree.counted_inode_keys(top).len(), 1);
    }
}
