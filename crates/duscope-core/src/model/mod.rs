/// Data model for the analysed tree.
///
/// Re-exports the arena-allocated tree, its node type, removal operations,
/// and display helpers for sizes.
pub mod file_node;
pub mod file_tree;
pub mod removal;
pub mod size;

pub use file_node::{EntryKind, FileNode, InodeKey, NodeFlags, NodeIndex};
pub use file_tree::{FileTree, SortKey, SortOrder, Totals};
