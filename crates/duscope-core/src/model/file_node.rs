/// A single node in the arena-allocated file tree.
///
/// Nodes are stored in a flat `Vec<FileNode>`. Parent-child relationships
/// use indices rather than pointers, so the parent link is a plain
/// non-owning back-reference and dropping the tree is a single `Vec` drop.
use compact_str::CompactString;
use std::fs::{FileType, Metadata};
use std::time::SystemTime;

/// Lightweight index into the arena `Vec<FileNode>`.
///
/// Uses `u32` to keep nodes small; supports up to ~4 billion nodes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeIndex(pub u32);

impl NodeIndex {
    /// Create a new `NodeIndex` from a `usize`.
    ///
    /// Panics if `index` does not fit in a `u32`.
    #[inline]
    pub fn new(index: usize) -> Self {
        assert!(index <= u32::MAX as usize, "NodeIndex overflow");
        Self(index as u32)
    }

    /// Return the index as a `usize` for Vec indexing.
    #[inline]
    pub fn idx(self) -> usize {
        self.0 as usize
    }
}

/// What kind of filesystem entry a node stands for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EntryKind {
    File,
    Directory,
    Symlink,
    /// Sockets, FIFOs, device nodes.
    Other,
}

impl EntryKind {
    pub fn from_file_type(ft: FileType) -> Self {
        if ft.is_dir() {
            Self::Directory
        } else if ft.is_symlink() {
            Self::Symlink
        } else if ft.is_file() {
            Self::File
        } else {
            Self::Other
        }
    }

    #[inline]
    pub fn is_dir(self) -> bool {
        self == Self::Directory
    }
}

/// Per-node status flags.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NodeFlags {
    /// The entry itself could not be read (stat or directory listing failed).
    pub error: bool,
    /// Some descendant carries `error`.
    pub error_below: bool,
    /// The path was on the ignore list; never descended.
    pub ignored: bool,
    /// Directory on a different device than the scan root; never descended.
    pub other_fs: bool,
    /// Another link to the same (device, inode) was already counted.
    pub hardlink_duplicate: bool,
    /// Descent was cut short by cancellation.
    pub incomplete: bool,
    /// Some descendant was skipped (ignored, other filesystem, incomplete).
    pub skipped_below: bool,
}

impl NodeFlags {
    /// Single-character marker for list views, or a space when nothing is set.
    ///
    /// Precedence follows severity: own error, error below, then skips.
    pub fn marker(&self) -> char {
        if self.error {
            '!'
        } else if self.error_below {
            '.'
        } else if self.other_fs {
            '@'
        } else if self.ignored {
            'i'
        } else if self.hardlink_duplicate {
            'H'
        } else if self.incomplete {
            '~'
        } else {
            ' '
        }
    }

    /// Whether this node's own state makes its parent carry `skipped_below`.
    #[inline]
    pub(crate) fn is_skip(&self) -> bool {
        self.ignored || self.other_fs || self.incomplete || self.skipped_below
    }
}

/// Device and inode pair identifying one underlying file.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct InodeKey {
    pub device: u64,
    pub inode: u64,
}

/// A single file or directory in the tree.
#[derive(Debug, Clone)]
pub struct FileNode {
    /// Entry name only. The root node holds the full scan-root path instead.
    pub name: CompactString,

    pub kind: EntryKind,

    /// Apparent (logical) size in bytes.
    /// For directories this is the sum over all children.
    pub size: u64,

    /// Bytes allocated on disk (512-byte blocks × 512 on Unix).
    /// For directories this is the sum over all children.
    pub usage: u64,

    /// 1 for a leaf, 1 + sum of children for a directory, 0 for a
    /// duplicate hard link.
    pub item_count: u64,

    /// Index of the parent node. `None` for the root and for detached nodes.
    pub parent: Option<NodeIndex>,

    /// First child (directories only). Children form a singly-linked list
    /// via [`next_sibling`](Self::next_sibling).
    pub first_child: Option<NodeIndex>,

    /// Next sibling under the same parent.
    pub next_sibling: Option<NodeIndex>,

    pub modified: Option<SystemTime>,

    pub device: u64,
    pub inode: u64,
    /// Hard-link count reported by metadata.
    pub links: u64,

    pub flags: NodeFlags,
}

impl FileNode {
    fn blank(name: CompactString, kind: EntryKind) -> Self {
        Self {
            name,
            kind,
            size: 0,
            usage: 0,
            item_count: 1,
            parent: None,
            first_child: None,
            next_sibling: None,
            modified: None,
            device: 0,
            inode: 0,
            links: 1,
            flags: NodeFlags::default(),
        }
    }

    /// Create a leaf node with explicit sizes. Mostly useful for building
    /// trees by hand.
    pub fn new_file(name: impl Into<CompactString>, size: u64, usage: u64) -> Self {
        let mut node = Self::blank(name.into(), EntryKind::File);
        node.size = size;
        node.usage = usage;
        node
    }

    /// Create an empty directory node. Totals are filled in by
    /// [`FileTree::finalize_dir`](super::FileTree::finalize_dir).
    pub fn new_dir(name: impl Into<CompactString>) -> Self {
        Self::blank(name.into(), EntryKind::Directory)
    }

    /// Create a node from entry metadata (`symlink_metadata`, never followed).
    ///
    /// Directories start with zero size; a directory's own inode size is not
    /// counted, only its contents.
    pub fn from_metadata(name: impl Into<CompactString>, meta: &Metadata) -> Self {
        let kind = EntryKind::from_file_type(meta.file_type());
        let mut node = Self::blank(name.into(), kind);
        node.modified = meta.modified().ok();
        fill_platform_stats(&mut node, meta);
        if kind.is_dir() {
            node.size = 0;
            node.usage = 0;
        }
        node
    }

    /// Create an error placeholder (e.g. access denied). Contributes no bytes
    /// but stays in the tree so the user can see where errors occurred.
    pub fn new_error(name: impl Into<CompactString>, kind: EntryKind) -> Self {
        let mut node = Self::blank(name.into(), kind);
        node.flags.error = true;
        node
    }

    /// Create a node for an ignored path. Never descended, contributes no bytes.
    pub fn new_ignored(name: impl Into<CompactString>, kind: EntryKind) -> Self {
        let mut node = Self::blank(name.into(), kind);
        node.flags.ignored = true;
        node
    }

    #[inline]
    pub fn is_dir(&self) -> bool {
        self.kind.is_dir()
    }

    /// Dedup key for multiply-linked regular files, `None` otherwise.
    pub fn inode_key(&self) -> Option<InodeKey> {
        (self.kind == EntryKind::File && self.links > 1).then_some(InodeKey {
            device: self.device,
            inode: self.inode,
        })
    }

    /// Turn this node into a zero-contribution duplicate link.
    pub(crate) fn mark_hardlink_duplicate(&mut self) {
        self.size = 0;
        self.usage = 0;
        self.item_count = 0;
        self.flags.hardlink_duplicate = true;
    }

    /// Size in the requested flavour.
    #[inline]
    pub fn size_of(&self, apparent: bool) -> u64 {
        if apparent {
            self.size
        } else {
            self.usage
        }
    }
}

#[cfg(unix)]
fn fill_platform_stats(node: &mut FileNode, meta: &Metadata) {
    use std::os::unix::fs::MetadataExt;
    node.size = meta.len();
    node.usage = meta.blocks().saturating_mul(512);
    node.device = meta.dev();
    node.inode = meta.ino();
    node.links = meta.nlink();
}

#[cfg(not(unix))]
fn fill_platform_stats(node: &mut FileNode, meta: &Metadata) {
    node.size = meta.len();
    node.usage = meta.len();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_index_round_trips_u32_max() {
        assert_eq!(NodeIndex::new(u32::MAX as usize).idx(), u32::MAX as usize);
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    #[should_panic(expected = "NodeIndex overflow")]
    fn test_node_index_overflow_panics() {
        NodeIndex::new(u32::MAX as usize + 1);
    }

    #[test]
    fn test_marker_precedence() {
        let mut flags = NodeFlags::default();
        assert_eq!(flags.marker(), ' ');
        flags.ignored = true;
        assert_eq!(flags.marker(), 'i');
        flags.error_below = true;
        assert_eq!(flags.marker(), '.');
        flags.error = true;
        assert_eq!(flags.marker(), '!');
    }

    #[test]
    fn test_inode_key_only_for_linked_files() {
        let mut file = FileNode::new_file("a", 10, 4096);
        assert_eq!(file.inode_key(), None);
        file.links = 2;
        file.device = 7;
        file.inode = 42;
        assert_eq!(
            file.inode_key(),
            Some(InodeKey {
                device: 7,
                inode: 42
            })
        );

        let mut dir = FileNode::new_dir("d");
        dir.links = 3;
        assert_eq!(dir.inode_key(), None);
    }

    #[test]
    fn test_duplicate_contributes_nothing() {
        let mut file = FileNode::new_file("a", 10, 4096);
        file.mark_hardlink_duplicate();
        assert_eq!((file.size, file.usage, file.item_count), (0, 0, 0));
        assert!(file.flags.hardlink_duplicate);
    }
}
