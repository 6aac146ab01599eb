/// Parallel directory walker: one rayon task per directory subtree.
///
/// A directory task lists its entries, stats each one outside any lock,
/// then inserts the whole batch into the shared `LiveTree` under a single
/// write lock. Subdirectories fan out onto the pool; once all of them have
/// returned, the directory's totals are folded from its children and its
/// own contribution is added to the progress record.
///
/// # Ownership during the walk
///
/// Only the task expanding a directory writes that directory's node and its
/// direct children. The tree-wide write lock serialises the arena pushes,
/// but no two tasks ever modify the same node. Aggregates of a directory
/// are therefore final the moment its task returns.
use super::hardlinks::HardLinkRegistry;
use super::progress::ProgressHandle;
use super::LiveTree;
use crate::model::{EntryKind, FileNode, NodeIndex};
use compact_str::CompactString;
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

/// A resolved entry waiting to be inserted under the parent's write lock.
struct PendingEntry {
    node: FileNode,
    /// Set for directories the walk must descend into.
    descend: Option<PathBuf>,
}

/// Shared state of one run, borrowed by every directory task.
pub(crate) struct Walker<'a, F> {
    pub tree: &'a LiveTree,
    pub progress: &'a ProgressHandle,
    pub cancel_flag: &'a AtomicBool,
    pub registry: &'a HardLinkRegistry,
    pub should_ignore: &'a F,
    /// Device of the scan root when other filesystems must not be entered.
    pub root_device: Option<u64>,
}

impl<F> Walker<'_, F>
where
    F: Fn(&Path) -> bool + Sync,
{
    /// Expand the existing directory node `dir` located at `path`.
    ///
    /// Returns once every descendant is final, or cut short by cancellation.
    pub fn walk_dir(&self, dir: NodeIndex, path: &Path) {
        let entries = match fs::read_dir(path) {
            Ok(entries) => entries,
            Err(err) => {
                debug!("Cannot read directory {}: {}", path.display(), err);
                {
                    let mut tree = self.tree.write();
                    tree.node_mut(dir).flags.error = true;
                    tree.finalize_dir(dir);
                }
                self.progress.lock().record(1, 0, path);
                return;
            }
        };

        let mut listing_failed = false;
        let mut pending = Vec::new();
        for entry in entries {
            match entry {
                Ok(entry) => pending.push(self.resolve(&entry)),
                Err(err) => {
                    debug!("Listing of {} interrupted: {}", path.display(), err);
                    listing_failed = true;
                }
            }
        }

        // Items and bytes of children that are not walked themselves.
        let mut own_items: u64 = 0;
        let mut own_bytes: u64 = 0;
        let mut subdirs: Vec<(NodeIndex, PathBuf)> = Vec::new();
        {
            let mut tree = self.tree.write();
            if listing_failed {
                tree.node_mut(dir).flags.error = true;
            }
            for pe in pending {
                if pe.descend.is_none() {
                    own_items += pe.node.item_count;
                    own_bytes += pe.node.size;
                }
                let idx = tree.add_node(pe.node);
                tree.add_child(dir, idx);
                if let Some(child_path) = pe.descend {
                    subdirs.push((idx, child_path));
                }
            }
        }

        // Cancellation is observed before each descent; a skipped subdirectory
        // stays in the tree as an empty, incomplete node.
        let skipped: Vec<NodeIndex> = subdirs
            .into_par_iter()
            .filter_map(|(idx, child_path)| {
                if self.cancel_flag.load(Ordering::Relaxed) {
                    Some(idx)
                } else {
                    self.walk_dir(idx, &child_path);
                    None
                }
            })
            .collect();

        {
            let mut tree = self.tree.write();
            for &idx in &skipped {
                tree.node_mut(idx).flags.incomplete = true;
            }
            if !skipped.is_empty() {
                tree.node_mut(dir).flags.incomplete = true;
            }
            tree.finalize_dir(dir);
        }

        self.progress
            .lock()
            .record(1 + own_items + skipped.len() as u64, own_bytes, path);
    }

    /// Turn one directory entry into a node. Never fails: unreadable entries
    /// become error nodes.
    fn resolve(&self, entry: &fs::DirEntry) -> PendingEntry {
        let name = CompactString::new(entry.file_name().to_string_lossy());
        let path = entry.path();
        let listed_kind = || {
            entry
                .file_type()
                .map(EntryKind::from_file_type)
                .unwrap_or(EntryKind::Other)
        };

        if (self.should_ignore)(&path) {
            debug!("Ignoring {}", path.display());
            return PendingEntry {
                node: FileNode::new_ignored(name, listed_kind()),
                descend: None,
            };
        }

        let meta = match fs::symlink_metadata(&path) {
            Ok(meta) => meta,
            Err(err) => {
                debug!("Cannot stat {}: {}", path.display(), err);
                return PendingEntry {
                    node: FileNode::new_error(name, listed_kind()),
                    descend: None,
                };
            }
        };

        let mut node = FileNode::from_metadata(name, &meta);
        if node.is_dir() {
            if self.root_device.is_some_and(|dev| dev != node.device) {
                debug!("Not crossing into {} (other filesystem)", path.display());
                node.flags.other_fs = true;
                return PendingEntry {
                    node,
                    descend: None,
                };
            }
            return PendingEntry {
                node,
                descend: Some(path),
            };
        }

        if let Some(key) = node.inode_key() {
            if !self.registry.claim(key) {
                node.mark_hardlink_duplicate();
            }
        }
        PendingEntry {
            node,
            descend: None,
        }
    }
}
