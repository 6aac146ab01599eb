/// Removing nodes from the tree.
///
/// Two operations share one propagation rule: [`exclude`] only drops the
/// node from the in-memory tree, [`remove_from_disk`] also deletes the
/// underlying entry. Both subtract the removed totals from every ancestor.
///
/// Callers on a [`LiveTree`](crate::scanner::LiveTree) hold the write lock
/// for the whole call, which gives the operation exclusive access to the
/// ancestor chain it modifies.
use super::file_node::FileNode;
use super::file_tree::{FileTree, Totals};
use super::NodeIndex;
use crate::error::{FailedRemoval, RemoveError};
use std::fs;
use std::io;
use std::path::Path;
use tracing::{debug, warn};

/// Drop a node and its subtree from the tree without touching storage.
pub fn exclude(tree: &mut FileTree, index: NodeIndex) -> Result<Totals, RemoveError> {
    check_removable(tree, index)?;
    Ok(tree.detach(index))
}

/// Delete the entry behind `index` from storage and from the tree.
///
/// Directories are removed bottom-up, one entry at a time, and every entry
/// is detached only after its own deletion succeeded. On partial failure
/// the survivors stay in the tree with their totals intact and the error
/// lists each path that could not be removed.
pub fn remove_from_disk(tree: &mut FileTree, index: NodeIndex) -> Result<Totals, RemoveError> {
    check_removable(tree, index)?;
    let path = tree.full_path(index);

    let mut failed = Vec::new();
    let mut removed = Totals::default();
    remove_entry(tree, index, &path, &mut failed, &mut removed);

    if failed.is_empty() {
        debug!(
            "Removed {} ({} items, {} bytes)",
            path.display(),
            removed.items,
            removed.size
        );
        Ok(removed)
    } else {
        Err(RemoveError::Partial { failed })
    }
}

fn check_removable(tree: &FileTree, index: NodeIndex) -> Result<(), RemoveError> {
    if tree.root() == Some(index) {
        return Err(RemoveError::Root(tree.full_path(index)));
    }
    if !tree.is_attached(index) {
        return Err(RemoveError::Detached(tree.full_path(index)));
    }
    Ok(())
}

/// Returns `true` when the entry is gone from storage and from the tree.
fn remove_entry(
    tree: &mut FileTree,
    index: NodeIndex,
    path: &Path,
    failed: &mut Vec<FailedRemoval>,
    removed: &mut Totals,
) -> bool {
    let node = tree.node(index);
    let outcome = if !node.is_dir() {
        fs::remove_file(path)
    } else if node.flags.other_fs {
        Err(io::Error::other("mount point of another filesystem"))
    } else if was_listed(node) {
        let mut all_removed = true;
        for child in tree.children(index) {
            let child_path = path.join(tree.node(child).name.as_str());
            all_removed &= remove_entry(tree, child, &child_path, failed, removed);
        }
        if !all_removed {
            return false;
        }
        fs::remove_dir(path)
    } else {
        // Contents were never listed, so there is nothing to remove one by one.
        fs::remove_dir_all(path)
    };

    match outcome {
        Ok(()) => {
            let totals = tree.detach(index);
            removed.size += totals.size;
            removed.usage += totals.usage;
            removed.items += totals.items;
            true
        }
        Err(source) => {
            warn!("Failed to remove {}: {}", path.display(), source);
            failed.push(FailedRemoval {
                path: path.to_path_buf(),
                source,
            });
            false
        }
    }
}

/// Whether the directory's contents are fully represented by its children.
fn was_listed(node: &FileNode) -> bool {
    let unlisted = node.flags.ignored
        || node.flags.error
        || (node.flags.incomplete && node.first_child.is_none());
    !unlisted
}
