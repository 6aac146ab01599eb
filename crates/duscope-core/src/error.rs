use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failures of the mount enumerator.
#[derive(Debug, Error)]
pub enum MountError {
    /// The mount table itself could not be read. The cause is left to the
    /// error chain, so render with `{:#}` through `anyhow`.
    #[error("open {}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid mount table line: {0}")]
    InvalidLine(String),

    /// `statvfs` failed for a mount point while collecting usage.
    #[error("statvfs {}", .path.display())]
    Usage {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// One entry that could not be removed from storage.
#[derive(Debug)]
pub struct FailedRemoval {
    pub path: PathBuf,
    pub source: io::Error,
}

/// Failures of node removal.
#[derive(Debug, Error)]
pub enum RemoveError {
    /// Some entries were removed, these were not. The tree reflects exactly
    /// what is gone from storage.
    #[error("failed to remove {}", summarize(.failed))]
    Partial { failed: Vec<FailedRemoval> },

    #[error("{} is not attached to the tree", .0.display())]
    Detached(PathBuf),

    #[error("refusing to remove the analysis root {}", .0.display())]
    Root(PathBuf),
}

/// Failures of subtree re-analysis.
#[derive(Debug, Error)]
pub enum RefreshError {
    #[error("{} is not a directory node", .0.display())]
    NotADirectory(PathBuf),

    #[error("{} is not attached to the tree", .0.display())]
    Detached(PathBuf),
}

fn summarize(failed: &[FailedRemoval]) -> String {
    let noun = if failed.len() == 1 { "entry" } else { "entries" };
    let list = failed
        .iter()
        .map(|f| format!("{} ({})", f.path.display(), f.source))
        .collect::<Vec<_>>()
        .join(", ");
    format!("{} {noun}: {list}", failed.len())
}
