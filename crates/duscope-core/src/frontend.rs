/// Front-end contract.
///
/// The core never calls into a front end. A front end drives the analyzer
/// and the mount enumerator and renders what they produce; the binary only
/// talks to it through this trait, so any renderer (plain text, terminal UI,
/// web view) can be swapped in.
use crate::model::NodeIndex;
use crate::platform::MountSource;
use std::path::{Path, PathBuf};

pub trait Ui {
    /// Show mounted block devices with their usage.
    fn list_devices(&mut self, source: &dyn MountSource) -> anyhow::Result<()>;

    /// Analyze `path`. With `parent` set, re-analyze that directory node of
    /// the current tree in place instead of starting a new tree.
    fn analyze_path(&mut self, path: &Path, parent: Option<NodeIndex>) -> anyhow::Result<()>;

    /// Replace the list of paths the analyzer must not descend into.
    fn set_ignore_dir_paths(&mut self, paths: Vec<PathBuf>);

    /// Run until the user is done. Returns when the front end exits.
    fn start_ui_loop(&mut self) -> anyhow::Result<()>;
}
