/// Scanner module — the directory analyzer.
///
/// The analyzer walks a root path on a bounded rayon pool, writing nodes
/// into a **shared `LiveTree`** (`Arc<RwLock<FileTree>>`) as each directory
/// is listed, and updating a lock-guarded [`Progress`] record as each
/// directory finishes. Front ends may read the tree while the walk runs;
/// totals are final once `Progress::done` is observed.
pub mod hardlinks;
pub mod progress;
mod walker;

use crate::error::RefreshError;
use crate::model::{EntryKind, FileNode, FileTree, NodeIndex};
use hardlinks::HardLinkRegistry;
use progress::{Progress, ProgressHandle};
use walker::Walker;

use parking_lot::RwLock;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;
use tracing::{info, warn};

/// A shared, concurrently-readable file tree.
///
/// Walker tasks hold the write lock briefly, once per directory batch.
/// Readers hold a read lock while rendering. Removal and refresh hold the
/// write lock for the whole mutation.
pub type LiveTree = Arc<RwLock<FileTree>>;

/// Initial arena capacity for a fresh analysis.
const INITIAL_TREE_CAPACITY: usize = 65_536;

/// Stack size of walker threads. Recursion depth equals directory depth.
const WORKER_STACK_SIZE: usize = 8 * 1024 * 1024;

/// Analyzer settings.
#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    /// Number of concurrently running directory tasks.
    pub threads: usize,
    /// Flag directories on another device than the root as other-filesystem
    /// and do not descend into them.
    pub same_filesystem: bool,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            threads: num_cpus::get(),
            same_filesystem: false,
        }
    }
}

impl AnalyzerConfig {
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    pub fn with_same_filesystem(mut self, same_filesystem: bool) -> Self {
        self.same_filesystem = same_filesystem;
        self
    }
}

/// Runs analyses. Each run resets the progress record in place, so a
/// [`ProgressHandle`] obtained earlier keeps tracking the latest run.
pub struct Analyzer {
    config: AnalyzerConfig,
    progress: ProgressHandle,
    cancel_flag: Arc<AtomicBool>,
}

impl Analyzer {
    pub fn new(config: AnalyzerConfig) -> Self {
        Self {
            config,
            progress: Progress::new_handle(),
            cancel_flag: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Live handle to the progress record.
    pub fn progress(&self) -> ProgressHandle {
        self.progress.clone()
    }

    /// Request the running walk to stop at its next descent.
    pub fn cancel(&self) {
        self.cancel_flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel_flag.load(Ordering::Relaxed)
    }

    /// Analyze `root` and return the finished tree. Blocks until done.
    pub fn analyze_dir<F>(&self, root: &Path, should_ignore: &F) -> LiveTree
    where
        F: Fn(&Path) -> bool + Sync,
    {
        let tree: LiveTree = Arc::new(RwLock::new(FileTree::default()));
        self.analyze_into(&tree, root, should_ignore);
        tree
    }

    /// Analyze `root` into `tree`, replacing whatever it held.
    ///
    /// An unreadable root, or one that is not a directory, yields a
    /// single-node tree flagged with an error. A cancel requested before
    /// this call does not carry over into the run.
    pub fn analyze_into<F>(&self, tree: &LiveTree, root: &Path, should_ignore: &F)
    where
        F: Fn(&Path) -> bool + Sync,
    {
        self.cancel_flag.store(false, Ordering::Relaxed);
        self.run_analysis(tree, root, should_ignore);
    }

    fn run_analysis<F>(&self, tree: &LiveTree, root: &Path, should_ignore: &F)
    where
        F: Fn(&Path) -> bool + Sync,
    {
        let start = Instant::now();
        *self.progress.lock() = Progress::default();
        info!("Analyzing {}", root.display());

        let name = root.to_string_lossy();
        let root_node = match fs::metadata(root) {
            Ok(meta) if meta.is_dir() => FileNode::from_metadata(name.as_ref(), &meta),
            Ok(meta) => {
                warn!("{} is not a directory", root.display());
                let mut node = FileNode::from_metadata(name.as_ref(), &meta);
                node.flags.error = true;
                self.finish_single_node(tree, node, root);
                return;
            }
            Err(err) => {
                warn!("Cannot read {}: {}", root.display(), err);
                let node = FileNode::new_error(name.as_ref(), EntryKind::Other);
                self.finish_single_node(tree, node, root);
                return;
            }
        };

        let root_device = self.config.same_filesystem.then_some(root_node.device);
        let root_idx = {
            let mut guard = tree.write();
            *guard = FileTree::with_capacity(INITIAL_TREE_CAPACITY);
            guard.set_root(root_node)
        };

        let registry = HardLinkRegistry::default();
        let walker = Walker {
            tree,
            progress: &self.progress,
            cancel_flag: &self.cancel_flag,
            registry: &registry,
            should_ignore,
            root_device,
        };
        self.run_in_pool(|| walker.walk_dir(root_idx, root));

        let cancelled = self.is_cancelled();
        let mut progress = self.progress.lock();
        progress.finish(cancelled);
        info!(
            "Analysis of {} {} after {:?}: {} items, {} bytes",
            root.display(),
            if cancelled { "cancelled" } else { "finished" },
            start.elapsed(),
            progress.item_count,
            progress.total_size
        );
    }

    fn finish_single_node(&self, tree: &LiveTree, node: FileNode, root: &Path) {
        let bytes = node.size;
        {
            let mut guard = tree.write();
            *guard = FileTree::with_capacity(1);
            guard.set_root(node);
        }
        let mut progress = self.progress.lock();
        progress.record(1, bytes, root);
        progress.finish(false);
    }

    /// Re-analyze the directory `dir` of an existing tree in place.
    ///
    /// The old subtree is dropped, the directory is walked again, and the
    /// difference between old and new totals is applied to every ancestor.
    /// Hard links already counted outside the subtree stay counted there.
    pub fn refresh<F>(&self, tree: &LiveTree, dir: NodeIndex, should_ignore: &F) -> Result<(), RefreshError>
    where
        F: Fn(&Path) -> bool + Sync,
    {
        self.cancel_flag.store(false, Ordering::Relaxed);
        self.run_refresh(tree, dir, should_ignore)
    }

    fn run_refresh<F>(&self, tree: &LiveTree, dir: NodeIndex, should_ignore: &F) -> Result<(), RefreshError>
    where
        F: Fn(&Path) -> bool + Sync,
    {
        let start = Instant::now();
        *self.progress.lock() = Progress::default();

        let prepared = {
            let mut guard = tree.write();
            let path = guard.full_path(dir);
            if !guard.is_attached(dir) {
                Err(RefreshError::Detached(path))
            } else if !guard.node(dir).is_dir() {
                Err(RefreshError::NotADirectory(path))
            } else {
                let registry = HardLinkRegistry::seeded(guard.counted_inode_keys(dir));
                let root_device = match guard.root() {
                    Some(root) if self.config.same_filesystem => Some(guard.node(root).device),
                    _ => None,
                };
                let before = guard.clear_children(dir);
                Ok((path, registry, root_device, before))
            }
        };
        let (path, registry, root_device, before) = match prepared {
            Ok(prepared) => prepared,
            Err(err) => {
                self.progress.lock().finish(false);
                return Err(err);
            }
        };
        info!("Refreshing {}", path.display());

        let walker = Walker {
            tree,
            progress: &self.progress,
            cancel_flag: &self.cancel_flag,
            registry: &registry,
            should_ignore,
            root_device,
        };
        self.run_in_pool(|| walker.walk_dir(dir, &path));

        {
            let mut guard = tree.write();
            let after = guard.totals(dir);
            if let Some(parent) = guard.node(dir).parent {
                guard.propagate(parent, before, after);
                guard.refresh_flags_upward(parent);
            }
        }

        self.progress.lock().finish(self.is_cancelled());
        info!("Refresh of {} done in {:?}", path.display(), start.elapsed());
        Ok(())
    }

    /// Run `op` on a dedicated pool bounded by `config.threads`, falling back
    /// to the global pool if the dedicated one cannot be built.
    fn run_in_pool<R: Send>(&self, op: impl FnOnce() -> R + Send) -> R {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.threads.max(1))
            .thread_name(|i| format!("duscope-walk-{i}"))
            .stack_size(WORKER_STACK_SIZE)
            .build();
        match pool {
            Ok(pool) => pool.install(op),
            Err(err) => {
                warn!("Cannot build walker pool ({err}); using the global pool");
                op()
            }
        }
    }
}

/// Handle to a running or completed background analysis.
pub struct AnalysisHandle {
    /// Tree populated while the analysis runs.
    pub tree: LiveTree,
    /// Progress of the run; poll until `done`.
    pub progress: ProgressHandle,
    cancel_flag: Arc<AtomicBool>,
    thread: Option<thread::JoinHandle<()>>,
}

impl AnalysisHandle {
    /// Request the analysis to stop as soon as possible.
    pub fn cancel(&self) {
        self.cancel_flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel_flag.load(Ordering::Relaxed)
    }

    pub fn is_done(&self) -> bool {
        self.progress.lock().done
    }

    /// Block until the background thread exits and return the tree.
    pub fn wait(mut self) -> LiveTree {
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("Analyzer thread panicked");
                self.progress.lock().finish(true);
            }
        }
        self.tree.clone()
    }
}

/// Start analyzing `root` on a background thread. Returns immediately.
pub fn start_analysis<F>(root: PathBuf, should_ignore: F, config: AnalyzerConfig) -> AnalysisHandle
where
    F: Fn(&Path) -> bool + Send + Sync + 'static,
{
    let analyzer = Analyzer::new(config);
    let tree: LiveTree = Arc::new(RwLock::new(FileTree::default()));
    let progress = analyzer.progress();
    let cancel_flag = analyzer.cancel_flag.clone();
    let tree_clone = tree.clone();

    let thread = thread::Builder::new()
        .name("duscope-analyzer".into())
        .spawn(move || analyzer.run_analysis(&tree_clone, &root, &should_ignore))
        .expect("failed to spawn analyzer thread");

    AnalysisHandle {
        tree,
        progress,
        cancel_flag,
        thread: Some(thread),
    }
}

/// Re-analyze `dir` of an existing tree on a background thread.
pub fn start_refresh<F>(tree: LiveTree, dir: NodeIndex, should_ignore: F, config: AnalyzerConfig) -> AnalysisHandle
where
    F: Fn(&Path) -> bool + Send + Sync + 'static,
{
    let analyzer = Analyzer::new(config);
    let progress = analyzer.progress();
    let cancel_flag = analyzer.cancel_flag.clone();
    let tree_clone = tree.clone();

    let thread = thread::Builder::new()
        .name("duscope-refresh".into())
        .spawn(move || {
            if let Err(err) = analyzer.run_refresh(&tree_clone, dir, &should_ignore) {
                warn!("Refresh failed: {err}");
            }
        })
        .expect("failed to spawn refresh thread");

    AnalysisHandle {
        tree,
        progress,
        cancel_flag,
        thread: Some(thread),
    }
}
