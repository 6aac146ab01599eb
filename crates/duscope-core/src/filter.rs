/// Path filter. Decides which paths the analyzer must not descend into.
///
/// Matching is exact-path, not prefix: a directory is ignored only if its
/// own path is listed. Descendants of an ignored directory are never
/// visited, so prefix matching would add nothing.
use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};

/// Set of absolute paths to skip.
#[derive(Debug, Clone, Default)]
pub struct IgnoreSet {
    paths: HashSet<PathBuf>,
}

impl IgnoreSet {
    pub fn new<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let mut set = Self::default();
        set.extend(paths);
        set
    }

    /// Add more paths, e.g. the nested mount points of the scan root.
    pub fn extend<I, P>(&mut self, paths: I)
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.paths
            .extend(paths.into_iter().map(|p| normalize(p.into())));
    }

    /// Whether `path` is on the list.
    pub fn should_be_ignored(&self, path: &Path) -> bool {
        !self.paths.is_empty() && self.paths.contains(path)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

fn normalize(path: PathBuf) -> PathBuf {
    clean_path(&path)
}

/// Lexically clean a path: drop `.` and trailing separators, and resolve
/// each `..` against the component before it. `..` directly under the root
/// stays at the root; leading `..` of a relative path is kept.
///
/// Symlinks are not consulted, so the result names the same entry only when
/// no `..` follows a symlinked directory.
pub fn clean_path(path: &Path) -> PathBuf {
    let mut out: Vec<Component<'_>> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.last() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => out.push(component),
            },
            other => out.push(other),
        }
    }
    if out.is_empty() {
        return PathBuf::from(".");
    }
    out.into_iter().collect()
}
