/// Hard-link registry shared by all directory workers of one run.
///
/// The same inode can be reached from two directories being walked on
/// different threads at once, so the set is a single locked `HashSet`
/// rather than per-worker state.
use crate::model::InodeKey;
use parking_lot::Mutex;
use std::collections::HashSet;

#[derive(Debug, Default)]
pub struct HardLinkRegistry {
    seen: Mutex<HashSet<InodeKey>>,
}

impl HardLinkRegistry {
    /// Registry pre-populated with keys already counted elsewhere in the tree.
    pub fn seeded(keys: impl IntoIterator<Item = InodeKey>) -> Self {
        Self {
            seen: Mutex::new(keys.into_iter().collect()),
        }
    }

    /// Claim `key` for counting. Returns `true` for the first claimant only.
    pub fn claim(&self, key: InodeKey) -> bool {
        self.seen.lock().insert(key)
    }

    pub fn len(&self) -> usize {
        self.seen.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.lock().is_empty()
    }
}
