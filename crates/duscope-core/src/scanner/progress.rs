/// Analysis progress, kept in one lock-guarded record updated by the walker and
/// polled by any number of observers.
///
/// There is no push channel: observers hold a [`ProgressHandle`] and read it
/// at their own cadence (typically every 100 ms) until `done` is set.
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

/// Shared, live handle to the progress of one run.
pub type ProgressHandle = Arc<Mutex<Progress>>;

/// Running totals of one analysis.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Progress {
    /// Items (files, directories, links, skipped entries) resolved so far.
    pub item_count: u64,
    /// Apparent bytes counted so far.
    pub total_size: u64,
    /// Set exactly once, when the root's totals are final or the run was
    /// cancelled. No field changes afterwards.
    pub done: bool,
    /// The run stopped early on request.
    pub cancelled: bool,
    /// Directory most recently finished, for display.
    pub current_path: String,
}

impl Progress {
    pub fn new_handle() -> ProgressHandle {
        Arc::new(Mutex::new(Self::default()))
    }

    /// Add one directory's own contribution. Ignored once `done`.
    pub fn record(&mut self, items: u64, bytes: u64, path: &Path) {
        if self.done {
            return;
        }
        self.item_count += items;
        self.total_size += bytes;
        self.current_path = path.to_string_lossy().into_owned();
    }

    /// Mark the run finished. Only the first call has any effect.
    pub fn finish(&mut self, cancelled: bool) {
        if self.done {
            return;
        }
        self.done = true;
        self.cancelled = cancelled;
    }

    /// Snapshot for streaming front ends.
    pub fn message(&self) -> ProgressMessage {
        ProgressMessage {
            msg_type: "progress".to_string(),
            done: self.done,
            item_count: self.item_count,
            total_size: self.total_size,
        }
    }
}

/// Wire form of a progress snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressMessage {
    pub msg_type: String,
    pub done: bool,
    pub item_count: u64,
    pub total_size: u64,
}

impl ProgressMessage {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
