/// Platform-specific functionality — mounted filesystem enumeration and
/// per-mount usage figures.
pub mod mounts;

pub use mounts::{nested_mount_paths, parse_mounts, MountInfo, MountSource, ProcMounts};
