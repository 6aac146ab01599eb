/// Mounted-filesystem enumeration.
///
/// Lists mounts from a `/proc/mounts`-style table with their type and, for
/// block devices, total/free/used space via `statvfs`. Also computes which
/// mount points sit strictly below a scan root, which is platform-independent.
use crate::error::MountError;
use crate::model::size;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Default mount table on Linux.
pub const PROC_MOUNTS: &str = "/proc/mounts";

/// One mounted filesystem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MountInfo {
    /// Device name, e.g. `/dev/nvme0n1p2`.
    pub device: String,
    pub mount_point: PathBuf,
    /// Filesystem type, e.g. `ext4`.
    pub fs_type: String,
    /// Total capacity in bytes.
    pub size: u64,
    /// Space available to unprivileged users, in bytes.
    pub free: u64,
    pub used: u64,
}

impl MountInfo {
    /// Used space as a percentage of capacity (0.0–100.0).
    pub fn usage_percent(&self) -> f64 {
        size::percent(self.used, self.size)
    }
}

/// Source of mount information. Implemented per platform; tests supply
/// their own.
pub trait MountSource {
    /// Every mounted filesystem. Usage fields are left at zero.
    fn mounts(&self) -> Result<Vec<MountInfo>, MountError>;

    /// Mounts backed by a block device, with usage figures filled in.
    fn devices(&self) -> Result<Vec<MountInfo>, MountError>;
}

/// Reads a `/proc/mounts`-format table.
#[derive(Debug, Clone)]
pub struct ProcMounts {
    pub mounts_path: PathBuf,
}

impl Default for ProcMounts {
    fn default() -> Self {
        Self {
            mounts_path: PathBuf::from(PROC_MOUNTS),
        }
    }
}

impl ProcMounts {
    pub fn new(mounts_path: impl Into<PathBuf>) -> Self {
        Self {
            mounts_path: mounts_path.into(),
        }
    }
}

impl MountSource for ProcMounts {
    fn mounts(&self) -> Result<Vec<MountInfo>, MountError> {
        let table = fs::read_to_string(&self.mounts_path).map_err(|source| {
            warn!("Cannot read mount table {}: {}", self.mounts_path.display(), source);
            MountError::Read {
                path: self.mounts_path.clone(),
                source,
            }
        })?;
        parse_mounts(&table)
    }

    fn devices(&self) -> Result<Vec<MountInfo>, MountError> {
        let mut devices: Vec<MountInfo> = self
            .mounts()?
            .into_iter()
            .filter(|m| m.device.starts_with("/dev"))
            .collect();
        for device in &mut devices {
            fill_usage(device)?;
        }
        Ok(devices)
    }
}

/// Parse mount table text: `device mount_point fs_type options dump pass`.
pub fn parse_mounts(input: &str) -> Result<Vec<MountInfo>, MountError> {
    let mut mounts = Vec::new();
    for line in input.lines().filter(|line| !line.trim().is_empty()) {
        let mut fields = line.split_whitespace();
        let (Some(device), Some(mount_point), Some(fs_type)) =
            (fields.next(), fields.next(), fields.next())
        else {
            return Err(MountError::InvalidLine(line.to_string()));
        };

        mounts.push(MountInfo {
            device: unescape_mount_field(device),
            mount_point: PathBuf::from(unescape_mount_field(mount_point)),
            fs_type: fs_type.to_string(),
            size: 0,
            free: 0,
            used: 0,
        });
    }
    Ok(mounts)
}

/// Mount points strictly below `root`, compared by whole path components.
/// `root` itself is never reported.
pub fn nested_mount_paths(root: &Path, mounts: &[MountInfo]) -> Vec<PathBuf> {
    let mut nested: Vec<PathBuf> = mounts
        .iter()
        .map(|m| m.mount_point.as_path())
        .filter(|mp| mp.starts_with(root) && *mp != root)
        .map(Path::to_path_buf)
        .collect();
    nested.sort();
    nested.dedup();
    nested
}

/// Decode the octal escapes (`\040` for space etc.) the kernel writes.
fn unescape_mount_field(value: &str) -> String {
    let bytes = value.as_bytes();
    let mut output = Vec::with_capacity(bytes.len());
    let mut index = 0;

    while index < bytes.len() {
        if bytes[index] == b'\\'
            && index + 3 < bytes.len()
            && bytes[index + 1..index + 4].iter().all(|b| (b'0'..=b'7').contains(b))
        {
            if let Ok(num) = u8::from_str_radix(&value[index + 1..index + 4], 8) {
                output.push(num);
                index += 4;
                continue;
            }
        }
        output.push(bytes[index]);
        index += 1;
    }

    String::from_utf8_lossy(&output).into_owned()
}

#[cfg(unix)]
fn fill_usage(mount: &mut MountInfo) -> Result<(), MountError> {
    use std::ffi::CString;
    use std::mem::MaybeUninit;
    use std::os::unix::ffi::OsStrExt;

    let usage_error = |source| MountError::Usage {
        path: mount.mount_point.clone(),
        source,
    };

    let c_path = CString::new(mount.mount_point.as_os_str().as_bytes())
        .map_err(|e| usage_error(std::io::Error::new(std::io::ErrorKind::InvalidInput, e)))?;

    let mut stat = MaybeUninit::<libc::statvfs>::uninit();
    // SAFETY: `c_path` is NUL-terminated and `stat` points to writable storage
    // of the right type; it is only read after a successful return.
    let rc = unsafe { libc::statvfs(c_path.as_ptr(), stat.as_mut_ptr()) };
    if rc != 0 {
        return Err(usage_error(std::io::Error::last_os_error()));
    }
    let stat = unsafe { stat.assume_init() };

    let frsize = if stat.f_frsize > 0 {
        stat.f_frsize as u64
    } else {
        stat.f_bsize as u64
    };
    let total = (stat.f_blocks as u64).saturating_mul(frsize);
    let free_total = (stat.f_bfree as u64).saturating_mul(frsize);

    mount.size = total;
    mount.free = (stat.f_bavail as u64).saturating_mul(frsize);
    mount.used = total.saturating_sub(free_total);
    Ok(())
}

#[cfg(not(unix))]
fn fill_usage(_mount: &mut MountInfo) -> Result<(), MountError> {
    Ok(())
}
