/// Application wiring: mount-aware ignore list, then the selected action,
/// then the front end's loop.
use crate::cli::Flags;
use anyhow::Context;
use duscope_core::filter::clean_path;
use duscope_core::frontend::Ui;
use duscope_core::platform::{nested_mount_paths, MountSource};
use std::path::PathBuf;
use tracing::debug;

/// What the application does once the ignore list is set up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    AnalyzePath,
    ListDevices,
}

pub struct App<U, M> {
    path: PathBuf,
    flags: Flags,
    ui: U,
    mounts: M,
    action: Action,
}

impl<U: Ui, M: MountSource> App<U, M> {
    pub fn new(path: PathBuf, flags: Flags, ui: U, mounts: M) -> Self {
        Self {
            path,
            flags,
            ui,
            mounts,
            action: Action::AnalyzePath,
        }
    }

    pub fn set_action(&mut self, action: Action) {
        self.action = action;
    }

    pub fn run(&mut self) -> anyhow::Result<()> {
        self.set_no_cross()?;
        self.ui.set_ignore_dir_paths(self.flags.ignore_dirs.clone());

        match self.action {
            Action::AnalyzePath => self.ui.analyze_path(&self.path, None)?,
            Action::ListDevices => self
                .ui
                .list_devices(&self.mounts)
                .context("Error loading mount points")?,
        }

        self.ui.start_ui_loop()
    }

    pub fn into_ui(self) -> U {
        self.ui
    }

    fn set_no_cross(&mut self) -> anyhow::Result<()> {
        if !self.flags.no_cross {
            return Ok(());
        }
        let mounts = self.mounts.mounts().context("Error loading mount points")?;
        let root = clean_path(&std::path::absolute(&self.path).unwrap_or_else(|_| self.path.clone()));
        let nested = nested_mount_paths(&root, &mounts);
        debug!("Ignoring {} nested mount points under {}", nested.len(), root.display());
        self.flags.ignore_dirs.extend(nested);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stdout::StdoutUi;
    use duscope_core::error::MountError;
    use duscope_core::platform::{MountInfo, ProcMounts};
    use std::fs;
    use tempfile::TempDir;
    use termcolor::NoColor;

    struct MountsMock {
        points: Vec<PathBuf>,
    }

    impl MountSource for MountsMock {
        fn mounts(&self) -> Result<Vec<MountInfo>, MountError> {
            Ok(self
                .points
                .iter()
                .map(|p| MountInfo {
                    device: "/dev/sda1".into(),
                    mount_point: p.clone(),
                    fs_type: "ext4".into(),
                    size: 1024,
                    free: 512,
                    used: 512,
                })
                .collect())
        }

        fn devices(&self) -> Result<Vec<MountInfo>, MountError> {
            self.mounts()
        }
    }

    fn test_dir() -> TempDir {
        let tmp = TempDir::new().unwrap();
        let nested = tmp.path().join("test_dir/nested");
        fs::create_dir_all(&nested).unwrap();
        fs::write(tmp.path().join("test_dir/file1"), vec![0u8; 100]).unwrap();
        fs::write(nested.join("file2"), vec![0u8; 50]).unwrap();
        tmp
    }

    fn run_app<M: MountSource>(
        flags: Flags,
        path: PathBuf,
        mounts: M,
        action: Action,
    ) -> (String, anyhow::Result<()>) {
        let ui = StdoutUi::new(NoColor::new(Vec::new()), false, false, flags.show_apparent_size);
        let mut app = App::new(path, flags, ui, mounts);
        app.set_action(action);
        let result = app.run();
        let out = String::from_utf8(app.into_ui().into_inner().into_inner()).unwrap();
        (out.trim().to_string(), result)
    }

    #[test]
    fn test_analyze_path() {
        let tmp = test_dir();
        let (out, result) = run_app(
            Flags::default(),
            tmp.path().join("test_dir"),
            MountsMock { points: vec![] },
            Action::AnalyzePath,
        );
        result.unwrap();
        assert!(out.contains("nested"), "{out}");
    }

    #[test]
    fn test_no_cross() {
        let tmp = test_dir();
        let root = tmp.path().join("test_dir");
        let nested = root.join("nested");
        let flags = Flags {
            no_cross: true,
            show_apparent_size: true,
            ..Flags::default()
        };
        let mounts = MountsMock {
            points: vec![nested],
        };

        let (out, result) = run_app(flags, root, mounts, Action::AnalyzePath);
        result.unwrap();
        let line = out.lines().find(|l| l.ends_with("nested/")).unwrap();
        assert!(line.starts_with('i'), "{out}");
        assert!(line.contains(" 0 B"), "{out}");
    }

    #[test]
    fn test_no_cross_with_parent_segments() {
        let tmp = test_dir();
        let root = tmp.path().join("test_dir/nested/..");
        let nested = tmp.path().join("test_dir/nested");
        let flags = Flags {
            no_cross: true,
            show_apparent_size: true,
            ..Flags::default()
        };
        let mounts = MountsMock {
            points: vec![nested],
        };

        let (out, result) = run_app(flags, root, mounts, Action::AnalyzePath);
        result.unwrap();
        let line = out.lines().find(|l| l.ends_with("nested/")).unwrap();
        assert!(line.starts_with('i'), "{out}");
    }

    #[test]
    fn test_no_cross_with_err() {
        let tmp = test_dir();
        let flags = Flags {
            no_cross: true,
            ..Flags::default()
        };

        let (out, result) = run_app(
            flags,
            tmp.path().join("test_dir"),
            ProcMounts::new("/xxxyyy"),
            Action::AnalyzePath,
        );
        let err = result.unwrap_err();
        assert!(
            format!("{err:#}").starts_with("Error loading mount points: open /xxxyyy: "),
            "{err:#}"
        );
        assert!(out.is_empty());
    }

    #[test]
    fn test_list_devices() {
        let (out, result) = run_app(
            Flags::default(),
            PathBuf::new(),
            MountsMock {
                points: vec![PathBuf::from("/")],
            },
            Action::ListDevices,
        );
        result.unwrap();
        assert!(out.contains("Device"), "{out}");
    }

    #[test]
    fn test_list_devices_with_err() {
        let (_, result) = run_app(
            Flags::default(),
            PathBuf::new(),
            ProcMounts::new("/xxxyyy"),
            Action::ListDevices,
        );
        let err = result.unwrap_err();
        assert_eq!(
            format!("{err:#}"),
            "Error loading mount points: open /xxxyyy: No such file or directory (os error 2)"
        );
    }
}
