/// Plain-text front end.
///
/// Runs the analysis in the background, redraws a one-line progress
/// indicator every 100 ms while it runs, then prints the analyzed
/// directory's entries sorted by size with a usage bar and status markers.
use crossbeam_channel::tick;
use duscope_core::filter::{clean_path, IgnoreSet};
use duscope_core::frontend::Ui;
use duscope_core::model::size::{format_count, format_size, percent};
use duscope_core::model::{NodeIndex, SortKey, SortOrder};
use duscope_core::platform::MountSource;
use duscope_core::scanner::{start_analysis, start_refresh, AnalysisHandle, AnalyzerConfig, LiveTree};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use termcolor::{Color, ColorSpec, WriteColor};

const PROGRESS_TICK: Duration = Duration::from_millis(100);
const SPINNER: [char; 4] = ['|', '/', '-', '\\'];
const BAR_WIDTH: usize = 10;

pub struct StdoutUi<W> {
    out: W,
    use_color: bool,
    show_progress: bool,
    show_apparent_size: bool,
    config: AnalyzerConfig,
    ignore: IgnoreSet,
    tree: Option<LiveTree>,
}

impl<W: WriteColor> StdoutUi<W> {
    pub fn new(out: W, use_color: bool, show_progress: bool, show_apparent_size: bool) -> Self {
        Self {
            out,
            use_color,
            show_progress,
            show_apparent_size,
            config: AnalyzerConfig::default(),
            ignore: IgnoreSet::default(),
            tree: None,
        }
    }

    pub fn with_config(mut self, config: AnalyzerConfig) -> Self {
        self.config = config;
        self
    }

    /// Tree of the last analysis, if any.
    #[cfg(test)]
    pub fn tree(&self) -> Option<&LiveTree> {
        self.tree.as_ref()
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn color(&mut self, spec: &ColorSpec) -> io::Result<()> {
        if self.use_color {
            self.out.set_color(spec)?;
        }
        Ok(())
    }

    fn reset(&mut self) -> io::Result<()> {
        if self.use_color {
            self.out.reset()?;
        }
        Ok(())
    }

    fn watch_progress(&mut self, handle: &AnalysisHandle) -> io::Result<()> {
        let mut width = 0;
        for (frame, _) in tick(PROGRESS_TICK).iter().enumerate() {
            if handle.is_done() {
                break;
            }
            let snapshot = handle.progress.lock().clone();
            let line = format!(
                "{} Scanning... Total items: {} Size: {}",
                SPINNER[frame % SPINNER.len()],
                format_count(snapshot.item_count),
                format_size(snapshot.total_size)
            );
            width = width.max(line.len());
            write!(self.out, "\r{line}")?;
            self.out.flush()?;
        }
        write!(self.out, "\r{:width$}\r", "")?;
        self.out.flush()
    }

    fn print_report(&mut self, tree: &LiveTree, dir: NodeIndex) -> io::Result<()> {
        let key = if self.show_apparent_size {
            SortKey::ApparentSize
        } else {
            SortKey::DiskUsage
        };
        let mut tree = tree.write();
        tree.sort_children(dir, key, SortOrder::Descending);

        let apparent = self.show_apparent_size;
        let parent = tree.node(dir);
        let parent_size = parent.size_of(apparent);
        let header = format!(
            "{}  {}  {} items",
            tree.full_path(dir).display(),
            format_size(parent_size),
            format_count(parent.item_count)
        );
        self.color(ColorSpec::new().set_bold(true))?;
        write!(self.out, "{header}")?;
        self.reset()?;
        writeln!(self.out)?;

        for child in tree.children(dir) {
            let node = tree.node(child);
            let size = node.size_of(apparent);
            let marker = node.flags.marker();
            let filled = (percent(size, parent_size) / 100.0 * BAR_WIDTH as f64).round() as usize;
            let bar = format!("{}{}", "#".repeat(filled), " ".repeat(BAR_WIDTH - filled.min(BAR_WIDTH)));

            if marker == '!' || marker == '.' {
                self.color(ColorSpec::new().set_fg(Some(Color::Red)).set_bold(true))?;
            }
            write!(self.out, "{marker}")?;
            self.reset()?;

            self.color(ColorSpec::new().set_fg(Some(Color::Cyan)))?;
            write!(self.out, " {:>10}", format_size(size))?;
            self.reset()?;
            write!(self.out, " [{bar}] ")?;

            if node.is_dir() {
                self.color(ColorSpec::new().set_fg(Some(Color::Blue)).set_bold(true))?;
                write!(self.out, "{}/", node.name)?;
            } else {
                self.color(ColorSpec::new().set_fg(Some(Color::White)))?;
                write!(self.out, "{}", node.name)?;
            }
            self.reset()?;
            writeln!(self.out)?;
        }
        Ok(())
    }
}

impl<W: WriteColor> Ui for StdoutUi<W> {
    fn list_devices(&mut self, source: &dyn MountSource) -> anyhow::Result<()> {
        let devices = source.devices()?;
        let device_width = devices
            .iter()
            .map(|d| d.device.len())
            .max()
            .unwrap_or(0)
            .max("Device".len());

        self.color(ColorSpec::new().set_bold(true))?;
        write!(
            self.out,
            "{:<device_width$} {:>10} {:>10} {:>10} {:>6} {:<8} Mount point",
            "Device", "Size", "Used", "Free", "Used%", "Type"
        )?;
        self.reset()?;
        writeln!(self.out)?;

        for device in &devices {
            writeln!(
                self.out,
                "{:<device_width$} {:>10} {:>10} {:>10} {:>5.0}% {:<8} {}",
                device.device,
                format_size(device.size),
                format_size(device.used),
                format_size(device.free),
                device.usage_percent(),
                device.fs_type,
                device.mount_point.display()
            )?;
        }
        Ok(())
    }

    fn analyze_path(&mut self, path: &Path, parent: Option<NodeIndex>) -> anyhow::Result<()> {
        let ignore = self.ignore.clone();
        let should_ignore = move |p: &Path| ignore.should_be_ignored(p);

        let (handle, refreshed) = match (parent, &self.tree) {
            (Some(dir), Some(tree)) => (
                start_refresh(tree.clone(), dir, should_ignore, self.config.clone()),
                Some(dir),
            ),
            _ => {
                let root = std::path::absolute(path)
                    .map(|p| clean_path(&p))
                    .map_err(|e| anyhow::anyhow!("Cannot resolve {}: {e}", path.display()))?;
                (start_analysis(root, should_ignore, self.config.clone()), None)
            }
        };

        if self.show_progress {
            self.watch_progress(&handle)?;
        }
        let tree = handle.wait();

        let dir = refreshed.or_else(|| tree.read().root());
        if let Some(dir) = dir {
            self.print_report(&tree, dir)?;
        }
        self.tree = Some(tree);
        Ok(())
    }

    fn set_ignore_dir_paths(&mut self, paths: Vec<PathBuf>) {
        self.ignore = IgnoreSet::new(paths);
    }

    fn start_ui_loop(&mut self) -> anyhow::Result<()> {
        self.out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use duscope_core::error::MountError;
    use duscope_core::platform::MountInfo;
    use std::fs;
    use termcolor::NoColor;
    use tempfile::TempDir;

    struct FakeMounts;

    impl MountSource for FakeMounts {
        fn mounts(&self) -> Result<Vec<MountInfo>, MountError> {
            Ok(vec![MountInfo {
                device: "/dev/sda1".into(),
                mount_point: PathBuf::from("/"),
                fs_type: "ext4".into(),
                size: 4 * 1024 * 1024,
                free: 1024 * 1024,
                used: 3 * 1024 * 1024,
            }])
        }

        fn devices(&self) -> Result<Vec<MountInfo>, MountError> {
            self.mounts()
        }
    }

    fn output(ui: StdoutUi<NoColor<Vec<u8>>>) -> String {
        String::from_utf8(ui.into_inner().into_inner()).unwrap()
    }

    fn test_dir() -> TempDir {
        let tmp = TempDir::new().unwrap();
        let nested = tmp.path().join("nested");
        fs::create_dir_all(&nested).unwrap();
        fs::write(tmp.path().join("file1"), vec![0u8; 100]).unwrap();
        fs::write(nested.join("file2"), vec![0u8; 50]).unwrap();
        tmp
    }

    #[test]
    fn test_report_lists_children_largest_first() {
        let tmp = test_dir();
        let mut ui = StdoutUi::new(NoColor::new(Vec::new()), false, false, true);
        ui.analyze_path(tmp.path(), None).unwrap();
        ui.start_ui_loop().unwrap();

        let out = output(ui);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 3, "{out}");
        assert!(lines[0].contains("150 B"), "{out}");
        assert!(lines[0].ends_with("4 items"), "{out}");
        assert!(lines[1].ends_with("file1"), "{out}");
        assert!(lines[1].contains("[#######   ]"), "{out}");
        assert!(lines[2].ends_with("nested/"), "{out}");
    }

    #[test]
    fn test_ignored_entries_are_marked() {
        let tmp = test_dir();
        let mut ui = StdoutUi::new(NoColor::new(Vec::new()), false, false, true);
        ui.set_ignore_dir_paths(vec![tmp.path().join("nested")]);
        ui.analyze_path(tmp.path(), None).unwrap();

        let out = output(ui);
        let nested = out.lines().find(|l| l.ends_with("nested/")).unwrap();
        assert!(nested.starts_with('i'), "{out}");
    }

    #[test]
    fn test_refresh_reports_the_subdirectory() {
        let tmp = test_dir();
        let mut ui = StdoutUi::new(NoColor::new(Vec::new()), false, false, true);
        ui.analyze_path(tmp.path(), None).unwrap();

        let nested = {
            let tree = ui.tree().unwrap().read();
            tree.find_child(tree.root().unwrap(), "nested").unwrap()
        };
        fs::write(tmp.path().join("nested/file3"), vec![0u8; 25]).unwrap();
        ui.analyze_path(tmp.path(), Some(nested)).unwrap();

        {
            let tree = ui.tree().unwrap().read();
            assert_eq!(tree.node(tree.root().unwrap()).size, 175);
        }
        let out = output(ui);
        assert!(out.contains("file3"), "{out}");
    }

    #[test]
    fn test_parent_segments_in_root_still_honor_ignores() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("keep")).unwrap();
        fs::create_dir_all(tmp.path().join("skip")).unwrap();
        fs::write(tmp.path().join("skip/f"), vec![0u8; 100]).unwrap();

        let mut ui = StdoutUi::new(NoColor::new(Vec::new()), false, false, true);
        ui.set_ignore_dir_paths(vec![tmp.path().join("skip")]);
        ui.analyze_path(&tmp.path().join("keep/.."), None).unwrap();

        let out = output(ui);
        let header = out.lines().next().unwrap();
        assert!(header.starts_with(&format!("{}  ", tmp.path().display())), "{out}");
        assert!(header.contains(" 0 B"), "{out}");
        let skip = out.lines().find(|l| l.ends_with("skip/")).unwrap();
        assert!(skip.starts_with('i'), "{out}");
    }

    #[test]
    fn test_progress_line_is_cleared() {
        let tmp = test_dir();
        let mut ui = StdoutUi::new(NoColor::new(Vec::new()), false, true, true);
        ui.analyze_path(tmp.path(), None).unwrap();

        let out = output(ui);
        let report = out.rsplit('\r').next().unwrap();
        assert!(report.contains("nested/"), "{out}");
    }

    #[test]
    fn test_device_table() {
        let mut ui = StdoutUi::new(NoColor::new(Vec::new()), false, false, false);
        ui.list_devices(&FakeMounts).unwrap();

        let out = output(ui);
        let mut lines = out.lines();
        assert!(lines.next().unwrap().starts_with("Device"));
        let row = lines.next().unwrap();
        assert!(row.starts_with("/dev/sda1"));
        assert!(row.contains("4.0 MiB"));
        assert!(row.contains("75%"));
        assert!(row.ends_with(" /"));
    }
}
