/// Command-line flags.
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug, Clone, Default)]
#[command(name = "duscope")]
#[command(about = "Fast disk usage analyzer with hard-link aware totals")]
#[command(version)]
pub struct Flags {
    /// Directory to analyze
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Write logs to this file instead of stderr
    #[arg(short = 'l', long = "log-file", global = true)]
    pub log_file: Option<PathBuf>,

    /// Absolute paths to ignore (separated by comma)
    #[arg(
        short = 'i',
        long = "ignore-dirs",
        value_delimiter = ',',
        default_values = ["/proc", "/dev", "/sys", "/run"],
        global = true
    )]
    pub ignore_dirs: Vec<PathBuf>,

    /// Show apparent size instead of disk usage
    #[arg(short = 'a', long = "show-apparent-size", global = true)]
    pub show_apparent_size: bool,

    /// Do not use colorized output
    #[arg(short = 'c', long = "no-color", global = true)]
    pub no_color: bool,

    /// Do not show progress
    #[arg(short = 'p', long = "no-progress")]
    pub no_progress: bool,

    /// Do not cross filesystem boundaries
    #[arg(short = 'x', long = "no-cross", global = true)]
    pub no_cross: bool,

    /// Log debug messages
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Show all mounted disks
    #[command(visible_alias = "d")]
    Disks,
}

impl Flags {
    /// Disk usage is not available off Unix, so apparent size is forced there.
    pub fn apparent_size(&self) -> bool {
        self.show_apparent_size || cfg!(not(unix))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let flags = Flags::try_parse_from(["duscope"]).unwrap();
        assert_eq!(flags.path, PathBuf::from("."));
        assert_eq!(
            flags.ignore_dirs,
            ["/proc", "/dev", "/sys", "/run"].map(PathBuf::from).to_vec()
        );
        assert!(flags.command.is_none());
        assert!(flags.log_file.is_none());
    }

    #[test]
    fn test_short_flags_and_ignore_list() {
        let flags =
            Flags::try_parse_from(["duscope", "-x", "-a", "-c", "-p", "-i", "/a,/b", "/srv"]).unwrap();
        assert!(flags.no_cross && flags.show_apparent_size && flags.no_color && flags.no_progress);
        assert_eq!(flags.ignore_dirs, vec![PathBuf::from("/a"), PathBuf::from("/b")]);
        assert_eq!(flags.path, PathBuf::from("/srv"));
    }

    #[test]
    fn test_disks_alias() {
        let flags = Flags::try_parse_from(["duscope", "d"]).unwrap();
        assert_eq!(flags.command, Some(Command::Disks));
    }
}
