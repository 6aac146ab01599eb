//! duscope — fast disk usage analyser.
//!
//! Thin binary entry point. The analysis itself lives in `duscope-core`;
//! this crate parses flags, sets up logging, and drives the plain-text
//! front end.

mod app;
mod cli;
mod stdout;

use anyhow::Context;
use app::{Action, App};
use clap::Parser;
use cli::{Command, Flags};
use duscope_core::platform::ProcMounts;
use duscope_core::scanner::AnalyzerConfig;
use std::fs::OpenOptions;
use std::io::{self, IsTerminal};
use std::sync::Mutex;
use stdout::StdoutUi;
use termcolor::{ColorChoice, StandardStream};
use tracing::Level;

fn main() {
    let flags = Flags::parse();
    if let Err(err) = run(flags) {
        eprintln!("{err:#}");
        std::process::exit(1);
    }
}

fn run(flags: Flags) -> anyhow::Result<()> {
    init_logging(&flags)?;
    tracing::info!("duscope starting");

    let istty = io::stdout().is_terminal();
    let use_color = !flags.no_color && istty;
    let choice = if use_color {
        ColorChoice::Auto
    } else {
        ColorChoice::Never
    };
    let config = AnalyzerConfig::default().with_same_filesystem(flags.no_cross);
    let ui = StdoutUi::new(
        StandardStream::stdout(choice),
        use_color,
        !flags.no_progress && istty,
        flags.apparent_size(),
    )
    .with_config(config);

    let action = match flags.command {
        Some(Command::Disks) => Action::ListDevices,
        None => Action::AnalyzePath,
    };
    let mut app = App::new(flags.path.clone(), flags, ui, ProcMounts::default());
    app.set_action(action);
    app.run()
}

/// Logs go to `--log-file` when given; otherwise warnings only, on stderr,
/// so they do not interleave with the report.
fn init_logging(flags: &Flags) -> anyhow::Result<()> {
    let level = if flags.verbose {
        Level::DEBUG
    } else if flags.log_file.is_some() {
        Level::INFO
    } else {
        Level::WARN
    };

    match &flags.log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Error opening log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_max_level(level)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_max_level(level)
                .with_writer(io::stderr)
                .init();
        }
    }
    Ok(())
}
