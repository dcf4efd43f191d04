use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use groupdir_core::config::DirectoryConfig;
use groupdir_core::directory::GroupDirectory;
use groupdir_core::events::{DirectoryEvent, EventSink};
use groupdir_core::store::{Fixture, InMemoryProvider};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::UnboundedReceiver;

// ANSI color codes
pub(crate) const CYAN: &str = "\x1b[36m";
pub(crate) const GREEN: &str = "\x1b[32m";
pub(crate) const YELLOW: &str = "\x1b[33m";
pub(crate) const RED: &str = "\x1b[31m";
pub(crate) const WHITE_BOLD: &str = "\x1b[1;37m";
pub(crate) const DIM: &str = "\x1b[2m";
pub(crate) const RESET: &str = "\x1b[0m";

mod commands;
mod fixture;
mod format;
mod tracing_setup;

use commands::{handle_command, parse_command, render_screen, CommandResult};
use format::{format_event, print_error_raw};

const DEFAULT_VIEWER: &str = "me";

#[derive(Parser, Debug)]
#[command(name = "groupdir")]
#[command(about = "Browse groups and manage their members")]
struct Args {
    /// JSON fixture with users and groups (defaults to a generated directory)
    #[arg(long)]
    fixture: Option<PathBuf>,

    /// Directory config file (defaults to <config dir>/groupdir/config.json)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Act as this user id
    #[arg(long)]
    user: Option<String>,

    /// Number of groups in the generated directory
    #[arg(long, default_value_t = 150)]
    groups: usize,
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("groupdir").join("config.json"))
}

/// An explicit path must exist; the default location is optional.
fn load_config(explicit: Option<&Path>) -> Result<DirectoryConfig> {
    if let Some(path) = explicit {
        return DirectoryConfig::load(path).with_context(|| format!("Failed to load config {}", path.display()));
    }
    match default_config_path() {
        Some(path) if path.exists() => {
            DirectoryConfig::load(&path).with_context(|| format!("Failed to load config {}", path.display()))
        }
        _ => Ok(DirectoryConfig::default()),
    }
}

fn print_lines(lines: &[String]) {
    let mut out = std::io::stdout();
    for line in lines {
        writeln!(out, "{}", line).ok();
    }
    out.flush().ok();
}

fn drain_events(rx: &mut UnboundedReceiver<DirectoryEvent>) {
    let mut lines = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let Some(line) = format_event(&event) {
            lines.push(line);
        }
    }
    print_lines(&lines);
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    tracing_setup::init_tracing()?;

    let mut config = load_config(args.config.as_deref())?;
    if let Some(user) = &args.user {
        config.current_user_id = user.clone();
    }

    let mut fixture = match &args.fixture {
        Some(path) => Fixture::load(path).with_context(|| format!("Failed to load fixture {}", path.display()))?,
        None => {
            let viewer = if config.current_user_id.is_empty() {
                DEFAULT_VIEWER
            } else {
                config.current_user_id.as_str()
            };
            fixture::demo_fixture(viewer, args.groups)
        }
    };
    if config.current_user_id.is_empty() {
        config.current_user_id = fixture.viewer_id.clone();
    }
    // Permissions are derived for whoever is acting
    fixture.viewer_id = config.current_user_id.clone();
    tracing::info!(user_id = %config.current_user_id, groups = fixture.groups.len(), "starting directory");

    let provider = Arc::new(InMemoryProvider::from_fixture(fixture));
    let (events, mut rx) = EventSink::channel();
    let mut directory = GroupDirectory::new(provider, config, events);

    if let Err(err) = directory.open().await {
        print_lines(&[print_error_raw(&err.to_string())]);
    }
    print_lines(&render_screen(&directory));
    drain_events(&mut rx);

    let mut input = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush().ok();
        let Some(line) = input.next_line().await? else {
            break;
        };
        match parse_command(&line) {
            Ok(None) => continue,
            Err(usage) => print_lines(&[print_error_raw(&usage)]),
            Ok(Some(command)) => match handle_command(&mut directory, command).await {
                CommandResult::Quit => break,
                CommandResult::Lines(lines) => print_lines(&lines),
            },
        }
        drain_events(&mut rx);
    }

    directory.close();
    Ok(())
}
