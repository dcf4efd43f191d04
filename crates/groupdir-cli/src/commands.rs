use std::time::Duration;

use groupdir_core::controllers::{LoadOutcome, ScrollMetrics, SkipReason};
use groupdir_core::directory::{GroupDirectory, Screen, ScreenEvent};
use groupdir_core::membership::MembershipAction;
use groupdir_core::models::GroupFilter;
use groupdir_core::DirectoryError;

use crate::format::{format_detail, format_list, print_error_raw, print_help_raw, print_system_raw};

/// Pixel height of one rendered row, for synthesized scroll positions
const ROW_HEIGHT: u32 = 24;
const VIEWPORT_HEIGHT: u32 = 480;

/// Extra wait after the quiet period so a debounced search can land
const SEARCH_SETTLE: Duration = Duration::from_millis(25);

// ─── Parsing ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Command {
    Filter(GroupFilter),
    Search(String),
    More,
    /// Explicit metrics, or `None` for "scrolled to the bottom"
    Scroll(Option<ScrollMetrics>),
    View(String),
    Join(Option<String>),
    Leave(Option<String>),
    Add(Vec<String>),
    Remove(Vec<String>),
    Archive(Option<String>),
    Edit,
    Back,
    Show,
    Help,
    Quit,
}

/// Parse one input line. Blank lines yield `Ok(None)`.
pub(crate) fn parse_command(line: &str) -> Result<Option<Command>, String> {
    let line = line.trim();
    let line = line.strip_prefix('/').unwrap_or(line);
    let (name, rest) = match line.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim()),
        None => (line, ""),
    };
    let args: Vec<String> = rest.split_whitespace().map(str::to_string).collect();
    let first = args.first().cloned();

    let command = match name.to_lowercase().as_str() {
        "" => return Ok(None),
        "filter" | "f" => Command::Filter(rest.parse::<GroupFilter>().map_err(|_| "usage: filter <all|my>".to_string())?),
        "search" | "s" => Command::Search(rest.to_string()),
        "more" | "m" => Command::More,
        "scroll" => match args.as_slice() {
            [] => Command::Scroll(None),
            [top, client, height] => {
                let parse = |value: &String| value.parse::<u32>().map_err(|_| format!("not a pixel value: {}", value));
                Command::Scroll(Some(ScrollMetrics::new(parse(top)?, parse(client)?, parse(height)?)))
            }
            _ => return Err("usage: scroll [top client height]".to_string()),
        },
        "view" | "v" => match first {
            Some(group_id) => Command::View(group_id),
            None => return Err("usage: view <group>".to_string()),
        },
        "join" => Command::Join(first),
        "leave" => Command::Leave(first),
        "add" if !args.is_empty() => Command::Add(args),
        "remove" | "rm" if !args.is_empty() => Command::Remove(args),
        "add" | "remove" | "rm" => return Err(format!("usage: {} <user>...", name)),
        "archive" => Command::Archive(first),
        "edit" => Command::Edit,
        "back" | "b" => Command::Back,
        "show" | "ls" => Command::Show,
        "help" | "h" | "?" => Command::Help,
        "quit" | "q" | "exit" => Command::Quit,
        other => return Err(format!("unknown command: {} (try 'help')", other)),
    };
    Ok(Some(command))
}

// ─── Command Result ─────────────────────────────────────────────────────────

pub(crate) enum CommandResult {
    Lines(Vec<String>),
    Quit,
}

// ─── Command Handlers ───────────────────────────────────────────────────────

pub(crate) fn render_screen(directory: &GroupDirectory) -> Vec<String> {
    match directory.screen() {
        Screen::Closed => vec![print_system_raw("Directory closed.")],
        Screen::GroupList => format_list(directory.list()),
        Screen::GroupDetail { .. } => match directory.detail() {
            Some(detail) => format_detail(detail),
            None => vec![print_error_raw("detail screen missing")],
        },
    }
}

fn bottom_metrics(rows: usize) -> ScrollMetrics {
    let height = u32::try_from(rows).unwrap_or(u32::MAX).saturating_mul(ROW_HEIGHT);
    ScrollMetrics::new(height.saturating_sub(VIEWPORT_HEIGHT), VIEWPORT_HEIGHT, height)
}

fn describe_load(outcome: LoadOutcome) -> String {
    match outcome {
        LoadOutcome::Loaded { added, exhausted: false } => format!("Loaded {} more.", added),
        LoadOutcome::Loaded { added, exhausted: true } => format!("Loaded {} more, end of list.", added),
        LoadOutcome::Skipped(SkipReason::Exhausted) => "Nothing more to load.".to_string(),
        LoadOutcome::Skipped(SkipReason::InFlight) | LoadOutcome::Skipped(SkipReason::Loading) => {
            "Still loading.".to_string()
        }
        LoadOutcome::Skipped(SkipReason::NotNearBottom) => "Not near the bottom yet.".to_string(),
        LoadOutcome::Stale => "Response was superseded.".to_string(),
    }
}

/// A membership action addressed either at a list row or at the open detail.
fn membership_event(directory: &GroupDirectory, group_id: Option<String>, action: MembershipAction) -> Result<ScreenEvent, String> {
    match (group_id, directory.screen()) {
        (Some(group_id), Screen::GroupList) => Ok(ScreenEvent::ListRowAction { group_id, action }),
        (None, Screen::GroupDetail { .. }) => Ok(ScreenEvent::DetailAction(action)),
        (Some(group_id), Screen::GroupDetail { group_id: open }) if group_id == *open => {
            Ok(ScreenEvent::DetailAction(action))
        }
        (Some(_), _) => Err("go back to the list to act on another group".to_string()),
        (None, _) => Err(format!("usage: {} <group>", action.label())),
    }
}

pub(crate) async fn handle_command(directory: &mut GroupDirectory, command: Command) -> CommandResult {
    match run_command(directory, command).await {
        Ok(result) => result,
        Err(err) => CommandResult::Lines(vec![print_error_raw(&err.to_string())]),
    }
}

async fn run_command(directory: &mut GroupDirectory, command: Command) -> Result<CommandResult, DirectoryError> {
    let lines = match command {
        Command::Quit => return Ok(CommandResult::Quit),
        Command::Help => vec![print_help_raw()],
        Command::Show => render_screen(directory),
        Command::Filter(filter) => {
            directory.handle(ScreenEvent::SelectFilter(filter)).await?;
            render_screen(directory)
        }
        Command::Search(text) => {
            let delay = directory.config().search_delay();
            directory.handle(ScreenEvent::SearchChanged(text)).await?;
            tokio::time::sleep(delay + SEARCH_SETTLE).await;
            render_screen(directory)
        }
        Command::More => {
            let outcome = match directory.detail() {
                Some(detail) => detail.load_more_members().await?,
                None => directory.list().load_more().await?,
            };
            let mut lines = render_screen(directory);
            lines.push(print_system_raw(&describe_load(outcome)));
            lines
        }
        Command::Scroll(metrics) => {
            let metrics = metrics.unwrap_or_else(|| {
                let rows = match directory.detail() {
                    Some(detail) => detail.members().len(),
                    None => directory.list().items().len(),
                };
                bottom_metrics(rows)
            });
            directory.handle(ScreenEvent::Scrolled(metrics)).await?;
            render_screen(directory)
        }
        Command::View(group_id) => {
            directory.handle(ScreenEvent::ViewGroup(group_id)).await?;
            render_screen(directory)
        }
        Command::Join(group_id) => return Ok(mutate(directory, group_id, MembershipAction::Join).await),
        Command::Leave(group_id) => return Ok(mutate(directory, group_id, MembershipAction::Leave).await),
        Command::Add(user_ids) => return Ok(mutate(directory, None, MembershipAction::Add(user_ids)).await),
        Command::Remove(user_ids) => return Ok(mutate(directory, None, MembershipAction::Remove(user_ids)).await),
        Command::Archive(group_id) => return Ok(mutate(directory, group_id, MembershipAction::Archive).await),
        Command::Edit => {
            directory.handle(ScreenEvent::ReenterDetail).await?;
            render_screen(directory)
        }
        Command::Back => {
            directory.handle(ScreenEvent::Back).await?;
            render_screen(directory)
        }
    };
    Ok(CommandResult::Lines(lines))
}

async fn mutate(directory: &mut GroupDirectory, group_id: Option<String>, action: MembershipAction) -> CommandResult {
    let label = action.label();
    let event = match membership_event(directory, group_id, action) {
        Ok(event) => event,
        Err(usage) => return CommandResult::Lines(vec![print_error_raw(&usage)]),
    };
    match directory.handle(event).await {
        Ok(()) => {
            let mut lines = vec![print_system_raw(&format!("Done: {}.", label))];
            lines.extend(render_screen(directory));
            CommandResult::Lines(lines)
        }
        Err(err) => CommandResult::Lines(vec![print_error_raw(&err.to_string())]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &str) -> Command {
        parse_command(line).unwrap().unwrap()
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(parse("filter my"), Command::Filter(GroupFilter::Mine));
        assert_eq!(parse("/search design team"), Command::Search("design team".to_string()));
        assert_eq!(parse("search"), Command::Search(String::new()));
        assert_eq!(parse("view g001"), Command::View("g001".to_string()));
        assert_eq!(parse("join"), Command::Join(None));
        assert_eq!(parse("archive g002"), Command::Archive(Some("g002".to_string())));
        assert_eq!(
            parse("remove u01 u02"),
            Command::Remove(vec!["u01".to_string(), "u02".to_string()])
        );
        assert_eq!(
            parse("scroll 600 370 1000"),
            Command::Scroll(Some(ScrollMetrics::new(600, 370, 1000)))
        );
        assert_eq!(parse("q"), Command::Quit);
        assert!(parse_command("   ").unwrap().is_none());
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_command("view").is_err());
        assert!(parse_command("add").is_err());
        assert!(parse_command("filter everything").is_err());
        assert!(parse_command("scroll 1 2").is_err());
        assert!(parse_command("frobnicate").is_err());
    }

    #[test]
    fn test_bottom_metrics_are_near_bottom() {
        assert!(bottom_metrics(0).is_near_bottom(30));
        assert!(bottom_metrics(60).is_near_bottom(30));
        assert_eq!(bottom_metrics(60).scroll_height, 1440);
    }
}
