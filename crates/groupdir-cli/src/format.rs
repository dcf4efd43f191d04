use groupdir_core::controllers::{EmptyState, GroupDetailController, GroupListController};
use groupdir_core::events::{CollectionKind, DirectoryEvent};
use groupdir_core::membership::MembershipAction;
use groupdir_core::models::{member_count_label, Group, GroupFilter, Member};

use crate::{CYAN, DIM, GREEN, RED, RESET, WHITE_BOLD, YELLOW};

// ─── Messages ───────────────────────────────────────────────────────────────

pub(crate) fn print_error_raw(msg: &str) -> String {
    format!("{RED}error:{RESET} {msg}")
}

pub(crate) fn print_system_raw(msg: &str) -> String {
    format!("{YELLOW}{msg}{RESET}")
}

pub(crate) fn print_help_raw() -> String {
    format!(
        "{WHITE_BOLD}Commands:{RESET}\n\
         \x20 filter <all|my>        Switch the group list filter\n\
         \x20 search [text]          Search the current screen (empty clears)\n\
         \x20 more                   Load the next page\n\
         \x20 scroll [top client h]  Report a scroll position (default: bottom)\n\
         \x20 view <group>           Open a group's members\n\
         \x20 join|leave [group]     Join or leave (current group on detail)\n\
         \x20 add <user>...          Add members to the current group\n\
         \x20 remove <user>...       Remove members from the current group\n\
         \x20 archive [group]        Archive a group\n\
         \x20 edit                   Reload the detail screen after an edit\n\
         \x20 back                   Return to the group list\n\
         \x20 show                   Redraw the current screen\n\
         \x20 help                   Show this help\n\
         \x20 quit                   Exit"
    )
}

// ─── Group list ─────────────────────────────────────────────────────────────

fn filter_tabs(active: GroupFilter) -> String {
    [GroupFilter::All, GroupFilter::Mine]
        .iter()
        .map(|filter| {
            if *filter == active {
                format!("{WHITE_BOLD}[{}]{RESET}", filter.label())
            } else {
                format!("{DIM} {} {RESET}", filter.label())
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn row_actions(list: &GroupListController, group: &Group) -> String {
    let offered: Vec<&str> = [MembershipAction::Join, MembershipAction::Leave, MembershipAction::Archive]
        .iter()
        .filter(|action| list.allows(group, action))
        .map(MembershipAction::label)
        .collect();
    if offered.is_empty() {
        String::new()
    } else {
        format!(" {CYAN}[{}]{RESET}", offered.join(" "))
    }
}

pub(crate) fn format_group_row(group: &Group) -> String {
    let source = if group.is_membership_editable() {
        String::new()
    } else {
        format!(" {DIM}(ldap){RESET}")
    };
    format!(
        "  {DIM}{}{RESET}  {WHITE_BOLD}{}{RESET} {DIM}{}{RESET}  {}{}",
        group.id,
        group.display_name,
        group.mention(),
        group.member_count_label(),
        source
    )
}

pub(crate) fn format_list(list: &GroupListController) -> Vec<String> {
    let filter = list.filter();
    let mut lines = vec![filter_tabs(filter)];

    let term = list.search_term();
    if let Some(pending) = list.pending_search() {
        lines.push(format!("{DIM}search: {pending} (pending){RESET}"));
    } else if !term.is_empty() {
        lines.push(format!("{DIM}search:{RESET} {term}"));
    }

    if list.is_loading() {
        lines.push(print_system_raw("Loading..."));
    }

    match list.empty_state() {
        Some(EmptyState::NoGroups) => lines.push(print_system_raw("No groups yet.")),
        Some(EmptyState::NoSearchResults(term)) => {
            lines.push(print_system_raw(&format!("No groups match \"{}\".", term)))
        }
        None => {
            for group in list.items() {
                lines.push(format!("{}{}", format_group_row(&group), row_actions(list, &group)));
            }
        }
    }

    let cursor = list.cursor(filter);
    let footer = if cursor.is_exhausted() {
        format!("{} shown, end of list", list.items().len())
    } else {
        format!("{} shown, 'more' for page {}", list.items().len(), cursor.page() + 1)
    };
    lines.push(format!("{DIM}{footer}{RESET}"));
    lines
}

// ─── Group detail ───────────────────────────────────────────────────────────

pub(crate) fn format_member_row(member: &Member) -> String {
    format!(
        "  {DIM}{}{RESET}  {}  {DIM}{}{RESET}",
        member.id,
        member.full_name(),
        member.mention()
    )
}

pub(crate) fn format_detail(detail: &GroupDetailController) -> Vec<String> {
    let mut lines = Vec::new();
    match detail.group() {
        Some(group) => {
            lines.push(format!(
                "{WHITE_BOLD}{}{RESET} {DIM}{}{RESET}  {GREEN}{}{RESET}",
                group.display_name,
                group.mention(),
                member_count_label(detail.member_count())
            ));
            if !detail.can_edit_membership() {
                lines.push(print_system_raw("Membership is managed by LDAP and cannot be changed here."));
            }
        }
        None => lines.push(print_system_raw(&format!("Group {} is not loaded.", detail.group_id()))),
    }

    let term = detail.search_term();
    if let Some(pending) = detail.pending_search() {
        lines.push(format!("{DIM}search: {pending} (pending){RESET}"));
    } else if !term.is_empty() {
        lines.push(format!("{DIM}search:{RESET} {term}"));
    }

    if detail.is_loading() {
        lines.push(print_system_raw("Loading..."));
    }

    let members = detail.members();
    if members.is_empty() && !detail.is_loading() {
        lines.push(print_system_raw("No members."));
    }
    for member in &members {
        lines.push(format_member_row(member));
    }
    if !detail.cursor().is_exhausted() {
        lines.push(format!("{DIM}{} shown, 'more' for the next page{RESET}", members.len()));
    }
    lines
}

// ─── Events ─────────────────────────────────────────────────────────────────

pub(crate) fn format_event(event: &DirectoryEvent) -> Option<String> {
    match event {
        DirectoryEvent::FetchFailed { operation, message } => {
            Some(print_error_raw(&format!("could not load {}: {}", operation, message)))
        }
        DirectoryEvent::MutationFailed {
            group_id,
            action,
            message,
        } => Some(print_error_raw(&format!("could not {} {}: {}", action, group_id, message))),
        DirectoryEvent::MemberCountChanged {
            group_id,
            member_count,
        } => Some(format!(
            "{DIM}{} now has {}{RESET}",
            group_id,
            member_count_label(*member_count)
        )),
        DirectoryEvent::GroupArchived { group_id } => Some(print_system_raw(&format!("Archived {}.", group_id))),
        DirectoryEvent::CollectionExhausted(CollectionKind::Groups(_))
        | DirectoryEvent::CollectionExhausted(CollectionKind::Members { .. })
        | DirectoryEvent::SearchTermCleared => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_event_skips_internal_signals() {
        assert!(format_event(&DirectoryEvent::SearchTermCleared).is_none());
        let line = format_event(&DirectoryEvent::MemberCountChanged {
            group_id: "g1".to_string(),
            member_count: 1,
        })
        .unwrap();
        assert!(line.contains("g1 now has 1 member"));
    }

    #[test]
    fn test_group_row_marks_ldap() {
        let mut group = Group::new("g1", "Staff", "staff");
        group.member_count = 3;
        assert!(!format_group_row(&group).contains("(ldap)"));
        group.source = groupdir_core::models::GroupSource::ExternalDirectory;
        let row = format_group_row(&group);
        assert!(row.contains("(ldap)"));
        assert!(row.contains("3 members"));
    }
}
