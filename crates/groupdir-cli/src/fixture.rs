use groupdir_core::models::{GroupSource, Member};
use groupdir_core::store::{Fixture, FixtureGroup};

const FIRST_NAMES: &[&str] = &[
    "Ada", "Grace", "Linus", "Barbara", "Ken", "Margaret", "Dennis", "Frances", "Alan", "Radia",
];

const TEAMS: &[&str] = &[
    "Design", "Platform", "Mobile", "Security", "Support", "Finance", "Research", "Growth",
];

/// A generated directory: `group_count` groups over a pool of users, every
/// fifth group synced from LDAP, and the viewer a member of every third.
pub fn demo_fixture(viewer_id: &str, group_count: usize) -> Fixture {
    let mut users: Vec<Member> = (0..90)
        .map(|i| {
            let first = FIRST_NAMES[i % FIRST_NAMES.len()];
            Member::new(
                format!("u{:02}", i),
                format!("{}{}", first.to_lowercase(), i),
                format!("{} {}", first, i),
            )
        })
        .collect();
    users.push(Member::new(viewer_id, viewer_id, "You"));

    let groups = (0..group_count)
        .map(|i| {
            let team = TEAMS[i % TEAMS.len()];
            let name = format!("{} {}", team, i / TEAMS.len() + 1);
            let member_total = (i * 7) % users.len().saturating_sub(1).max(1);
            let mut members: Vec<String> = users
                .iter()
                .take(member_total)
                .filter(|u| u.id != viewer_id)
                .map(|u| u.id.clone())
                .collect();
            if i % 3 == 0 {
                members.insert(0, viewer_id.to_string());
            }
            FixtureGroup {
                id: format!("g{:03}", i),
                mention_name: name.to_lowercase().replace(' ', "-"),
                display_name: name,
                source: if i % 5 == 4 {
                    GroupSource::ExternalDirectory
                } else {
                    GroupSource::Internal
                },
                members,
            }
        })
        .collect();

    Fixture {
        viewer_id: viewer_id.to_string(),
        users,
        groups,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_demo_fixture_shape() {
        let fixture = demo_fixture("me", 75);
        assert_eq!(fixture.groups.len(), 75);
        assert_eq!(fixture.viewer_id, "me");
        assert!(fixture.groups[0].members.contains(&"me".to_string()));
        assert!(!fixture.groups[1].members.contains(&"me".to_string()));
        assert_eq!(fixture.groups[4].source, GroupSource::ExternalDirectory);
        assert_eq!(fixture.groups[8].display_name, "Design 2");
        assert_eq!(fixture.groups[8].mention_name, "design-2");
    }
}
