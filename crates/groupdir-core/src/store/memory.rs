//! Fixture-backed `GroupProvider`.
//!
//! Keeps groups, users and memberships in memory, records every call, and
//! lets callers inject failures or latency for the next call of a given
//! operation. Permissions are derived for the configured viewer.

use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::config::ConfigError;
use crate::error::{ProviderError, ProviderResult};
use crate::models::{Group, GroupPermissions, GroupSource, Member};
use crate::provider::{GroupProvider, GroupSearchParams, PageRequest};
use crate::search::{group_matches, member_matches, parse_search_terms};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderOp {
    ListGroups,
    ListGroupsForUser,
    SearchGroups,
    GetGroup,
    ListMembers,
    SearchMembers,
    AddMembers,
    RemoveMembers,
    ArchiveGroup,
}

/// A recorded provider call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderCall {
    ListGroups { page: u32 },
    ListGroupsForUser { user_id: String, page: u32 },
    SearchGroups {
        query: String,
        restrict_to_user_id: Option<String>,
        page: u32,
    },
    GetGroup { group_id: String },
    ListMembers { group_id: String, page: u32 },
    SearchMembers { group_id: String, query: String },
    AddMembers { group_id: String, user_ids: Vec<String> },
    RemoveMembers { group_id: String, user_ids: Vec<String> },
    ArchiveGroup { group_id: String },
}

impl ProviderCall {
    pub fn op(&self) -> ProviderOp {
        match self {
            Self::ListGroups { .. } => ProviderOp::ListGroups,
            Self::ListGroupsForUser { .. } => ProviderOp::ListGroupsForUser,
            Self::SearchGroups { .. } => ProviderOp::SearchGroups,
            Self::GetGroup { .. } => ProviderOp::GetGroup,
            Self::ListMembers { .. } => ProviderOp::ListMembers,
            Self::SearchMembers { .. } => ProviderOp::SearchMembers,
            Self::AddMembers { .. } => ProviderOp::AddMembers,
            Self::RemoveMembers { .. } => ProviderOp::RemoveMembers,
            Self::ArchiveGroup { .. } => ProviderOp::ArchiveGroup,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixtureGroup {
    pub id: String,
    pub display_name: String,
    pub mention_name: String,
    #[serde(default)]
    pub source: GroupSource,
    /// Member user ids, in listing order
    #[serde(default)]
    pub members: Vec<String>,
}

/// Seed data for an [`InMemoryProvider`], loadable from JSON.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Fixture {
    pub viewer_id: String,
    #[serde(default)]
    pub users: Vec<Member>,
    #[serde(default)]
    pub groups: Vec<FixtureGroup>,
}

impl Fixture {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }
}

struct StoredGroup {
    group: Group,
    members: Vec<String>,
    archived: bool,
}

#[derive(Default)]
struct Inner {
    viewer_id: String,
    users: HashMap<String, Member>,
    groups: Vec<StoredGroup>,
    calls: Vec<ProviderCall>,
    failures: VecDeque<(ProviderOp, ProviderError)>,
    delays: VecDeque<(ProviderOp, Duration)>,
}

impl Inner {
    fn record(&mut self, call: ProviderCall) -> (Option<ProviderError>, Option<Duration>) {
        let op = call.op();
        self.calls.push(call);
        let failure = self
            .failures
            .iter()
            .position(|(o, _)| *o == op)
            .and_then(|idx| self.failures.remove(idx))
            .map(|(_, err)| err);
        let delay = self
            .delays
            .iter()
            .position(|(o, _)| *o == op)
            .and_then(|idx| self.delays.remove(idx))
            .map(|(_, d)| d);
        (failure, delay)
    }

    fn find(&self, group_id: &str) -> ProviderResult<&StoredGroup> {
        self.groups
            .iter()
            .find(|g| g.group.id == group_id && !g.archived)
            .ok_or_else(|| ProviderError::NotFound(format!("group {}", group_id)))
    }

    fn find_mut(&mut self, group_id: &str) -> ProviderResult<&mut StoredGroup> {
        self.groups
            .iter_mut()
            .find(|g| g.group.id == group_id && !g.archived)
            .ok_or_else(|| ProviderError::NotFound(format!("group {}", group_id)))
    }

    fn project(&self, stored: &StoredGroup, include_member_count: bool) -> Group {
        let mut group = stored.group.clone();
        group.member_count = if include_member_count {
            stored.members.len() as u32
        } else {
            0
        };
        group.permissions = if group.source.is_read_only() {
            GroupPermissions::default()
        } else {
            let is_member = stored.members.iter().any(|m| *m == self.viewer_id);
            GroupPermissions {
                can_join: !is_member,
                can_leave: is_member,
                ..GroupPermissions::all()
            }
        };
        group
    }

    fn member(&self, user_id: &str) -> Member {
        self.users
            .get(user_id)
            .cloned()
            .unwrap_or_else(|| Member::new(user_id, user_id, ""))
    }

    fn active(&self) -> impl Iterator<Item = &StoredGroup> {
        self.groups.iter().filter(|g| !g.archived)
    }
}

fn page_slice<T: Clone>(items: &[T], page: PageRequest) -> Vec<T> {
    let start = (page.page as usize).saturating_mul(page.per_page as usize);
    items
        .iter()
        .skip(start)
        .take(page.per_page as usize)
        .cloned()
        .collect()
}

pub struct InMemoryProvider {
    inner: Mutex<Inner>,
}

impl InMemoryProvider {
    pub fn new(viewer_id: impl Into<String>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                viewer_id: viewer_id.into(),
                ..Inner::default()
            }),
        }
    }

    pub fn from_fixture(fixture: Fixture) -> Self {
        let provider = Self::new(fixture.viewer_id);
        for user in fixture.users {
            provider.add_user(user);
        }
        for seed in fixture.groups {
            let mut group = Group::new(seed.id, seed.display_name, seed.mention_name);
            group.source = seed.source;
            provider.insert_group(group, seed.members);
        }
        provider
    }

    // ===== Seeding =====

    pub fn add_user(&self, user: Member) {
        self.inner.lock().users.insert(user.id.clone(), user);
    }

    pub fn insert_group(&self, group: Group, members: Vec<String>) {
        self.inner.lock().groups.push(StoredGroup {
            group,
            members,
            archived: false,
        });
    }

    // ===== Test controls =====

    /// Fail the next call of `op` with `error`.
    pub fn fail_next(&self, op: ProviderOp, error: ProviderError) {
        self.inner.lock().failures.push_back((op, error));
    }

    /// Delay the response to the next call of `op`.
    pub fn delay_next(&self, op: ProviderOp, delay: Duration) {
        self.inner.lock().delays.push_back((op, delay));
    }

    pub fn calls(&self) -> Vec<ProviderCall> {
        self.inner.lock().calls.clone()
    }

    pub fn count_calls(&self, op: ProviderOp) -> usize {
        self.inner.lock().calls.iter().filter(|c| c.op() == op).count()
    }

    pub fn clear_calls(&self) {
        self.inner.lock().calls.clear();
    }

    pub fn member_ids(&self, group_id: &str) -> Vec<String> {
        self.inner
            .lock()
            .find(group_id)
            .map(|g| g.members.clone())
            .unwrap_or_default()
    }

    pub fn is_archived(&self, group_id: &str) -> bool {
        self.inner
            .lock()
            .groups
            .iter()
            .any(|g| g.group.id == group_id && g.archived)
    }

    async fn respond<T>(delay: Option<Duration>, result: ProviderResult<T>) -> ProviderResult<T> {
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        result
    }
}

#[async_trait]
impl GroupProvider for InMemoryProvider {
    async fn list_groups(&self, page: PageRequest, include_member_count: bool) -> ProviderResult<Vec<Group>> {
        let (delay, result) = {
            let mut inner = self.inner.lock();
            let (failure, delay) = inner.record(ProviderCall::ListGroups { page: page.page });
            let result = match failure {
                Some(err) => Err(err),
                None => {
                    let all: Vec<Group> = inner
                        .active()
                        .map(|g| inner.project(g, include_member_count))
                        .collect();
                    Ok(page_slice(&all, page))
                }
            };
            (delay, result)
        };
        Self::respond(delay, result).await
    }

    async fn list_groups_for_user(
        &self,
        user_id: &str,
        page: PageRequest,
        include_member_count: bool,
    ) -> ProviderResult<Vec<Group>> {
        let (delay, result) = {
            let mut inner = self.inner.lock();
            let (failure, delay) = inner.record(ProviderCall::ListGroupsForUser {
                user_id: user_id.to_string(),
                page: page.page,
            });
            let result = match failure {
                Some(err) => Err(err),
                None => {
                    let mine: Vec<Group> = inner
                        .active()
                        .filter(|g| g.members.iter().any(|m| m == user_id))
                        .map(|g| inner.project(g, include_member_count))
                        .collect();
                    Ok(page_slice(&mine, page))
                }
            };
            (delay, result)
        };
        Self::respond(delay, result).await
    }

    async fn search_groups(&self, params: &GroupSearchParams) -> ProviderResult<Vec<Group>> {
        let (delay, result) = {
            let mut inner = self.inner.lock();
            let (failure, delay) = inner.record(ProviderCall::SearchGroups {
                query: params.query.clone(),
                restrict_to_user_id: params.restrict_to_user_id.clone(),
                page: params.page,
            });
            let result = match failure {
                Some(err) => Err(err),
                None => {
                    let terms = parse_search_terms(&params.query);
                    let matches: Vec<Group> = inner
                        .active()
                        .filter(|g| match &params.restrict_to_user_id {
                            Some(user_id) => g.members.iter().any(|m| m == user_id),
                            None => true,
                        })
                        .filter(|g| group_matches(&g.group, &terms))
                        .map(|g| inner.project(g, params.include_member_count))
                        .collect();
                    Ok(page_slice(
                        &matches,
                        PageRequest {
                            page: params.page,
                            per_page: params.per_page,
                        },
                    ))
                }
            };
            (delay, result)
        };
        Self::respond(delay, result).await
    }

    async fn get_group(&self, group_id: &str, include_member_count: bool) -> ProviderResult<Group> {
        let (delay, result) = {
            let mut inner = self.inner.lock();
            let (failure, delay) = inner.record(ProviderCall::GetGroup {
                group_id: group_id.to_string(),
            });
            let result = match failure {
                Some(err) => Err(err),
                None => inner
                    .find(group_id)
                    .map(|g| inner.project(g, include_member_count)),
            };
            (delay, result)
        };
        Self::respond(delay, result).await
    }

    async fn list_members(&self, group_id: &str, page: PageRequest) -> ProviderResult<Vec<Member>> {
        let (delay, result) = {
            let mut inner = self.inner.lock();
            let (failure, delay) = inner.record(ProviderCall::ListMembers {
                group_id: group_id.to_string(),
                page: page.page,
            });
            let result = match failure {
                Some(err) => Err(err),
                None => inner.find(group_id).map(|g| {
                    page_slice(&g.members, page)
                        .iter()
                        .map(|id| inner.member(id))
                        .collect::<Vec<_>>()
                }),
            };
            (delay, result)
        };
        Self::respond(delay, result).await
    }

    async fn search_members(&self, group_id: &str, query: &str) -> ProviderResult<Vec<Member>> {
        let (delay, result) = {
            let mut inner = self.inner.lock();
            let (failure, delay) = inner.record(ProviderCall::SearchMembers {
                group_id: group_id.to_string(),
                query: query.to_string(),
            });
            let result = match failure {
                Some(err) => Err(err),
                None => {
                    let terms = parse_search_terms(query);
                    inner.find(group_id).map(|g| {
                        g.members
                            .iter()
                            .map(|id| inner.member(id))
                            .filter(|m| member_matches(m, &terms))
                            .collect::<Vec<_>>()
                    })
                }
            };
            (delay, result)
        };
        Self::respond(delay, result).await
    }

    async fn add_members(&self, group_id: &str, user_ids: &[String]) -> ProviderResult<()> {
        let (delay, result) = {
            let mut inner = self.inner.lock();
            let (failure, delay) = inner.record(ProviderCall::AddMembers {
                group_id: group_id.to_string(),
                user_ids: user_ids.to_vec(),
            });
            let result = match failure {
                Some(err) => Err(err),
                None => inner.find_mut(group_id).map(|g| {
                    for id in user_ids {
                        if !g.members.contains(id) {
                            g.members.push(id.clone());
                        }
                    }
                }),
            };
            (delay, result)
        };
        Self::respond(delay, result).await
    }

    async fn remove_members(&self, group_id: &str, user_ids: &[String]) -> ProviderResult<()> {
        let (delay, result) = {
            let mut inner = self.inner.lock();
            let (failure, delay) = inner.record(ProviderCall::RemoveMembers {
                group_id: group_id.to_string(),
                user_ids: user_ids.to_vec(),
            });
            let result = match failure {
                Some(err) => Err(err),
                None => inner
                    .find_mut(group_id)
                    .map(|g| g.members.retain(|m| !user_ids.contains(m))),
            };
            (delay, result)
        };
        Self::respond(delay, result).await
    }

    async fn archive_group(&self, group_id: &str) -> ProviderResult<()> {
        let (delay, result) = {
            let mut inner = self.inner.lock();
            let (failure, delay) = inner.record(ProviderCall::ArchiveGroup {
                group_id: group_id.to_string(),
            });
            let result = match failure {
                Some(err) => Err(err),
                None => inner.find_mut(group_id).map(|g| g.archived = true),
            };
            (delay, result)
        };
        Self::respond(delay, result).await
    }
}
