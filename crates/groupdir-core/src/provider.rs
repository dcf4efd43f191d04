//! Data-provider contract the controllers depend on.
//!
//! The transport (HTTP client, auth, timeouts) lives behind this trait.
//! Pages are 0-based; a batch shorter than `per_page` means the collection
//! is exhausted.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::ProviderResult;
use crate::models::{Group, Member};
use crate::pagination::PageTicket;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub per_page: u32,
}

impl From<&PageTicket> for PageRequest {
    fn from(ticket: &PageTicket) -> Self {
        Self {
            page: ticket.page,
            per_page: ticket.per_page,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupSearchParams {
    pub query: String,
    /// Restrict results to groups this user belongs to
    pub restrict_to_user_id: Option<String>,
    pub page: u32,
    pub per_page: u32,
    pub include_member_count: bool,
}

#[async_trait]
pub trait GroupProvider: Send + Sync {
    async fn list_groups(&self, page: PageRequest, include_member_count: bool) -> ProviderResult<Vec<Group>>;

    async fn list_groups_for_user(
        &self,
        user_id: &str,
        page: PageRequest,
        include_member_count: bool,
    ) -> ProviderResult<Vec<Group>>;

    async fn search_groups(&self, params: &GroupSearchParams) -> ProviderResult<Vec<Group>>;

    async fn get_group(&self, group_id: &str, include_member_count: bool) -> ProviderResult<Group>;

    async fn list_members(&self, group_id: &str, page: PageRequest) -> ProviderResult<Vec<Member>>;

    /// Unpaginated in practice
    async fn search_members(&self, group_id: &str, query: &str) -> ProviderResult<Vec<Member>>;

    async fn add_members(&self, group_id: &str, user_ids: &[String]) -> ProviderResult<()>;

    async fn remove_members(&self, group_id: &str, user_ids: &[String]) -> ProviderResult<()>;

    async fn archive_group(&self, group_id: &str) -> ProviderResult<()>;
}

pub type SharedProvider = Arc<dyn GroupProvider>;

/// One page request against a group collection, resolved at send time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupQuery {
    All {
        page: PageRequest,
        include_member_count: bool,
    },
    ForUser {
        user_id: String,
        page: PageRequest,
        include_member_count: bool,
    },
    Search(GroupSearchParams),
}

impl GroupQuery {
    pub fn operation(&self) -> &'static str {
        match self {
            Self::All { .. } => "groups",
            Self::ForUser { .. } => "my groups",
            Self::Search(_) => "group search",
        }
    }

    pub async fn send(&self, provider: &dyn GroupProvider) -> ProviderResult<Vec<Group>> {
        match self {
            Self::All {
                page,
                include_member_count,
            } => provider.list_groups(*page, *include_member_count).await,
            Self::ForUser {
                user_id,
                page,
                include_member_count,
            } => {
                provider
                    .list_groups_for_user(user_id, *page, *include_member_count)
                    .await
            }
            Self::Search(params) => provider.search_groups(params).await,
        }
    }
}

/// One request against a group's member list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemberQuery {
    Page { group_id: String, page: PageRequest },
    Search { group_id: String, query: String },
}

impl MemberQuery {
    pub fn operation(&self) -> &'static str {
        match self {
            Self::Page { .. } => "group members",
            Self::Search { .. } => "member search",
        }
    }

    pub async fn send(&self, provider: &dyn GroupProvider) -> ProviderResult<Vec<Member>> {
        match self {
            Self::Page { group_id, page } => provider.list_members(group_id, *page).await,
            Self::Search { group_id, query } => provider.search_members(group_id, query).await,
        }
    }
}
