//! Membership mutations.
//!
//! Every row action goes through [`MembershipMutator::apply`]. The mutator
//! checks the group's source and the viewer's permission, issues the provider
//! call, and only when that call succeeds returns a [`MutationOutcome`] for
//! the controllers to apply. A rejected call changes nothing locally.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::DirectoryError;
use crate::events::{DirectoryEvent, EventSink};
use crate::models::Group;
use crate::provider::SharedProvider;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MembershipAction {
    /// Add the current user
    Join,
    /// Remove the current user
    Leave,
    Add(Vec<String>),
    Remove(Vec<String>),
    Archive,
}

impl MembershipAction {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Join => "join",
            Self::Leave => "leave",
            Self::Add(_) => "add members to",
            Self::Remove(_) => "remove members from",
            Self::Archive => "archive",
        }
    }

    /// Whether the group's permission flags allow this action.
    pub fn is_permitted(&self, group: &Group) -> bool {
        let perms = &group.permissions;
        match self {
            Self::Join => perms.can_join,
            Self::Leave => perms.can_leave,
            Self::Add(_) | Self::Remove(_) => perms.can_manage_members,
            Self::Archive => perms.can_delete,
        }
    }
}

/// A confirmed membership change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationOutcome {
    MembersChanged {
        group_id: String,
        delta: i64,
        /// Rows to evict from a materialized member list
        removed_user_ids: Vec<String>,
        /// The current user's membership after the change, when it was touched
        viewer_is_member: Option<bool>,
    },
    Archived { group_id: String },
}

impl MutationOutcome {
    pub fn group_id(&self) -> &str {
        match self {
            Self::MembersChanged { group_id, .. } | Self::Archived { group_id } => group_id,
        }
    }
}

#[derive(Clone)]
pub struct MembershipMutator {
    provider: SharedProvider,
    current_user_id: Arc<str>,
    events: EventSink,
}

impl MembershipMutator {
    pub fn new(provider: SharedProvider, current_user_id: impl Into<String>, events: EventSink) -> Self {
        Self {
            provider,
            current_user_id: Arc::from(current_user_id.into()),
            events,
        }
    }

    pub fn current_user_id(&self) -> &str {
        &self.current_user_id
    }

    /// Whether the action would be offered for this group at all.
    pub fn allows(&self, group: &Group, action: &MembershipAction) -> bool {
        group.is_membership_editable() && action.is_permitted(group)
    }

    pub async fn apply(&self, group: &Group, action: MembershipAction) -> Result<MutationOutcome, DirectoryError> {
        let label = action.label();
        if !group.is_membership_editable() {
            return Err(DirectoryError::ReadOnlyGroup(group.id.clone()));
        }
        if !action.is_permitted(group) {
            return Err(DirectoryError::NotPermitted {
                action: label,
                group_id: group.id.clone(),
            });
        }

        let group_id = group.id.clone();
        let result = match action {
            MembershipAction::Join => {
                let ids = vec![self.current_user_id.to_string()];
                let sent = self.provider.add_members(&group_id, &ids).await;
                sent.map(|_| MutationOutcome::MembersChanged {
                    group_id: group_id.clone(),
                    delta: 1,
                    removed_user_ids: Vec::new(),
                    viewer_is_member: Some(true),
                })
            }
            MembershipAction::Leave => {
                let ids = vec![self.current_user_id.to_string()];
                let sent = self.provider.remove_members(&group_id, &ids).await;
                sent.map(|_| MutationOutcome::MembersChanged {
                    group_id: group_id.clone(),
                    delta: -1,
                    removed_user_ids: ids,
                    viewer_is_member: Some(false),
                })
            }
            MembershipAction::Add(ids) => {
                let ids = unique(ids);
                if ids.is_empty() {
                    return Ok(Self::unchanged(group_id));
                }
                let sent = self.provider.add_members(&group_id, &ids).await;
                let viewer_is_member = self.mentions_viewer(&ids).then_some(true);
                sent.map(|_| MutationOutcome::MembersChanged {
                    group_id: group_id.clone(),
                    delta: ids.len() as i64,
                    removed_user_ids: Vec::new(),
                    viewer_is_member,
                })
            }
            MembershipAction::Remove(ids) => {
                let ids = unique(ids);
                if ids.is_empty() {
                    return Ok(Self::unchanged(group_id));
                }
                let sent = self.provider.remove_members(&group_id, &ids).await;
                let viewer_is_member = self.mentions_viewer(&ids).then_some(false);
                sent.map(|_| MutationOutcome::MembersChanged {
                    group_id: group_id.clone(),
                    delta: -(ids.len() as i64),
                    removed_user_ids: ids,
                    viewer_is_member,
                })
            }
            MembershipAction::Archive => {
                let sent = self.provider.archive_group(&group_id).await;
                sent.map(|_| MutationOutcome::Archived {
                    group_id: group_id.clone(),
                })
            }
        };

        match result {
            Ok(outcome) => {
                debug!(group_id = %group_id, action = label, "membership change confirmed");
                if let MutationOutcome::Archived { group_id } = &outcome {
                    self.events.emit(DirectoryEvent::GroupArchived {
                        group_id: group_id.clone(),
                    });
                }
                Ok(outcome)
            }
            Err(source) => {
                warn!(group_id = %group_id, action = label, error = %source, "membership change rejected");
                self.events.emit(DirectoryEvent::MutationFailed {
                    group_id: group_id.clone(),
                    action: label,
                    message: source.to_string(),
                });
                Err(DirectoryError::Mutation {
                    action: label,
                    group_id,
                    source,
                })
            }
        }
    }

    fn mentions_viewer(&self, ids: &[String]) -> bool {
        ids.iter().any(|id| id.as_str() == &*self.current_user_id)
    }

    fn unchanged(group_id: String) -> MutationOutcome {
        MutationOutcome::MembersChanged {
            group_id,
            delta: 0,
            removed_user_ids: Vec::new(),
            viewer_is_member: None,
        }
    }
}

/// Drop repeated ids, keeping first-seen order.
fn unique(ids: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    ids.into_iter().filter(|id| seen.insert(id.clone())).collect()
}
