use serde::{Deserialize, Serialize};

use crate::constants::EXTERNAL_SOURCE_LABEL;

/// Where a group's membership is managed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum GroupSource {
    /// Custom group managed inside the directory.
    #[default]
    #[serde(rename = "custom", alias = "internal")]
    Internal,
    /// Synced from an external directory (LDAP); membership is read-only here.
    #[serde(rename = "ldap")]
    ExternalDirectory,
}

impl GroupSource {
    /// Case-insensitive mapping from the wire label.
    pub fn from_label(label: &str) -> Self {
        if label.eq_ignore_ascii_case(EXTERNAL_SOURCE_LABEL) {
            Self::ExternalDirectory
        } else {
            Self::Internal
        }
    }

    pub fn is_read_only(&self) -> bool {
        matches!(self, Self::ExternalDirectory)
    }
}

/// What the current user may do with a group.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupPermissions {
    pub can_join: bool,
    pub can_leave: bool,
    /// Add or remove other users
    pub can_manage_members: bool,
    pub can_edit: bool,
    /// Archive the group
    pub can_delete: bool,
}

impl GroupPermissions {
    /// Everything allowed. Used for internal groups the viewer administers.
    pub fn all() -> Self {
        Self {
            can_join: true,
            can_leave: true,
            can_manage_members: true,
            can_edit: true,
            can_delete: true,
        }
    }
}

/// A user group as returned by the data provider.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: String,
    pub display_name: String,
    /// Unique handle, rendered as `@mention_name`
    pub mention_name: String,
    #[serde(default)]
    pub source: GroupSource,
    #[serde(default)]
    pub member_count: u32,
    #[serde(default)]
    pub permissions: GroupPermissions,
}

impl Group {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>, mention_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            mention_name: mention_name.into(),
            source: GroupSource::Internal,
            member_count: 0,
            permissions: GroupPermissions::default(),
        }
    }

    pub fn mention(&self) -> String {
        format!("@{}", self.mention_name)
    }

    /// "1 member" / "N members"
    pub fn member_count_label(&self) -> String {
        member_count_label(self.member_count)
    }

    /// Apply a confirmed membership delta. The count never goes below zero.
    pub fn apply_member_delta(&mut self, delta: i64) {
        self.member_count = apply_delta(self.member_count, delta);
    }

    pub fn is_membership_editable(&self) -> bool {
        !self.source.is_read_only()
    }

    /// Flip join/leave after the current user's membership changed.
    /// External groups keep their (empty) permissions.
    pub fn set_viewer_membership(&mut self, is_member: bool) {
        if !self.is_membership_editable() {
            return;
        }
        self.permissions.can_join = !is_member;
        self.permissions.can_leave = is_member;
    }
}

pub fn member_count_label(count: u32) -> String {
    if count == 1 {
        "1 member".to_string()
    } else {
        format!("{} members", count)
    }
}

pub(crate) fn apply_delta(count: u32, delta: i64) -> u32 {
    let next = i64::from(count) + delta;
    next.clamp(0, i64::from(u32::MAX)) as u32
}
