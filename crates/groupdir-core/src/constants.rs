//! Directory-wide constants
//!
//! Centralized location for paging sizes, timings and labels
//! that are used across multiple modules.

/// Rows requested per page for both group listings.
pub const GROUPS_PER_PAGE: u32 = 60;

/// Rows requested per page for a group's member list.
pub const MEMBERS_PER_PAGE: u32 = 60;

/// Quiet period before a typed search term is committed.
pub const SEARCH_DELAY_MS: u64 = 300;

/// Distance from the bottom of the scroll region that counts as "near bottom".
pub const SCROLL_THRESHOLD_PX: u32 = 30;

/// Source label the directory uses for externally managed (LDAP) groups.
pub const EXTERNAL_SOURCE_LABEL: &str = "ldap";

// Display defaults
pub const ALL_GROUPS_LABEL: &str = "All Groups";
pub const MY_GROUPS_LABEL: &str = "My Groups";
