use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{GROUPS_PER_PAGE, MEMBERS_PER_PAGE, SCROLL_THRESHOLD_PX, SEARCH_DELAY_MS};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectoryConfig {
    /// The signed-in user; used for "my groups", join and leave
    pub current_user_id: String,
    pub groups_per_page: u32,
    pub members_per_page: u32,
    pub search_delay_ms: u64,
    pub scroll_threshold_px: u32,
    pub include_member_count: bool,
}

impl DirectoryConfig {
    pub fn new(current_user_id: impl Into<String>) -> Self {
        Self {
            current_user_id: current_user_id.into(),
            ..Self::default()
        }
    }

    pub fn search_delay(&self) -> Duration {
        Duration::from_millis(self.search_delay_ms)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            current_user_id: String::new(),
            groups_per_page: GROUPS_PER_PAGE,
            members_per_page: MEMBERS_PER_PAGE,
            search_delay_ms: SEARCH_DELAY_MS,
            scroll_threshold_px: SCROLL_THRESHOLD_PX,
            include_member_count: true,
        }
    }
}
