use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::constants::{ALL_GROUPS_LABEL, MY_GROUPS_LABEL};

/// Which collection the group list screen is showing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupFilter {
    #[default]
    All,
    Mine,
}

impl GroupFilter {
    pub fn label(&self) -> &'static str {
        match self {
            Self::All => ALL_GROUPS_LABEL,
            Self::Mine => MY_GROUPS_LABEL,
        }
    }

    pub fn other(&self) -> Self {
        match self {
            Self::All => Self::Mine,
            Self::Mine => Self::All,
        }
    }
}

impl FromStr for GroupFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(Self::All),
            "my" | "mine" => Ok(Self::Mine),
            other => Err(format!("unknown filter '{}'", other)),
        }
    }
}
