use serde::{Deserialize, Serialize};

/// Projection of a user profile shown in a group's member list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub display_name: String,
}

impl Member {
    pub fn new(id: impl Into<String>, username: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
            display_name: display_name.into(),
        }
    }

    /// Display name, falling back to the username when blank
    pub fn full_name(&self) -> &str {
        if self.display_name.trim().is_empty() {
            &self.username
        } else {
            &self.display_name
        }
    }

    pub fn mention(&self) -> String {
        format!("@{}", self.username)
    }
}
