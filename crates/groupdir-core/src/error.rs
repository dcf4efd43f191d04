/// Errors returned by a `GroupProvider`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("Server returned {status}: {message}")]
    Server { status: u16, message: String },
    #[error("Not found: {0}")]
    NotFound(String),
}

pub type ProviderResult<T> = Result<T, ProviderError>;

/// Errors surfaced by the directory controllers.
#[derive(Debug, Clone, thiserror::Error)]
pub enum DirectoryError {
    #[error("Failed to fetch {operation}: {source}")]
    Fetch {
        operation: &'static str,
        #[source]
        source: ProviderError,
    },
    #[error("Failed to {action} group {group_id}: {source}")]
    Mutation {
        action: &'static str,
        group_id: String,
        #[source]
        source: ProviderError,
    },
    #[error("Not permitted to {action} group {group_id}")]
    NotPermitted {
        action: &'static str,
        group_id: String,
    },
    #[error("Group {0} is managed by an external directory")]
    ReadOnlyGroup(String),
    #[error("Group details have not been loaded yet")]
    GroupNotLoaded,
    #[error("No group detail screen is open")]
    NoDetailScreen,
    #[error("Unknown group: {0}")]
    UnknownGroup(String),
}

impl DirectoryError {
    pub fn fetch(operation: &'static str, source: ProviderError) -> Self {
        Self::Fetch { operation, source }
    }
}
