pub mod config;
pub mod constants;
pub mod controllers;
pub mod directory;
pub mod error;
pub mod events;
pub mod membership;
pub mod models;
pub mod navigation;
pub mod pagination;
pub mod provider;
pub mod search;
pub mod store;

// Re-export the types front-ends work with at crate root
pub use config::{ConfigError, DirectoryConfig};
pub use controllers::{EmptyState, GroupDetailController, GroupListController, LoadOutcome, ScrollMetrics, SkipReason};
pub use directory::{GroupDirectory, Screen, ScreenEvent};
pub use error::{DirectoryError, ProviderError, ProviderResult};
pub use events::{CollectionKind, DirectoryEvent, EventSink};
pub use membership::{MembershipAction, MembershipMutator, MutationOutcome};
pub use models::{Group, GroupFilter, GroupPermissions, GroupSource, Member};
pub use navigation::{NavigationEntry, NavigationStack};
pub use provider::{GroupProvider, GroupSearchParams, PageRequest, SharedProvider};
pub use store::{Fixture, InMemoryProvider};
