use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::models::GroupFilter;

/// Which paginated collection an event refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectionKind {
    Groups(GroupFilter),
    Members { group_id: String },
}

/// Signals for the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectoryEvent {
    /// A page or search fetch was rejected; collection state is unchanged
    FetchFailed {
        operation: &'static str,
        message: String,
    },
    /// A membership change was rejected; nothing was applied locally
    MutationFailed {
        group_id: String,
        action: &'static str,
        message: String,
    },
    MemberCountChanged {
        group_id: String,
        member_count: u32,
    },
    /// Drop the group from every list on the next render pass
    GroupArchived { group_id: String },
    /// The search box should be emptied
    SearchTermCleared,
    CollectionExhausted(CollectionKind),
}

/// Cloneable sender side; a sink without a receiver drops events.
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    tx: Option<UnboundedSender<DirectoryEvent>>,
}

impl EventSink {
    pub fn channel() -> (Self, UnboundedReceiver<DirectoryEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    pub fn disabled() -> Self {
        Self { tx: None }
    }

    pub fn emit(&self, event: DirectoryEvent) {
        if let Some(tx) = &self.tx {
            if tx.send(event).is_err() {
                tracing::trace!("directory event receiver dropped");
            }
        }
    }
}
