//! The directory flow as a whole: list screen, detail screen, and the
//! navigation between them. Front-ends feed [`ScreenEvent`]s into
//! [`GroupDirectory::handle`] and render from the controllers.

use std::sync::Arc;

use tracing::{debug, info};

use crate::config::DirectoryConfig;
use crate::controllers::{GroupDetailController, GroupListController, ScrollMetrics};
use crate::error::DirectoryError;
use crate::events::EventSink;
use crate::membership::{MembershipAction, MembershipMutator, MutationOutcome};
use crate::models::GroupFilter;
use crate::navigation::NavigationStack;
use crate::provider::SharedProvider;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Screen {
    Closed,
    GroupList,
    GroupDetail { group_id: String },
}

/// User input, as delivered by whatever renders the screens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScreenEvent {
    SelectFilter(GroupFilter),
    /// Search box contents on the current screen
    SearchChanged(String),
    /// Scroll position of the current screen's list
    Scrolled(ScrollMetrics),
    ViewGroup(String),
    ListRowAction {
        group_id: String,
        action: MembershipAction,
    },
    DetailAction(MembershipAction),
    /// Reload the detail screen after its group was edited; needs `can_edit`
    ReenterDetail,
    Back,
    Close,
}

pub struct GroupDirectory {
    provider: SharedProvider,
    config: Arc<DirectoryConfig>,
    events: EventSink,
    mutator: MembershipMutator,
    list: GroupListController,
    detail: Option<GroupDetailController>,
    nav: NavigationStack,
    screen: Screen,
}

impl GroupDirectory {
    pub fn new(provider: SharedProvider, config: DirectoryConfig, events: EventSink) -> Self {
        let config = Arc::new(config);
        let mutator = MembershipMutator::new(provider.clone(), config.current_user_id.clone(), events.clone());
        let list = GroupListController::new(provider.clone(), mutator.clone(), config.clone(), events.clone());
        Self {
            provider,
            config,
            events,
            mutator,
            list,
            detail: None,
            nav: NavigationStack::new(),
            screen: Screen::Closed,
        }
    }

    pub fn screen(&self) -> &Screen {
        &self.screen
    }

    pub fn list(&self) -> &GroupListController {
        &self.list
    }

    pub fn detail(&self) -> Option<&GroupDetailController> {
        self.detail.as_ref()
    }

    pub fn navigation(&self) -> &NavigationStack {
        &self.nav
    }

    pub fn config(&self) -> &DirectoryConfig {
        &self.config
    }

    /// Show the list screen with freshly fetched collections.
    pub async fn open(&mut self) -> Result<(), DirectoryError> {
        if self.screen != Screen::Closed {
            self.close();
        }
        self.list = GroupListController::new(
            self.provider.clone(),
            self.mutator.clone(),
            self.config.clone(),
            self.events.clone(),
        );
        self.screen = Screen::GroupList;
        info!("group directory opened");
        self.list.mount().await
    }

    pub async fn handle(&mut self, event: ScreenEvent) -> Result<(), DirectoryError> {
        debug!(?event, screen = ?self.screen, "screen event");
        match event {
            ScreenEvent::SelectFilter(filter) => {
                self.list.switch_filter(filter);
                Ok(())
            }
            ScreenEvent::SearchChanged(text) => match &self.screen {
                Screen::GroupList => self.list.search(&text).await,
                Screen::GroupDetail { .. } => self.require_detail()?.search(&text).await,
                Screen::Closed => Ok(()),
            },
            ScreenEvent::Scrolled(metrics) => match &self.screen {
                Screen::GroupList => self.list.on_scroll(metrics).await.map(|_| ()),
                Screen::GroupDetail { .. } => self.require_detail()?.on_scroll(metrics).await.map(|_| ()),
                Screen::Closed => Ok(()),
            },
            ScreenEvent::ViewGroup(group_id) => self.view_group(group_id).await,
            ScreenEvent::ListRowAction { group_id, action } => {
                self.list_action(&group_id, action).await.map(|_| ())
            }
            ScreenEvent::DetailAction(action) => self.detail_action(action).await.map(|_| ()),
            ScreenEvent::ReenterDetail => self.reenter_detail().await,
            ScreenEvent::Back => {
                self.back();
                Ok(())
            }
            ScreenEvent::Close => {
                self.close();
                Ok(())
            }
        }
    }

    /// Drill into a group from the list screen.
    pub async fn view_group(&mut self, group_id: String) -> Result<(), DirectoryError> {
        if self.screen != Screen::GroupList {
            debug!(group_id = %group_id, screen = ?self.screen, "ignoring view outside the list screen");
            return Ok(());
        }
        self.nav.drill_into(self.list.filter(), group_id.clone());
        self.show_detail(group_id).await
    }

    /// Run a row action from the list. If the same group is open on the
    /// detail screen, the confirmed change is mirrored there too.
    pub async fn list_action(
        &mut self,
        group_id: &str,
        action: MembershipAction,
    ) -> Result<MutationOutcome, DirectoryError> {
        let outcome = self.list.perform(group_id, action).await?;
        let Some(detail) = self.detail.as_ref().filter(|d| d.group_id() == group_id) else {
            return Ok(outcome);
        };
        detail.apply_outcome(&outcome);
        if matches!(outcome, MutationOutcome::Archived { .. }) {
            self.back();
        }
        Ok(outcome)
    }

    /// Run a membership action on the detail screen's group. Confirmed
    /// changes are mirrored into the list; an archived group also closes
    /// the detail screen.
    pub async fn detail_action(&mut self, action: MembershipAction) -> Result<MutationOutcome, DirectoryError> {
        let detail = self.require_detail()?.clone();
        let outcome = detail.perform(action).await?;
        self.list.apply_outcome(&outcome);
        if matches!(outcome, MutationOutcome::Archived { .. }) {
            self.back();
        }
        Ok(outcome)
    }

    pub async fn reenter_detail(&mut self) -> Result<(), DirectoryError> {
        let Screen::GroupDetail { group_id } = self.screen.clone() else {
            return Err(DirectoryError::NoDetailScreen);
        };
        let group = self.detail.as_ref().and_then(GroupDetailController::group);
        if group.is_some_and(|group| !group.permissions.can_edit) {
            return Err(DirectoryError::NotPermitted {
                action: "edit",
                group_id,
            });
        }
        if self.nav.reenter(group_id.clone()).is_none() {
            return Err(DirectoryError::NoDetailScreen);
        }
        self.show_detail(group_id).await
    }

    /// Return to the list screen with the filter it had, without refetching.
    pub fn back(&mut self) {
        let Some(entry) = self.nav.go_back() else {
            return;
        };
        if let Some(detail) = self.detail.take() {
            detail.leave();
        }
        self.list.switch_filter(entry.origin_filter);
        self.screen = Screen::GroupList;
        debug!(group_id = %entry.group_id, filter = ?entry.origin_filter, "navigated back");
    }

    /// Close the whole flow from outside.
    pub fn close(&mut self) {
        if self.screen == Screen::Closed {
            return;
        }
        self.nav.dismiss();
        if let Some(detail) = self.detail.take() {
            detail.leave();
        }
        self.list.unmount();
        self.screen = Screen::Closed;
        info!("group directory closed");
    }

    async fn show_detail(&mut self, group_id: String) -> Result<(), DirectoryError> {
        if let Some(previous) = self.detail.take() {
            previous.leave();
        }
        let detail = GroupDetailController::new(
            group_id.clone(),
            self.provider.clone(),
            self.mutator.clone(),
            self.config.clone(),
            self.events.clone(),
        );
        self.detail = Some(detail.clone());
        self.screen = Screen::GroupDetail { group_id };
        detail.enter().await
    }

    fn require_detail(&self) -> Result<&GroupDetailController, DirectoryError> {
        self.detail.as_ref().ok_or(DirectoryError::NoDetailScreen)
    }
}
