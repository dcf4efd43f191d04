//! State for the "browse groups" screen.
//!
//! Two independently paged collections ("all groups" and "my groups"), one
//! active filter pointer, a debounced search per collection, and
//! infinite-scroll paging. The controller is a cheap clonable handle; state
//! sits behind a mutex that is never held across a provider call.

use std::sync::Arc;

use futures::join;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use super::{LoadOutcome, ScrollMetrics, SkipReason};
use crate::config::DirectoryConfig;
use crate::error::{DirectoryError, ProviderResult};
use crate::events::{CollectionKind, DirectoryEvent, EventSink};
use crate::membership::{MembershipAction, MembershipMutator, MutationOutcome};
use crate::models::{Group, GroupFilter};
use crate::pagination::{PageOutcome, PageTicket, PaginationCursor};
use crate::provider::{GroupQuery, GroupSearchParams, PageRequest, SharedProvider};
use crate::search::{InputOutcome, SearchDebouncer, SearchTicket};
use crate::store::PagedCollection;

/// What to show when the active list has no rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmptyState {
    NoGroups,
    NoSearchResults(String),
}

struct ListState {
    filter: GroupFilter,
    all: PagedCollection<Group>,
    mine: PagedCollection<Group>,
    /// Each filter keeps its own search box text
    all_search: SearchDebouncer,
    mine_search: SearchDebouncer,
    /// Initial parallel fetch in progress
    loading: bool,
}

impl ListState {
    fn collection(&self, filter: GroupFilter) -> &PagedCollection<Group> {
        match filter {
            GroupFilter::All => &self.all,
            GroupFilter::Mine => &self.mine,
        }
    }

    fn collection_mut(&mut self, filter: GroupFilter) -> &mut PagedCollection<Group> {
        match filter {
            GroupFilter::All => &mut self.all,
            GroupFilter::Mine => &mut self.mine,
        }
    }

    fn debouncer(&self, filter: GroupFilter) -> &SearchDebouncer {
        match filter {
            GroupFilter::All => &self.all_search,
            GroupFilter::Mine => &self.mine_search,
        }
    }

    fn debouncer_mut(&mut self, filter: GroupFilter) -> &mut SearchDebouncer {
        match filter {
            GroupFilter::All => &mut self.all_search,
            GroupFilter::Mine => &mut self.mine_search,
        }
    }
}

#[derive(Clone)]
pub struct GroupListController {
    state: Arc<Mutex<ListState>>,
    provider: SharedProvider,
    mutator: MembershipMutator,
    config: Arc<DirectoryConfig>,
    events: EventSink,
}

impl GroupListController {
    pub fn new(
        provider: SharedProvider,
        mutator: MembershipMutator,
        config: Arc<DirectoryConfig>,
        events: EventSink,
    ) -> Self {
        let state = ListState {
            filter: GroupFilter::All,
            all: PagedCollection::new(config.groups_per_page),
            mine: PagedCollection::new(config.groups_per_page),
            all_search: SearchDebouncer::new(config.search_delay()),
            mine_search: SearchDebouncer::new(config.search_delay()),
            loading: false,
        };
        Self {
            state: Arc::new(Mutex::new(state)),
            provider,
            mutator,
            config,
            events,
        }
    }

    // ===== Getters =====

    pub fn filter(&self) -> GroupFilter {
        self.state.lock().filter
    }

    /// Rows of the active collection.
    pub fn items(&self) -> Vec<Group> {
        let state = self.state.lock();
        state.collection(state.filter).items().to_vec()
    }

    pub fn items_for(&self, filter: GroupFilter) -> Vec<Group> {
        self.state.lock().collection(filter).items().to_vec()
    }

    pub fn group(&self, group_id: &str) -> Option<Group> {
        let state = self.state.lock();
        state
            .all
            .get(group_id)
            .or_else(|| state.mine.get(group_id))
            .cloned()
    }

    pub fn cursor(&self, filter: GroupFilter) -> PaginationCursor {
        self.state.lock().collection(filter).cursor().clone()
    }

    /// The search text the given collection's rows reflect.
    pub fn collection_query(&self, filter: GroupFilter) -> String {
        self.state.lock().collection(filter).query().to_string()
    }

    /// Spinner state: initial fetch, or a page of the active list in flight.
    pub fn is_loading(&self) -> bool {
        let state = self.state.lock();
        state.loading || state.collection(state.filter).cursor().is_in_flight()
    }

    /// Committed search text of the active filter.
    pub fn search_term(&self) -> String {
        let state = self.state.lock();
        state.debouncer(state.filter).committed().to_string()
    }

    pub fn pending_search(&self) -> Option<String> {
        let state = self.state.lock();
        state.debouncer(state.filter).pending().map(str::to_string)
    }

    pub fn empty_state(&self) -> Option<EmptyState> {
        let state = self.state.lock();
        let collection = state.collection(state.filter);
        if state.loading || collection.cursor().is_in_flight() || !collection.is_empty() {
            return None;
        }
        if collection.query().is_empty() {
            Some(EmptyState::NoGroups)
        } else {
            Some(EmptyState::NoSearchResults(collection.query().to_string()))
        }
    }

    pub fn allows(&self, group: &Group, action: &MembershipAction) -> bool {
        self.mutator.allows(group, action)
    }

    // ===== Screen lifecycle =====

    /// Fetch the first page of both collections in parallel.
    pub async fn mount(&self) -> Result<(), DirectoryError> {
        let (all_query, all_ticket, mine_query, mine_ticket) = {
            let mut state = self.state.lock();
            state.loading = true;
            let all_ticket = state.all.restart("");
            let mine_ticket = state.mine.restart("");
            (
                self.query_for(GroupFilter::All, "", &all_ticket),
                all_ticket,
                self.query_for(GroupFilter::Mine, "", &mine_ticket),
                mine_ticket,
            )
        };
        info!(user_id = %self.config.current_user_id, "mounting group list");

        let (all_result, mine_result) = join!(
            all_query.send(self.provider.as_ref()),
            mine_query.send(self.provider.as_ref())
        );

        let mut state = self.state.lock();
        let all_outcome = self.settle(
            &mut state,
            GroupFilter::All,
            &all_ticket,
            all_query.operation(),
            all_result,
        );
        let mine_outcome = self.settle(
            &mut state,
            GroupFilter::Mine,
            &mine_ticket,
            mine_query.operation(),
            mine_result,
        );
        state.loading = false;
        all_outcome.and(mine_outcome).map(|_| ())
    }

    /// Screen closed: drop pending searches and clear the committed terms.
    pub fn unmount(&self) {
        {
            let mut state = self.state.lock();
            state.all_search.reset();
            state.mine_search.reset();
        }
        self.events.emit(DirectoryEvent::SearchTermCleared);
        debug!("group list unmounted");
    }

    /// Point the screen at another collection. Neither cursor nor search box
    /// is reset.
    pub fn switch_filter(&self, filter: GroupFilter) -> bool {
        let mut state = self.state.lock();
        if state.filter == filter {
            return false;
        }
        debug!(from = ?state.filter, to = ?filter, "switching group filter");
        state.filter = filter;
        true
    }

    // ===== Paging =====

    pub async fn on_scroll(&self, metrics: ScrollMetrics) -> Result<LoadOutcome, DirectoryError> {
        if !metrics.is_near_bottom(self.config.scroll_threshold_px) {
            return Ok(LoadOutcome::Skipped(SkipReason::NotNearBottom));
        }
        self.load_more().await
    }

    /// Fetch the next page of the active collection.
    pub async fn load_more(&self) -> Result<LoadOutcome, DirectoryError> {
        let (filter, ticket, query) = {
            let mut state = self.state.lock();
            if state.loading {
                return Ok(LoadOutcome::Skipped(SkipReason::Loading));
            }
            let filter = state.filter;
            let collection = state.collection_mut(filter);
            if collection.cursor().is_exhausted() {
                return Ok(LoadOutcome::Skipped(SkipReason::Exhausted));
            }
            let Some(ticket) = collection.begin_fetch() else {
                return Ok(LoadOutcome::Skipped(SkipReason::InFlight));
            };
            let query = self.query_for(filter, collection.query(), &ticket);
            (filter, ticket, query)
        };
        debug!(filter = ?filter, page = ticket.page, "loading more groups");

        let result = query.send(self.provider.as_ref()).await;

        let mut state = self.state.lock();
        self.settle(&mut state, filter, &ticket, query.operation(), result)
    }

    // ===== Search =====

    /// Search-box input for the active filter. Empty text restores the
    /// unfiltered listing at once; anything else is committed after the quiet
    /// period, against the filter that was active when it was typed.
    pub async fn search(&self, text: &str) -> Result<(), DirectoryError> {
        let (filter, outcome) = {
            let mut state = self.state.lock();
            let filter = state.filter;
            (filter, state.debouncer_mut(filter).on_input(text))
        };
        match outcome {
            InputOutcome::Unchanged | InputOutcome::Cancelled => Ok(()),
            InputOutcome::Immediate(ticket) => self.run_search(filter, ticket).await.map(|_| ()),
            InputOutcome::Scheduled { delay, seq } => {
                let this = self.clone();
                let task = tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    this.fire_search(filter, seq).await;
                });
                self.state.lock().debouncer_mut(filter).arm(seq, task.abort_handle());
                Ok(())
            }
        }
    }

    async fn fire_search(&self, filter: GroupFilter, seq: u64) {
        let ticket = self.state.lock().debouncer_mut(filter).fire(seq);
        if let Some(ticket) = ticket {
            if let Err(err) = self.run_search(filter, ticket).await {
                warn!(error = %err, filter = ?filter, "group search failed");
            }
        }
    }

    async fn run_search(&self, filter: GroupFilter, ticket: SearchTicket) -> Result<LoadOutcome, DirectoryError> {
        let (previous, page_ticket, query) = {
            let mut state = self.state.lock();
            if !state.debouncer(filter).is_current(ticket.token) {
                return Ok(LoadOutcome::Stale);
            }
            let collection = state.collection_mut(filter);
            let previous = collection.query().to_string();
            let page_ticket = collection.restart(&ticket.text);
            let query = self.query_for(filter, &ticket.text, &page_ticket);
            (previous, page_ticket, query)
        };
        debug!(token = ticket.token, filter = ?filter, term = %ticket.text, "issuing group search");

        let result = query.send(self.provider.as_ref()).await;

        let mut state = self.state.lock();
        if !state.debouncer(filter).is_current(ticket.token) {
            debug!(token = ticket.token, filter = ?filter, "dropping stale group search response");
            state.collection_mut(filter).abandon(&page_ticket, &previous);
            return Ok(LoadOutcome::Stale);
        }
        self.settle(&mut state, filter, &page_ticket, query.operation(), result)
    }

    // ===== Mutations =====

    /// Run a row action and apply its confirmed outcome.
    pub async fn perform(&self, group_id: &str, action: MembershipAction) -> Result<MutationOutcome, DirectoryError> {
        let group = self
            .group(group_id)
            .ok_or_else(|| DirectoryError::UnknownGroup(group_id.to_string()))?;
        let outcome = self.mutator.apply(&group, action).await?;
        self.apply_outcome(&outcome);
        Ok(outcome)
    }

    /// Reflect a confirmed mutation in both collections.
    pub fn apply_outcome(&self, outcome: &MutationOutcome) {
        let mut state = self.state.lock();
        match outcome {
            MutationOutcome::MembersChanged {
                group_id,
                delta,
                viewer_is_member,
                ..
            } => {
                let mut member_count = None;
                for filter in [GroupFilter::All, GroupFilter::Mine] {
                    if let Some(group) = state.collection_mut(filter).get_mut(group_id) {
                        group.apply_member_delta(*delta);
                        if let Some(is_member) = viewer_is_member {
                            group.set_viewer_membership(*is_member);
                        }
                        member_count = Some(group.member_count);
                    }
                }
                if let Some(member_count) = member_count {
                    self.events.emit(DirectoryEvent::MemberCountChanged {
                        group_id: group_id.clone(),
                        member_count,
                    });
                }
            }
            MutationOutcome::Archived { group_id } => {
                state.all.remove(group_id);
                state.mine.remove(group_id);
            }
        }
    }

    // ===== Internals =====

    fn query_for(&self, filter: GroupFilter, query: &str, ticket: &PageTicket) -> GroupQuery {
        let include_member_count = self.config.include_member_count;
        if query.is_empty() {
            let page = PageRequest::from(ticket);
            return match filter {
                GroupFilter::All => GroupQuery::All {
                    page,
                    include_member_count,
                },
                GroupFilter::Mine => GroupQuery::ForUser {
                    user_id: self.config.current_user_id.clone(),
                    page,
                    include_member_count,
                },
            };
        }
        GroupQuery::Search(GroupSearchParams {
            query: query.to_string(),
            restrict_to_user_id: (filter == GroupFilter::Mine).then(|| self.config.current_user_id.clone()),
            page: ticket.page,
            per_page: ticket.per_page,
            include_member_count,
        })
    }

    fn settle(
        &self,
        state: &mut ListState,
        filter: GroupFilter,
        ticket: &PageTicket,
        operation: &'static str,
        result: ProviderResult<Vec<Group>>,
    ) -> Result<LoadOutcome, DirectoryError> {
        let collection = state.collection_mut(filter);
        match result {
            Ok(batch) => match collection.apply_page(ticket, batch) {
                PageOutcome::Stale => {
                    debug!(filter = ?filter, page = ticket.page, "dropping stale group page");
                    Ok(LoadOutcome::Stale)
                }
                PageOutcome::Applied { added, exhausted } => {
                    if exhausted {
                        debug!(filter = ?filter, rows = collection.len(), "group collection exhausted");
                        self.events
                            .emit(DirectoryEvent::CollectionExhausted(CollectionKind::Groups(filter)));
                    }
                    Ok(LoadOutcome::Loaded { added, exhausted })
                }
            },
            Err(source) => {
                if !collection.fail(ticket) {
                    return Ok(LoadOutcome::Stale);
                }
                warn!(operation, page = ticket.page, error = %source, "group fetch failed");
                self.events.emit(DirectoryEvent::FetchFailed {
                    operation,
                    message: source.to_string(),
                });
                Err(DirectoryError::fetch(operation, source))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use crate::store::{InMemoryProvider, ProviderCall, ProviderOp};
    use std::time::Duration;
    use tokio::sync::mpsc::UnboundedReceiver;

    const ME: &str = "me";

    /// `total` groups named "Team NNN"; the viewer belongs to those where `mine(i)`.
    fn provider_with(total: usize, mine: impl Fn(usize) -> bool) -> Arc<InMemoryProvider> {
        let provider = Arc::new(InMemoryProvider::new(ME));
        for i in 0..total {
            let members = if mine(i) {
                vec![ME.to_string(), "u1".to_string()]
            } else {
                vec!["u1".to_string()]
            };
            provider.insert_group(
                Group::new(format!("g{:03}", i), format!("Team {:03}", i), format!("team{:03}", i)),
                members,
            );
        }
        provider
    }

    fn controller(provider: &Arc<InMemoryProvider>) -> (GroupListController, UnboundedReceiver<DirectoryEvent>) {
        let (events, rx) = EventSink::channel();
        let config = Arc::new(DirectoryConfig::new(ME));
        let mutator = MembershipMutator::new(provider.clone(), ME, events.clone());
        (
            GroupListController::new(provider.clone(), mutator, config, events),
            rx,
        )
    }

    fn loaded(added: usize, exhausted: bool) -> LoadOutcome {
        LoadOutcome::Loaded { added, exhausted }
    }

    #[tokio::test]
    async fn test_pagination_until_exhausted() {
        let provider = provider_with(70, |_| false);
        let (list, _rx) = controller(&provider);

        assert_eq!(list.load_more().await.unwrap(), loaded(60, false));
        assert_eq!(list.load_more().await.unwrap(), loaded(10, true));
        assert_eq!(list.items().len(), 70);
        assert!(list.cursor(GroupFilter::All).is_exhausted());

        assert_eq!(
            list.load_more().await.unwrap(),
            LoadOutcome::Skipped(SkipReason::Exhausted)
        );
        assert_eq!(provider.count_calls(ProviderOp::ListGroups), 2);
    }

    #[tokio::test]
    async fn test_filter_isolation() {
        let provider = provider_with(200, |i| i % 2 == 0);
        let (list, _rx) = controller(&provider);

        list.load_more().await.unwrap();
        list.load_more().await.unwrap();
        assert_eq!(list.cursor(GroupFilter::All).page(), 2);
        assert_eq!(list.cursor(GroupFilter::Mine).page(), 0);

        assert!(list.switch_filter(GroupFilter::Mine));
        assert!(!list.switch_filter(GroupFilter::Mine));
        list.load_more().await.unwrap();

        assert_eq!(list.cursor(GroupFilter::Mine).page(), 1);
        assert_eq!(list.cursor(GroupFilter::All).page(), 2);
        assert_eq!(list.items().len(), 60);
        assert_eq!(list.items_for(GroupFilter::All).len(), 120);
        assert_eq!(
            provider.calls().last(),
            Some(&ProviderCall::ListGroupsForUser {
                user_id: ME.to_string(),
                page: 0
            })
        );
    }

    #[tokio::test]
    async fn test_mount_fetches_both_first_pages() {
        let provider = provider_with(5, |i| i < 2);
        let (list, _rx) = controller(&provider);

        list.mount().await.unwrap();
        assert!(!list.is_loading());
        assert_eq!(list.items_for(GroupFilter::All).len(), 5);
        assert_eq!(list.items_for(GroupFilter::Mine).len(), 2);
        assert_eq!(list.cursor(GroupFilter::All).page(), 1);
        assert_eq!(list.cursor(GroupFilter::Mine).page(), 1);
        assert_eq!(provider.count_calls(ProviderOp::ListGroups), 1);
        assert_eq!(provider.count_calls(ProviderOp::ListGroupsForUser), 1);
        assert_eq!(list.items()[0].member_count, 2);
    }

    #[tokio::test]
    async fn test_mount_failure_keeps_other_collection() {
        let provider = provider_with(5, |_| true);
        provider.fail_next(
            ProviderOp::ListGroupsForUser,
            ProviderError::Server {
                status: 500,
                message: "boom".to_string(),
            },
        );
        let (list, mut rx) = controller(&provider);

        let err = list.mount().await.unwrap_err();
        assert!(matches!(err, DirectoryError::Fetch { operation: "my groups", .. }));
        assert!(!list.is_loading());
        assert_eq!(list.items_for(GroupFilter::All).len(), 5);
        assert!(list.items_for(GroupFilter::Mine).is_empty());

        let mine = list.cursor(GroupFilter::Mine);
        assert_eq!(mine.page(), 0);
        assert!(!mine.is_in_flight());

        let mut saw_failure = false;
        while let Ok(event) = rx.try_recv() {
            if matches!(event, DirectoryEvent::FetchFailed { .. }) {
                saw_failure = true;
            }
        }
        assert!(saw_failure);
    }

    #[tokio::test]
    async fn test_failed_page_can_be_retried() {
        let provider = provider_with(100, |_| false);
        let (list, _rx) = controller(&provider);
        list.load_more().await.unwrap();

        provider.fail_next(ProviderOp::ListGroups, ProviderError::Network("reset".to_string()));
        assert!(list.load_more().await.is_err());
        assert_eq!(list.items().len(), 60);
        assert_eq!(list.cursor(GroupFilter::All).page(), 1);

        assert_eq!(list.load_more().await.unwrap(), loaded(40, true));
        assert_eq!(
            provider.calls()[1..],
            [
                ProviderCall::ListGroups { page: 1 },
                ProviderCall::ListGroups { page: 1 }
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_flight_per_cursor() {
        let provider = provider_with(100, |_| true);
        provider.delay_next(ProviderOp::ListGroups, Duration::from_secs(1));
        let (list, _rx) = controller(&provider);

        let (first, second) = tokio::join!(list.load_more(), list.load_more());
        assert_eq!(first.unwrap(), loaded(60, false));
        assert_eq!(second.unwrap(), LoadOutcome::Skipped(SkipReason::InFlight));
        assert_eq!(provider.count_calls(ProviderOp::ListGroups), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_collections_fetch_independently() {
        let provider = provider_with(10, |_| true);
        provider.delay_next(ProviderOp::ListGroups, Duration::from_secs(1));
        let (list, _rx) = controller(&provider);

        let other = list.clone();
        let (all, mine) = tokio::join!(list.load_more(), async {
            tokio::task::yield_now().await;
            other.switch_filter(GroupFilter::Mine);
            other.load_more().await
        });
        assert_eq!(all.unwrap(), loaded(10, true));
        assert_eq!(mine.unwrap(), loaded(10, true));
    }

    #[tokio::test]
    async fn test_scroll_trigger_threshold() {
        let provider = provider_with(10, |_| false);
        let (list, _rx) = controller(&provider);

        let far = ScrollMetrics::new(0, 400, 1000);
        assert_eq!(
            list.on_scroll(far).await.unwrap(),
            LoadOutcome::Skipped(SkipReason::NotNearBottom)
        );
        assert!(provider.calls().is_empty());

        let near = ScrollMetrics::new(580, 400, 1000);
        assert_eq!(list.on_scroll(near).await.unwrap(), loaded(10, true));
    }

    #[tokio::test(start_paused = true)]
    async fn test_debounce_collapses_rapid_input() {
        let provider = provider_with(30, |_| false);
        let (list, _rx) = controller(&provider);
        list.mount().await.unwrap();
        provider.clear_calls();

        for text in ["t", "te", "tea", "team 01"] {
            list.search(text).await.unwrap();
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert!(provider.calls().is_empty());
        assert_eq!(list.pending_search().as_deref(), Some("team 01"));

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(
            provider.calls(),
            vec![ProviderCall::SearchGroups {
                query: "team 01".to_string(),
                restrict_to_user_id: None,
                page: 0,
            }]
        );
        assert_eq!(list.search_term(), "team 01");
        // "Team 001" and "Team 010" through "Team 019"
        assert_eq!(list.items().len(), 11);
        assert_eq!(list.collection_query(GroupFilter::All), "team 01");
        assert!(list.cursor(GroupFilter::All).is_exhausted());
    }

    #[tokio::test(start_paused = true)]
    async fn test_search_in_my_groups_is_restricted() {
        let provider = provider_with(6, |i| i < 3);
        let (list, _rx) = controller(&provider);
        list.mount().await.unwrap();
        list.switch_filter(GroupFilter::Mine);
        provider.clear_calls();

        list.search("team").await.unwrap();
        tokio::time::sleep(Duration::from_millis(350)).await;

        assert_eq!(
            provider.calls(),
            vec![ProviderCall::SearchGroups {
                query: "team".to_string(),
                restrict_to_user_id: Some(ME.to_string()),
                page: 0,
            }]
        );
        assert_eq!(list.items().len(), 3);
        // The other collection is untouched
        assert_eq!(list.collection_query(GroupFilter::All), "");
        assert_eq!(list.items_for(GroupFilter::All).len(), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_each_filter_keeps_its_own_search() {
        let provider = provider_with(6, |i| i % 2 == 1);
        let (list, _rx) = controller(&provider);
        list.mount().await.unwrap();

        list.search("team 001").await.unwrap();
        tokio::time::sleep(Duration::from_millis(350)).await;
        assert_eq!(list.items().len(), 1);

        list.switch_filter(GroupFilter::Mine);
        assert_eq!(list.search_term(), "");
        provider.clear_calls();
        // Nothing to clear on this filter
        list.search("").await.unwrap();
        assert!(provider.calls().is_empty());
        assert_eq!(list.items().len(), 3);

        list.switch_filter(GroupFilter::All);
        assert_eq!(list.search_term(), "team 001");
        assert_eq!(list.search_term(), list.collection_query(GroupFilter::All));
        assert_eq!(list.items().len(), 1);

        // The same text typed on the other filter still searches there
        list.switch_filter(GroupFilter::Mine);
        list.search("team 001").await.unwrap();
        tokio::time::sleep(Duration::from_millis(350)).await;
        assert_eq!(
            provider.calls(),
            vec![ProviderCall::SearchGroups {
                query: "team 001".to_string(),
                restrict_to_user_id: Some(ME.to_string()),
                page: 0,
            }]
        );
        assert_eq!(list.collection_query(GroupFilter::Mine), "team 001");

        list.switch_filter(GroupFilter::All);
        list.search("").await.unwrap();
        assert_eq!(list.items().len(), 6);
        assert_eq!(list.collection_query(GroupFilter::All), "");
        assert_eq!(list.collection_query(GroupFilter::Mine), "team 001");
    }

    #[tokio::test(start_paused = true)]
    async fn test_search_dropped_by_unmount_restores_query() {
        let provider = provider_with(4, |_| false);
        let (list, _rx) = controller(&provider);
        list.mount().await.unwrap();

        provider.delay_next(ProviderOp::SearchGroups, Duration::from_secs(2));
        list.search("team 002").await.unwrap();
        tokio::time::sleep(Duration::from_millis(350)).await;
        assert_eq!(list.collection_query(GroupFilter::All), "team 002");

        list.unmount();
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(list.collection_query(GroupFilter::All), "");
        assert_eq!(list.items().len(), 4);
        assert!(!list.is_loading());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_search_response_is_dropped() {
        let provider = Arc::new(InMemoryProvider::new(ME));
        provider.insert_group(Group::new("a", "Alpha Team", "alpha"), vec![]);
        provider.insert_group(Group::new("b", "Beta Team", "beta"), vec![]);
        let (list, _rx) = controller(&provider);
        list.mount().await.unwrap();

        provider.delay_next(ProviderOp::SearchGroups, Duration::from_secs(2));
        list.search("alpha").await.unwrap();
        tokio::time::sleep(Duration::from_millis(350)).await;
        // "alpha" is now in flight; commit a newer search
        list.search("beta").await.unwrap();
        tokio::time::sleep(Duration::from_millis(350)).await;
        assert_eq!(list.items().iter().map(|g| g.id.as_str()).collect::<Vec<_>>(), vec!["b"]);

        // Let the old response land
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(provider.count_calls(ProviderOp::SearchGroups), 2);
        assert_eq!(list.items().iter().map(|g| g.id.as_str()).collect::<Vec<_>>(), vec!["b"]);
        assert_eq!(list.search_term(), "beta");
        assert!(!list.is_loading());
    }

    #[tokio::test(start_paused = true)]
    async fn test_clearing_search_restores_listing_immediately() {
        let provider = provider_with(8, |_| false);
        let (list, _rx) = controller(&provider);
        list.mount().await.unwrap();

        list.search("team 003").await.unwrap();
        tokio::time::sleep(Duration::from_millis(350)).await;
        assert_eq!(list.items().len(), 1);
        provider.clear_calls();

        list.search("").await.unwrap();
        assert_eq!(provider.calls(), vec![ProviderCall::ListGroups { page: 0 }]);
        assert_eq!(list.items().len(), 8);
        assert_eq!(list.search_term(), "");
    }

    #[tokio::test(start_paused = true)]
    async fn test_load_more_continues_search_results() {
        let provider = provider_with(130, |_| false);
        let (list, _rx) = controller(&provider);
        list.mount().await.unwrap();

        list.search("team").await.unwrap();
        tokio::time::sleep(Duration::from_millis(350)).await;
        assert_eq!(list.items().len(), 60);

        list.load_more().await.unwrap();
        assert_eq!(
            provider.calls().last(),
            Some(&ProviderCall::SearchGroups {
                query: "team".to_string(),
                restrict_to_user_id: None,
                page: 1,
            })
        );
        assert_eq!(list.items().len(), 120);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unmount_cancels_pending_search() {
        let provider = provider_with(3, |_| false);
        let (list, mut rx) = controller(&provider);
        list.mount().await.unwrap();
        provider.clear_calls();

        list.search("team").await.unwrap();
        list.unmount();
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert!(provider.calls().is_empty());
        assert_eq!(list.pending_search(), None);
        let mut cleared = false;
        while let Ok(event) = rx.try_recv() {
            cleared |= event == DirectoryEvent::SearchTermCleared;
        }
        assert!(cleared);
    }

    #[tokio::test]
    async fn test_confirmed_join_updates_both_collections() {
        let provider = provider_with(3, |i| i == 0);
        let (list, _rx) = controller(&provider);
        list.mount().await.unwrap();

        // Viewer is not in g001
        list.perform("g001", MembershipAction::Join).await.unwrap();
        assert_eq!(list.group("g001").unwrap().member_count, 2);

        // Viewer is in g000, which sits in both collections
        list.perform("g000", MembershipAction::Leave).await.unwrap();
        assert_eq!(list.items_for(GroupFilter::All)[0].member_count, 1);
        assert_eq!(list.items_for(GroupFilter::Mine)[0].member_count, 1);
    }

    #[tokio::test]
    async fn test_join_then_leave_tracks_viewer_membership() {
        let provider = provider_with(2, |_| false);
        let (list, _rx) = controller(&provider);
        list.mount().await.unwrap();

        list.perform("g001", MembershipAction::Join).await.unwrap();
        let group = list.group("g001").unwrap();
        assert_eq!(group.member_count, 2);
        assert!(!list.allows(&group, &MembershipAction::Join));
        assert!(list.allows(&group, &MembershipAction::Leave));

        let err = list.perform("g001", MembershipAction::Join).await.unwrap_err();
        assert!(matches!(err, DirectoryError::NotPermitted { action: "join", .. }));
        assert_eq!(list.group("g001").unwrap().member_count, 2);
        assert_eq!(provider.count_calls(ProviderOp::AddMembers), 1);

        list.perform("g001", MembershipAction::Leave).await.unwrap();
        let group = list.group("g001").unwrap();
        assert_eq!(group.member_count, 1);
        assert_eq!(provider.member_ids("g001").len() as u32, group.member_count);
        assert!(list.allows(&group, &MembershipAction::Join));
    }

    #[tokio::test]
    async fn test_failed_join_leaves_count() {
        let provider = provider_with(1, |_| false);
        let (list, _rx) = controller(&provider);
        list.mount().await.unwrap();

        provider.fail_next(ProviderOp::AddMembers, ProviderError::Network("offline".to_string()));
        assert!(list.perform("g000", MembershipAction::Join).await.is_err());
        assert_eq!(list.group("g000").unwrap().member_count, 1);
    }

    #[tokio::test]
    async fn test_archive_drops_group_from_both_collections() {
        let provider = provider_with(3, |_| true);
        let (list, _rx) = controller(&provider);
        list.mount().await.unwrap();

        list.perform("g001", MembershipAction::Archive).await.unwrap();
        assert!(list.group("g001").is_none());
        assert_eq!(list.items_for(GroupFilter::All).len(), 2);
        assert_eq!(list.items_for(GroupFilter::Mine).len(), 2);

        let err = list.perform("g001", MembershipAction::Archive).await.unwrap_err();
        assert!(matches!(err, DirectoryError::UnknownGroup(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_states() {
        let provider = provider_with(2, |_| false);
        let (list, _rx) = controller(&provider);
        list.mount().await.unwrap();

        assert_eq!(list.empty_state(), None);
        list.switch_filter(GroupFilter::Mine);
        assert_eq!(list.empty_state(), Some(EmptyState::NoGroups));

        list.switch_filter(GroupFilter::All);
        list.search("nothing-matches").await.unwrap();
        tokio::time::sleep(Duration::from_millis(350)).await;
        assert_eq!(
            list.empty_state(),
            Some(EmptyState::NoSearchResults("nothing-matches".to_string()))
        );
    }
}
