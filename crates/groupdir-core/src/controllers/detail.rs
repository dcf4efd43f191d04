//! State for the "group detail / member management" screen.
//!
//! One controller per drill-down. It holds the group's metadata, its paged
//! member list, a debounced member search, and the locally maintained member
//! count that confirmed mutations adjust.

use std::sync::Arc;

use futures::join;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use super::{LoadOutcome, ScrollMetrics, SkipReason};
use crate::config::DirectoryConfig;
use crate::error::{DirectoryError, ProviderResult};
use crate::events::{CollectionKind, DirectoryEvent, EventSink};
use crate::membership::{MembershipAction, MembershipMutator, MutationOutcome};
use crate::models::{Group, Member};
use crate::pagination::{PageOutcome, PageTicket, PaginationCursor};
use crate::provider::{MemberQuery, PageRequest, SharedProvider};
use crate::search::{InputOutcome, SearchDebouncer, SearchTicket};
use crate::store::PagedCollection;

struct DetailState {
    group: Option<Group>,
    members: PagedCollection<Member>,
    debouncer: SearchDebouncer,
    loading: bool,
    member_count: u32,
    archived: bool,
}

impl DetailState {
    /// Every member of an unsearched listing is materialized.
    fn all_members_loaded(&self) -> bool {
        self.group.is_some()
            && self.members.query().is_empty()
            && self.member_count > 0
            && self.members.len() >= self.member_count as usize
    }
}

#[derive(Clone)]
pub struct GroupDetailController {
    group_id: Arc<str>,
    state: Arc<Mutex<DetailState>>,
    provider: SharedProvider,
    mutator: MembershipMutator,
    config: Arc<DirectoryConfig>,
    events: EventSink,
}

impl GroupDetailController {
    pub fn new(
        group_id: impl Into<String>,
        provider: SharedProvider,
        mutator: MembershipMutator,
        config: Arc<DirectoryConfig>,
        events: EventSink,
    ) -> Self {
        let state = DetailState {
            group: None,
            members: PagedCollection::new(config.members_per_page),
            debouncer: SearchDebouncer::new(config.search_delay()),
            loading: false,
            member_count: 0,
            archived: false,
        };
        Self {
            group_id: Arc::from(group_id.into()),
            state: Arc::new(Mutex::new(state)),
            provider,
            mutator,
            config,
            events,
        }
    }

    pub fn group_id(&self) -> &str {
        &self.group_id
    }

    pub fn group(&self) -> Option<Group> {
        self.state.lock().group.clone()
    }

    pub fn members(&self) -> Vec<Member> {
        self.state.lock().members.items().to_vec()
    }

    pub fn member_count(&self) -> u32 {
        self.state.lock().member_count
    }

    pub fn cursor(&self) -> PaginationCursor {
        self.state.lock().members.cursor().clone()
    }

    pub fn is_loading(&self) -> bool {
        let state = self.state.lock();
        state.loading || state.members.cursor().is_in_flight()
    }

    pub fn is_archived(&self) -> bool {
        self.state.lock().archived
    }

    pub fn search_term(&self) -> String {
        self.state.lock().debouncer.committed().to_string()
    }

    pub fn pending_search(&self) -> Option<String> {
        self.state.lock().debouncer.pending().map(str::to_string)
    }

    /// Membership controls are hidden for externally managed groups.
    pub fn can_edit_membership(&self) -> bool {
        self.state
            .lock()
            .group
            .as_ref()
            .is_some_and(Group::is_membership_editable)
    }

    pub fn allows(&self, action: &MembershipAction) -> bool {
        self.state
            .lock()
            .group
            .as_ref()
            .is_some_and(|group| self.mutator.allows(group, action))
    }

    /// Fetch the group and the first member page concurrently.
    pub async fn enter(&self) -> Result<(), DirectoryError> {
        let (ticket, member_query) = {
            let mut state = self.state.lock();
            state.loading = true;
            let ticket = state.members.restart("");
            let query = MemberQuery::Page {
                group_id: self.group_id.to_string(),
                page: PageRequest::from(&ticket),
            };
            (ticket, query)
        };
        info!(group_id = %self.group_id, "entering group detail");

        let (group_result, member_result) = join!(
            self.provider
                .get_group(&self.group_id, self.config.include_member_count),
            member_query.send(self.provider.as_ref())
        );

        let mut state = self.state.lock();
        let group_outcome = match group_result {
            Ok(group) => {
                state.member_count = group.member_count;
                state.group = Some(group);
                Ok(())
            }
            Err(source) => {
                warn!(group_id = %self.group_id, error = %source, "group fetch failed");
                self.events.emit(DirectoryEvent::FetchFailed {
                    operation: "group",
                    message: source.to_string(),
                });
                Err(DirectoryError::fetch("group", source))
            }
        };
        let member_outcome = self.settle(&mut state, &ticket, member_query.operation(), member_result, false);
        state.loading = false;
        group_outcome.and(member_outcome).map(|_| ())
    }

    /// Screen left: drop any pending member search and clear the term.
    pub fn leave(&self) {
        self.state.lock().debouncer.reset();
        self.events.emit(DirectoryEvent::SearchTermCleared);
        debug!(group_id = %self.group_id, "left group detail");
    }

    pub async fn on_scroll(&self, metrics: ScrollMetrics) -> Result<LoadOutcome, DirectoryError> {
        if !metrics.is_near_bottom(self.config.scroll_threshold_px) {
            return Ok(LoadOutcome::Skipped(SkipReason::NotNearBottom));
        }
        self.load_more_members().await
    }

    pub async fn load_more_members(&self) -> Result<LoadOutcome, DirectoryError> {
        let (ticket, query) = {
            let mut state = self.state.lock();
            if state.loading {
                return Ok(LoadOutcome::Skipped(SkipReason::Loading));
            }
            if state.all_members_loaded() {
                state.members.mark_exhausted();
            }
            if state.members.cursor().is_exhausted() {
                return Ok(LoadOutcome::Skipped(SkipReason::Exhausted));
            }
            let Some(ticket) = state.members.begin_fetch() else {
                return Ok(LoadOutcome::Skipped(SkipReason::InFlight));
            };
            let query = MemberQuery::Page {
                group_id: self.group_id.to_string(),
                page: PageRequest::from(&ticket),
            };
            (ticket, query)
        };
        debug!(group_id = %self.group_id, page = ticket.page, "loading more members");

        let result = query.send(self.provider.as_ref()).await;

        let mut state = self.state.lock();
        self.settle(&mut state, &ticket, query.operation(), result, false)
    }

    /// Member search box input.
    pub async fn search(&self, text: &str) -> Result<(), DirectoryError> {
        let outcome = self.state.lock().debouncer.on_input(text);
        match outcome {
            InputOutcome::Unchanged | InputOutcome::Cancelled => Ok(()),
            InputOutcome::Immediate(ticket) => self.run_search(ticket).await.map(|_| ()),
            InputOutcome::Scheduled { delay, seq } => {
                let this = self.clone();
                let task = tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    this.fire_search(seq).await;
                });
                self.state.lock().debouncer.arm(seq, task.abort_handle());
                Ok(())
            }
        }
    }

    async fn fire_search(&self, seq: u64) {
        let ticket = self.state.lock().debouncer.fire(seq);
        if let Some(ticket) = ticket {
            if let Err(err) = self.run_search(ticket).await {
                warn!(group_id = %self.group_id, error = %err, "member search failed");
            }
        }
    }

    async fn run_search(&self, ticket: SearchTicket) -> Result<LoadOutcome, DirectoryError> {
        let (previous, page_ticket, query) = {
            let mut state = self.state.lock();
            if !state.debouncer.is_current(ticket.token) {
                return Ok(LoadOutcome::Stale);
            }
            let previous = state.members.query().to_string();
            let page_ticket = state.members.restart(&ticket.text);
            let query = if ticket.text.is_empty() {
                MemberQuery::Page {
                    group_id: self.group_id.to_string(),
                    page: PageRequest::from(&page_ticket),
                }
            } else {
                MemberQuery::Search {
                    group_id: self.group_id.to_string(),
                    query: ticket.text.clone(),
                }
            };
            (previous, page_ticket, query)
        };
        debug!(token = ticket.token, term = %ticket.text, "issuing member search");

        let result = query.send(self.provider.as_ref()).await;

        let mut state = self.state.lock();
        if !state.debouncer.is_current(ticket.token) {
            debug!(token = ticket.token, "dropping stale member search response");
            state.members.abandon(&page_ticket, &previous);
            return Ok(LoadOutcome::Stale);
        }
        let unpaginated = matches!(query, MemberQuery::Search { .. });
        self.settle(&mut state, &page_ticket, query.operation(), result, unpaginated)
    }

    pub fn increment_member_count(&self, n: u32) -> u32 {
        let mut state = self.state.lock();
        let count = state.member_count.saturating_add(n);
        self.set_member_count(&mut state, count)
    }

    pub fn decrement_member_count(&self, n: u32) -> u32 {
        let mut state = self.state.lock();
        let count = state.member_count.saturating_sub(n);
        self.set_member_count(&mut state, count)
    }

    /// Run a membership action against the loaded group and apply the
    /// confirmed outcome locally.
    pub async fn perform(&self, action: MembershipAction) -> Result<MutationOutcome, DirectoryError> {
        let group = self.group().ok_or(DirectoryError::GroupNotLoaded)?;
        let outcome = self.mutator.apply(&group, action).await?;
        self.apply_outcome(&outcome);
        Ok(outcome)
    }

    pub fn apply_outcome(&self, outcome: &MutationOutcome) {
        match outcome {
            MutationOutcome::MembersChanged {
                delta,
                removed_user_ids,
                viewer_is_member,
                ..
            } => {
                if let Some(is_member) = viewer_is_member {
                    if let Some(group) = self.state.lock().group.as_mut() {
                        group.set_viewer_membership(*is_member);
                    }
                }
                let magnitude = u32::try_from(delta.unsigned_abs()).unwrap_or(u32::MAX);
                if *delta > 0 {
                    self.increment_member_count(magnitude);
                } else if *delta < 0 {
                    self.decrement_member_count(magnitude);
                }
                if !removed_user_ids.is_empty() {
                    let evicted = self.state.lock().members.remove_all(removed_user_ids);
                    debug!(group_id = %self.group_id, evicted, "evicted member rows");
                }
            }
            MutationOutcome::Archived { .. } => {
                self.state.lock().archived = true;
            }
        }
    }

    fn set_member_count(&self, state: &mut DetailState, count: u32) -> u32 {
        state.member_count = count;
        if let Some(group) = state.group.as_mut() {
            group.member_count = count;
        }
        self.events.emit(DirectoryEvent::MemberCountChanged {
            group_id: self.group_id.to_string(),
            member_count: count,
        });
        count
    }

    fn settle(
        &self,
        state: &mut DetailState,
        ticket: &PageTicket,
        operation: &'static str,
        result: ProviderResult<Vec<Member>>,
        unpaginated: bool,
    ) -> Result<LoadOutcome, DirectoryError> {
        match result {
            Ok(batch) => match state.members.apply_page(ticket, batch) {
                PageOutcome::Stale => {
                    debug!(group_id = %self.group_id, page = ticket.page, "dropping stale member page");
                    Ok(LoadOutcome::Stale)
                }
                PageOutcome::Applied { added, mut exhausted } => {
                    if !exhausted && (unpaginated || state.all_members_loaded()) {
                        state.members.mark_exhausted();
                        exhausted = true;
                    }
                    if exhausted {
                        debug!(group_id = %self.group_id, rows = state.members.len(), "member list exhausted");
                        self.events
                            .emit(DirectoryEvent::CollectionExhausted(CollectionKind::Members {
                                group_id: self.group_id.to_string(),
                            }));
                    }
                    Ok(LoadOutcome::Loaded { added, exhausted })
                }
            },
            Err(source) => {
                if !state.members.fail(ticket) {
                    return Ok(LoadOutcome::Stale);
                }
                warn!(operation, group_id = %self.group_id, error = %source, "member fetch failed");
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
    use crate::models::GroupSource;
    use crate::store::{InMemoryProvider, ProviderCall, ProviderOp};
    use std::time::Duration;

    const ME: &str = "me";

    fn provider_with_members(group_id: &str, count: usize) -> Arc<InMemoryProvider> {
        let provider = Arc::new(InMemoryProvider::new(ME));
        for i in 0..count {
            provider.add_user(Member::new(format!("u{}", i), format!("user{}", i), format!("User {}", i)));
        }
        let members = (0..count).map(|i| format!("u{}", i)).collect();
        provider.insert_group(Group::new(group_id, "Design", "design"), members);
        provider
    }

    fn controller(provider: &Arc<InMemoryProvider>, group_id: &str) -> GroupDetailController {
        let events = EventSink::disabled();
        let mutator = MembershipMutator::new(provider.clone(), ME, events.clone());
        GroupDetailController::new(
            group_id,
            provider.clone(),
            mutator,
            Arc::new(DirectoryConfig::new(ME)),
            events,
        )
    }

    #[tokio::test]
    async fn test_enter_loads_group_and_members() {
        let provider = provider_with_members("g1", 5);
        let detail = controller(&provider, "g1");

        detail.enter().await.unwrap();
        assert!(!detail.is_loading());
        assert_eq!(detail.group().unwrap().display_name, "Design");
        assert_eq!(detail.member_count(), 5);
        assert_eq!(detail.members().len(), 5);
        assert!(detail.cursor().is_exhausted());
        assert!(detail.can_edit_membership());
    }

    #[tokio::test]
    async fn test_member_paging() {
        let provider = provider_with_members("g1", 130);
        let detail = controller(&provider, "g1");
        detail.enter().await.unwrap();
        assert_eq!(detail.members().len(), 60);

        assert_eq!(
            detail.load_more_members().await.unwrap(),
            LoadOutcome::Loaded {
                added: 60,
                exhausted: false
            }
        );
        assert_eq!(
            detail.load_more_members().await.unwrap(),
            LoadOutcome::Loaded {
                added: 10,
                exhausted: true
            }
        );
        assert_eq!(detail.members().len(), 130);
    }

    #[tokio::test]
    async fn test_exhaustion_inferred_from_member_count() {
        let provider = provider_with_members("g1", 60);
        let detail = controller(&provider, "g1");
        detail.enter().await.unwrap();

        // A full page, but every member is already materialized
        assert!(detail.cursor().is_exhausted());
        assert_eq!(
            detail.load_more_members().await.unwrap(),
            LoadOutcome::Skipped(SkipReason::Exhausted)
        );
        assert_eq!(provider.count_calls(ProviderOp::ListMembers), 1);
    }

    #[tokio::test]
    async fn test_count_consistency() {
        let provider = provider_with_members("g1", 5);
        let detail = controller(&provider, "g1");
        detail.enter().await.unwrap();

        provider.fail_next(ProviderOp::AddMembers, ProviderError::Network("offline".to_string()));
        assert!(detail.perform(MembershipAction::Join).await.is_err());
        assert_eq!(detail.member_count(), 5);

        detail.perform(MembershipAction::Join).await.unwrap();
        assert_eq!(detail.member_count(), 6);
        assert_eq!(detail.group().unwrap().member_count, 6);

        detail
            .perform(MembershipAction::Remove(vec!["u1".to_string(), "u3".to_string()]))
            .await
            .unwrap();
        assert_eq!(detail.member_count(), 4);
        let ids: Vec<String> = detail.members().into_iter().map(|m| m.id).collect();
        assert_eq!(ids, vec!["u0", "u2", "u4"]);
    }

    #[tokio::test]
    async fn test_remove_two_of_five() {
        let provider = provider_with_members("g1", 5);
        let detail = controller(&provider, "g1");
        detail.enter().await.unwrap();

        detail
            .perform(MembershipAction::Remove(vec!["u0".to_string(), "u4".to_string()]))
            .await
            .unwrap();
        assert_eq!(detail.member_count(), 3);
        let ids: Vec<String> = detail.members().into_iter().map(|m| m.id).collect();
        assert_eq!(ids, vec!["u1", "u2", "u3"]);
    }

    #[tokio::test]
    async fn test_count_adjustments_saturate() {
        let provider = provider_with_members("g1", 2);
        let detail = controller(&provider, "g1");
        detail.enter().await.unwrap();

        assert_eq!(detail.decrement_member_count(5), 0);
        assert_eq!(detail.increment_member_count(3), 3);
        assert_eq!(detail.group().unwrap().member_count, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_member_search_and_clear() {
        let provider = provider_with_members("g1", 80);
        let detail = controller(&provider, "g1");
        detail.enter().await.unwrap();
        provider.clear_calls();

        detail.search("user7").await.unwrap();
        tokio::time::sleep(Duration::from_millis(350)).await;
        assert_eq!(
            provider.calls(),
            vec![ProviderCall::SearchMembers {
                group_id: "g1".to_string(),
                query: "user7".to_string(),
            }]
        );
        // user7 and user70 through user79
        assert_eq!(detail.members().len(), 11);
        assert!(detail.cursor().is_exhausted());
        assert_eq!(
            detail.load_more_members().await.unwrap(),
            LoadOutcome::Skipped(SkipReason::Exhausted)
        );

        provider.clear_calls();
        detail.search("").await.unwrap();
        assert_eq!(
            provider.calls(),
            vec![ProviderCall::ListMembers {
                group_id: "g1".to_string(),
                page: 0,
            }]
        );
        assert_eq!(detail.members().len(), 60);
        assert!(!detail.cursor().is_exhausted());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_member_search_is_dropped() {
        let provider = provider_with_members("g1", 30);
        let detail = controller(&provider, "g1");
        detail.enter().await.unwrap();

        provider.delay_next(ProviderOp::SearchMembers, Duration::from_secs(2));
        detail.search("user1").await.unwrap();
        tokio::time::sleep(Duration::from_millis(350)).await;
        // "user1" is still in flight
        detail.search("user2").await.unwrap();
        tokio::time::sleep(Duration::from_millis(350)).await;

        let usernames = |detail: &GroupDetailController| -> Vec<String> {
            detail.members().into_iter().map(|m| m.username).collect()
        };
        // user2 and user20 through user29
        assert_eq!(detail.members().len(), 11);
        assert!(usernames(&detail).iter().all(|u| u.starts_with("user2")));

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(provider.count_calls(ProviderOp::SearchMembers), 2);
        assert_eq!(detail.members().len(), 11);
        assert!(usernames(&detail).iter().all(|u| u.starts_with("user2")));
        assert_eq!(detail.search_term(), "user2");
        assert!(!detail.is_loading());
        assert!(detail.cursor().is_exhausted());
    }

    #[tokio::test]
    async fn test_join_then_leave_flips_permissions() {
        let provider = provider_with_members("g1", 3);
        let detail = controller(&provider, "g1");
        detail.enter().await.unwrap();
        assert!(detail.allows(&MembershipAction::Join));
        assert!(!detail.allows(&MembershipAction::Leave));

        detail.perform(MembershipAction::Join).await.unwrap();
        assert_eq!(detail.member_count(), 4);
        assert!(detail.allows(&MembershipAction::Leave));

        let err = detail.perform(MembershipAction::Join).await.unwrap_err();
        assert!(matches!(err, DirectoryError::NotPermitted { action: "join", .. }));
        assert_eq!(detail.member_count(), 4);

        detail.perform(MembershipAction::Leave).await.unwrap();
        assert_eq!(detail.member_count(), 3);
        assert_eq!(provider.member_ids("g1").len(), 3);
        assert!(detail.allows(&MembershipAction::Join));
    }

    #[tokio::test(start_paused = true)]
    async fn test_leave_cancels_pending_search() {
        let provider = provider_with_members("g1", 3);
        let detail = controller(&provider, "g1");
        detail.enter().await.unwrap();
        provider.clear_calls();

        detail.search("user1").await.unwrap();
        detail.leave();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(provider.calls().is_empty());
        assert_eq!(detail.search_term(), "");
    }

    #[tokio::test]
    async fn test_external_group_is_read_only() {
        let provider = Arc::new(InMemoryProvider::new(ME));
        let mut staff = Group::new("g9", "Staff", "staff");
        staff.source = GroupSource::ExternalDirectory;
        provider.insert_group(staff, vec!["u1".to_string()]);
        let detail = controller(&provider, "g9");
        detail.enter().await.unwrap();

        assert!(!detail.can_edit_membership());
        assert!(!detail.allows(&MembershipAction::Join));
        let err = detail.perform(MembershipAction::Join).await.unwrap_err();
        assert!(matches!(err, DirectoryError::ReadOnlyGroup(_)));
        assert_eq!(provider.count_calls(ProviderOp::AddMembers), 0);
    }

    #[tokio::test]
    async fn test_perform_before_group_loaded() {
        let provider = provider_with_members("g1", 1);
        provider.fail_next(ProviderOp::GetGroup, ProviderError::NotFound("g1".to_string()));
        let detail = controller(&provider, "g1");

        let err = detail.enter().await.unwrap_err();
        assert!(matches!(err, DirectoryError::Fetch { operation: "group", .. }));
        assert_eq!(detail.members().len(), 1);

        let err = detail.perform(MembershipAction::Archive).await.unwrap_err();
        assert!(matches!(err, DirectoryError::GroupNotLoaded));
    }

    #[tokio::test]
    async fn test_archive_marks_detail() {
        let provider = provider_with_members("g1", 1);
        let detail = controller(&provider, "g1");
        detail.enter().await.unwrap();

        detail.perform(MembershipAction::Archive).await.unwrap();
        assert!(detail.is_archived());
        assert!(provider.is_archived("g1"));
    }
}
