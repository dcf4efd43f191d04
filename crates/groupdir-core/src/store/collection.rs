use crate::models::{Group, Member};
use crate::pagination::{PageOutcome, PageTicket, PaginationCursor};

/// Rows that can be de-duplicated by id.
pub trait Keyed {
    fn key(&self) -> &str;
}

impl Keyed for Group {
    fn key(&self) -> &str {
        &self.id
    }
}

impl Keyed for Member {
    fn key(&self) -> &str {
        &self.id
    }
}

/// Materialized slice of one paginated collection.
///
/// `query` is the search text the rows reflect (empty = unfiltered listing).
#[derive(Debug, Clone)]
pub struct PagedCollection<T> {
    items: Vec<T>,
    cursor: PaginationCursor,
    query: String,
}

impl<T: Keyed + Clone> PagedCollection<T> {
    pub fn new(page_size: u32) -> Self {
        Self {
            items: Vec::new(),
            cursor: PaginationCursor::new(page_size),
            query: String::new(),
        }
    }

    // ===== Getters =====

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn cursor(&self) -> &PaginationCursor {
        &self.cursor
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn get(&self, id: &str) -> Option<&T> {
        self.items.iter().find(|i| i.key() == id)
    }

    // ===== Paging =====

    pub fn begin_fetch(&mut self) -> Option<PageTicket> {
        self.cursor.begin()
    }

    /// Reset the cursor for a new query and start its first page.
    /// Rows stay visible until the first page lands.
    pub fn restart(&mut self, query: &str) -> PageTicket {
        self.query = query.to_string();
        self.cursor.restart()
    }

    /// Merge a fetched batch. Page zero replaces the rows; later pages
    /// append, skipping ids already present.
    pub fn apply_page(&mut self, ticket: &PageTicket, batch: Vec<T>) -> PageOutcome {
        if !self.cursor.is_current(ticket) {
            return PageOutcome::Stale;
        }
        let fetched = batch.len();
        if ticket.page == 0 {
            self.items.clear();
        }
        for item in batch {
            if !self.items.iter().any(|i| i.key() == item.key()) {
                self.items.push(item);
            }
        }
        self.cursor.complete(ticket, fetched)
    }

    pub fn fail(&mut self, ticket: &PageTicket) -> bool {
        self.cursor.fail(ticket)
    }

    /// Give up on a restarted query whose response was discarded. If nothing
    /// restarted the collection since, the query goes back to `previous`, the
    /// text the rows still reflect. The next fetch starts over at page zero.
    pub fn abandon(&mut self, ticket: &PageTicket, previous: &str) -> bool {
        if !self.cursor.fail(ticket) {
            return false;
        }
        self.query = previous.to_string();
        true
    }

    pub fn mark_exhausted(&mut self) {
        self.cursor.mark_exhausted();
    }

    // ===== Mutations =====

    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.items.len();
        self.items.retain(|i| i.key() != id);
        self.items.len() != before
    }

    /// Evict every row whose id is listed. Returns how many were removed.
    pub fn remove_all(&mut self, ids: &[String]) -> usize {
        let before = self.items.len();
        self.items.retain(|i| !ids.iter().any(|id| id == i.key()));
        before - self.items.len()
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut T> {
        self.items.iter_mut().find(|i| i.key() == id)
    }
}
