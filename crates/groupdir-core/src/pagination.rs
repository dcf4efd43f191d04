//! Per-collection paging state.
//!
//! A cursor counts the pages a collection has consumed, remembers whether the
//! provider has run out of rows, and allows at most one outstanding fetch.
//! Every fetch is described by a [`PageTicket`]; tickets issued before a
//! [`PaginationCursor::reset`] are stale and their results are ignored.

/// Handle for one outstanding page fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageTicket {
    pub page: u32,
    pub per_page: u32,
    epoch: u64,
}

/// Result of completing a page fetch against the cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageOutcome {
    /// The batch belonged to the current epoch and was consumed.
    Applied { added: usize, exhausted: bool },
    /// The cursor was reset while the fetch was outstanding.
    Stale,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaginationCursor {
    page: u32,
    page_size: u32,
    exhausted: bool,
    in_flight: bool,
    epoch: u64,
}

impl PaginationCursor {
    pub fn new(page_size: u32) -> Self {
        Self {
            page: 0,
            page_size: page_size.max(1),
            exhausted: false,
            in_flight: false,
            epoch: 0,
        }
    }

    /// Number of pages consumed so far, i.e. the next page to request.
    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    pub fn can_fetch(&self) -> bool {
        !self.exhausted && !self.in_flight
    }

    /// Start a fetch for the next page. Returns `None` when exhausted or
    /// when a fetch for this cursor is already outstanding.
    pub fn begin(&mut self) -> Option<PageTicket> {
        if !self.can_fetch() {
            return None;
        }
        self.in_flight = true;
        Some(PageTicket {
            page: self.page,
            per_page: self.page_size,
            epoch: self.epoch,
        })
    }

    pub fn advance(&mut self) -> u32 {
        self.page += 1;
        self.page
    }

    pub fn mark_exhausted(&mut self) {
        self.exhausted = true;
    }

    /// Back to page zero. Outstanding tickets become stale.
    pub fn reset(&mut self) {
        self.page = 0;
        self.exhausted = false;
        self.in_flight = false;
        self.epoch += 1;
    }

    /// Reset and immediately start the first page of the new epoch.
    pub fn restart(&mut self) -> PageTicket {
        self.reset();
        self.in_flight = true;
        PageTicket {
            page: 0,
            per_page: self.page_size,
            epoch: self.epoch,
        }
    }

    pub fn is_current(&self, ticket: &PageTicket) -> bool {
        ticket.epoch == self.epoch
    }

    /// Record a successful fetch of `batch_len` rows.
    pub fn complete(&mut self, ticket: &PageTicket, batch_len: usize) -> PageOutcome {
        if !self.is_current(ticket) {
            return PageOutcome::Stale;
        }
        self.in_flight = false;
        self.advance();
        if batch_len < self.page_size as usize {
            self.mark_exhausted();
        }
        PageOutcome::Applied {
            added: batch_len,
            exhausted: self.exhausted,
        }
    }

    /// Record a failed fetch. Page and exhaustion stay untouched so the same
    /// page can be retried. Returns false for a stale ticket.
    pub fn fail(&mut self, ticket: &PageTicket) -> bool {
        if !self.is_current(ticket) {
            return false;
        }
        self.in_flight = false;
        true
    }
}
