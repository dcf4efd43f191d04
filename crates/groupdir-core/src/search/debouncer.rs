//! Search-input debouncing.
//!
//! The debouncer itself owns no timer; the controller schedules one from the
//! [`InputOutcome::Scheduled`] it gets back and hands the task's
//! [`AbortHandle`] over via [`SearchDebouncer::arm`]. A newer input aborts the
//! previous timer outright. Every committed query carries a token, and only
//! the most recent token is current: responses for older tokens are dropped.

use std::time::Duration;

use tokio::task::AbortHandle;

/// A committed search, ready to be issued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchTicket {
    pub token: u64,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputOutcome {
    /// Same text as the latest input; nothing to do.
    Unchanged,
    /// A pending search was dropped before it fired; the listing was never filtered.
    Cancelled,
    /// Search cleared: issue the unfiltered fetch right away.
    Immediate(SearchTicket),
    /// Start a timer for `delay`, then call [`SearchDebouncer::fire`] with `seq`.
    Scheduled { delay: Duration, seq: u64 },
}

#[derive(Debug)]
pub struct SearchDebouncer {
    delay: Duration,
    pending: Option<String>,
    committed: String,
    /// Bumped on every accepted input; a timer only fires for the latest one
    input_seq: u64,
    /// Token of the most recently committed query
    token: u64,
    timer: Option<AbortHandle>,
}

impl SearchDebouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
            committed: String::new(),
            input_seq: 0,
            token: 0,
            timer: None,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn pending(&self) -> Option<&str> {
        self.pending.as_deref()
    }

    pub fn committed(&self) -> &str {
        &self.committed
    }

    pub fn current_token(&self) -> u64 {
        self.token
    }

    pub fn has_timer(&self) -> bool {
        self.timer.is_some()
    }

    /// The text the search box currently shows.
    pub fn latest_text(&self) -> &str {
        self.pending.as_deref().unwrap_or(&self.committed)
    }

    pub fn on_input(&mut self, text: &str) -> InputOutcome {
        if text == self.latest_text() {
            return InputOutcome::Unchanged;
        }
        self.cancel_timer();
        self.input_seq += 1;

        if text.is_empty() {
            self.pending = None;
            if self.committed.is_empty() {
                return InputOutcome::Cancelled;
            }
            return InputOutcome::Immediate(self.commit(String::new()));
        }

        self.pending = Some(text.to_string());
        InputOutcome::Scheduled {
            delay: self.delay,
            seq: self.input_seq,
        }
    }

    /// Attach the timer started for input `seq`. A timer for an input that
    /// has already been superseded is aborted instead.
    pub fn arm(&mut self, seq: u64, handle: AbortHandle) {
        if seq != self.input_seq {
            handle.abort();
            return;
        }
        if self.pending.is_none() {
            // Already fired; the task now carries the committed search
            return;
        }
        self.cancel_timer();
        self.timer = Some(handle);
    }

    /// Timer expiry. Commits the pending text unless a newer input arrived
    /// after this timer was scheduled.
    pub fn fire(&mut self, seq: u64) -> Option<SearchTicket> {
        if seq != self.input_seq {
            return None;
        }
        self.timer = None;
        let text = self.pending.take()?;
        Some(self.commit(text))
    }

    pub fn is_current(&self, token: u64) -> bool {
        token == self.token
    }

    /// Drop pending and committed text; outstanding tokens become stale.
    pub fn reset(&mut self) {
        self.cancel_timer();
        self.input_seq += 1;
        self.pending = None;
        self.committed.clear();
        self.token += 1;
    }

    fn commit(&mut self, text: String) -> SearchTicket {
        self.token += 1;
        self.committed = text.clone();
        SearchTicket {
            token: self.token,
            text,
        }
    }

    fn cancel_timer(&mut self) {
        if let Some(handle) = self.timer.take() {
            handle.abort();
        }
    }
}

impl Drop for SearchDebouncer {
    fn drop(&mut self) {
        self.cancel_timer();
    }
}
