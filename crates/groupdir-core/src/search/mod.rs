//! Search input handling and text matching shared across the directory.

pub mod debouncer;
pub mod matching;

pub use debouncer::{InputOutcome, SearchDebouncer, SearchTicket};
pub use matching::{group_matches, member_matches, parse_search_terms};
