//! Text matching for directory searches.
//!
//! - Whitespace splits a query into terms that must ALL match
//! - A term may match any of the searchable fields of a row
//! - A leading '@' is ignored so mention handles can be typed as shown
//! - ASCII case-insensitive

use crate::models::{Group, Member};

/// Split a query into lowercase terms.
///
/// # Examples
/// - "design" -> ["design"]
/// - "  Design  Team " -> ["design", "team"]
/// - "@design" -> ["design"]
/// - "" -> []
pub fn parse_search_terms(query: &str) -> Vec<String> {
    query
        .split_whitespace()
        .map(|s| s.trim_start_matches('@').to_ascii_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

/// ASCII case-insensitive substring test. The empty term matches everything.
pub fn text_contains_term(text: &str, term: &str) -> bool {
    if term.is_empty() {
        return true;
    }
    let text = text.as_bytes();
    let term = term.as_bytes();
    if text.len() < term.len() {
        return false;
    }
    text.windows(term.len())
        .any(|window| window.eq_ignore_ascii_case(term))
}

/// True when every term is found in at least one of `fields`.
pub fn fields_match_all_terms(fields: &[&str], terms: &[String]) -> bool {
    terms
        .iter()
        .all(|term| fields.iter().any(|field| text_contains_term(field, term)))
}

pub fn group_matches(group: &Group, terms: &[String]) -> bool {
    fields_match_all_terms(&[&group.display_name, &group.mention_name], terms)
}

pub fn member_matches(member: &Member, terms: &[String]) -> bool {
    fields_match_all_terms(&[&member.username, &member.display_name], terms)
}
