//! Candidate Filter
//!
//! Drops candidates that are malformed or come from blocked site sections
//! before they cost a fingerprint.

use newswire_core::Item;

/// Why a candidate was (or was not) let through
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterVerdict {
    Accepted,
    MissingTitle,
    MissingLink,
    /// Link contains the given block-list pattern
    Blocked(String),
}

/// Pure predicate over candidate items
#[derive(Debug, Clone)]
pub struct CandidateFilter {
    /// Lowercased link substrings
    block_list: Vec<String>,
}

impl CandidateFilter {
    pub fn new(block_list: &[String]) -> Self {
        Self {
            block_list: block_list
                .iter()
                .map(|p| p.to_lowercase())
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }

    pub fn verdict(&self, item: &Item) -> FilterVerdict {
        if item.title.trim().is_empty() {
            return FilterVerdict::MissingTitle;
        }
        if item.link.trim().is_empty() {
            return FilterVerdict::MissingLink;
        }

        let link = item.link.to_lowercase();
        match self.block_list.iter().find(|p| link.contains(p.as_str())) {
            Some(pattern) => FilterVerdict::Blocked(pattern.clone()),
            None => FilterVerdict::Accepted,
        }
    }

    pub fn accept(&self, item: &Item) -> bool {
        self.verdict(item) == FilterVerdict::Accepted
    }
}
