//! Keyword queries over paper titles and abstracts.
//!
//! Matching is plain substring containment on lower-cased text, not word
//! matching. Short terms over-match: "face" hits "surface" and "interface".

use serde::{Deserialize, Serialize};

/// Conjunction of OR-groups: `[["a", "b"], ["c"]]` reads `(a OR b) AND c`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<Vec<String>>", into = "Vec<Vec<String>>")]
pub struct AndOrQuery {
    groups: Vec<Vec<String>>,
}

impl AndOrQuery {
    /// Build a query, lower-casing every term.
    pub fn new<G, S>(groups: G) -> Self
    where
        G: IntoIterator,
        G::Item: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let groups = groups
            .into_iter()
            .map(|group| group.into_iter().map(|s| s.as_ref().to_lowercase()).collect())
            .collect();
        Self { groups }
    }

    pub fn groups(&self) -> &[Vec<String>] {
        &self.groups
    }

    /// An empty OR-group can never be satisfied, so it rejects every text.
    pub fn has_empty_group(&self) -> bool {
        self.groups.iter().any(|group| group.is_empty())
    }
}

impl From<Vec<Vec<String>>> for AndOrQuery {
    fn from(groups: Vec<Vec<String>>) -> Self {
        Self::new(groups)
    }
}

impl From<AndOrQuery> for Vec<Vec<String>> {
    fn from(query: AndOrQuery) -> Self {
        query.groups
    }
}

/// Flat exclusion list: any hit rejects the text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct NotQuery {
    terms: Vec<String>,
}

impl NotQuery {
    /// Build a query, lower-casing every term.
    pub fn new<I, S>(terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            terms: terms.into_iter().map(|s| s.as_ref().to_lowercase()).collect(),
        }
    }

    pub fn terms(&self) -> &[String] {
        &self.terms
    }
}

impl From<Vec<String>> for NotQuery {
    fn from(terms: Vec<String>) -> Self {
        Self::new(terms)
    }
}

impl From<NotQuery> for Vec<String> {
    fn from(query: NotQuery) -> Self {
        query.terms
    }
}

/// True iff every OR-group has at least one term occurring in `text`.
///
/// `text` must already be lower-cased. An empty query matches everything.
pub fn matches_and_or(text: &str, query: &AndOrQuery) -> bool {
    query
        .groups
        .iter()
        .all(|group| group.iter().any(|term| text.contains(term.as_str())))
}

/// True iff any term occurs in `text`, i.e. the text should be excluded.
pub fn matches_not(text: &str, query: &NotQuery) -> bool {
    query.terms.iter().any(|term| text.contains(term.as_str()))
}
