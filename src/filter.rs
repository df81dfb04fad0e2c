use std::str::FromStr;

use crate::data_models::{BookListing, ResultEntry, SearchQuery};

/// Decides whether a listing has anything to do with the book being searched for.
pub trait RelevanceFilter: Send + Sync {
    fn is_relevant(&self, listing: &BookListing, query: &SearchQuery) -> bool;
}

/// Keeps listings whose link mentions a marketplace-ish token (`book`, `shop`, `store`, ...).
#[derive(Debug, Clone)]
pub struct MarketplaceLinkFilter {
    tokens: Vec<String>,
}

impl MarketplaceLinkFilter {
    pub fn new<I, S>(tokens: I) -> MarketplaceLinkFilter
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        MarketplaceLinkFilter {
            tokens: tokens
                .into_iter()
                .map(|t| t.as_ref().trim().to_lowercase())
                .filter(|t| !t.is_empty())
                .collect(),
        }
    }
}

impl Default for MarketplaceLinkFilter {
    fn default() -> Self {
        MarketplaceLinkFilter::new(DEFAULT_MARKETPLACE_TOKENS)
    }
}

pub const DEFAULT_MARKETPLACE_TOKENS: [&str; 3] = ["book", "shop", "store"];

impl RelevanceFilter for MarketplaceLinkFilter {
    fn is_relevant(&self, listing: &BookListing, _query: &SearchQuery) -> bool {
        let link = listing.link.to_lowercase();
        self.tokens.iter().any(|t| link.contains(t.as_str()))
    }
}

/// Keeps listings whose title contains the query, ignoring case.
#[derive(Debug, Clone, Copy, Default)]
pub struct TitleMatchFilter;

impl RelevanceFilter for TitleMatchFilter {
    fn is_relevant(&self, listing: &BookListing, query: &SearchQuery) -> bool {
        listing
            .title
            .to_lowercase()
            .contains(&query.as_str().to_lowercase())
    }
}

/// Passes when any inner filter passes.
pub struct AnyOf(Vec<Box<dyn RelevanceFilter>>);

impl AnyOf {
    pub fn new(filters: Vec<Box<dyn RelevanceFilter>>) -> AnyOf {
        AnyOf(filters)
    }
}

impl RelevanceFilter for AnyOf {
    fn is_relevant(&self, listing: &BookListing, query: &SearchQuery) -> bool {
        self.0.iter().any(|f| f.is_relevant(listing, query))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RelevanceMode {
    Link,
    Title,
    #[default]
    Either,
}

impl RelevanceMode {
    pub fn build(self, marketplace_tokens: &[String]) -> Box<dyn RelevanceFilter> {
        let link = || MarketplaceLinkFilter::new(marketplace_tokens);
        match self {
            RelevanceMode::Link => Box::new(link()),
            RelevanceMode::Title => Box::new(TitleMatchFilter),
            RelevanceMode::Either => Box::new(AnyOf::new(vec![
                Box::new(link()),
                Box::new(TitleMatchFilter),
            ])),
        }
    }
}

impl FromStr for RelevanceMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "link" => Ok(RelevanceMode::Link),
            "title" => Ok(RelevanceMode::Title),
            "either" => Ok(RelevanceMode::Either),
            other => Err(format!(
                "unknown relevance mode {other:?}, expected link, title or either"
            )),
        }
    }
}

/// Drops incomplete entries, then the ones the filter rejects. Order is preserved.
pub fn filter_entries(
    entries: Vec<ResultEntry>,
    filter: &dyn RelevanceFilter,
    query: &SearchQuery,
) -> Vec<BookListing> {
    entries
        .into_iter()
        .filter_map(ResultEntry::into_listing)
        .filter(|listing| filter.is_relevant(listing, query))
        .collect()
}
