use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::SearchError;

/// A book title as typed by the user, trimmed. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery(String);

impl SearchQuery {
    /// Accepts the raw `bookName` parameter. Missing and blank input are both rejected.
    pub fn parse(raw: Option<&str>) -> Result<SearchQuery, SearchError> {
        match raw.map(str::trim) {
            Some(q) if !q.is_empty() => Ok(SearchQuery(q.to_string())),
            _ => Err(SearchError::InvalidInput),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SearchQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One result card as it came out of the page. Either field may be missing.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResultEntry {
    pub title: Option<String>,
    pub link: Option<String>,
}

impl ResultEntry {
    pub fn new(title: Option<String>, link: Option<String>) -> ResultEntry {
        ResultEntry { title, link }
    }

    /// `None` when the title or the link is missing.
    pub fn into_listing(self) -> Option<BookListing> {
        Some(BookListing {
            title: self.title?,
            link: self.link?,
        })
    }
}

/// A complete result as returned to clients.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct BookListing {
    pub title: String,
    pub link: String,
}

impl BookListing {
    pub fn new(title: impl Into<String>, link: impl Into<String>) -> BookListing {
        BookListing {
            title: title.into(),
            link: link.into(),
        }
    }
}

/// The DOM of a page after its initial render, with the URL it ended up at.
#[derive(Debug, Clone)]
pub struct RenderedPage {
    pub url: Url,
    pub html: String,
}

impl RenderedPage {
    pub fn new(url: Url, html: impl Into<String>) -> RenderedPage {
        RenderedPage {
            url,
            html: html.into(),
        }
    }
}
