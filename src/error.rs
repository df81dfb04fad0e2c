use std::time::Duration;

/// Anything that goes wrong between launching the browser and having entries in hand.
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    #[error("failed to launch browser: {0}")]
    Launch(String),

    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("page did not render within {0:?}")]
    Timeout(Duration),

    #[error("page at {0} has no content to extract from")]
    EmptyPage(String),

    #[error("invalid target url: {0}")]
    InvalidTarget(#[from] url::ParseError),
}

/// Errors surfaced by a search request. Each maps to one HTTP status.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("Book name is required")]
    InvalidInput,

    #[error("no browser session available")]
    Busy,

    #[error(transparent)]
    ExtractionFailure(#[from] ExtractionError),
}

/// Problems with a configured extraction schema, caught at startup.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("no extraction schema configured")]
    Empty,

    #[error("{field} selector is empty")]
    Blank { field: &'static str },

    #[error("invalid {field} selector {selector:?}: {reason}")]
    Invalid {
        field: &'static str,
        selector: String,
        reason: String,
    },
}
