use anyhow::{Context, Result, ensure};
use url::Url;
use url::form_urlencoded::byte_serialize;

use crate::data_models::SearchQuery;
use crate::error::ExtractionError;

pub const QUERY_PLACEHOLDER: &str = "{query}";

/// Results-page URL template with a `{query}` placeholder.
#[derive(Debug, Clone)]
pub struct SearchTarget {
    template: String,
}

impl SearchTarget {
    pub fn new(template: &str) -> Result<SearchTarget> {
        ensure!(
            template.contains(QUERY_PLACEHOLDER),
            "search url template {template:?} has no {QUERY_PLACEHOLDER} placeholder"
        );
        let sample = template.replace(QUERY_PLACEHOLDER, "probe");
        Url::parse(&sample)
            .with_context(|| format!("search url template {template:?} is not a valid url"))?;

        Ok(SearchTarget {
            template: template.to_string(),
        })
    }

    /// Interpolates the form-encoded query into the template.
    pub fn url_for(&self, query: &SearchQuery) -> Result<Url, ExtractionError> {
        let encoded: String = byte_serialize(query.as_str().as_bytes()).collect();
        Ok(Url::parse(&self.template.replace(QUERY_PLACEHOLDER, &encoded))?)
    }
}
