use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::timeout;
use url::Url;

use crate::browser::{BrowserSession, SessionLauncher};
use crate::data_models::{BookListing, RenderedPage, SearchQuery};
use crate::error::{ExtractionError, SearchError};
use crate::extraction::{ExtractionSchema, extract_entries};
use crate::filter::{RelevanceFilter, filter_entries};
use crate::target::SearchTarget;

#[derive(Debug, Clone, Copy)]
pub struct Limits {
    /// Ceiling on page load and initial render.
    pub navigation_timeout: Duration,
    /// Browser sessions allowed to run at once.
    pub max_sessions: usize,
    /// How long a request waits for a free session slot before giving up.
    pub queue_timeout: Duration,
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            navigation_timeout: Duration::from_secs(20),
            max_sessions: 4,
            queue_timeout: Duration::from_secs(5),
        }
    }
}

/// Turns a book name into purchase links by rendering a results page in a
/// throwaway browser session.
pub struct SearchService<L> {
    launcher: L,
    target: SearchTarget,
    schemas: Vec<ExtractionSchema>,
    filter: Box<dyn RelevanceFilter>,
    limits: Limits,
    sessions: Arc<Semaphore>,
}

impl<L: SessionLauncher> SearchService<L> {
    pub fn new(
        launcher: L,
        target: SearchTarget,
        schemas: Vec<ExtractionSchema>,
        filter: Box<dyn RelevanceFilter>,
        limits: Limits,
    ) -> SearchService<L> {
        SearchService {
            launcher,
            target,
            schemas,
            filter,
            sessions: Arc::new(Semaphore::new(limits.max_sessions.max(1))),
            limits,
        }
    }

    pub fn launcher(&self) -> &L {
        &self.launcher
    }

    #[tracing::instrument(skip(self), fields(results = tracing::field::Empty))]
    pub async fn search(&self, book_name: Option<&str>) -> Result<Vec<BookListing>, SearchError> {
        let query = SearchQuery::parse(book_name)?;
        let _permit = self.acquire_slot().await?;

        let target = self.target.url_for(&query)?;
        let page = self.render(&target).await?;
        let entries = extract_entries(&self.schemas, &page)?;
        let extracted = entries.len();

        let listings = filter_entries(entries, self.filter.as_ref(), &query);
        tracing::Span::current().record("results", listings.len());
        tracing::info!(
            "extracted {extracted} entries from {}, kept {}",
            page.url,
            listings.len()
        );

        Ok(listings)
    }

    async fn acquire_slot(&self) -> Result<OwnedSemaphorePermit, SearchError> {
        match timeout(
            self.limits.queue_timeout,
            self.sessions.clone().acquire_owned(),
        )
        .await
        {
            Ok(Ok(permit)) => Ok(permit),
            Ok(Err(_)) | Err(_) => {
                tracing::warn!(
                    "no browser slot freed up within {:?}",
                    self.limits.queue_timeout
                );
                Err(SearchError::Busy)
            }
        }
    }

    // The session is released whatever render returns; if this future is
    // dropped instead, the session's Drop does the cleanup.
    async fn render(&self, target: &Url) -> Result<RenderedPage, ExtractionError> {
        let mut session = self.launcher.launch().await?;

        let rendered = timeout(self.limits.navigation_timeout, session.render(target))
            .await
            .unwrap_or(Err(ExtractionError::Timeout(self.limits.navigation_timeout)));

        session.release().await;
        rendered
    }
}
