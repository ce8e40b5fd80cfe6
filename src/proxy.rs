//! Recommendation proxy
//!
//! Sends recommendation, similar-books and diversity queries to whichever backend is active and
//! turns the returned `book_id`s into full books through the [`BookLookup`] collaborator.
//!
//! Recommendations are an enhancement, never a dependency: every failure on the way (no usable
//! base URL, transport error, non-2xx status, malformed body, timeout) is logged and becomes an
//! empty result. Books that fail to hydrate are dropped individually.
use futures_util::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, instrument, warn};
use url::Url;

use crate::catalog::BookLookup;
use crate::client::{HttpClient, get_json_bytes};
use crate::errors::BackendError;
use crate::models::{BackendItems, BookResponse, DiversityBooksResponse, RecommendationItem};
use crate::router::RecsysRouter;

/// Smallest and largest `limit` accepted for similar-books and diversity queries.
pub const MIN_LIMIT: i64 = 1;
pub const MAX_LIMIT: i64 = 100;

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Catalog lookups in flight at once while hydrating a single response.
pub const MAX_CONCURRENT_LOOKUPS: usize = 8;

pub fn is_valid_limit(limit: i64) -> bool {
    (MIN_LIMIT..=MAX_LIMIT).contains(&limit)
}

#[derive(Debug, Clone)]
pub struct RecommendationProxy<T: HttpClient> {
    router: Arc<RecsysRouter>,
    http_client: T,
    books: Arc<dyn BookLookup>,
    timeout: Duration,
}

impl<T: HttpClient + Send + Sync> RecommendationProxy<T> {
    pub fn new(
        router: Arc<RecsysRouter>,
        http_client: T,
        books: Arc<dyn BookLookup>,
        timeout: Duration,
    ) -> Self {
        Self {
            router,
            http_client,
            books,
            timeout,
        }
    }

    pub fn router(&self) -> &Arc<RecsysRouter> {
        &self.router
    }

    /// Personalised recommendations for `user_id`, in backend rank order. `limit` is forwarded
    /// as given; a non-negative one also caps how many items are hydrated.
    #[instrument(skip(self))]
    pub async fn get_recommendations(&self, user_id: i64, limit: i64) -> Vec<BookResponse> {
        let query = [("user_id", user_id), ("limit", limit)];
        self.recommend("recommendations", &query, usize::try_from(limit).ok())
            .await
    }

    /// Books similar to `book_id`. Out-of-range limits short-circuit without a backend call.
    #[instrument(skip(self))]
    pub async fn get_similar_books(&self, book_id: i64, limit: i64) -> Vec<BookResponse> {
        if !is_valid_limit(limit) {
            debug!("Similar-books limit out of range, skipping backend");
            return Vec::new();
        }
        let query = [("book_id", book_id), ("limit", limit)];
        self.recommend("similar", &query, usize::try_from(limit).ok())
            .await
    }

    /// A deliberately varied set of books around `book_id`.
    #[instrument(skip(self))]
    pub async fn get_diversity_books(&self, book_id: i64, limit: i64) -> DiversityBooksResponse {
        if !is_valid_limit(limit) {
            debug!("Diversity limit out of range, skipping backend");
            return DiversityBooksResponse::default();
        }
        let query = [("book_id", book_id), ("limit", limit)];
        DiversityBooksResponse {
            items: self
                .recommend("diversity", &query, usize::try_from(limit).ok())
                .await,
        }
    }

    async fn recommend(
        &self,
        endpoint: &str,
        query: &[(&str, i64)],
        max_items: Option<usize>,
    ) -> Vec<BookResponse> {
        let (model, base_url) = match self.router.active_backend() {
            Ok(active) => active,
            Err(e) => {
                error!(endpoint, error = %e, "Recommender backend is misconfigured");
                return Vec::new();
            }
        };

        match self.fetch_items(base_url, endpoint, query).await {
            Ok(mut items) => {
                if let Some(max_items) = max_items {
                    items.truncate(max_items);
                }
                self.hydrate(items).await
            }
            Err(e) => {
                warn!(
                    endpoint,
                    model = %model,
                    error = %e,
                    "Recommender backend call failed, returning no results"
                );
                Vec::new()
            }
        }
    }

    async fn fetch_items(
        &self,
        base_url: Url,
        endpoint: &str,
        query: &[(&str, i64)],
    ) -> Result<Vec<RecommendationItem>, BackendError> {
        let url = endpoint_url(base_url, endpoint, query)?;
        debug!(%url, "Calling recommender backend");

        let (status, body) = get_json_bytes(&self.http_client, &url, self.timeout).await?;
        if !status.is_success() {
            return Err(BackendError::Status(status));
        }
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }

        let parsed: BackendItems =
            serde_json::from_slice(&body).map_err(|e| BackendError::Malformed(e.to_string()))?;
        Ok(parsed.into_items())
    }

    /// Looks items up with at most [`MAX_CONCURRENT_LOOKUPS`] in flight; the output keeps the
    /// backend's order.
    async fn hydrate(&self, items: Vec<RecommendationItem>) -> Vec<BookResponse> {
        stream::iter(items)
            .map(|item| self.books.get_book(item.book_id))
            .buffered(MAX_CONCURRENT_LOOKUPS)
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .filter_map(|result| match result {
                Ok(book) => Some(book),
                Err(e) => {
                    debug!(error = %e, "Dropping recommendation that could not be hydrated");
                    None
                }
            })
            .collect()
    }
}

/// `{base}/{endpoint}?k=v&...`, keeping any path prefix the base URL carries.
fn endpoint_url(mut base: Url, endpoint: &str, query: &[(&str, i64)]) -> Result<Url, BackendError> {
    let cannot_be_base = format!("base URL {base} cannot carry a path");
    base.path_segments_mut()
        .map_err(|_| BackendError::InvalidRequest(cannot_be_base))?
        .pop_if_empty()
        .push(endpoint);
    {
        let mut pairs = base.query_pairs_mut();
        pairs.clear();
        for (key, value) in query {
            pairs.append_pair(key, &value.to_string());
        }
    }
    Ok(base)
}
