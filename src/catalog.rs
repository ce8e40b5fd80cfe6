//! Book lookup used to hydrate recommender results into full catalog records.
//!
//! The catalog itself lives in another service; [`CatalogClient`] fetches single books from it
//! over HTTP. Anything implementing [`BookLookup`] can be plugged into the proxy instead.
use async_trait::async_trait;
use axum::http::StatusCode;
use std::time::Duration;
use tracing::trace;
use url::Url;

use crate::client::{HttpClient, get_json_bytes};
use crate::errors::BookLookupError;
use crate::models::{ApiResponse, BookResponse};

#[async_trait]
pub trait BookLookup: std::fmt::Debug + Send + Sync {
    async fn get_book(&self, id: i64) -> Result<BookResponse, BookLookupError>;
}

/// Reads books from `{base_url}/books/{id}`, which answers with the usual `ApiResponse` envelope.
#[derive(Debug, Clone)]
pub struct CatalogClient<T: HttpClient> {
    base_url: Url,
    http_client: T,
    timeout: Duration,
}

impl<T: HttpClient> CatalogClient<T> {
    pub fn new(base_url: Url, http_client: T, timeout: Duration) -> Self {
        Self {
            base_url,
            http_client,
            timeout,
        }
    }

    fn book_url(&self, id: i64) -> Result<Url, BookLookupError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| BookLookupError::Unavailable {
                id,
                reason: format!("catalog URL {} cannot be a base", self.base_url),
            })?
            .pop_if_empty()
            .push("books")
            .push(&id.to_string());
        Ok(url)
    }
}

#[async_trait]
impl<T: HttpClient + Send + Sync> BookLookup for CatalogClient<T> {
    async fn get_book(&self, id: i64) -> Result<BookResponse, BookLookupError> {
        let url = self.book_url(id)?;
        trace!(%url, "Looking up book");

        let (status, body) = get_json_bytes(&self.http_client, &url, self.timeout)
            .await
            .map_err(|e| BookLookupError::Unavailable {
                id,
                reason: e.to_string(),
            })?;

        if status == StatusCode::NOT_FOUND {
            return Err(BookLookupError::NotFound(id));
        }
        if !status.is_success() {
            return Err(BookLookupError::Unavailable {
                id,
                reason: format!("catalog responded with status {status}"),
            });
        }

        let envelope: ApiResponse<BookResponse> =
            serde_json::from_slice(&body).map_err(|e| BookLookupError::Unavailable {
                id,
                reason: e.to_string(),
            })?;
        envelope.data.ok_or(BookLookupError::NotFound(id))
    }
}
