//! HTTP client abstraction for calling recommender backends and the book catalog
//!
//! Outbound calls go through the [`HttpClient`] trait so the pooled hyper client used in
//! production can be swapped for a mock in tests.
use async_trait::async_trait;
use axum::body::Bytes;
use axum::http::{Method, StatusCode, header::ACCEPT};
use axum::response::IntoResponse;
use hyper_util::{client::legacy::Client, rt::TokioExecutor};
use std::time::Duration;
use url::Url;

use crate::errors::BackendError;

pub type HyperClient = Client<
    hyper_tls::HttpsConnector<hyper_util::client::legacy::connect::HttpConnector>,
    axum::body::Body,
>;

#[async_trait]
pub trait HttpClient: std::fmt::Debug {
    async fn request(
        &self,
        req: axum::extract::Request,
    ) -> Result<axum::response::Response, Box<dyn std::error::Error + Send + Sync>>;
}

#[async_trait]
impl HttpClient for HyperClient {
    async fn request(
        &self,
        req: axum::extract::Request,
    ) -> Result<axum::response::Response, Box<dyn std::error::Error + Send + Sync>> {
        self.request(req)
            .await
            .map(|res| res.into_response())
            .map_err(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>)
    }
}

/// Connection pool settings for [`create_hyper_client`].
#[derive(Debug, Clone, Copy)]
pub struct PoolConfig {
    pub idle_timeout: Duration,
    pub max_idle_per_host: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(90),
            max_idle_per_host: 32,
        }
    }
}

pub fn create_hyper_client(pool: PoolConfig) -> HyperClient {
    let https = hyper_tls::HttpsConnector::new();

    tracing::debug!(
        "HTTP client pool config: idle_timeout={:?}, max_idle_per_host={}",
        pool.idle_timeout,
        pool.max_idle_per_host
    );

    Client::builder(TokioExecutor::new())
        .pool_idle_timeout(pool.idle_timeout)
        .pool_max_idle_per_host(pool.max_idle_per_host)
        .pool_timer(hyper_util::rt::TokioTimer::new())
        .build(https)
}

/// Upper bound on a buffered response body.
const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

/// Issues a `GET` for JSON and buffers the body, all within `timeout`. Non-2xx statuses are
/// returned as-is for the caller to interpret.
pub(crate) async fn get_json_bytes<T>(
    client: &T,
    url: &Url,
    timeout: Duration,
) -> Result<(StatusCode, Bytes), BackendError>
where
    T: HttpClient + ?Sized,
{
    let req = axum::http::Request::builder()
        .method(Method::GET)
        .uri(url.as_str())
        .header(ACCEPT, "application/json")
        .body(axum::body::Body::empty())
        .map_err(|e| BackendError::InvalidRequest(e.to_string()))?;

    let exchange = async {
        let response = client
            .request(req)
            .await
            .map_err(|e| BackendError::Unavailable(e.to_string()))?;
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), MAX_BODY_BYTES)
            .await
            .map_err(|e| BackendError::Unavailable(e.to_string()))?;
        Ok::<_, BackendError>((status, body))
    };

    match tokio::time::timeout(timeout, exchange).await {
        Ok(result) => result,
        Err(_) => Err(BackendError::Timeout(timeout)),
    }
}
