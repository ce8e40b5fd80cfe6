//! recsys-router - routing proxy for book recommendation backends
//!
//! This library keeps a fixed registry of recommender backends ("models"), tracks which one is
//! active, lets operators switch it at runtime, and proxies recommendation, similar-books and
//! diversity queries to the active backend, hydrating the results into full book records.

use axum::Router;
use axum::middleware;
use axum::routing::{get, put};
use axum_prometheus::{
    GenericMetricLayer, Handle, PrometheusMetricLayerBuilder,
    metrics_exporter_prometheus::PrometheusHandle,
};
use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument};

pub mod auth;
pub mod catalog;
pub mod client;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod proxy;
pub mod registry;
pub mod router;
pub mod selector;

use auth::{KeySet, require_admin_key};
use catalog::BookLookup;
use client::HttpClient;
use handlers::{
    activate_model, active_model, diversity_books, list_models, recommendations, similar_books,
};
use proxy::RecommendationProxy;
use router::RecsysRouter;

/// Prefix the API is mounted under unless configured otherwise.
pub const DEFAULT_API_PREFIX: &str = "/api/v1";

/// The main application state: the routing core, the proxy built on it, and the admin keys
#[derive(Clone, Debug)]
pub struct AppState<T: HttpClient> {
    pub recsys: Arc<RecsysRouter>,
    pub proxy: RecommendationProxy<T>,
    pub admin_keys: Arc<KeySet>,
}

impl<T: HttpClient + Send + Sync> AppState<T> {
    /// Create a new AppState around an HTTP client. Custom clients are useful for testing.
    pub fn with_client(
        recsys: RecsysRouter,
        http_client: T,
        books: Arc<dyn BookLookup>,
        timeout: Duration,
    ) -> Self {
        let recsys = Arc::new(recsys);
        let proxy = RecommendationProxy::new(Arc::clone(&recsys), http_client, books, timeout);
        Self {
            recsys,
            proxy,
            admin_keys: Arc::new(KeySet::new()),
        }
    }

    /// Require one of `keys` as a bearer token on the admin endpoints.
    pub fn with_admin_keys(mut self, keys: KeySet) -> Self {
        self.admin_keys = Arc::new(keys);
        self
    }
}

/// Build the main router. Under `api_prefix` it serves:
/// - `/recommendation/active-model` - the active model
/// - `/recommendations`, `/similar-books`, `/diversity-books` - proxied queries
/// - `/admin/recommendation/models[/{model_key}]` - listing and switching, behind the admin keys
#[instrument(skip(state))]
pub fn build_router<T: HttpClient + Clone + Send + Sync + 'static>(
    state: AppState<T>,
    api_prefix: &str,
) -> Router {
    info!("Building router");
    let admin = Router::new()
        .route("/admin/recommendation/models", get(list_models))
        .route(
            "/admin/recommendation/models/{model_key}",
            put(activate_model),
        )
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&state.admin_keys),
            require_admin_key,
        ));

    let api = Router::new()
        .route("/recommendation/active-model", get(active_model))
        .route("/recommendations", get(recommendations))
        .route("/similar-books", get(similar_books))
        .route("/diversity-books", get(diversity_books))
        .merge(admin)
        .with_state(state);

    let prefix = api_prefix.trim_matches('/');
    if prefix.is_empty() {
        api
    } else {
        Router::new().nest(&format!("/{prefix}"), api)
    }
}

/// Builds a router for the metrics endpoint.
#[instrument(skip(handle))]
pub fn build_metrics_router(handle: PrometheusHandle) -> Router {
    info!("Building metrics router");
    Router::new().route(
        "/metrics",
        axum::routing::get(move || async move { handle.render() }),
    )
}

type MetricsLayerAndHandle = (
    GenericMetricLayer<'static, PrometheusHandle, Handle>,
    PrometheusHandle,
);

/// Builds a layer and handle for prometheus metrics collection, with every metric name starting
/// with `prefix`.
pub fn build_metrics_layer_and_handle(
    prefix: impl Into<Cow<'static, str>>,
) -> MetricsLayerAndHandle {
    info!("Building metrics layer");
    PrometheusMetricLayerBuilder::new()
        .with_prefix(prefix)
        .enable_response_body_size(true)
        .with_endpoint_label_type(axum_prometheus::EndpointLabel::Exact)
        .with_default_metrics()
        .build_pair()
}

#[cfg(test)]
pub mod test_utils {
    use super::*;
    use crate::errors::BookLookupError;
    use crate::models::BookResponse;
    use async_trait::async_trait;
    use axum::http::StatusCode;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Debug, Clone)]
    pub enum MockReply {
        Respond(StatusCode, String),
        Fail(String),
        Hang,
    }

    #[derive(Debug, Clone)]
    pub struct MockHttpClient {
        pub requests: Arc<Mutex<Vec<MockRequest>>>,
        reply: MockReply,
    }

    #[derive(Debug, Clone)]
    pub struct MockRequest {
        pub method: String,
        pub uri: String,
        pub headers: Vec<(String, String)>,
    }

    impl MockHttpClient {
        pub fn new(status: StatusCode, body: &str) -> Self {
            Self::with_reply(MockReply::Respond(status, body.to_string()))
        }

        /// Every request fails at the transport level.
        pub fn failing(message: &str) -> Self {
            Self::with_reply(MockReply::Fail(message.to_string()))
        }

        /// Requests never complete.
        pub fn hanging() -> Self {
            Self::with_reply(MockReply::Hang)
        }

        fn with_reply(reply: MockReply) -> Self {
            Self {
                requests: Arc::new(Mutex::new(Vec::new())),
                reply,
            }
        }

        pub fn get_requests(&self) -> Vec<MockRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl HttpClient for MockHttpClient {
        async fn request(
            &self,
            req: axum::extract::Request,
        ) -> Result<axum::response::Response, Box<dyn std::error::Error + Send + Sync>> {
            let mock_request = MockRequest {
                method: req.method().to_string(),
                uri: req.uri().to_string(),
                headers: req
                    .headers()
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or("").to_string()))
                    .collect(),
            };
            self.requests.lock().unwrap().push(mock_request);

            match &self.reply {
                MockReply::Respond(status, body) => Ok(axum::response::Response::builder()
                    .status(*status)
                    .header("content-type", "application/json")
                    .body(axum::body::Body::from(body.clone()))
                    .unwrap()),
                MockReply::Fail(message) => Err(message.clone().into()),
                MockReply::Hang => std::future::pending().await,
            }
        }
    }

    /// In-memory stand-in for the book catalog.
    #[derive(Debug, Default)]
    pub struct MockCatalog {
        books: HashMap<i64, BookResponse>,
    }

    impl MockCatalog {
        pub fn with_books(books: Vec<BookResponse>) -> Self {
            Self {
                books: books.into_iter().map(|book| (book.id, book)).collect(),
            }
        }
    }

    #[async_trait]
    impl BookLookup for MockCatalog {
        async fn get_book(&self, id: i64) -> Result<BookResponse, BookLookupError> {
            self.books
                .get(&id)
                .cloned()
                .ok_or(BookLookupError::NotFound(id))
        }
    }

    pub fn book(id: i64, title: &str) -> BookResponse {
        BookResponse {
            id,
            title: title.to_string(),
            description: None,
            cover_image_url: None,
            publication_year: None,
            publisher: None,
            created_at: None,
            updated_at: None,
        }
    }
}
