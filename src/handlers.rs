//! Axum handlers for the recommendation and model-administration endpoints
use crate::AppState;
use crate::client::HttpClient;
use crate::errors::RoutingError;
use crate::models::{ApiResponse, BookResponse, DiversityBooksResponse, ModelInfo, ModelsResponse};
use crate::proxy::is_valid_limit;
use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use tracing::instrument;

const LIMIT_OUT_OF_RANGE: &str = "Limit must be between 1 and 100";

fn default_limit() -> i64 {
    10
}

fn default_diversity_limit() -> i64 {
    5
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationsQuery {
    pub user_id: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimilarBooksQuery {
    pub book_id: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiversityBooksQuery {
    pub book_id: i64,
    #[serde(default = "default_diversity_limit")]
    pub limit: i64,
}

#[instrument(skip(state))]
pub async fn recommendations<T: HttpClient + Send + Sync>(
    State(state): State<AppState<T>>,
    Query(query): Query<RecommendationsQuery>,
) -> Json<ApiResponse<Vec<BookResponse>>> {
    let books = state
        .proxy
        .get_recommendations(query.user_id, query.limit)
        .await;
    Json(ApiResponse::success(
        books,
        "Recommendations retrieved successfully",
    ))
}

#[instrument(skip(state))]
pub async fn similar_books<T: HttpClient + Send + Sync>(
    State(state): State<AppState<T>>,
    Query(query): Query<SimilarBooksQuery>,
) -> Json<ApiResponse<Vec<BookResponse>>> {
    if !is_valid_limit(query.limit) {
        return Json(ApiResponse::success(Vec::new(), LIMIT_OUT_OF_RANGE));
    }
    let books = state
        .proxy
        .get_similar_books(query.book_id, query.limit)
        .await;
    Json(ApiResponse::success(
        books,
        "Similar books retrieved successfully",
    ))
}

#[instrument(skip(state))]
pub async fn diversity_books<T: HttpClient + Send + Sync>(
    State(state): State<AppState<T>>,
    Query(query): Query<DiversityBooksQuery>,
) -> Json<ApiResponse<DiversityBooksResponse>> {
    if !is_valid_limit(query.limit) {
        return Json(ApiResponse::success(
            DiversityBooksResponse::default(),
            LIMIT_OUT_OF_RANGE,
        ));
    }
    let books = state
        .proxy
        .get_diversity_books(query.book_id, query.limit)
        .await;
    Json(ApiResponse::success(
        books,
        "Diversity recommendations retrieved successfully",
    ))
}

#[instrument(skip(state))]
pub async fn active_model<T: HttpClient>(
    State(state): State<AppState<T>>,
) -> Json<ApiResponse<Option<ModelInfo>>> {
    Json(ApiResponse::success(
        state.recsys.active_model_info(),
        "Active recommendation model retrieved successfully",
    ))
}

#[instrument(skip(state))]
pub async fn list_models<T: HttpClient>(
    State(state): State<AppState<T>>,
) -> Json<ApiResponse<ModelsResponse>> {
    Json(ApiResponse::success(
        state.recsys.models_overview(),
        "Recommendation model registry retrieved successfully",
    ))
}

#[instrument(skip(state))]
pub async fn activate_model<T: HttpClient>(
    State(state): State<AppState<T>>,
    Path(model_key): Path<String>,
) -> Result<Json<ApiResponse<ModelInfo>>, RoutingError> {
    let info = state.recsys.activate_model(&model_key)?;
    Ok(Json(ApiResponse::success(
        info,
        "Active recommendation model updated successfully",
    )))
}
