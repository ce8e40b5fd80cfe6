//! Wire types: the `ApiResponse` envelope every endpoint answers with, the model listing DTOs, and
//! the item shape returned by recommender backends.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::registry::ModelDescriptor;

/// Envelope shared with the rest of the book backend.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: String,
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T, message: impl Into<String>) -> Self {
        ApiResponse {
            success: true,
            message: message.into(),
            data: Some(data),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        ApiResponse {
            success: false,
            message: message.into(),
            data: None,
        }
    }
}

/// A read view of one registered model, with `active` computed at read time.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ModelInfo {
    pub key: String,
    pub label: String,
    pub base_url: String,
    pub supports_online_learning: bool,
    pub active: bool,
}

impl ModelInfo {
    pub(crate) fn from_descriptor(descriptor: &ModelDescriptor, active: bool) -> Self {
        ModelInfo {
            key: descriptor.key.clone(),
            label: descriptor.label.clone(),
            base_url: descriptor.base_url.clone(),
            supports_online_learning: descriptor.supports_online_learning,
            active,
        }
    }
}

/// Body of the admin model listing.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ModelsResponse {
    pub active_key: String,
    pub models: Vec<ModelInfo>,
}

/// One entry of a backend's `items` array.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RecommendationItem {
    pub book_id: i64,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
}

/// Every backend endpoint answers with this shape; other top-level fields (`user_id`, `limit`,
/// `book_id`) are echoed by some backends and ignored here.
#[derive(Deserialize, Debug, Clone, Default)]
pub(crate) struct BackendItems {
    #[serde(default)]
    items: Option<Vec<Value>>,
}

impl BackendItems {
    /// The usable items in backend order. Entries that do not parse (no `book_id`, wrong types)
    /// are dropped one by one instead of failing the whole response.
    pub(crate) fn into_items(self) -> Vec<RecommendationItem> {
        self.items
            .unwrap_or_default()
            .into_iter()
            .filter_map(|entry| match serde_json::from_value(entry) {
                Ok(item) => Some(item),
                Err(e) => {
                    debug!(error = %e, "Skipping unparseable recommendation item");
                    None
                }
            })
            .collect()
    }
}

/// A full catalog record, as served by the book catalog.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BookResponse {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub cover_image_url: Option<String>,
    #[serde(default)]
    pub publication_year: Option<i32>,
    #[serde(default)]
    pub publisher: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct DiversityBooksResponse {
    pub items: Vec<BookResponse>,
}
