//! The registry is the fixed catalog of recommender backends ('models') this service can route to.
//! It is read once from a JSON config file at startup and never changes afterwards; which model is
//! *active* is tracked separately by the selector.
//!
//! Declaration order in the config file matters: it decides the fallback active model when no
//! valid default is configured, and it is the order models are listed in API responses.
use crate::auth::KeySet;
use crate::errors::{RegistryError, RoutingError};
use anyhow::anyhow;
use bon::Builder;
use serde::de::{Deserializer, MapAccess, Visitor};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use tracing::{debug, info, warn};
use url::Url;

/// The static description of one recommender backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Builder)]
pub struct ModelDescriptor {
    #[builder(into)]
    pub key: String,
    #[builder(into)]
    pub label: String,
    /// Kept as text rather than `Url`: a blank or broken URL must not stop startup, it only
    /// surfaces when a request is routed to this model.
    #[builder(into)]
    pub base_url: String,
    #[builder(default)]
    pub supports_online_learning: bool,
}

/// One entry under `models` in the config file. The key comes from the map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub label: String,
    #[serde(default)]
    pub base_url: String,
    #[serde(default)]
    pub supports_online_learning: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Base URL of the book catalog; books are fetched from `{base_url}/books/{id}`.
    pub base_url: Url,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Auth {
    /// Bearer keys accepted on the admin endpoints. Empty means the admin endpoints are open.
    #[serde(default)]
    pub admin_keys: KeySet,
}

/// The config file: the model registry plus the collaborators the service talks to.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub default_model: Option<String>,
    #[serde(default, deserialize_with = "ordered_models")]
    pub models: Vec<(String, ModelConfig)>,
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub auth: Option<Auth>,
}

/// Deserializes a JSON object into a list of entries, keeping declaration order.
fn ordered_models<'de, D>(deserializer: D) -> Result<Vec<(String, ModelConfig)>, D::Error>
where
    D: Deserializer<'de>,
{
    struct OrderedModels;

    impl<'de> Visitor<'de> for OrderedModels {
        type Value = Vec<(String, ModelConfig)>;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a map of model keys to model configurations")
        }

        fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
        where
            A: MapAccess<'de>,
        {
            let mut models = Vec::with_capacity(map.size_hint().unwrap_or(0));
            while let Some(entry) = map.next_entry::<String, ModelConfig>()? {
                models.push(entry);
            }
            Ok(models)
        }
    }

    deserializer.deserialize_map(OrderedModels)
}

impl ConfigFile {
    pub async fn from_path(config_path: &Path) -> Result<Self, anyhow::Error> {
        let contents = tokio::fs::read_to_string(config_path).await.map_err(|e| {
            anyhow!(
                "Failed to read config file {}: {}",
                config_path.display(),
                e
            )
        })?;

        let config_file: ConfigFile = serde_json::from_str(&contents).map_err(|e| {
            anyhow!(
                "Failed to parse config file {}: {}",
                config_path.display(),
                e
            )
        })?;

        info!(
            "Loaded {} recommender models from {}",
            config_file.models.len(),
            config_path.display()
        );
        Ok(config_file)
    }

    pub fn admin_keys(&self) -> KeySet {
        self.auth
            .as_ref()
            .map(|auth| auth.admin_keys.clone())
            .unwrap_or_default()
    }
}

/// Immutable, insertion-ordered mapping of model key to descriptor.
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    models: Vec<ModelDescriptor>,
    index: HashMap<String, usize>,
}

impl ModelRegistry {
    /// Builds the registry. A repeated key replaces the earlier descriptor in place.
    pub fn new(
        descriptors: impl IntoIterator<Item = ModelDescriptor>,
    ) -> Result<Self, RegistryError> {
        let mut models: Vec<ModelDescriptor> = Vec::new();
        let mut index = HashMap::new();

        for descriptor in descriptors {
            if descriptor.base_url.trim().is_empty() {
                warn!(model = %descriptor.key, "Recommender model has no base URL configured");
            }
            match index.get(&descriptor.key) {
                Some(&position) => {
                    warn!(model = %descriptor.key, "Duplicate recommender model key, keeping the last definition");
                    models[position] = descriptor;
                }
                None => {
                    index.insert(descriptor.key.clone(), models.len());
                    models.push(descriptor);
                }
            }
        }

        if models.is_empty() {
            return Err(RegistryError::Empty);
        }
        debug!("{} recommender models registered", models.len());

        Ok(ModelRegistry { models, index })
    }

    pub fn from_config(config_file: &ConfigFile) -> Result<Self, RegistryError> {
        Self::new(config_file.models.iter().map(|(key, model)| {
            ModelDescriptor::builder()
                .key(key.as_str())
                .label(model.label.as_str())
                .base_url(model.base_url.as_str())
                .supports_online_learning(model.supports_online_learning)
                .build()
        }))
    }

    pub fn get(&self, key: &str) -> Result<&ModelDescriptor, RoutingError> {
        self.index
            .get(key)
            .map(|&position| &self.models[position])
            .ok_or_else(|| RoutingError::UnknownModel(key.to_string()))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    /// Keys in declaration order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.models.iter().map(|model| model.key.as_str())
    }

    /// Descriptors in declaration order.
    pub fn all(&self) -> &[ModelDescriptor] {
        &self.models
    }

    pub fn first_key(&self) -> &str {
        // Non-empty by construction.
        &self.models[0].key
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}
