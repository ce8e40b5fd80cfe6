//! The routing core: combines the immutable registry with the active-model selector. Everything
//! else in the service asks this type which backend to talk to.
use std::sync::Arc;
use tracing::{info, instrument};
use url::Url;

use crate::errors::RoutingError;
use crate::models::{ModelInfo, ModelsResponse};
use crate::registry::{ModelDescriptor, ModelRegistry};
use crate::selector::ActiveModelSelector;

#[derive(Debug)]
pub struct RecsysRouter {
    registry: ModelRegistry,
    selector: ActiveModelSelector,
}

impl RecsysRouter {
    pub fn new(registry: ModelRegistry, default_model: Option<&str>) -> Self {
        let selector = ActiveModelSelector::initialize(&registry, default_model);
        Self { registry, selector }
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    pub fn active_model_key(&self) -> Arc<String> {
        self.selector.current()
    }

    /// `None` only if the selector ever held an unregistered key, which `activate_model` rules out.
    pub fn active_model(&self) -> Option<&ModelDescriptor> {
        self.registry.get(&self.selector.current()).ok()
    }

    /// The base URL outbound calls must use.
    pub fn active_base_url(&self) -> Result<Url, RoutingError> {
        self.active_backend().map(|(_, url)| url)
    }

    /// The active key together with its parsed base URL, both from one read of the selector.
    pub fn active_backend(&self) -> Result<(Arc<String>, Url), RoutingError> {
        let key = self.selector.current();
        let misconfigured = |reason: String| RoutingError::ActiveBackendMisconfigured {
            key: key.to_string(),
            reason,
        };

        let model = self
            .registry
            .get(&key)
            .map_err(|_| misconfigured("model is not registered".to_string()))?;

        let base_url = model.base_url.trim();
        if base_url.is_empty() {
            return Err(misconfigured("base URL is blank".to_string()));
        }
        let url = Url::parse(base_url).map_err(|e| misconfigured(e.to_string()))?;
        Ok((key, url))
    }

    /// Switches the active model. The only mutating operation of the core.
    #[instrument(skip(self))]
    pub fn activate_model(&self, model_key: &str) -> Result<ModelInfo, RoutingError> {
        let descriptor = self.registry.get(model_key)?;
        let previous = self.selector.current();
        self.selector.activate(model_key);
        info!(
            previous = %previous,
            "Switched active recommender model to '{}'", model_key
        );
        Ok(ModelInfo::from_descriptor(descriptor, true))
    }

    /// Every registered model in declaration order. The active key is read once, so at most one
    /// entry is flagged active even if a switch happens concurrently.
    pub fn available_models(&self) -> Vec<ModelInfo> {
        let current = self.selector.current();
        self.models_for(&current)
    }

    pub fn active_model_info(&self) -> Option<ModelInfo> {
        let current = self.selector.current();
        self.registry
            .get(&current)
            .ok()
            .map(|descriptor| ModelInfo::from_descriptor(descriptor, true))
    }

    /// The admin listing: active key and models taken from the same snapshot.
    pub fn models_overview(&self) -> ModelsResponse {
        let current = self.selector.current();
        ModelsResponse {
            models: self.models_for(&current),
            active_key: current.to_string(),
        }
    }

    fn models_for(&self, active_key: &str) -> Vec<ModelInfo> {
        self.registry
            .all()
            .iter()
            .map(|descriptor| ModelInfo::from_descriptor(descriptor, descriptor.key == active_key))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::*;
    use std::thread;

    fn descriptor(key: &str, base_url: &str) -> ModelDescriptor {
        ModelDescriptor::builder()
            .key(key)
            .label(format!("{key} model"))
            .base_url(base_url)
            .build()
    }

    #[fixture]
    fn router() -> RecsysRouter {
        let registry = ModelRegistry::new(vec![
            descriptor("svd", "http://rec1"),
            ModelDescriptor::builder()
                .key("neural")
                .label("Two-tower")
                .base_url("http://rec2")
                .supports_online_learning(true)
                .build(),
        ])
        .unwrap();
        RecsysRouter::new(registry, Some("neural"))
    }

    #[rstest]
    fn test_switch_from_default_to_other_model(router: RecsysRouter) {
        assert_eq!(router.active_model_key().as_str(), "neural");

        let info = router.activate_model("svd").unwrap();
        assert_eq!(info.key, "svd");
        assert!(info.active);
        assert_eq!(info.base_url, "http://rec1");
        assert_eq!(router.active_model_key().as_str(), "svd");
    }

    #[rstest]
    fn test_unknown_model_is_rejected_and_active_unchanged(router: RecsysRouter) {
        let err = router.activate_model("does-not-exist").unwrap_err();
        assert_eq!(err, RoutingError::UnknownModel("does-not-exist".to_string()));
        assert!(err.to_string().contains("does-not-exist"));
        assert_eq!(router.active_model_key().as_str(), "neural");
    }

    #[rstest]
    #[case("svd")]
    #[case("neural")]
    fn test_listing_marks_exactly_the_activated_model(router: RecsysRouter, #[case] key: &str) {
        router.activate_model(key).unwrap();

        let models = router.available_models();
        assert_eq!(models.len(), 2);
        let active: Vec<_> = models.iter().filter(|m| m.active).collect();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].key, key);
    }

    #[rstest]
    fn test_listing_keeps_declaration_order(router: RecsysRouter) {
        let keys: Vec<_> = router
            .available_models()
            .into_iter()
            .map(|m| m.key)
            .collect();
        assert_eq!(keys, vec!["svd", "neural"]);
    }

    #[rstest]
    fn test_active_model_info(router: RecsysRouter) {
        let info = router.active_model_info().unwrap();
        assert_eq!(info.key, "neural");
        assert_eq!(info.label, "Two-tower");
        assert!(info.supports_online_learning);
        assert!(info.active);
        assert_eq!(router.active_model().unwrap().key, "neural");
    }

    #[rstest]
    fn test_models_overview_is_consistent(router: RecsysRouter) {
        router.activate_model("svd").unwrap();
        let overview = router.models_overview();
        assert_eq!(overview.active_key, "svd");
        let flagged: Vec<_> = overview.models.iter().filter(|m| m.active).collect();
        assert_eq!(flagged.len(), 1);
        assert_eq!(flagged[0].key, overview.active_key);
    }

    #[rstest]
    fn test_active_base_url_parses(router: RecsysRouter) {
        assert_eq!(router.active_base_url().unwrap().as_str(), "http://rec2/");
    }

    #[rstest]
    fn test_active_backend_pairs_key_with_url(router: RecsysRouter) {
        router.activate_model("svd").unwrap();
        let (key, url) = router.active_backend().unwrap();
        assert_eq!(key.as_str(), "svd");
        assert_eq!(url.as_str(), "http://rec1/");
    }

    #[rstest]
    #[case::blank("")]
    #[case::whitespace("   ")]
    #[case::relative("not a url")]
    fn test_unusable_base_url_is_misconfiguration(#[case] base_url: &str) {
        let registry = ModelRegistry::new(vec![descriptor("broken", base_url)]).unwrap();
        let router = RecsysRouter::new(registry, None);

        let err = router.active_base_url().unwrap_err();
        assert!(matches!(
            err,
            RoutingError::ActiveBackendMisconfigured { ref key, .. } if key == "broken"
        ));
    }

    #[test]
    fn test_concurrent_switches_and_listings() {
        let keys = ["a", "b", "c", "d", "e"];
        let registry = ModelRegistry::new(
            keys.iter()
                .map(|key| descriptor(key, &format!("http://{key}"))),
        )
        .unwrap();
        let router = RecsysRouter::new(registry, None);

        thread::scope(|scope| {
            for &key in &keys {
                let router = &router;
                scope.spawn(move || {
                    for _ in 0..500 {
                        router.activate_model(key).unwrap();
                    }
                });
            }
            for _ in 0..4 {
                let router = &router;
                scope.spawn(move || {
                    for _ in 0..500 {
                        let listing = router.available_models();
                        assert_eq!(listing.iter().filter(|m| m.active).count(), 1);
                        assert!(router.registry().contains(&router.active_model_key()));
                    }
                });
            }
        });
    }
}
