//! The single mutable cell of the routing core: which model key is active.
//!
//! Reads are lock-free (`ArcSwap::load`), so any number of request handlers can read while an
//! admin request swaps the value. The selector does not validate keys itself; the only caller
//! of [`ActiveModelSelector::activate`] is the router, which checks the registry first.
use arc_swap::ArcSwap;
use std::sync::Arc;
use tracing::info;

use crate::registry::ModelRegistry;

#[derive(Debug)]
pub struct ActiveModelSelector {
    active: ArcSwap<String>,
}

impl ActiveModelSelector {
    /// Seeds the active key from `default_key` when it names a registered model, otherwise from
    /// the first model in declaration order.
    pub fn initialize(registry: &ModelRegistry, default_key: Option<&str>) -> Self {
        let initial = default_key
            .filter(|key| !key.trim().is_empty() && registry.contains(key))
            .unwrap_or_else(|| registry.first_key());

        info!("Active recommendation model initialized to '{}'", initial);
        Self {
            active: ArcSwap::from_pointee(initial.to_string()),
        }
    }

    pub fn current(&self) -> Arc<String> {
        self.active.load_full()
    }

    /// Last writer wins.
    pub(crate) fn activate(&self, key: &str) {
        self.active.store(Arc::new(key.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ModelDescriptor;
    use rstest::rstest;
    use std::thread;

    fn registry(keys: &[&str]) -> ModelRegistry {
        ModelRegistry::new(keys.iter().map(|key| {
            ModelDescriptor::builder()
                .key(*key)
                .label(*key)
                .base_url(format!("http://{key}"))
                .build()
        }))
        .unwrap()
    }

    #[rstest]
    #[case::default_present(Some("neural"), "neural")]
    #[case::default_first(Some("svd"), "svd")]
    #[case::default_unknown(Some("missing"), "svd")]
    #[case::default_blank(Some(""), "svd")]
    #[case::default_whitespace(Some("   "), "svd")]
    #[case::default_padded(Some(" neural "), "svd")]
    #[case::no_default(None, "svd")]
    fn test_initialize_picks_default_or_first(
        #[case] default_key: Option<&str>,
        #[case] expected: &str,
    ) {
        let registry = registry(&["svd", "neural", "popular"]);
        let selector = ActiveModelSelector::initialize(&registry, default_key);
        assert_eq!(selector.current().as_str(), expected);
    }

    #[test]
    fn test_activate_replaces_current() {
        let registry = registry(&["svd", "neural"]);
        let selector = ActiveModelSelector::initialize(&registry, None);
        selector.activate("neural");
        assert_eq!(selector.current().as_str(), "neural");
        selector.activate("svd");
        assert_eq!(selector.current().as_str(), "svd");
    }

    #[test]
    fn test_concurrent_readers_only_see_registered_keys() {
        let keys = ["svd", "neural", "popular", "hybrid"];
        let registry = Arc::new(registry(&keys));
        let selector = Arc::new(ActiveModelSelector::initialize(&registry, None));

        thread::scope(|scope| {
            for (i, &key) in keys.iter().enumerate() {
                let selector = Arc::clone(&selector);
                scope.spawn(move || {
                    for round in 0..1_000 {
                        let next = keys[(i + round) % keys.len()];
                        selector.activate(if round % 2 == 0 { key } else { next });
                    }
                });
            }
            for _ in 0..8 {
                let selector = Arc::clone(&selector);
                let registry = Arc::clone(&registry);
                scope.spawn(move || {
                    for _ in 0..5_000 {
                        let current = selector.current();
                        assert!(registry.contains(&current), "observed unknown key {current}");
                    }
                });
            }
        });

        assert!(registry.contains(&selector.current()));
    }
}
