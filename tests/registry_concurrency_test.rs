use async_trait::async_trait;
use audio_hub::repositories::RepositoryResult;
use audio_hub::{
    AdapterRegistry, Capability, DefinitionRepository, InMemoryDefinitionRepository,
    ProviderDefinition,
};
use futures::future::join_all;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Store that reads immediately but answers late, so concurrent loaders overlap
#[derive(Debug)]
struct SlowStore {
    inner: InMemoryDefinitionRepository,
    delay: Duration,
    lookups: AtomicUsize,
}

#[async_trait]
impl DefinitionRepository for SlowStore {
    fn name(&self) -> &'static str {
        "slow"
    }

    async fn find_definition(&self, name: &str) -> RepositoryResult<Option<ProviderDefinition>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        let found = self.inner.find_definition(name).await;
        tokio::time::sleep(self.delay).await;
        found
    }

    async fn list_definitions(&self) -> RepositoryResult<Vec<ProviderDefinition>> {
        self.inner.list_definitions().await
    }
}

fn definition(template: &str) -> ProviderDefinition {
    let mut definition = ProviderDefinition::new("p");
    definition.search = Some(json!({"url_template": template}));
    definition
}

async fn setup(delay: Duration) -> (Arc<SlowStore>, Arc<AdapterRegistry>) {
    let inner = InMemoryDefinitionRepository::new();
    inner.upsert(definition("https://v1/{keyword}")).await.unwrap();
    let store = Arc::new(SlowStore {
        inner,
        delay,
        lookups: AtomicUsize::new(0),
    });
    let registry = Arc::new(AdapterRegistry::new(
        store.clone(),
        reqwest::Client::new(),
        Duration::from_secs(1),
    ));
    (store, registry)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_cold_gets_share_one_adapter() {
    let (store, registry) = setup(Duration::from_millis(50)).await;

    let handles = (0..16).map(|_| {
        let registry = Arc::clone(&registry);
        tokio::spawn(async move { registry.get("p").await })
    });
    let adapters: Vec<_> = join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.unwrap().unwrap())
        .collect();

    let cached = registry.get("p").await.unwrap();
    for adapter in &adapters {
        assert!(Arc::ptr_eq(adapter, &cached));
        assert_eq!(adapter.name(), "p");
    }
    assert_eq!(registry.list().await, ["p"]);
    assert!(store.lookups.load(Ordering::SeqCst) >= 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_reload_during_cold_load_is_not_overwritten() {
    let (store, registry) = setup(Duration::from_millis(100)).await;

    // starts loading the v1 definition
    let loader = {
        let registry = Arc::clone(&registry);
        tokio::spawn(async move { registry.get("p").await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    // definition changes and the provider is reloaded before the loader finishes
    let mut updated = ProviderDefinition::new("p");
    updated.chapters = Some(json!({"url_template": "https://v2/{bookId}"}));
    store.inner.upsert(updated).await.unwrap();
    let reloaded = registry.reload("p").await.unwrap();

    let stale = loader.await.unwrap().unwrap();
    let current = registry.get("p").await.unwrap();

    assert!(Arc::ptr_eq(&reloaded, &current));
    assert!(current.supports(Capability::Chapters));
    assert!(!current.supports(Capability::Search));
    // the stale loader still answered its caller, just not from the cache
    assert!(stale.supports(Capability::Search));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_readers_always_see_a_complete_adapter() {
    let (_store, registry) = setup(Duration::from_millis(1)).await;

    let readers = (0..32).map(|i| {
        let registry = Arc::clone(&registry);
        tokio::spawn(async move {
            if i % 8 == 0 {
                registry.reload("p").await
            } else {
                registry.get("p").await
            }
        })
    });

    for joined in join_all(readers).await {
        let adapter = joined.unwrap().unwrap();
        assert_eq!(adapter.name(), "p");
        assert!(adapter.supports(Capability::Search));
    }
    assert!(registry.get("p").await.is_some());
}

#[tokio::test]
async fn test_cold_enabled_adapters_skip_per_name_lookups() {
    let (store, registry) = setup(Duration::from_millis(50)).await;

    let adapters = registry.enabled_adapters().await.unwrap();
    assert_eq!(adapters.len(), 1);
    assert_eq!(store.lookups.load(Ordering::SeqCst), 0);

    // built from the listing and cached like any other load
    let cached = registry.get("p").await.unwrap();
    assert!(Arc::ptr_eq(&adapters[0], &cached));
    assert_eq!(store.lookups.load(Ordering::SeqCst), 0);
}
