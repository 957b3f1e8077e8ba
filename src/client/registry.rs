//! # Adapter registry
//!
//! Owns one constructed provider per definition name. Adapters are built
//! lazily on first use and then cached until explicitly invalidated with
//! [`AdapterRegistry::reload`], [`AdapterRegistry::unregister`] or
//! [`AdapterRegistry::reload_all`].
//!
//! Reads take a shared lock. A miss releases it, loads the definition and
//! builds the adapter without holding any lock, then takes the write lock to
//! publish the result. Every invalidation bumps a generation counter; a
//! loader only publishes if the generation it started from is still current,
//! so an adapter built from a definition read before a reload never lands in
//! the cache after it. Among concurrent loaders of the same name the first
//! one to publish wins and the others return its adapter.

use super::providers::{AudioProvider, ConfigBasedProvider};
use crate::repositories::{DefinitionRepository, ProviderDefinition, ProviderSummary};
use crate::Result;
use reqwest::Client;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

#[derive(Default)]
struct RegistryState {
    adapters: HashMap<String, Arc<dyn AudioProvider>>,
    generation: u64,
}

pub struct AdapterRegistry {
    store: Arc<dyn DefinitionRepository>,
    client: Client,
    timeout: Duration,
    state: RwLock<RegistryState>,
}

impl std::fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterRegistry")
            .field("store", &self.store.name())
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl AdapterRegistry {
    /// Create an empty registry over `store`; adapters share `client`
    pub fn new(store: Arc<dyn DefinitionRepository>, client: Client, timeout: Duration) -> Self {
        info!("Initialized adapter registry over {} definition store", store.name());
        Self {
            store,
            client,
            timeout,
            state: RwLock::new(RegistryState::default()),
        }
    }

    /// Adapter for `name`, building it from the stored definition on a miss.
    ///
    /// Returns `None` when no definition exists or the store cannot be read.
    /// Malformed capability blocks only disable that capability. Disabled
    /// definitions still resolve.
    pub async fn get(&self, name: &str) -> Option<Arc<dyn AudioProvider>> {
        let generation = {
            let state = self.state.read().await;
            if let Some(adapter) = state.adapters.get(name) {
                return Some(Arc::clone(adapter));
            }
            state.generation
        };

        let definition = match self.store.find_definition(name).await {
            Ok(Some(definition)) => definition,
            Ok(None) => {
                debug!("No provider definition named {}", name);
                return None;
            }
            Err(e) => {
                warn!("Failed to load provider definition {}: {}", name, e);
                return None;
            }
        };

        Some(self.publish(name, self.build(&definition), generation).await)
    }

    fn build(&self, definition: &ProviderDefinition) -> Arc<dyn AudioProvider> {
        Arc::new(ConfigBasedProvider::from_definition(
            definition,
            self.client.clone(),
            self.timeout,
        ))
    }

    /// Cache `adapter` under `name` unless the registry was invalidated after
    /// `generation`. Returns the adapter that answers for `name`.
    async fn publish(
        &self,
        name: &str,
        adapter: Arc<dyn AudioProvider>,
        generation: u64,
    ) -> Arc<dyn AudioProvider> {
        let mut state = self.state.write().await;
        if state.generation == generation {
            let cached = state
                .adapters
                .entry(name.to_string())
                .or_insert(adapter);
            debug!("Cached adapter for provider {}", name);
            Arc::clone(cached)
        } else {
            debug!("Registry invalidated while loading {}, not caching", name);
            adapter
        }
    }

    /// Install `adapter` under `name`, replacing any adapter cached there.
    ///
    /// The key is `name` even when it differs from `adapter.name()`.
    pub async fn register(&self, name: impl Into<String>, adapter: Arc<dyn AudioProvider>) {
        let name = name.into();
        info!("Registered provider {} ({})", name, adapter.name());
        self.state.write().await.adapters.insert(name, adapter);
    }

    /// Drop the cached adapter for `name`, returning whether one was cached
    pub async fn unregister(&self, name: &str) -> bool {
        let mut state = self.state.write().await;
        state.generation += 1;
        let removed = state.adapters.remove(name).is_some();
        debug!("Unregistered provider {}: {}", name, removed);
        removed
    }

    /// Rebuild the adapter for `name` from its current definition
    pub async fn reload(&self, name: &str) -> Option<Arc<dyn AudioProvider>> {
        self.unregister(name).await;
        info!("Reloading provider {}", name);
        self.get(name).await
    }

    /// Drop every cached adapter
    pub async fn reload_all(&self) {
        let mut state = self.state.write().await;
        state.generation += 1;
        let dropped = state.adapters.len();
        state.adapters.clear();
        info!("Dropped {} cached adapters", dropped);
    }

    /// Names of the currently cached adapters, sorted
    pub async fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.state.read().await.adapters.keys().cloned().collect();
        names.sort();
        names
    }

    /// Summaries of every enabled definition in the store
    pub async fn enabled_providers(&self) -> Result<Vec<ProviderSummary>> {
        Ok(self
            .store
            .list_enabled()
            .await?
            .iter()
            .map(|definition| definition.summary())
            .collect())
    }

    /// Adapters for every enabled definition.
    ///
    /// Cached adapters are reused; the rest are built from the listed
    /// definitions and cached the same way [`get`](Self::get) does, without
    /// another store lookup per name.
    pub async fn enabled_adapters(&self) -> Result<Vec<Arc<dyn AudioProvider>>> {
        let generation = self.state.read().await.generation;
        let definitions = self.store.list_enabled().await?;
        let cached: Vec<_> = {
            let state = self.state.read().await;
            definitions
                .iter()
                .map(|definition| state.adapters.get(&definition.name).cloned())
                .collect()
        };

        let mut adapters = Vec::with_capacity(definitions.len());
        for (definition, cached) in definitions.iter().zip(cached) {
            let adapter = match cached {
                Some(adapter) => adapter,
                None => {
                    self.publish(&definition.name, self.build(definition), generation)
                        .await
                }
            };
            adapters.push(adapter);
        }
        Ok(adapters)
    }
}
