use crate::client::providers::{AudioProvider, Capability, ProviderError, SearchOutcome};
use crate::client::registry::AdapterRegistry;
use crate::client::{Book, ChapterListing};
use crate::{Error, Result};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};
use url::Url;

/// Domains whose plain-HTTP audio URLs are rewritten to HTTPS
pub const DEFAULT_HTTPS_UPGRADE_DOMAINS: &[&str] = &[
    "audiopay.cos.tx.xmcdn.com",
    "cos.tx.xmcdn.com",
    "xmcdn.com",
    "ximalaya.com",
    "hls.ximalaya.com",
    "fdfs.xmcdn.com",
    "file.ximalaya.com",
];

/// Configuration for aggregated search and routed calls
#[derive(Debug, Clone)]
pub struct MetaSearchConfig {
    /// Maximum number of providers to query in parallel
    pub max_parallel_providers: usize,
    /// Timeout for each provider
    pub provider_timeout: Duration,
    /// Whether to drop repeated (provider, id) pairs
    pub deduplicate_results: bool,
    /// Hosts (and their subdomains) that get `http://` upgraded to `https://`
    pub https_upgrade_domains: Vec<String>,
}

impl Default for MetaSearchConfig {
    fn default() -> Self {
        Self {
            max_parallel_providers: 4,
            provider_timeout: Duration::from_secs(15),
            deduplicate_results: true,
            https_upgrade_domains: DEFAULT_HTTPS_UPGRADE_DOMAINS
                .iter()
                .map(|d| (*d).to_string())
                .collect(),
        }
    }
}

/// Result of a search across every enabled provider
#[derive(Debug, Clone, Default, Serialize)]
pub struct MetaSearchResult {
    /// Books from all providers, in provider listing order
    pub books: Vec<Book>,
    /// Number of books each provider contributed
    pub by_provider: HashMap<String, usize>,
    /// Total search time
    #[serde(with = "duration_millis")]
    pub total_search_time: Duration,
    /// Number of providers whose upstream answered with a usable body
    pub successful_providers: usize,
    /// Number of providers that failed: transport or parse errors, rejected
    /// input, or the aggregate timeout
    pub failed_providers: usize,
    /// Errors from failed providers
    pub provider_errors: HashMap<String, String>,
}

mod duration_millis {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u128(duration.as_millis())
    }
}

/// Front door for callers: aggregated search plus calls routed to one provider
#[derive(Debug)]
pub struct MetaSearchClient {
    registry: Arc<AdapterRegistry>,
    config: MetaSearchConfig,
}

impl MetaSearchClient {
    pub fn new(registry: Arc<AdapterRegistry>, config: MetaSearchConfig) -> Self {
        info!(
            "Initialized meta-search client (parallelism {}, timeout {:?})",
            config.max_parallel_providers, config.provider_timeout
        );
        Self { registry, config }
    }

    pub fn registry(&self) -> &Arc<AdapterRegistry> {
        &self.registry
    }

    async fn provider(&self, name: &str) -> Result<Arc<dyn AudioProvider>> {
        self.registry.get(name).await.ok_or_else(|| Error::InvalidInput {
            field: "provider".to_string(),
            reason: format!("unknown or unusable provider '{name}'"),
        })
    }

    /// Search every enabled provider that offers search
    pub async fn search(&self, keyword: &str) -> Result<MetaSearchResult> {
        let keyword = keyword.trim();
        if keyword.is_empty() {
            return Err(Error::InvalidInput {
                field: "keyword".to_string(),
                reason: "must not be empty".to_string(),
            });
        }

        let start_time = Instant::now();
        let providers: Vec<_> = self
            .registry
            .enabled_adapters()
            .await?
            .into_iter()
            .filter(|p| p.supports(Capability::Search))
            .collect();
        info!(
            "Starting search for '{}' across {} providers",
            keyword,
            providers.len()
        );

        let semaphore = Arc::new(tokio::sync::Semaphore::new(
            self.config.max_parallel_providers.max(1),
        ));

        let mut tasks = Vec::with_capacity(providers.len());
        for provider in providers {
            let keyword = keyword.to_string();
            let semaphore = Arc::clone(&semaphore);
            let timeout_duration = self.config.provider_timeout;
            let name = provider.name().to_string();

            let task = tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                let result = match timeout(timeout_duration, provider.search_outcome(&keyword)).await {
                    Ok(result) => result,
                    Err(_) => Err(ProviderError::Timeout(timeout_duration)),
                };
                (provider.name().to_string(), result)
            });
            tasks.push((name, task));
        }

        let mut result = MetaSearchResult::default();
        let mut seen = HashSet::new();
        for (name, task) in tasks {
            match task.await {
                Ok((provider_name, Ok(SearchOutcome { failure: Some(e), .. }))) => {
                    warn!("Provider {} failed: {}", provider_name, e);
                    result.failed_providers += 1;
                    result.provider_errors.insert(provider_name, e);
                }
                Ok((provider_name, Ok(SearchOutcome { books, failure: None }))) => {
                    debug!("Provider {} returned {} books", provider_name, books.len());
                    result.successful_providers += 1;
                    let mut kept = 0;
                    for book in books {
                        if self.config.deduplicate_results
                            && !seen.insert((book.provider_id.clone(), book.id.clone()))
                        {
                            continue;
                        }
                        kept += 1;
                        result.books.push(book);
                    }
                    result.by_provider.insert(provider_name, kept);
                }
                Ok((provider_name, Err(e))) => {
                    warn!("Provider {} failed: {}", provider_name, e);
                    result.failed_providers += 1;
                    result.provider_errors.insert(provider_name, e.to_string());
                }
                Err(e) => {
                    error!("Search task for {} failed: {}", name, e);
                    result.failed_providers += 1;
                    result.provider_errors.insert(name, e.to_string());
                }
            }
        }

        result.total_search_time = start_time.elapsed();
        info!(
            "Search completed: {} books from {} providers in {:?}",
            result.books.len(),
            result.successful_providers,
            result.total_search_time
        );
        Ok(result)
    }

    /// Search a single named provider
    pub async fn search_provider(&self, provider: &str, keyword: &str) -> Result<Vec<Book>> {
        Ok(self.provider(provider).await?.search(keyword).await?)
    }

    pub async fn list_chapters(
        &self,
        provider: &str,
        book_id: &str,
        page: u32,
        size: u32,
    ) -> Result<ChapterListing> {
        Ok(self
            .provider(provider)
            .await?
            .list_chapters(book_id, page, size)
            .await?)
    }

    /// Playable URL for a chapter, upgraded to HTTPS for known CDN hosts
    pub async fn resolve_audio_url(
        &self,
        provider: &str,
        book_id: Option<&str>,
        chapter_id: &str,
    ) -> Result<Option<String>> {
        let url = self
            .provider(provider)
            .await?
            .resolve_audio_url(book_id, chapter_id)
            .await?;
        Ok(url.map(|url| ensure_https(&url, &self.config.https_upgrade_domains)))
    }
}

/// Rewrite `http://` to `https://` when the host is one of `domains` or a
/// subdomain of one.
#[must_use]
pub fn ensure_https(url: &str, domains: &[String]) -> String {
    let Ok(parsed) = Url::parse(url) else {
        return url.to_string();
    };
    if parsed.scheme() != "http" {
        return url.to_string();
    }
    let Some(host) = parsed.host_str() else {
        return url.to_string();
    };

    let matched = domains.iter().any(|domain| {
        host.eq_ignore_ascii_case(domain)
            || host
                .to_ascii_lowercase()
                .ends_with(&format!(".{}", domain.to_ascii_lowercase()))
    });
    match url.get(.."http://".len()) {
        Some(prefix) if matched && prefix.eq_ignore_ascii_case("http://") => {
            format!("https://{}", &url["http://".len()..])
        }
        _ => url.to_string(),
    }
}
