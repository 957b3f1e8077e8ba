//! Provider driven entirely by a stored definition.

use super::traits::{AudioProvider, Capability, ProviderError, SearchOutcome};
use crate::client::capability::{CapabilityConfig, ConfigurationError};
use crate::client::normalize::ResponseNormalizer;
use crate::client::request::{CallParams, RequestBuilder};
use crate::client::ChapterListing;
use crate::repositories::ProviderDefinition;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::{debug, instrument, warn};

/// A provider built from a [`ProviderDefinition`]
pub struct ConfigBasedProvider {
    name: String,
    search: CapabilityConfig,
    chapters: CapabilityConfig,
    url: CapabilityConfig,
    client: Client,
    timeout: Duration,
}

impl std::fmt::Debug for ConfigBasedProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigBasedProvider")
            .field("name", &self.name)
            .field("search", &self.search.is_supported())
            .field("chapters", &self.chapters.is_supported())
            .field("url", &self.url.is_supported())
            .finish_non_exhaustive()
    }
}

impl ConfigBasedProvider {
    /// Build a provider from `definition`.
    ///
    /// A missing capability block leaves that capability unsupported. So does
    /// a malformed one, with a warning; the other capabilities still load. A
    /// block whose templates need a value its calls never carry, such as
    /// `{page}` in a search URL, counts as malformed.
    #[must_use]
    pub fn from_definition(definition: &ProviderDefinition, client: Client, timeout: Duration) -> Self {
        let overrides = definition.field_mapping_overrides().unwrap_or_else(|e| {
            warn!(provider = %definition.name, "ignoring definition-level field mapping: {}", e);
            None
        });

        let capability = |block: Option<&Value>, capability: Capability| match block {
            None | Some(Value::Null) => CapabilityConfig::default(),
            Some(raw) => {
                let mapping = overrides.as_ref().and_then(|o| o.get(capability.as_str()));
                CapabilityConfig::from_raw(raw, mapping)
                    .and_then(|config| suppliable(config, capability))
                    .unwrap_or_else(|e| {
                        warn!(
                            provider = %definition.name,
                            %capability,
                            "capability disabled, invalid configuration: {}",
                            e
                        );
                        CapabilityConfig::default()
                    })
            }
        };

        let provider = Self {
            name: definition.name.clone(),
            search: capability(definition.search.as_ref(), Capability::Search),
            chapters: capability(definition.chapters.as_ref(), Capability::Chapters),
            url: capability(definition.url.as_ref(), Capability::Url),
            client,
            timeout,
        };
        debug!("Constructed provider {:?}", provider);
        provider
    }

    const fn config(&self, capability: Capability) -> &CapabilityConfig {
        match capability {
            Capability::Search => &self.search,
            Capability::Chapters => &self.chapters,
            Capability::Url => &self.url,
        }
    }

    /// Build and send one request, returning the raw body.
    ///
    /// Only invalid input is an `Err`; upstream failures are logged here and
    /// handed back as [`Fetched::Failed`].
    async fn fetch(
        &self,
        capability: Capability,
        params: &CallParams,
    ) -> Result<Fetched, ProviderError> {
        let config = self.config(capability);
        let request = match RequestBuilder::build(config, params) {
            Ok(Some(request)) => request,
            Ok(None) => {
                debug!(provider = %self.name, %capability, "capability not configured");
                return Ok(Fetched::Skipped);
            }
            Err(err @ ProviderError::InvalidQuery { .. }) => return Err(err),
            Err(err) => {
                warn!(provider = %self.name, %capability, "cannot build request: {}", err);
                return Ok(Fetched::Failed(err));
            }
        };

        let start = Instant::now();
        match request.send(&self.client, self.timeout).await {
            Ok(raw) => {
                debug!(
                    provider = %self.name,
                    %capability,
                    elapsed_ms = start.elapsed().as_millis(),
                    "upstream call completed"
                );
                Ok(Fetched::Body(raw))
            }
            Err(err) if err.is_transport() => {
                warn!(provider = %self.name, %capability, url = %request.url, "upstream call failed: {}", err);
                Ok(Fetched::Failed(err))
            }
            Err(err) => {
                debug!(provider = %self.name, %capability, url = %request.url, "unusable response: {}", err);
                Ok(Fetched::Failed(err))
            }
        }
    }
}

/// Result of one upstream exchange
enum Fetched {
    Body(Value),
    /// Capability not configured, nothing was sent
    Skipped,
    Failed(ProviderError),
}

impl Fetched {
    fn into_body(self) -> Option<Value> {
        match self {
            Self::Body(raw) => Some(raw),
            Self::Skipped | Self::Failed(_) => None,
        }
    }
}

/// Reject a block whose templates reference a value `capability` never supplies.
fn suppliable(
    config: CapabilityConfig,
    capability: Capability,
) -> Result<CapabilityConfig, ConfigurationError> {
    match config
        .placeholders()
        .into_iter()
        .find(|placeholder| !capability.supplies(*placeholder))
    {
        Some(placeholder) => Err(ConfigurationError::Invalid {
            field: "template",
            reason: format!("{placeholder} is never supplied to {capability} calls"),
        }),
        None => Ok(config),
    }
}

fn require(field: &str, value: &str) -> Result<(), ProviderError> {
    if value.trim().is_empty() {
        Err(ProviderError::InvalidQuery {
            field: field.to_string(),
            reason: "must not be empty".to_string(),
        })
    } else {
        Ok(())
    }
}

#[async_trait]
impl AudioProvider for ConfigBasedProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn supports(&self, capability: Capability) -> bool {
        self.config(capability).is_supported()
    }

    #[instrument(skip(self), fields(provider = %self.name))]
    async fn search_outcome(&self, keyword: &str) -> Result<SearchOutcome, ProviderError> {
        require("keyword", keyword)?;
        let outcome = match self.fetch(Capability::Search, &CallParams::search(keyword)).await? {
            Fetched::Body(raw) => SearchOutcome {
                books: ResponseNormalizer::new(&self.name, &self.search.field_mapping).books(&raw),
                failure: None,
            },
            Fetched::Skipped => SearchOutcome::default(),
            Fetched::Failed(err) => SearchOutcome {
                books: Vec::new(),
                failure: Some(err.to_string()),
            },
        };
        Ok(outcome)
    }

    #[instrument(skip(self), fields(provider = %self.name))]
    async fn list_chapters(
        &self,
        book_id: &str,
        page: u32,
        size: u32,
    ) -> Result<ChapterListing, ProviderError> {
        require("book_id", book_id)?;
        let params = CallParams::chapters(book_id, page, size);
        let Some(raw) = self.fetch(Capability::Chapters, &params).await?.into_body() else {
            return Ok(ChapterListing::default());
        };
        Ok(ResponseNormalizer::new(&self.name, &self.chapters.field_mapping).chapters(&raw, size))
    }

    #[instrument(skip(self), fields(provider = %self.name))]
    async fn resolve_audio_url(
        &self,
        book_id: Option<&str>,
        chapter_id: &str,
    ) -> Result<Option<String>, ProviderError> {
        require("chapter_id", chapter_id)?;
        let params = CallParams::audio(book_id, chapter_id);
        let Some(raw) = self.fetch(Capability::Url, &params).await?.into_body() else {
            return Ok(None);
        };
        Ok(ResponseNormalizer::new(&self.name, &self.url.field_mapping).audio_url(&raw))
    }
}
