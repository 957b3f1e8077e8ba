pub mod capability;
pub mod meta_search;
pub mod normalize;
pub mod path;
pub mod providers;
pub mod registry;
pub mod request;
pub mod template;

pub use capability::{CapabilityConfig, FieldMapping, HttpMethod};
pub use meta_search::{MetaSearchClient, MetaSearchConfig, MetaSearchResult};
pub use registry::AdapterRegistry;
pub use request::{CallParams, RequestBuilder, RequestDescriptor};

use crate::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// HTTP client configuration for upstream provider calls
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Fixed per-call timeout
    pub timeout: Duration,
    /// Connection timeout duration
    pub connect_timeout: Duration,
    /// User agent string
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(5),
            user_agent: concat!("audio-hub/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl HttpClientConfig {
    /// Build the shared client used by every provider
    pub fn build_client(&self) -> Result<reqwest::Client> {
        Ok(reqwest::Client::builder()
            .timeout(self.timeout)
            .connect_timeout(self.connect_timeout)
            .user_agent(&self.user_agent)
            .build()?)
    }
}

/// A title found by a provider search, in the provider-independent schema
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    pub id: String,
    pub title: String,
    pub author_or_anchor: String,
    pub cover_image: String,
    pub description: String,
    /// Chapter count as text, `N/A` when the provider does not report it
    pub chapter_count: String,
    /// Popularity as text, `N/A` when the provider does not report it
    pub popularity: String,
    /// Name of the provider that returned this book
    pub provider_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter {
    pub id: String,
    pub title: String,
    /// `MM:SS`, or the provider's own text
    pub duration: String,
    pub order: i64,
}

/// Title metadata that accompanies a chapter listing
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookInfo {
    pub title: String,
    pub cover_image: String,
    pub author: String,
    pub anchor: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationInfo {
    pub total_count: u64,
    pub total_pages: u64,
}

impl Default for PaginationInfo {
    fn default() -> Self {
        Self {
            total_count: 0,
            total_pages: 1,
        }
    }
}

/// One page of chapters plus the metadata needed to render it
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterListing {
    pub book: BookInfo,
    pub chapters: Vec<Chapter>,
    pub pagination: PaginationInfo,
}
