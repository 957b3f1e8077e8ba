use crate::client::template::Placeholder;
use crate::client::{Book, ChapterListing};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// The three operations a provider may offer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    Search,
    Chapters,
    Url,
}

impl Capability {
    pub const ALL: [Self; 3] = [Self::Search, Self::Chapters, Self::Url];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Search => "search",
            Self::Chapters => "chapters",
            Self::Url => "url",
        }
    }

    /// Whether calls of this capability can fill `placeholder`
    #[must_use]
    pub const fn supplies(self, placeholder: Placeholder) -> bool {
        match placeholder {
            Placeholder::Timestamp => true,
            Placeholder::Keyword => matches!(self, Self::Search),
            Placeholder::BookId => matches!(self, Self::Chapters | Self::Url),
            Placeholder::ChapterId => matches!(self, Self::Url),
            Placeholder::Page | Placeholder::Size => matches!(self, Self::Chapters),
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur during provider operations
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Upstream returned HTTP {0}")]
    Status(u16),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid query: {field} - {reason}")]
    InvalidQuery { field: String, reason: String },

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl ProviderError {
    /// Failures of the upstream exchange itself, as opposed to bad input
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Status(_) | Self::Timeout(_))
    }
}

/// What one provider search produced
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchOutcome {
    pub books: Vec<Book>,
    /// Set when the upstream exchange failed or its body was unusable
    pub failure: Option<String>,
}

/// An upstream audio content provider.
///
/// Only invalid caller input is reported as `Err`. Upstream failures of any
/// kind (transport, HTTP status, malformed or unsuccessful responses) are
/// logged by the implementation and surface as an empty result.
/// [`search_outcome`](Self::search_outcome) also names the failure so that
/// aggregated searches can report it.
#[async_trait]
pub trait AudioProvider: Send + Sync {
    /// Unique name of this provider
    fn name(&self) -> &str;

    /// Whether the given capability is configured
    fn supports(&self, capability: Capability) -> bool;

    /// Search the provider catalogue, keeping any upstream failure
    async fn search_outcome(&self, keyword: &str) -> Result<SearchOutcome, ProviderError>;

    /// Search the provider catalogue
    async fn search(&self, keyword: &str) -> Result<Vec<Book>, ProviderError> {
        Ok(self.search_outcome(keyword).await?.books)
    }

    /// One page of chapters of a book, plus book info and pagination
    async fn list_chapters(
        &self,
        book_id: &str,
        page: u32,
        size: u32,
    ) -> Result<ChapterListing, ProviderError>;

    /// Playable URL of one chapter
    async fn resolve_audio_url(
        &self,
        book_id: Option<&str>,
        chapter_id: &str,
    ) -> Result<Option<String>, ProviderError>;
}
