pub mod client;
pub mod config;
pub mod error;
pub mod logging;
pub mod repositories;

pub use client::providers::{
    AudioProvider, Capability, ConfigBasedProvider, ProviderError, SearchOutcome,
};
pub use client::{
    AdapterRegistry, Book, BookInfo, Chapter, ChapterListing, MetaSearchClient, MetaSearchConfig,
    MetaSearchResult, PaginationInfo,
};
pub use config::{Config, ConfigOverrides};
pub use error::{Error, Result};
pub use repositories::{
    DefinitionRepository, FileDefinitionRepository, InMemoryDefinitionRepository,
    ProviderDefinition, ProviderSummary,
};
