//! # Provider definition storage
//!
//! Provider definitions are owned by an outside collaborator (an admin tool,
//! a file on disk). The core only reads them, through the
//! [`DefinitionRepository`] trait, and never caches what it reads: the
//! adapter registry decides when a definition is looked at again.
//!
//! - [`InMemoryDefinitionRepository`]: mutable store for embedding and tests
//! - [`FileDefinitionRepository`]: TOML or JSON file, re-read on every call

pub mod definitions;

pub use definitions::{
    FileDefinitionRepository, InMemoryDefinitionRepository, ProviderDefinition, ProviderSummary,
};

use async_trait::async_trait;
use std::fmt::Debug;

/// Common repository error types
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: String, id: String },

    #[error("Storage error: {message}")]
    Storage { message: String },

    #[error("Serialization error: {message}")]
    Serialization { message: String },

    #[error("Validation error: {field} - {message}")]
    Validation { field: String, message: String },

    #[error("Constraint violation: {message}")]
    ConstraintViolation { message: String },
}

/// Repository result type
pub type RepositoryResult<T> = std::result::Result<T, RepositoryError>;

/// Read access to provider definitions
#[async_trait]
pub trait DefinitionRepository: Send + Sync + Debug {
    /// Returns the name of the repository for logging and debugging
    fn name(&self) -> &'static str;

    /// Definition with the given unique name, enabled or not
    async fn find_definition(&self, name: &str) -> RepositoryResult<Option<ProviderDefinition>>;

    /// Every stored definition
    async fn list_definitions(&self) -> RepositoryResult<Vec<ProviderDefinition>>;

    /// Definitions with `enabled` set
    async fn list_enabled(&self) -> RepositoryResult<Vec<ProviderDefinition>> {
        let mut definitions = self.list_definitions().await?;
        definitions.retain(|d| d.enabled);
        Ok(definitions)
    }
}
