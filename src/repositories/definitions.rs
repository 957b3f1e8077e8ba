//! # Provider definitions
//!
//! A definition names a provider and carries its three raw capability
//! blocks. The blocks stay loosely typed here; they are validated when an
//! adapter is built from them.

use super::{DefinitionRepository, RepositoryError, RepositoryResult};
use crate::client::capability::ConfigurationError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

const fn default_enabled() -> bool {
    true
}

/// A stored provider definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderDefinition {
    /// Unique provider name
    #[serde(alias = "interface_name")]
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default, alias = "search_config", skip_serializing_if = "Option::is_none")]
    pub search: Option<Value>,
    #[serde(default, alias = "chapters_config", skip_serializing_if = "Option::is_none")]
    pub chapters: Option<Value>,
    #[serde(default, alias = "url_config", skip_serializing_if = "Option::is_none")]
    pub url: Option<Value>,
    /// Per-capability mappings (`search`, `chapters`, `url`) that replace the
    /// mapping inside the matching block
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_mapping: Option<Value>,
}

impl ProviderDefinition {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            display_name: name.clone(),
            name,
            description: None,
            enabled: true,
            search: None,
            chapters: None,
            url: None,
            field_mapping: None,
        }
    }

    /// Definition-level mapping overrides, keyed by capability name.
    ///
    /// The stored value may be an object or a JSON-encoded object.
    pub fn field_mapping_overrides(&self) -> Result<Option<Map<String, Value>>, ConfigurationError> {
        let invalid = |reason: String| ConfigurationError::Invalid {
            field: "field_mapping",
            reason,
        };
        match &self.field_mapping {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Object(map)) => Ok(Some(map.clone())),
            Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
            Some(Value::String(s)) => match serde_json::from_str::<Value>(s) {
                Ok(Value::Object(map)) => Ok(Some(map)),
                Ok(other) => Err(invalid(format!("expected an object, got {other}"))),
                Err(e) => Err(invalid(e.to_string())),
            },
            Some(other) => Err(invalid(format!("expected an object, got {other}"))),
        }
    }

    #[must_use]
    pub fn summary(&self) -> ProviderSummary {
        ProviderSummary {
            name: self.name.clone(),
            display_name: if self.display_name.is_empty() {
                self.name.clone()
            } else {
                self.display_name.clone()
            },
            description: self.description.clone().unwrap_or_default(),
        }
    }
}

/// What callers see when listing enabled providers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderSummary {
    pub name: String,
    pub display_name: String,
    pub description: String,
}

fn validate_name(name: &str) -> RepositoryResult<()> {
    if name.trim().is_empty() {
        return Err(RepositoryError::Validation {
            field: "name".to_string(),
            message: "provider name must not be empty".to_string(),
        });
    }
    Ok(())
}

/// In-memory definition store
#[derive(Debug, Default, Clone)]
pub struct InMemoryDefinitionRepository {
    definitions: Arc<RwLock<HashMap<String, ProviderDefinition>>>,
}

impl InMemoryDefinitionRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store from an initial set of definitions
    pub fn with_definitions(
        definitions: impl IntoIterator<Item = ProviderDefinition>,
    ) -> RepositoryResult<Self> {
        let mut map = HashMap::new();
        for definition in definitions {
            validate_name(&definition.name)?;
            if map.contains_key(&definition.name) {
                return Err(RepositoryError::ConstraintViolation {
                    message: format!("duplicate provider name '{}'", definition.name),
                });
            }
            map.insert(definition.name.clone(), definition);
        }
        Ok(Self {
            definitions: Arc::new(RwLock::new(map)),
        })
    }

    /// Insert or replace the definition with the same name
    pub async fn upsert(&self, definition: ProviderDefinition) -> RepositoryResult<()> {
        validate_name(&definition.name)?;
        debug!("Stored provider definition: {}", definition.name);
        self.definitions
            .write()
            .await
            .insert(definition.name.clone(), definition);
        Ok(())
    }

    /// Remove a definition, returning whether it existed
    pub async fn remove(&self, name: &str) -> bool {
        let removed = self.definitions.write().await.remove(name).is_some();
        debug!("Removed provider definition {}: {}", name, removed);
        removed
    }
}

#[async_trait]
impl DefinitionRepository for InMemoryDefinitionRepository {
    fn name(&self) -> &'static str {
        "in-memory"
    }

    async fn find_definition(&self, name: &str) -> RepositoryResult<Option<ProviderDefinition>> {
        Ok(self.definitions.read().await.get(name).cloned())
    }

    async fn list_definitions(&self) -> RepositoryResult<Vec<ProviderDefinition>> {
        let mut definitions: Vec<_> = self.definitions.read().await.values().cloned().collect();
        definitions.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(definitions)
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DefinitionFile {
    Wrapped { providers: Vec<ProviderDefinition> },
    Bare(Vec<ProviderDefinition>),
}

/// Definitions read from a TOML or JSON file on every call
#[derive(Debug, Clone)]
pub struct FileDefinitionRepository {
    path: PathBuf,
}

impl FileDefinitionRepository {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn parse(&self, contents: &str) -> RepositoryResult<Vec<ProviderDefinition>> {
        let serialization = |message: String| RepositoryError::Serialization {
            message: format!("{}: {message}", self.path.display()),
        };

        let is_json = self
            .path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        let file: DefinitionFile = if is_json {
            serde_json::from_str(contents).map_err(|e| serialization(e.to_string()))?
        } else {
            toml::from_str(contents).map_err(|e| serialization(e.to_string()))?
        };

        let definitions = match file {
            DefinitionFile::Wrapped { providers } | DefinitionFile::Bare(providers) => providers,
        };

        let mut seen = HashSet::new();
        for definition in &definitions {
            validate_name(&definition.name)?;
            if !seen.insert(definition.name.as_str()) {
                return Err(RepositoryError::ConstraintViolation {
                    message: format!(
                        "duplicate provider name '{}' in {}",
                        definition.name,
                        self.path.display()
                    ),
                });
            }
        }
        Ok(definitions)
    }

    async fn load(&self) -> RepositoryResult<Vec<ProviderDefinition>> {
        let contents = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| RepositoryError::Storage {
                message: format!("cannot read {}: {e}", self.path.display()),
            })?;
        let definitions = self.parse(&contents)?;
        info!(
            "Loaded {} provider definitions from {}",
            definitions.len(),
            self.path.display()
        );
        Ok(definitions)
    }
}

#[async_trait]
impl DefinitionRepository for FileDefinitionRepository {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn find_definition(&self, name: &str) -> RepositoryResult<Option<ProviderDefinition>> {
        Ok(self.load().await?.into_iter().find(|d| d.name == name))
    }

    async fn list_definitions(&self) -> RepositoryResult<Vec<ProviderDefinition>> {
        self.load().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    const TOML_DEFINITIONS: &str = r#"
[[providers]]
name = "lam"
display_name = "Lam Radio"
description = "sample"

[providers.search]
url = "https://lam.example.com/search?kw={keyword}"

[providers.search.field_mapping]
data_path = "data.bookData"

[[providers]]
name = "off"
enabled = false
"#;

    fn write_file(suffix: &str, contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[tokio::test]
    async fn test_toml_file_definitions() {
        let file = write_file(".toml", TOML_DEFINITIONS);
        let repo = FileDefinitionRepository::new(file.path());

        let all = repo.list_definitions().await.unwrap();
        assert_eq!(all.len(), 2);

        let enabled = repo.list_enabled().await.unwrap();
        assert_eq!(enabled.len(), 1);
        assert_eq!(enabled[0].summary().display_name, "Lam Radio");

        let lam = repo.find_definition("lam").await.unwrap().unwrap();
        assert_eq!(
            lam.search.unwrap()["field_mapping"]["data_path"],
            json!("data.bookData")
        );

        // disabled definitions are still found by name
        assert!(repo.find_definition("off").await.unwrap().is_some());
        assert!(repo.find_definition("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_json_file_definitions_and_reread() {
        let file = write_file(".json", r#"[{"interface_name": "a", "display_name": "A"}]"#);
        let repo = FileDefinitionRepository::new(file.path());
        assert_eq!(repo.list_definitions().await.unwrap().len(), 1);

        std::fs::write(
            file.path(),
            r#"{"providers": [{"name": "a"}, {"name": "b", "enabled": false}]}"#,
        )
        .unwrap();
        let names: Vec<_> = repo
            .list_definitions()
            .await
            .unwrap()
            .into_iter()
            .map(|d| d.name)
            .collect();
        assert_eq!(names, ["a", "b"]);
    }

    #[tokio::test]
    async fn test_duplicate_names_rejected() {
        let file = write_file(".json", r#"[{"name": "a"}, {"name": "a"}]"#);
        let repo = FileDefinitionRepository::new(file.path());
        assert!(matches!(
            repo.list_definitions().await,
            Err(RepositoryError::ConstraintViolation { .. })
        ));
    }

    #[tokio::test]
    async fn test_missing_file_is_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        let repo = FileDefinitionRepository::new(dir.path().join("none.toml"));
        assert!(matches!(
            repo.find_definition("a").await,
            Err(RepositoryError::Storage { .. })
        ));
    }

    #[tokio::test]
    async fn test_in_memory_upsert_and_remove() {
        let repo = InMemoryDefinitionRepository::new();
        repo.upsert(ProviderDefinition::new("b")).await.unwrap();
        repo.upsert(ProviderDefinition::new("a")).await.unwrap();

        let mut replaced = ProviderDefinition::new("a");
        replaced.enabled = false;
        repo.upsert(replaced).await.unwrap();

        let names: Vec<_> = repo
            .list_definitions()
            .await
            .unwrap()
            .into_iter()
            .map(|d| d.name)
            .collect();
        assert_eq!(names, ["a", "b"]);
        assert_eq!(repo.list_enabled().await.unwrap().len(), 1);

        assert!(repo.remove("a").await);
        assert!(!repo.remove("a").await);
        assert!(repo.upsert(ProviderDefinition::new("  ")).await.is_err());
    }

    #[test]
    fn test_field_mapping_overrides_accept_json_string() {
        let mut definition = ProviderDefinition::new("a");
        definition.field_mapping = Some(json!(r#"{"search": {"data_path": "x"}}"#));
        let overrides = definition.field_mapping_overrides().unwrap().unwrap();
        assert_eq!(overrides["search"]["data_path"], json!("x"));

        definition.field_mapping = Some(json!("[1]"));
        assert!(definition.field_mapping_overrides().is_err());
    }

    #[test]
    fn test_duplicate_names_rejected_in_memory() {
        let result = InMemoryDefinitionRepository::with_definitions([
            ProviderDefinition::new("x"),
            ProviderDefinition::new("x"),
        ]);
        assert!(result.is_err());
    }
}
