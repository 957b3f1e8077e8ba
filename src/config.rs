//! Configuration management
//!
//! Precedence, lowest first: built-in defaults, the TOML config file,
//! `AUDIO_HUB_*` environment variables (`__` separates nested keys, e.g.
//! `AUDIO_HUB_HTTP__TIMEOUT_SECS=5`), then command-line overrides.

use crate::client::meta_search::{MetaSearchConfig, DEFAULT_HTTPS_UPGRADE_DOMAINS};
use crate::client::HttpClientConfig;
use crate::{Error, Result};
use config::{Config as ConfigBuilder, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const ENV_PREFIX: &str = "AUDIO_HUB";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub http: HttpConfig,
    pub providers: ProvidersConfig,
    pub aggregation: AggregationConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Fixed timeout for every upstream call
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub user_agent: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvidersConfig {
    /// TOML or JSON file holding the provider definitions
    pub definitions_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregationConfig {
    pub max_parallel_providers: usize,
    pub deduplicate_results: bool,
    pub https_upgrade_domains: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    /// `text` or `json`
    pub format: String,
}

/// Values given on the command line; they win over every other source
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub definitions_path: Option<PathBuf>,
    pub timeout_secs: Option<u64>,
    pub log_level: Option<String>,
    pub log_format: Option<String>,
}

fn default_definitions_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("audio-hub")
        .join("providers.toml")
}

impl Default for Config {
    fn default() -> Self {
        let http = HttpClientConfig::default();
        Self {
            http: HttpConfig {
                timeout_secs: http.timeout.as_secs(),
                connect_timeout_secs: http.connect_timeout.as_secs(),
                user_agent: http.user_agent,
            },
            providers: ProvidersConfig {
                definitions_path: default_definitions_path(),
            },
            aggregation: AggregationConfig {
                max_parallel_providers: 4,
                deduplicate_results: true,
                https_upgrade_domains: DEFAULT_HTTPS_UPGRADE_DOMAINS
                    .iter()
                    .map(|d| (*d).to_string())
                    .collect(),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "text".to_string(),
            },
        }
    }
}

impl Config {
    /// Load configuration from every source in precedence order
    pub fn load(config_file: Option<&Path>, overrides: &ConfigOverrides) -> Result<Self> {
        let defaults = Self::default();

        let mut builder = ConfigBuilder::builder()
            .set_default("http.timeout_secs", defaults.http.timeout_secs)?
            .set_default("http.connect_timeout_secs", defaults.http.connect_timeout_secs)?
            .set_default("http.user_agent", defaults.http.user_agent)?
            .set_default(
                "providers.definitions_path",
                defaults.providers.definitions_path.display().to_string(),
            )?
            .set_default(
                "aggregation.max_parallel_providers",
                u64::try_from(defaults.aggregation.max_parallel_providers).unwrap_or(4),
            )?
            .set_default(
                "aggregation.deduplicate_results",
                defaults.aggregation.deduplicate_results,
            )?
            .set_default(
                "aggregation.https_upgrade_domains",
                defaults.aggregation.https_upgrade_domains,
            )?
            .set_default("logging.level", defaults.logging.level)?
            .set_default("logging.format", defaults.logging.format)?;

        if let Some(path) = config_file {
            if !path.exists() {
                return Err(Error::InvalidConfig {
                    field: "config_file".to_string(),
                    reason: format!("{} does not exist", path.display()),
                });
            }
            builder = builder.add_source(File::from(path));
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        if let Some(path) = &overrides.definitions_path {
            builder = builder.set_override("providers.definitions_path", path.display().to_string())?;
        }
        if let Some(timeout) = overrides.timeout_secs {
            builder = builder.set_override("http.timeout_secs", timeout)?;
        }
        if let Some(level) = &overrides.log_level {
            builder = builder.set_override("logging.level", level.clone())?;
        }
        if let Some(format) = &overrides.log_format {
            builder = builder.set_override("logging.format", format.clone())?;
        }

        let config: Self = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a config file with no command-line overrides
    pub fn load_from_file(path: &Path) -> Result<Self> {
        Self::load(Some(path), &ConfigOverrides::default())
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |field: &str, reason: &str| {
            Err(Error::InvalidConfig {
                field: field.to_string(),
                reason: reason.to_string(),
            })
        };

        if self.http.timeout_secs == 0 {
            return invalid("http.timeout_secs", "must be greater than 0");
        }
        if self.http.connect_timeout_secs == 0 {
            return invalid("http.connect_timeout_secs", "must be greater than 0");
        }
        if self.providers.definitions_path.as_os_str().is_empty() {
            return invalid("providers.definitions_path", "cannot be empty");
        }
        if self.aggregation.max_parallel_providers == 0 {
            return invalid("aggregation.max_parallel_providers", "must be greater than 0");
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_ascii_lowercase().as_str()) {
            return invalid(
                "logging.level",
                &format!("must be one of: {valid_levels:?}"),
            );
        }
        let valid_formats = ["text", "json"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            return invalid(
                "logging.format",
                &format!("must be one of: {valid_formats:?}"),
            );
        }
        Ok(())
    }

    #[must_use]
    pub fn http_client_config(&self) -> HttpClientConfig {
        HttpClientConfig {
            timeout: Duration::from_secs(self.http.timeout_secs),
            connect_timeout: Duration::from_secs(self.http.connect_timeout_secs),
            user_agent: self.http.user_agent.clone(),
        }
    }

    #[must_use]
    pub fn meta_search_config(&self) -> MetaSearchConfig {
        MetaSearchConfig {
            max_parallel_providers: self.aggregation.max_parallel_providers,
            // one upstream call plus slack for normalization
            provider_timeout: Duration::from_secs(self.http.timeout_secs + 1),
            deduplicate_results: self.aggregation.deduplicate_results,
            https_upgrade_domains: self.aggregation.https_upgrade_domains.clone(),
        }
    }
}
