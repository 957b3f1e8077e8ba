//! # Capability configuration
//!
//! Strongly-typed form of one provider capability (search, chapters or url).
//! Raw blocks come from the definition store as loosely-shaped JSON; they are
//! validated once, when the provider is constructed, so that malformed
//! mappings are rejected up front instead of surfacing while a response is
//! being normalized.
//!
//! Raw blocks accept a few historical spellings: `url` / `_url` for
//! `url_template`, `post_data` for `body_spec` (with `type` / `data` for
//! `encoding` / `template`), and JSON-encoded strings wherever an object is
//! expected.

use crate::client::template::{self, Placeholder};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// The literal marker that short-circuits a field lookup
pub const LITERAL_MARKER: &str = "N/A";

/// Errors found while validating a capability block
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("capability block must be an object")]
    NotAnObject,

    #[error("unsupported HTTP method: {0}")]
    UnsupportedMethod(String),

    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ConfigurationError {
    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    /// Whether a configured body is sent with this method
    #[must_use]
    pub const fn carries_body(self) -> bool {
        matches!(self, Self::Post)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }
}

impl FromStr for HttpMethod {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "" | "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "DELETE" => Ok(Self::Delete),
            _ => Err(ConfigurationError::UnsupportedMethod(s.to_string())),
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BodyEncoding {
    Json,
    #[default]
    Form,
}

/// Request body template, sent with POST only
#[derive(Debug, Clone, PartialEq)]
pub struct BodySpec {
    pub encoding: BodyEncoding,
    /// String leaves may contain placeholders
    pub template: Map<String, Value>,
}

/// A configured comparison value, restricted to scalars and nested mappings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MappingValue {
    Bool(bool),
    Number(serde_json::Number),
    String(String),
    Map(BTreeMap<String, MappingValue>),
}

impl MappingValue {
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Self::Bool(b) => Value::Bool(*b),
            Self::Number(n) => Value::Number(n.clone()),
            Self::String(s) => Value::String(s.clone()),
            Self::Map(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_value()))
                    .collect(),
            ),
        }
    }

    /// Exact, type-sensitive equality: `0` never matches `"0"` or `false`
    #[must_use]
    pub fn matches(&self, actual: Option<&Value>) -> bool {
        actual.is_some_and(|value| self.to_value() == *value)
    }
}

/// Where an output field gets its value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FieldSource {
    /// Always the literal string `N/A`
    Literal,
    /// Dotted path into the response item
    Path(String),
}

impl From<String> for FieldSource {
    fn from(s: String) -> Self {
        if s == LITERAL_MARKER {
            Self::Literal
        } else {
            Self::Path(s)
        }
    }
}

impl From<FieldSource> for String {
    fn from(source: FieldSource) -> Self {
        match source {
            FieldSource::Literal => LITERAL_MARKER.to_string(),
            FieldSource::Path(path) => path,
        }
    }
}

/// How numeric or textual durations are rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DurationFormat {
    /// Strings pass through, numbers are seconds
    #[default]
    Auto,
    /// Numbers and numeric strings are seconds
    Seconds,
    /// Whatever the provider sent, as text
    String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaginationMapping {
    pub total_count_field: Option<String>,
    pub max_page_field: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldMapping {
    pub success_field: Option<String>,
    pub success_value: Option<MappingValue>,
    pub data_path: Option<String>,
    pub fields: BTreeMap<String, FieldSource>,
    pub book_info_fields: BTreeMap<String, FieldSource>,
    pub chapter_fields: BTreeMap<String, FieldSource>,
    pub duration_format: DurationFormat,
    /// Path of the audio URL for the url capability
    pub url_field: Option<String>,
    pub pagination: Option<PaginationMapping>,
}

impl FieldMapping {
    /// Parse and validate a raw mapping block.
    pub fn from_raw(raw: &Value) -> Result<Self, ConfigurationError> {
        let raw = decode_embedded(raw, "field_mapping")?;
        let mut mapping: Self = serde_json::from_value(raw)
            .map_err(|e| ConfigurationError::invalid("field_mapping", e.to_string()))?;

        // Older configurations keep the duration hint among the chapter fields.
        if let Some(source) = mapping.chapter_fields.remove("duration_format") {
            let hint = String::from(source);
            mapping.duration_format =
                serde_json::from_value(Value::String(hint.clone())).map_err(|_| {
                    ConfigurationError::invalid("duration_format", format!("unknown format {hint}"))
                })?;
        }

        mapping.validate()?;
        Ok(mapping)
    }

    fn validate(&self) -> Result<(), ConfigurationError> {
        if self.success_field.is_some() && self.success_value.is_none() {
            return Err(ConfigurationError::invalid(
                "success_value",
                "success_field is set but success_value is missing",
            ));
        }
        for (field, path) in [
            ("success_field", &self.success_field),
            ("data_path", &self.data_path),
            ("url_field", &self.url_field),
        ] {
            if path.as_deref().is_some_and(|p| p.split('.').any(str::is_empty)) {
                return Err(ConfigurationError::invalid(field, "path has an empty segment"));
            }
        }
        Ok(())
    }
}

/// One validated capability of one provider
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CapabilityConfig {
    /// `None` means the capability is not offered
    pub url_template: Option<String>,
    pub method: HttpMethod,
    pub headers: BTreeMap<String, String>,
    /// Extra query-string pairs, values may contain placeholders
    pub query: Vec<(String, String)>,
    pub body: Option<BodySpec>,
    /// Fixed value for `{timestamp}` instead of the current time
    pub timestamp_override: Option<String>,
    pub field_mapping: FieldMapping,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawCapabilityConfig {
    #[serde(alias = "url", alias = "_url")]
    url_template: Option<String>,
    method: Option<String>,
    headers: Option<Value>,
    query: Option<Value>,
    #[serde(alias = "post_data")]
    body_spec: Option<Value>,
    timestamp: Option<Value>,
    field_mapping: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawBodySpec {
    #[serde(alias = "type")]
    encoding: Option<String>,
    #[serde(alias = "data")]
    template: Option<Value>,
}

impl CapabilityConfig {
    /// Validate a raw capability block.
    ///
    /// `mapping_override` is a field mapping stored separately on the provider
    /// definition; when present it replaces the block's own mapping.
    pub fn from_raw(
        raw: &Value,
        mapping_override: Option<&Value>,
    ) -> Result<Self, ConfigurationError> {
        if !raw.is_object() {
            return Err(ConfigurationError::NotAnObject);
        }
        let raw: RawCapabilityConfig = serde_json::from_value(raw.clone())
            .map_err(|e| ConfigurationError::invalid("capability", e.to_string()))?;

        let url_template = raw
            .url_template
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());

        let method = raw
            .method
            .as_deref()
            .map_or(Ok(HttpMethod::Get), str::parse::<HttpMethod>)?;

        let headers = match raw.headers {
            Some(value) => string_map(&decode_embedded(&value, "headers")?, "headers")?
                .into_iter()
                .collect(),
            None => BTreeMap::new(),
        };

        let query = match raw.query {
            Some(value) => string_map(&decode_embedded(&value, "query")?, "query")?,
            None => Vec::new(),
        };

        let body = raw.body_spec.map(|value| parse_body(&value)).transpose()?;

        let timestamp_override = match raw.timestamp {
            None | Some(Value::Null) => None,
            Some(Value::Number(n)) => Some(n.to_string()),
            Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Some(other) => {
                return Err(ConfigurationError::invalid(
                    "timestamp",
                    format!("expected a number, got {other}"),
                ))
            }
        };

        let field_mapping = match mapping_override.or(raw.field_mapping.as_ref()) {
            Some(value) => FieldMapping::from_raw(value)?,
            None => FieldMapping::default(),
        };

        Ok(Self {
            url_template,
            method,
            headers,
            query,
            body,
            timestamp_override,
            field_mapping,
        })
    }

    #[must_use]
    pub const fn is_supported(&self) -> bool {
        self.url_template.is_some()
    }

    /// Every placeholder a request built from this block would need.
    ///
    /// Covers the URL, header and query values, and the body when the method
    /// sends one.
    #[must_use]
    pub fn placeholders(&self) -> Vec<Placeholder> {
        let mut found = Vec::new();
        let texts = self
            .url_template
            .iter()
            .chain(self.headers.values())
            .chain(self.query.iter().map(|(_, value)| value));
        for text in texts {
            found.extend(template::referenced(text));
        }
        if let Some(body) = self.body.as_ref().filter(|_| self.method.carries_body()) {
            for value in body.template.values() {
                collect_leaves(value, &mut found);
            }
        }
        found.dedup();
        found
    }
}

fn collect_leaves(value: &Value, found: &mut Vec<Placeholder>) {
    match value {
        Value::String(s) => found.extend(template::referenced(s)),
        Value::Array(items) => items.iter().for_each(|v| collect_leaves(v, found)),
        Value::Object(map) => map.values().for_each(|v| collect_leaves(v, found)),
        _ => {}
    }
}

fn parse_body(value: &Value) -> Result<BodySpec, ConfigurationError> {
    let raw: RawBodySpec = serde_json::from_value(decode_embedded(value, "body_spec")?)
        .map_err(|e| ConfigurationError::invalid("body_spec", e.to_string()))?;

    let encoding = match raw.encoding.as_deref().map(str::trim) {
        Some("json") => BodyEncoding::Json,
        None | Some("" | "form") => BodyEncoding::Form,
        Some(other) => {
            return Err(ConfigurationError::invalid(
                "body_spec.encoding",
                format!("expected json or form, got {other}"),
            ))
        }
    };

    let template = match raw.template {
        Some(value) => match decode_embedded(&value, "body_spec.template")? {
            Value::Object(map) => map,
            other => {
                return Err(ConfigurationError::invalid(
                    "body_spec.template",
                    format!("expected an object, got {other}"),
                ))
            }
        },
        None => Map::new(),
    };

    Ok(BodySpec { encoding, template })
}

/// Objects stored by key/value backends arrive as JSON-encoded strings.
fn decode_embedded(value: &Value, field: &'static str) -> Result<Value, ConfigurationError> {
    match value {
        Value::String(s) if s.trim().is_empty() => Ok(Value::Object(Map::new())),
        Value::String(s) => serde_json::from_str(s)
            .map_err(|e| ConfigurationError::invalid(field, format!("not valid JSON: {e}"))),
        other => Ok(other.clone()),
    }
}

fn string_map(
    value: &Value,
    field: &'static str,
) -> Result<Vec<(String, String)>, ConfigurationError> {
    let Value::Object(map) = value else {
        return Err(ConfigurationError::invalid(field, "expected an object"));
    };
    map.iter()
        .map(|(key, value)| match value {
            Value::String(s) => Ok((key.clone(), s.clone())),
            Value::Number(n) => Ok((key.clone(), n.to_string())),
            Value::Bool(b) => Ok((key.clone(), b.to_string())),
            _ => Err(ConfigurationError::invalid(
                field,
                format!("value for {key} must be a string"),
            )),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_minimal_block() {
        let config = CapabilityConfig::from_raw(&json!({"url": "https://a/{keyword}"}), None)
            .unwrap();
        assert_eq!(config.url_template.as_deref(), Some("https://a/{keyword}"));
        assert_eq!(config.method, HttpMethod::Get);
        assert!(config.body.is_none());
        assert!(config.is_supported());
    }

    #[test]
    fn test_missing_url_is_unsupported_not_invalid() {
        let config = CapabilityConfig::from_raw(&json!({"method": "POST"}), None).unwrap();
        assert!(!config.is_supported());

        let blank = CapabilityConfig::from_raw(&json!({"_url": "  "}), None).unwrap();
        assert!(!blank.is_supported());
    }

    #[test]
    fn test_legacy_spellings() {
        let raw = json!({
            "_url": "https://a/search",
            "method": "post",
            "headers": "{\"Referer\": \"https://a\", \"X-Page\": 1}",
            "post_data": {"type": "json", "data": {"kw": "{keyword}", "page": 1}},
            "timestamp": 1_765_629_405_658_u64
        });
        let config = CapabilityConfig::from_raw(&raw, None).unwrap();

        assert_eq!(config.method, HttpMethod::Post);
        assert_eq!(config.headers.get("Referer").map(String::as_str), Some("https://a"));
        assert_eq!(config.headers.get("X-Page").map(String::as_str), Some("1"));
        let body = config.body.unwrap();
        assert_eq!(body.encoding, BodyEncoding::Json);
        assert_eq!(body.template.get("kw"), Some(&json!("{keyword}")));
        assert_eq!(config.timestamp_override.as_deref(), Some("1765629405658"));
    }

    #[test]
    fn test_placeholders_cover_every_template() {
        let raw = json!({
            "url": "https://a/{bookId}?p={page}",
            "method": "POST",
            "headers": {"X-Ts": "{timestamp}"},
            "query": {"n": "{size}"},
            "body_spec": {"template": {"inner": {"ids": ["{trackId}"]}}}
        });
        let found = CapabilityConfig::from_raw(&raw, None).unwrap().placeholders();
        for placeholder in [
            Placeholder::BookId,
            Placeholder::Page,
            Placeholder::Timestamp,
            Placeholder::Size,
            Placeholder::ChapterId,
        ] {
            assert!(found.contains(&placeholder), "{placeholder} not found");
        }
        assert!(!found.contains(&Placeholder::Keyword));

        // a body that is never sent needs nothing
        let get = json!({"url": "https://a/", "body_spec": {"template": {"k": "{keyword}"}}});
        assert!(CapabilityConfig::from_raw(&get, None).unwrap().placeholders().is_empty());
    }

    #[test]
    fn test_body_defaults_to_form() {
        let raw = json!({"url": "u", "method": "PUT", "body_spec": {"template": {"a": "b"}}});
        let config = CapabilityConfig::from_raw(&raw, None).unwrap();
        assert_eq!(config.body.unwrap().encoding, BodyEncoding::Form);
    }

    #[test]
    fn test_rejects_malformed_blocks() {
        assert_eq!(
            CapabilityConfig::from_raw(&json!("nope"), None),
            Err(ConfigurationError::NotAnObject)
        );
        assert!(matches!(
            CapabilityConfig::from_raw(&json!({"url": "u", "method": "PATCH"}), None),
            Err(ConfigurationError::UnsupportedMethod(_))
        ));
        assert!(CapabilityConfig::from_raw(&json!({"url": "u", "headers": "{oops"}), None).is_err());
        assert!(CapabilityConfig::from_raw(&json!({"url": "u", "headers": {"a": [1]}}), None).is_err());
        assert!(CapabilityConfig::from_raw(
            &json!({"url": "u", "body_spec": {"encoding": "xml"}}),
            None
        )
        .is_err());
    }

    #[test]
    fn test_field_mapping_validation() {
        let ok = FieldMapping::from_raw(&json!({
            "success_field": "code",
            "success_value": 0,
            "data_path": "data.items",
            "fields": {"id": "bookId", "title": "N/A"}
        }))
        .unwrap();
        assert_eq!(ok.fields.get("title"), Some(&FieldSource::Literal));
        assert_eq!(ok.fields.get("id"), Some(&FieldSource::Path("bookId".to_string())));

        // success_field without success_value
        assert!(FieldMapping::from_raw(&json!({"success_field": "code"})).is_err());
        // non-string field source
        assert!(FieldMapping::from_raw(&json!({"fields": {"id": 3}})).is_err());
        // array comparison value
        assert!(FieldMapping::from_raw(&json!({"success_field": "a", "success_value": [1]})).is_err());
        // broken path
        assert!(FieldMapping::from_raw(&json!({"data_path": "data..list"})).is_err());
    }

    #[test]
    fn test_duration_hint_moved_out_of_chapter_fields() {
        let mapping = FieldMapping::from_raw(&json!({
            "chapter_fields": {"duration": "len", "duration_format": "seconds"}
        }))
        .unwrap();
        assert_eq!(mapping.duration_format, DurationFormat::Seconds);
        assert!(!mapping.chapter_fields.contains_key("duration_format"));

        assert!(FieldMapping::from_raw(&json!({"chapter_fields": {"duration_format": "hours"}}))
            .is_err());
    }

    #[test]
    fn test_mapping_override_wins() {
        let raw = json!({"url": "u", "field_mapping": {"data_path": "inner"}});
        let config =
            CapabilityConfig::from_raw(&raw, Some(&json!("{\"data_path\": \"outer\"}"))).unwrap();
        assert_eq!(config.field_mapping.data_path.as_deref(), Some("outer"));
    }

    #[test]
    fn test_mapping_value_is_type_sensitive() {
        let zero = MappingValue::Number(0.into());
        assert!(zero.matches(Some(&json!(0))));
        assert!(!zero.matches(Some(&json!("0"))));
        assert!(!zero.matches(Some(&json!(false))));
        assert!(!zero.matches(None));

        let ok = MappingValue::String("ok".to_string());
        assert!(ok.matches(Some(&json!("ok"))));
    }
}
