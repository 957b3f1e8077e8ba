//! # Response normalization
//!
//! Converts an arbitrary upstream JSON document into the fixed [`Book`],
//! [`Chapter`] and audio URL schema, driven entirely by a [`FieldMapping`].
//!
//! Every failure here is a normal outcome: a response that fails its success
//! check, or whose data sits in an unexpected shape, simply normalizes to an
//! empty result and is logged.

use super::capability::{DurationFormat, FieldMapping, FieldSource, PaginationMapping, LITERAL_MARKER};
use super::path::{get_path, value_to_i64, value_to_text};
use super::providers::Capability;
use super::{Book, BookInfo, Chapter, ChapterListing, PaginationInfo};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, info};

const DEFAULT_SEARCH_DATA_PATH: &str = "data.bookData";
const DEFAULT_CHAPTERS_DATA_PATH: &str = "data.list";
const DEFAULT_URL_FIELD: &str = "src";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldClass {
    /// Defaults to the empty string
    Text,
    /// Counts and popularity, defaults to `N/A`
    Numeric,
}

struct FieldSpec {
    /// Mapping keys that may configure this field, first match wins
    keys: &'static [&'static str],
    /// Source path used when none of the keys is mapped
    default_path: Option<&'static str>,
    class: FieldClass,
}

const fn spec(
    keys: &'static [&'static str],
    default_path: Option<&'static str>,
    class: FieldClass,
) -> FieldSpec {
    FieldSpec {
        keys,
        default_path,
        class,
    }
}

const BOOK_ID: FieldSpec = spec(&["id"], Some("id"), FieldClass::Text);
const BOOK_TITLE: FieldSpec = spec(&["title", "bookTitle"], Some("bookTitle"), FieldClass::Text);
const BOOK_AUTHOR: FieldSpec = spec(
    &["author_or_anchor", "author", "bookAnchor"],
    Some("bookAnchor"),
    FieldClass::Text,
);
const BOOK_COVER: FieldSpec = spec(&["cover_image", "bookImage"], Some("bookImage"), FieldClass::Text);
const BOOK_DESC: FieldSpec = spec(&["description", "bookDesc"], Some("bookDesc"), FieldClass::Text);
const BOOK_COUNT: FieldSpec = spec(&["chapter_count", "count"], Some("count"), FieldClass::Numeric);
const BOOK_HEAT: FieldSpec = spec(&["popularity", "heat"], Some("heat"), FieldClass::Numeric);

const CHAPTER_ID: FieldSpec = spec(&["id", "chapter_id", "chapterId"], Some("chapterId"), FieldClass::Text);
const CHAPTER_TITLE: FieldSpec = spec(&["title"], Some("title"), FieldClass::Text);
const CHAPTER_DURATION: FieldSpec = spec(&["duration"], Some("time"), FieldClass::Text);
const CHAPTER_ORDER: FieldSpec = spec(&["order"], Some("position"), FieldClass::Numeric);

const INFO_TITLE: FieldSpec = spec(&["title", "book_title"], Some("bookTitle"), FieldClass::Text);
const INFO_COVER: FieldSpec = spec(&["cover_image", "book_image"], Some("bookImage"), FieldClass::Text);
const INFO_AUTHOR: FieldSpec = spec(&["author", "book_author"], None, FieldClass::Text);
const INFO_ANCHOR: FieldSpec = spec(&["anchor", "book_anchor"], Some("bookHost"), FieldClass::Text);

enum Lookup<'a> {
    Literal,
    Found(&'a Value),
    Missing,
}

fn lookup<'a>(item: &'a Value, map: &BTreeMap<String, FieldSource>, spec: &FieldSpec) -> Lookup<'a> {
    let path = match spec.keys.iter().find_map(|key| map.get(*key)) {
        Some(FieldSource::Literal) => return Lookup::Literal,
        Some(FieldSource::Path(path)) => Some(path.as_str()),
        None => spec.default_path,
    };
    match path.and_then(|p| get_path(item, p)) {
        Some(Value::String(s)) if s.is_empty() => Lookup::Missing,
        Some(value) => Lookup::Found(value),
        None => Lookup::Missing,
    }
}

fn field_text(item: &Value, map: &BTreeMap<String, FieldSource>, spec: &FieldSpec) -> String {
    match lookup(item, map, spec) {
        Lookup::Literal => LITERAL_MARKER.to_string(),
        Lookup::Found(value) => value_to_text(value),
        Lookup::Missing => match spec.class {
            FieldClass::Text => String::new(),
            FieldClass::Numeric => LITERAL_MARKER.to_string(),
        },
    }
}

/// Render a duration as `MM:SS`.
///
/// Numbers are seconds; strings pass through unless `format` asks for
/// seconds; missing or zero durations become `00:00`.
#[must_use]
pub fn format_duration(value: Option<&Value>, format: DurationFormat) -> String {
    const ZERO: &str = "00:00";

    let Some(value) = value else {
        return ZERO.to_string();
    };

    match (format, value) {
        (_, Value::String(s)) if s.is_empty() => ZERO.to_string(),
        (_, Value::Bool(false)) => ZERO.to_string(),
        (DurationFormat::String, other) => value_to_text(other),
        (DurationFormat::Auto, Value::String(s)) => s.clone(),
        (_, other) => match value_to_i64(other) {
            Some(seconds) if seconds > 0 => format!("{:02}:{:02}", seconds / 60, seconds % 60),
            Some(_) => ZERO.to_string(),
            None => value_to_text(other),
        },
    }
}

/// Pagination from explicit fields, falling back to `ceil(total_count / size)`.
#[must_use]
pub fn pagination_info(raw: &Value, mapping: Option<&PaginationMapping>, size: u32) -> PaginationInfo {
    let mut info = PaginationInfo::default();
    let Some(mapping) = mapping else {
        return info;
    };

    let read = |field: Option<&String>| {
        field
            .and_then(|path| get_path(raw, path))
            .and_then(value_to_i64)
            .and_then(|n| u64::try_from(n).ok())
            .filter(|n| *n > 0)
    };

    let total_count = read(mapping.total_count_field.as_ref());
    let total_pages = read(mapping.max_page_field.as_ref()).or_else(|| {
        total_count
            .filter(|_| size > 0)
            .map(|count| count.div_ceil(u64::from(size)))
    });

    if let Some(count) = total_count {
        info.total_count = count;
    }
    if let Some(pages) = total_pages {
        info.total_pages = pages;
    }
    info
}

/// Output of [`ResponseNormalizer::normalize`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NormalizedResult {
    Books(Vec<Book>),
    Chapters(ChapterListing),
    AudioUrl(Option<String>),
}

/// Applies one capability's field mapping to raw responses from one provider
#[derive(Debug, Clone, Copy)]
pub struct ResponseNormalizer<'a> {
    provider: &'a str,
    mapping: &'a FieldMapping,
}

impl<'a> ResponseNormalizer<'a> {
    #[must_use]
    pub const fn new(provider: &'a str, mapping: &'a FieldMapping) -> Self {
        Self { provider, mapping }
    }

    /// Normalize `raw` for `capability`; `page_size` only matters for chapters.
    #[must_use]
    pub fn normalize(&self, capability: Capability, raw: &Value, page_size: u32) -> NormalizedResult {
        match capability {
            Capability::Search => NormalizedResult::Books(self.books(raw)),
            Capability::Chapters => NormalizedResult::Chapters(self.chapters(raw, page_size)),
            Capability::Url => NormalizedResult::AudioUrl(self.audio_url(raw)),
        }
    }

    /// Success check; with no `success_field`, data must exist at `presence_path`.
    fn succeeded(&self, raw: &Value, presence_path: &str) -> bool {
        if let Some(field) = &self.mapping.success_field {
            let actual = get_path(raw, field);
            let ok = self
                .mapping
                .success_value
                .as_ref()
                .is_some_and(|expected| expected.matches(actual));
            if !ok {
                info!(
                    provider = %self.provider,
                    success_field = %field,
                    actual = ?actual,
                    "upstream reported failure"
                );
            }
            ok
        } else if get_path(raw, presence_path).is_none() {
            info!(provider = %self.provider, path = %presence_path, "no data at configured path");
            false
        } else {
            true
        }
    }

    fn list_at<'r>(&self, raw: &'r Value, default_path: &str) -> Option<&'r Vec<Value>> {
        let path = self.mapping.data_path.as_deref().unwrap_or(default_path);
        if !self.succeeded(raw, path) {
            return None;
        }
        match get_path(raw, path) {
            Some(Value::Array(items)) => Some(items),
            other => {
                info!(
                    provider = %self.provider,
                    path = %path,
                    found = other.map_or("nothing", value_kind),
                    "data shape mismatch, expected a list"
                );
                None
            }
        }
    }

    #[must_use]
    pub fn books(&self, raw: &Value) -> Vec<Book> {
        let Some(items) = self.list_at(raw, DEFAULT_SEARCH_DATA_PATH) else {
            return Vec::new();
        };
        let fields = &self.mapping.fields;

        let books: Vec<Book> = items
            .iter()
            .map(|item| Book {
                id: field_text(item, fields, &BOOK_ID),
                title: field_text(item, fields, &BOOK_TITLE),
                author_or_anchor: field_text(item, fields, &BOOK_AUTHOR),
                cover_image: field_text(item, fields, &BOOK_COVER),
                description: field_text(item, fields, &BOOK_DESC),
                chapter_count: field_text(item, fields, &BOOK_COUNT),
                popularity: field_text(item, fields, &BOOK_HEAT),
                provider_id: self.provider.to_string(),
            })
            .collect();

        debug!(provider = %self.provider, count = books.len(), "normalized search results");
        books
    }

    #[must_use]
    pub fn chapters(&self, raw: &Value, page_size: u32) -> ChapterListing {
        let Some(items) = self.list_at(raw, DEFAULT_CHAPTERS_DATA_PATH) else {
            return ChapterListing::default();
        };
        let fields = &self.mapping.chapter_fields;

        let book = items.first().map_or_else(BookInfo::default, |first| {
            let info_fields = &self.mapping.book_info_fields;
            BookInfo {
                title: field_text(first, info_fields, &INFO_TITLE),
                cover_image: field_text(first, info_fields, &INFO_COVER),
                author: field_text(first, info_fields, &INFO_AUTHOR),
                anchor: field_text(first, info_fields, &INFO_ANCHOR),
            }
        });

        let mut chapters: Vec<Chapter> = items
            .iter()
            .map(|item| {
                let duration = match lookup(item, fields, &CHAPTER_DURATION) {
                    Lookup::Literal => LITERAL_MARKER.to_string(),
                    Lookup::Found(value) => format_duration(Some(value), self.mapping.duration_format),
                    Lookup::Missing => format_duration(None, self.mapping.duration_format),
                };
                let order = match lookup(item, fields, &CHAPTER_ORDER) {
                    Lookup::Found(value) => value_to_i64(value).unwrap_or(0),
                    Lookup::Literal | Lookup::Missing => 0,
                };
                Chapter {
                    id: field_text(item, fields, &CHAPTER_ID),
                    title: field_text(item, fields, &CHAPTER_TITLE),
                    duration,
                    order,
                }
            })
            .collect();

        // sort_by_key is stable: equal orders keep upstream order
        chapters.sort_by_key(|chapter| chapter.order);

        debug!(provider = %self.provider, count = chapters.len(), "normalized chapter list");

        ChapterListing {
            book,
            chapters,
            pagination: pagination_info(raw, self.mapping.pagination.as_ref(), page_size),
        }
    }

    #[must_use]
    pub fn audio_url(&self, raw: &Value) -> Option<String> {
        let url_path = self.mapping.url_field.as_deref().unwrap_or(DEFAULT_URL_FIELD);
        let presence_path = self.mapping.data_path.as_deref().unwrap_or(url_path);
        if !self.succeeded(raw, presence_path) {
            return None;
        }

        match get_path(raw, url_path) {
            Some(Value::String(url)) if !url.trim().is_empty() => Some(url.trim().to_string()),
            other => {
                info!(
                    provider = %self.provider,
                    path = %url_path,
                    found = other.map_or("nothing", value_kind),
                    "no audio URL in response"
                );
                None
            }
        }
    }
}

const fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}
