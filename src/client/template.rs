//! Placeholder substitution for URL, header and body templates.
//!
//! Tokens are `{name}` where `name` is one of the recognized placeholders.
//! `{{` and `}}` produce literal braces. Any other brace-delimited text is
//! copied through untouched. Substitution is a single left-to-right pass, so
//! substituted values are never scanned for placeholders themselves.

use std::fmt;
use thiserror::Error;

/// A recognized template token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Placeholder {
    Keyword,
    BookId,
    /// `{chapterId}` and its alias `{trackId}`
    ChapterId,
    Page,
    Size,
    Timestamp,
}

impl Placeholder {
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "keyword" => Some(Self::Keyword),
            "bookId" => Some(Self::BookId),
            "chapterId" | "trackId" => Some(Self::ChapterId),
            "page" => Some(Self::Page),
            "size" => Some(Self::Size),
            "timestamp" => Some(Self::Timestamp),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Keyword => "keyword",
            Self::BookId => "bookId",
            Self::ChapterId => "chapterId",
            Self::Page => "page",
            Self::Size => "size",
            Self::Timestamp => "timestamp",
        }
    }
}

impl fmt::Display for Placeholder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}}}", self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("template references {0} but no value was supplied")]
    MissingValue(Placeholder),
}

/// Where the rendered text ends up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderTarget {
    /// URL templates: the keyword is percent-encoded
    Url,
    /// Header values and body leaves: values are inserted verbatim
    Text,
}

/// Call-time values for each placeholder
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateValues {
    pub keyword: Option<String>,
    pub book_id: Option<String>,
    pub chapter_id: Option<String>,
    pub page: Option<String>,
    pub size: Option<String>,
    pub timestamp: Option<String>,
}

impl TemplateValues {
    #[must_use]
    pub fn get(&self, placeholder: Placeholder) -> Option<&str> {
        match placeholder {
            Placeholder::Keyword => self.keyword.as_deref(),
            Placeholder::BookId => self.book_id.as_deref(),
            Placeholder::ChapterId => self.chapter_id.as_deref(),
            Placeholder::Page => self.page.as_deref(),
            Placeholder::Size => self.size.as_deref(),
            Placeholder::Timestamp => self.timestamp.as_deref(),
        }
    }
}

/// Substitute every recognized placeholder in `template`.
pub fn render(
    template: &str,
    values: &TemplateValues,
    target: RenderTarget,
) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(pos) = rest.find(['{', '}']) {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];

        if tail.starts_with("{{") {
            out.push('{');
            rest = &tail[2..];
            continue;
        }
        if tail.starts_with("}}") {
            out.push('}');
            rest = &tail[2..];
            continue;
        }
        if tail.starts_with('}') {
            out.push('}');
            rest = &tail[1..];
            continue;
        }

        match tail[1..].find(['{', '}']) {
            Some(end) if tail.as_bytes()[end + 1] == b'}' => {
                let token_len = end + 2;
                match Placeholder::from_name(&tail[1..=end]) {
                    Some(placeholder) => {
                        let value = values
                            .get(placeholder)
                            .ok_or(TemplateError::MissingValue(placeholder))?;
                        if target == RenderTarget::Url && placeholder == Placeholder::Keyword {
                            out.push_str(&urlencoding::encode(value));
                        } else {
                            out.push_str(value);
                        }
                    }
                    None => out.push_str(&tail[..token_len]),
                }
                rest = &tail[token_len..];
            }
            _ => {
                out.push('{');
                rest = &tail[1..];
            }
        }
    }

    out.push_str(rest);
    Ok(out)
}

/// Placeholders referenced by `template`, in order of appearance.
#[must_use]
pub fn referenced(template: &str) -> Vec<Placeholder> {
    let mut found = Vec::new();
    let mut rest = template;
    while let Some(pos) = rest.find('{') {
        let tail = &rest[pos + 1..];
        if let Some(stripped) = tail.strip_prefix('{') {
            rest = stripped;
            continue;
        }
        match tail.find(['{', '}']) {
            Some(end) if tail.as_bytes()[end] == b'}' => {
                if let Some(placeholder) = Placeholder::from_name(&tail[..end]) {
                    found.push(placeholder);
                }
                rest = &tail[end + 1..];
            }
            _ => rest = tail,
        }
    }
    found
}
