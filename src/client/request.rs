//! Turns a capability configuration plus call-time parameters into a concrete
//! HTTP request, and executes it.

use super::capability::{BodyEncoding, CapabilityConfig, HttpMethod};
use super::path::value_to_text;
use super::providers::ProviderError;
use super::template::{self, RenderTarget, TemplateError, TemplateValues};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Call-time inputs available to templates
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallParams {
    pub keyword: Option<String>,
    pub book_id: Option<String>,
    pub chapter_id: Option<String>,
    pub page: Option<u32>,
    pub size: Option<u32>,
}

impl CallParams {
    #[must_use]
    pub fn search(keyword: impl Into<String>) -> Self {
        Self {
            keyword: Some(keyword.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn chapters(book_id: impl Into<String>, page: u32, size: u32) -> Self {
        Self {
            book_id: Some(book_id.into()),
            page: Some(page),
            size: Some(size),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn audio(book_id: Option<&str>, chapter_id: impl Into<String>) -> Self {
        Self {
            book_id: book_id.map(str::to_string),
            chapter_id: Some(chapter_id.into()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Json(Value),
    Form(Vec<(String, String)>),
}

/// A fully rendered outbound request
#[derive(Debug, Clone, PartialEq)]
pub struct RequestDescriptor {
    pub method: HttpMethod,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub body: Option<RequestBody>,
}

pub struct RequestBuilder;

impl RequestBuilder {
    /// Render the request for one capability call.
    ///
    /// `Ok(None)` means the capability has no URL template and should be
    /// skipped. A template that references a value the caller did not supply
    /// is rejected as an invalid query.
    pub fn build(
        config: &CapabilityConfig,
        params: &CallParams,
    ) -> Result<Option<RequestDescriptor>, ProviderError> {
        let Some(url_template) = config.url_template.as_deref() else {
            return Ok(None);
        };

        let values = TemplateValues {
            keyword: params.keyword.clone(),
            book_id: params.book_id.clone(),
            chapter_id: params.chapter_id.clone(),
            page: params.page.map(|p| p.to_string()),
            size: params.size.map(|s| s.to_string()),
            timestamp: Some(
                config
                    .timestamp_override
                    .clone()
                    .unwrap_or_else(|| chrono::Utc::now().timestamp_millis().to_string()),
            ),
        };

        let mut url = template::render(url_template, &values, RenderTarget::Url)
            .map_err(missing_input)?;

        if !config.query.is_empty() {
            let mut parsed = Url::parse(&url).map_err(|e| {
                ProviderError::Configuration(format!("url_template does not render to a URL: {e}"))
            })?;
            {
                let mut pairs = parsed.query_pairs_mut();
                for (key, value) in &config.query {
                    let value = template::render(value, &values, RenderTarget::Text)
                        .map_err(missing_input)?;
                    pairs.append_pair(key, &value);
                }
            }
            url = parsed.into();
        }

        let headers = config
            .headers
            .iter()
            .map(|(name, value)| {
                template::render(value, &values, RenderTarget::Text)
                    .map(|rendered| (name.clone(), rendered))
            })
            .collect::<Result<BTreeMap<_, _>, _>>()
            .map_err(missing_input)?;

        let body = match &config.body {
            Some(spec) if config.method.carries_body() => Some(match spec.encoding {
                BodyEncoding::Json => {
                    RequestBody::Json(render_json(&Value::Object(spec.template.clone()), &values)?)
                }
                BodyEncoding::Form => RequestBody::Form(render_form(&spec.template, &values)?),
            }),
            _ => None,
        };

        Ok(Some(RequestDescriptor {
            method: config.method,
            url,
            headers,
            body,
        }))
    }
}

fn missing_input(err: TemplateError) -> ProviderError {
    match &err {
        TemplateError::MissingValue(placeholder) => ProviderError::InvalidQuery {
            field: placeholder.as_str().to_string(),
            reason: err.to_string(),
        },
    }
}

fn render_json(value: &Value, values: &TemplateValues) -> Result<Value, ProviderError> {
    Ok(match value {
        Value::String(s) => {
            Value::String(template::render(s, values, RenderTarget::Text).map_err(missing_input)?)
        }
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| render_json(item, values))
                .collect::<Result<_, _>>()?,
        ),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| Ok((k.clone(), render_json(v, values)?)))
                .collect::<Result<Map<_, _>, ProviderError>>()?,
        ),
        scalar => scalar.clone(),
    })
}

fn render_form(
    template: &Map<String, Value>,
    values: &TemplateValues,
) -> Result<Vec<(String, String)>, ProviderError> {
    template
        .iter()
        .map(|(key, value)| {
            let rendered = match value {
                Value::String(s) => {
                    template::render(s, values, RenderTarget::Text).map_err(missing_input)?
                }
                other => value_to_text(other),
            };
            Ok((key.clone(), rendered))
        })
        .collect()
}

impl RequestDescriptor {
    /// Send the request and decode the JSON response body.
    pub async fn send(
        &self,
        client: &reqwest::Client,
        timeout: Duration,
    ) -> Result<Value, ProviderError> {
        let method = match self.method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Delete => reqwest::Method::DELETE,
        };

        let mut request = client.request(method, &self.url).timeout(timeout);
        for (name, value) in &self.headers {
            request = request.header(name, value);
        }
        request = match &self.body {
            Some(RequestBody::Json(body)) => request.json(body),
            Some(RequestBody::Form(pairs)) => request.form(pairs),
            None => request,
        };

        debug!("{} {}", self.method, self.url);

        let response = request
            .send()
            .await
            .map_err(|e| transport_error(&e, timeout))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Status(status.as_u16()));
        }

        let text = response
            .text()
            .await
            .map_err(|e| transport_error(&e, timeout))?;

        serde_json::from_str(&text)
            .map_err(|e| ProviderError::Parse(format!("response is not JSON: {e}")))
    }
}

fn transport_error(err: &reqwest::Error, timeout: Duration) -> ProviderError {
    if err.is_timeout() {
        ProviderError::Timeout(timeout)
    } else {
        ProviderError::Network(err.to_string())
    }
}
