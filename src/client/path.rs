//! Dotted-path lookups into nested JSON

use serde_json::Value;

/// Read the value at a dot-separated `path` inside `data`.
///
/// Returns `None` when the path is empty, any segment is empty, a key is
/// missing, or an intermediate value is not a JSON object. Explicit `null`
/// values are reported as absent too.
#[must_use]
pub fn get_path<'a>(data: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return None;
    }

    let mut current = data;
    for segment in path.split('.') {
        if segment.is_empty() {
            return None;
        }
        current = current.as_object()?.get(segment)?;
    }

    if current.is_null() {
        None
    } else {
        Some(current)
    }
}

/// Render a scalar JSON value as display text.
///
/// Strings are returned without quotes; `null` becomes the empty string;
/// arrays and objects fall back to their JSON encoding.
#[must_use]
pub fn value_to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

/// Lenient integer read used for counts, page numbers and ordering.
#[must_use]
pub fn value_to_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_u64().and_then(|u| i64::try_from(u).ok()))
            .or_else(|| {
                #[allow(clippy::cast_possible_truncation)]
                n.as_f64().map(|f| f as i64)
            }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
