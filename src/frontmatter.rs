//! YAML front-matter parsing.
//!
//! A document may begin with a `---` line, a YAML mapping, and a closing
//! `---` line. Text without an opening delimiter, or with no closing one, is
//! treated as body only. Invalid YAML, or YAML that is not a mapping, is an
//! error: the caller skips such documents.

use serde_json::{Map, Value};

use crate::models::FrontMatter;

/// Splits `text` into its front-matter mapping and body.
pub fn split(text: &str) -> Result<(Map<String, Value>, String), String> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    let Some(after_open) = strip_delimiter_line(text) else {
        return Ok((Map::new(), text.to_string()));
    };

    let Some((yaml, body)) = find_closing(after_open) else {
        return Ok((Map::new(), text.to_string()));
    };

    if yaml.trim().is_empty() {
        return Ok((Map::new(), body.to_string()));
    }

    let value: Value = serde_yaml::from_str(yaml).map_err(|e| e.to_string())?;
    let map = match value {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => return Err(format!("expected a mapping, found {}", kind(&other))),
    };

    Ok((map, body.to_string()))
}

/// Parses the recognised keys out of a front-matter mapping.
pub fn parse(map: &Map<String, Value>) -> FrontMatter {
    FrontMatter {
        slug: scalar(map.get("slug")),
        title: scalar(map.get("title")),
        date: scalar(map.get("date")),
        excerpt: scalar(map.get("excerpt")),
        categories: string_list(map.get("categories")),
        author: scalar(map.get("author")),
        image: nested_url(map, "featuredImage").or_else(|| nested_url(map, "media")),
    }
}

/// Returns the text after an opening `---` line, if present.
fn strip_delimiter_line(text: &str) -> Option<&str> {
    let rest = text.strip_prefix("---")?;
    let rest = rest.trim_start_matches([' ', '\t']);
    rest.strip_prefix("\r\n").or_else(|| rest.strip_prefix('\n'))
}

/// Finds the closing `---` line and returns `(yaml, body)`.
fn find_closing(text: &str) -> Option<(&str, &str)> {
    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        let trimmed = line.trim_end_matches(['\r', '\n']);
        if trimmed.trim_end() == "---" {
            let yaml = &text[..offset];
            let body = &text[offset + line.len()..];
            return Some((yaml, body));
        }
        offset += line.len();
    }
    None
}

fn scalar(value: Option<&Value>) -> Option<String> {
    let s = match value? {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    (!s.is_empty()).then_some(s)
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items.iter().filter_map(|v| scalar(Some(v))).collect(),
        Some(v) => scalar(Some(v)).into_iter().collect(),
        None => Vec::new(),
    }
}

fn nested_url(map: &Map<String, Value>, key: &str) -> Option<String> {
    match map.get(key)? {
        Value::Object(inner) => scalar(inner.get("url")),
        _ => None,
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "a mapping",
    }
}
