// document.rs - Parsed documents that selectors run against
// HTML uses CSS selectors via the scraper crate; JSON uses field names,
// optionally dotted to reach nested objects.

use log::warn;
use scraper::{Html, Selector};
use serde_json::{Map, Value as JsonValue};

use crate::error::{BotError, Result};
use crate::template::SelectorSource;

pub struct HtmlDocument {
    html: Html,
}

impl HtmlDocument {
    /// Never fails. Bytes that are not UTF-8 become U+FFFD.
    pub fn parse(body: &[u8]) -> Self {
        Self {
            html: Html::parse_document(&String::from_utf8_lossy(body)),
        }
    }

    /// All text content of the document.
    pub fn text(&self) -> String {
        self.html.root_element().text().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.text().trim().is_empty()
    }
}

impl SelectorSource for HtmlDocument {
    fn select_all(&self, selector: &str) -> Vec<String> {
        let parsed = match Selector::parse(selector) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!("[DOCUMENT] Ignoring invalid selector '{}': {:?}", selector, e);
                return Vec::new();
            }
        };
        self.html
            .select(&parsed)
            .map(|element| element.text().collect::<String>())
            .collect()
    }
}

pub struct JsonDocument {
    root: Map<String, JsonValue>,
}

impl JsonDocument {
    /// The payload must be a JSON object. A blank body or `null` gives an
    /// empty document.
    pub fn parse(body: &[u8]) -> Result<Self> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self { root: Map::new() });
        }
        match serde_json::from_slice::<JsonValue>(body)? {
            JsonValue::Object(root) => Ok(Self { root }),
            JsonValue::Null => Ok(Self { root: Map::new() }),
            other => Err(BotError::Parse(format!(
                "expected a JSON object, found {}",
                kind_of(&other)
            ))),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    fn resolve(&self, key: &str) -> Option<&JsonValue> {
        if let Some(value) = self.root.get(key) {
            return Some(value);
        }
        let mut parts = key.split('.');
        let mut current = self.root.get(parts.next()?)?;
        for part in parts {
            current = current.as_object()?.get(part)?;
        }
        Some(current)
    }
}

fn kind_of(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "a boolean",
        JsonValue::Number(_) => "a number",
        JsonValue::String(_) => "a string",
        JsonValue::Array(_) => "an array",
        JsonValue::Object(_) => "an object",
    }
}

/// Scalars become text; null, arrays and objects have no text form.
fn scalar_text(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        JsonValue::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

impl SelectorSource for JsonDocument {
    fn select_all(&self, selector: &str) -> Vec<String> {
        match self.resolve(selector) {
            Some(JsonValue::Array(items)) => items.iter().filter_map(scalar_text).collect(),
            Some(value) => scalar_text(value).into_iter().collect(),
            None => Vec::new(),
        }
    }

    fn lookup(&self, key: &str) -> Option<String> {
        self.resolve(key).and_then(scalar_text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_html_select_all_in_document_order() {
        let doc = HtmlDocument::parse(
            b"<html><body><h1>One</h1><p>x</p><h1>Two <b>bold</b></h1></body></html>",
        );
        assert_eq!(doc.select_all("h1"), vec!["One".to_string(), "Two bold".to_string()]);
        assert!(doc.select_all("h2").is_empty());
    }

    #[test]
    fn test_html_invalid_selector_matches_nothing() {
        let doc = HtmlDocument::parse(b"<h1>One</h1>");
        assert!(doc.select_all("h1[").is_empty());
    }

    #[test]
    fn test_html_empty_document() {
        assert!(HtmlDocument::parse(b"").is_empty());
        assert!(HtmlDocument::parse(b"<html><body>  </body></html>").is_empty());
        assert!(!HtmlDocument::parse(b"<h1>Hello</h1>").is_empty());
    }

    #[test]
    fn test_html_latin1_bytes_are_replaced() {
        let doc = HtmlDocument::parse(b"<h1>Hello</h1><p>Caf\xe9</p>");
        assert_eq!(doc.select_all("h1"), vec!["Hello".to_string()]);
        assert_eq!(doc.select_all("p"), vec!["Caf\u{fffd}".to_string()]);
    }

    #[test]
    fn test_json_lookup_coerces_scalars() {
        let doc = JsonDocument::parse(br#"{"name": "Boby", "age": 3, "live": true, "none": null}"#)
            .unwrap();
        assert_eq!(doc.lookup("name").as_deref(), Some("Boby"));
        assert_eq!(doc.lookup("age").as_deref(), Some("3"));
        assert_eq!(doc.lookup("live").as_deref(), Some("true"));
        assert_eq!(doc.lookup("none"), None);
        assert_eq!(doc.lookup("missing"), None);
    }

    #[test]
    fn test_json_arrays_and_nested_paths() {
        let body = br#"{"tags": ["a", 2, {"x": 1}], "info": {"city": "Perth"}, "a.b": "flat"}"#;
        let doc = JsonDocument::parse(body).unwrap();
        assert_eq!(doc.select_all("tags"), vec!["a".to_string(), "2".to_string()]);
        assert_eq!(doc.lookup("info.city").as_deref(), Some("Perth"));
        assert_eq!(doc.lookup("a.b").as_deref(), Some("flat"));
        assert!(doc.select_all("info").is_empty());
    }

    #[test]
    fn test_json_requires_object() {
        assert!(matches!(JsonDocument::parse(b"[1, 2]"), Err(BotError::Parse(_))));
        assert!(matches!(JsonDocument::parse(b"{not json"), Err(BotError::Json(_))));
    }

    #[test]
    fn test_json_blank_and_null_are_empty() {
        assert!(JsonDocument::parse(b"").unwrap().is_empty());
        assert!(JsonDocument::parse(b" null ").unwrap().is_empty());
        assert!(JsonDocument::parse(b"{}").unwrap().is_empty());
        assert!(!JsonDocument::parse(br#"{"a": 1}"#).unwrap().is_empty());
    }
}
