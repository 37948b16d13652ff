//! ---
//! alerter_section: "11-test-harness"
//! alerter_subsection: "02-drivers"
//! alerter_type: "source"
//! alerter_scope: "code"
//! alerter_description: "JSON-path assertions over captured alert payloads."
//! alerter_version: "v0.1.0"
//! alerter_owner: "tbd"
//! ---
use serde_json::Value;

use crate::HarnessError;

/// Assertions over one captured message document. Failed checks panic with
/// the offending path and the full document.
#[derive(Debug, Clone)]
pub struct MessageAsserter {
    document: Value,
}

impl MessageAsserter {
    pub fn from_slice(payload: &[u8]) -> Result<Self, HarnessError> {
        Ok(Self {
            document: serde_json::from_slice(payload)?,
        })
    }

    pub fn from_value(document: Value) -> Self {
        Self { document }
    }

    pub fn document(&self) -> &Value {
        &self.document
    }

    /// Values matching a JSON path such as `$.attachments[0].text`.
    pub fn select(&self, path: &str) -> Vec<&Value> {
        match jsonpath_lib::select(&self.document, path) {
            Ok(values) => values,
            Err(err) => panic!("invalid json path {path}: {err:?}"),
        }
    }

    /// Assert that `path` matches exactly one string equal to `expected`.
    pub fn has_str(&self, path: &str, expected: &str) -> &Self {
        let values = self.select(path);
        assert_eq!(
            values,
            vec![&Value::String(expected.to_owned())],
            "{path} in {}",
            self.document
        );
        self
    }

    /// Assert that `path` matches nothing.
    pub fn absent(&self, path: &str) -> &Self {
        let values = self.select(path);
        assert!(values.is_empty(), "{path} should be absent in {}", self.document);
        self
    }

    pub fn text(&self, expected: &str) -> &Self {
        self.has_str("$.attachments[0].text", expected)
    }

    pub fn title(&self, expected: &str) -> &Self {
        self.has_str("$.attachments[0].title", expected)
    }

    pub fn title_link(&self, expected: &str) -> &Self {
        self.has_str("$.attachments[0].title_link", expected)
    }

    pub fn color(&self, expected: &str) -> &Self {
        self.has_str("$.attachments[0].color", expected)
    }

    pub fn channel(&self, expected: &str) -> &Self {
        self.has_str("$.channel", expected)
    }

    pub fn username(&self, expected: &str) -> &Self {
        self.has_str("$.username", expected)
    }

    /// Assert a field with title `key` exists and carries `value`.
    pub fn field(&self, key: &str, value: &str) -> &Self {
        let fields = self.select("$.attachments[0].fields[*]");
        let found = fields
            .iter()
            .find(|field| field.get("title").and_then(Value::as_str) == Some(key))
            .unwrap_or_else(|| panic!("no field titled {key} in {}", self.document));
        assert_eq!(
            found.get("value").and_then(Value::as_str),
            Some(value),
            "value of field {key}"
        );
        self
    }

    pub fn field_count(&self, expected: usize) -> &Self {
        assert_eq!(
            self.select("$.attachments[0].fields[*]").len(),
            expected,
            "fields in {}",
            self.document
        );
        self
    }
}
