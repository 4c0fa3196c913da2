//! Manifest streams: `---` separated YAML documents
//!
//! Charts render to streams, streams are merged in chart order, and a merged
//! stream can be re-encoded as newline separated JSON documents.

use serde_json::{Map, Number, Value as JsonValue};
use serde_yaml::Value as YamlValue;

use crate::error::EncodingError;

/// Document separator line
pub const SEPARATOR: &str = "---";

/// An ordered stream of YAML documents
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManifestStream(String);

impl ManifestStream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Concatenate streams in order
    ///
    /// Each stream is expected to bring its own separators; nothing is added
    /// or removed between them.
    pub fn merge<I>(streams: I) -> Self
    where
        I: IntoIterator<Item = ManifestStream>,
    {
        let mut merged = String::new();
        for stream in streams {
            merged.push_str(&stream.0);
        }
        Self(merged)
    }

    /// Append one document, preceded by a separator line
    pub fn push_document(&mut self, document: &str) {
        self.0.push_str(SEPARATOR);
        self.0.push('\n');
        self.0.push_str(document.trim_end_matches('\n'));
        self.0.push('\n');
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Raw segments between separator lines, including empty ones
    ///
    /// Only a line consisting of `---` (plus trailing whitespace) separates
    /// documents. A `---` inside a scalar or after indentation is content.
    pub fn segments(&self) -> Vec<&str> {
        let mut segments = Vec::new();
        let mut start = 0;
        let mut offset = 0;

        for line in self.0.split_inclusive('\n') {
            if line.trim_end() == SEPARATOR {
                segments.push(&self.0[start..offset]);
                start = offset + line.len();
            }
            offset += line.len();
        }
        segments.push(&self.0[start..]);

        segments
    }

    /// Re-encode every non-empty segment as compact JSON, joined by newlines
    ///
    /// Blank segments are skipped and `<<` merge keys are resolved. The first
    /// segment that is not valid YAML fails the whole conversion.
    pub fn to_json(&self) -> Result<String, EncodingError> {
        let mut documents = Vec::new();

        for (segment, text) in self.segments().into_iter().enumerate() {
            if text.trim().is_empty() {
                continue;
            }

            let mut yaml: YamlValue = serde_yaml::from_str(text).map_err(|e| EncodingError {
                segment,
                reason: e.to_string(),
            })?;
            yaml.apply_merge().map_err(|e| EncodingError {
                segment,
                reason: e.to_string(),
            })?;
            let json = yaml_to_json(yaml).map_err(|reason| EncodingError { segment, reason })?;
            let encoded = serde_json::to_string(&json).map_err(|e| EncodingError {
                segment,
                reason: e.to_string(),
            })?;

            documents.push(encoded);
        }

        Ok(documents.join("\n"))
    }
}

impl From<String> for ManifestStream {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ManifestStream {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for ManifestStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Convert a YAML tree to JSON, stringifying scalar map keys
fn yaml_to_json(value: YamlValue) -> Result<JsonValue, String> {
    Ok(match value {
        YamlValue::Null => JsonValue::Null,
        YamlValue::Bool(b) => JsonValue::Bool(b),
        YamlValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                JsonValue::from(i)
            } else if let Some(u) = n.as_u64() {
                JsonValue::from(u)
            } else {
                let f = n.as_f64().unwrap_or(f64::NAN);
                JsonValue::Number(
                    Number::from_f64(f).ok_or_else(|| format!("{n} has no JSON representation"))?,
                )
            }
        }
        YamlValue::String(s) => JsonValue::String(s),
        YamlValue::Sequence(items) => JsonValue::Array(
            items
                .into_iter()
                .map(yaml_to_json)
                .collect::<Result<_, _>>()?,
        ),
        YamlValue::Mapping(mapping) => {
            let mut object = Map::new();
            for (key, value) in mapping {
                object.insert(key_to_string(key)?, yaml_to_json(value)?);
            }
            JsonValue::Object(object)
        }
        YamlValue::Tagged(tagged) => yaml_to_json(tagged.value)?,
    })
}

fn key_to_string(key: YamlValue) -> Result<String, String> {
    match key {
        YamlValue::String(s) => Ok(s),
        YamlValue::Bool(b) => Ok(b.to_string()),
        YamlValue::Number(n) => Ok(n.to_string()),
        YamlValue::Null => Ok("null".to_string()),
        YamlValue::Tagged(tagged) => key_to_string(tagged.value),
        YamlValue::Sequence(_) | YamlValue::Mapping(_) => {
            Err("map keys must be scalars to be encoded as JSON".to_string())
        }
    }
}
