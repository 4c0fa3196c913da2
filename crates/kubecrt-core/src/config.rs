//! Charts configuration model
//!
//! A charts configuration lists the charts to render together, with a global
//! release name and namespace:
//!
//! ```yaml
//! apiVersion: v1
//! name: my-bundle
//! namespace: apps
//! charts:
//!   - stable/nginx:
//!       version: "~> 1.2.0"
//!       namespace: ingress
//!       values:
//!         replicas: 3
//!   - chart: ./charts/local-app
//!     name: backend
//! ```

use serde::Deserialize;
use serde_yaml::{Mapping, Value as YamlValue};
use std::path::PathBuf;

use crate::error::ParseError;
use crate::values::Values;

/// A parsed charts configuration
#[derive(Debug, Clone, Default)]
pub struct ChartsConfiguration {
    /// Document API version, when the document declares one
    pub api_version: Option<String>,

    /// Default release name for every chart
    pub name: String,

    /// Default namespace for every chart
    pub namespace: String,

    /// Charts in render order
    pub charts: Vec<ChartEntry>,

    /// Directory of template fragments shared by all charts
    ///
    /// Supplied by the caller, never read from the document itself.
    pub partial_templates_path: Option<PathBuf>,
}

/// One chart to render
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChartEntry {
    /// Local path or `<repository>/<chart>` reference
    pub chart: String,

    /// Release name override
    pub name: Option<String>,

    /// Namespace override
    pub namespace: Option<String>,

    /// Version constraint (`~> 1.2.0`, `^1.2`, ...)
    pub version: Option<String>,

    /// Values passed to the chart as-is
    pub values: Values,
}

impl ChartEntry {
    pub fn new(chart: impl Into<String>) -> Self {
        Self {
            chart: chart.into(),
            ..Default::default()
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawConfiguration {
    #[serde(default)]
    api_version: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    namespace: Option<String>,
    charts: Vec<YamlValue>,
}

#[derive(Default, Deserialize)]
#[serde(default)]
struct ChartOptions {
    name: Option<String>,
    namespace: Option<String>,
    version: Option<String>,
    values: Option<serde_json::Value>,
}

impl ChartsConfiguration {
    /// Parse a YAML or JSON charts configuration
    ///
    /// `partial_templates_path` is attached as given; it is not checked here.
    pub fn from_slice(
        bytes: &[u8],
        partial_templates_path: Option<PathBuf>,
    ) -> Result<Self, ParseError> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| ParseError::new(format!("configuration is not valid UTF-8: {e}")))?;

        if text.trim().is_empty() {
            return Err(ParseError::new("configuration is empty"));
        }

        let raw: RawConfiguration = serde_yaml::from_str(text)?;

        let charts = raw
            .charts
            .into_iter()
            .enumerate()
            .map(|(index, item)| parse_entry(index, item))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            api_version: raw.api_version,
            name: raw.name.unwrap_or_default(),
            namespace: raw.namespace.unwrap_or_default(),
            charts,
            partial_templates_path,
        })
    }

    /// Apply caller-level overrides of the global name and namespace
    ///
    /// Empty overrides are ignored. Must run before validation.
    pub fn apply_overrides(&mut self, name: Option<&str>, namespace: Option<&str>) {
        if let Some(name) = name.filter(|n| !n.is_empty()) {
            self.name = name.to_string();
        }
        if let Some(namespace) = namespace.filter(|n| !n.is_empty()) {
            self.namespace = namespace.to_string();
        }
    }
}

/// Turn one `charts` item into an entry
///
/// Items are either `{<chart>: <options>}` or a flat map with a `chart` key.
fn parse_entry(index: usize, item: YamlValue) -> Result<ChartEntry, ParseError> {
    let map = match item {
        YamlValue::Mapping(map) => map,
        other => {
            return Err(ParseError::new(format!(
                "charts[{index}]: expected a map, got {}",
                kind_of(&other)
            )));
        }
    };

    if map.contains_key("chart") {
        return parse_flat_entry(index, map);
    }

    let mut pairs = map.into_iter();
    let (Some((key, options)), None) = (pairs.next(), pairs.next()) else {
        return Err(ParseError::new(format!(
            "charts[{index}]: expected a single `<chart>: <options>` pair or a `chart` key"
        )));
    };

    let chart = match key {
        YamlValue::String(s) => s,
        other => {
            return Err(ParseError::new(format!(
                "charts[{index}]: chart reference must be a string, got {}",
                kind_of(&other)
            )));
        }
    };

    let options = match options {
        YamlValue::Null => ChartOptions::default(),
        other => serde_yaml::from_value(other)
            .map_err(|e| ParseError::new(format!("charts[{index}] ({chart}): {e}")))?,
    };

    Ok(entry_from_options(chart, options))
}

fn parse_flat_entry(index: usize, mut map: Mapping) -> Result<ChartEntry, ParseError> {
    let chart = match map.remove("chart") {
        Some(YamlValue::String(s)) => s,
        Some(YamlValue::Null) | None => String::new(),
        Some(other) => {
            return Err(ParseError::new(format!(
                "charts[{index}].chart: expected a string, got {}",
                kind_of(&other)
            )));
        }
    };

    let options: ChartOptions = serde_yaml::from_value(YamlValue::Mapping(map))
        .map_err(|e| ParseError::new(format!("charts[{index}]: {e}")))?;

    Ok(entry_from_options(chart, options))
}

fn entry_from_options(chart: String, options: ChartOptions) -> ChartEntry {
    ChartEntry {
        chart,
        name: options.name,
        namespace: options.namespace,
        version: options.version,
        values: options.values.map(Values::from).unwrap_or_default(),
    }
}

fn kind_of(value: &YamlValue) -> &'static str {
    match value {
        YamlValue::Null => "null",
        YamlValue::Bool(_) => "a boolean",
        YamlValue::Number(_) => "a number",
        YamlValue::String(_) => "a string",
        YamlValue::Sequence(_) => "a sequence",
        YamlValue::Mapping(_) => "a map",
        YamlValue::Tagged(_) => "a tagged value",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const CONFIG: &str = r#"
apiVersion: v1
name: bundle
namespace: apps
charts:
  - stable/nginx:
      version: "~> 1.2.0"
      namespace: ingress
      values:
        replicas: 3
        image:
          tag: "1.25"
  - ./charts/local: ~
  - chart: ./charts/flat
    name: backend
"#;

    #[test]
    fn test_parse_configuration() {
        let config = ChartsConfiguration::from_slice(CONFIG.as_bytes(), None).unwrap();

        assert_eq!(config.api_version.as_deref(), Some("v1"));
        assert_eq!(config.name, "bundle");
        assert_eq!(config.namespace, "apps");
        assert_eq!(config.charts.len(), 3);
        assert!(config.partial_templates_path.is_none());

        let nginx = &config.charts[0];
        assert_eq!(nginx.chart, "stable/nginx");
        assert_eq!(nginx.version.as_deref(), Some("~> 1.2.0"));
        assert_eq!(nginx.namespace.as_deref(), Some("ingress"));
        assert!(nginx.name.is_none());
        assert_eq!(nginx.values.0["image"]["tag"], json!("1.25"));

        assert_eq!(config.charts[1], ChartEntry::new("./charts/local"));

        let flat = &config.charts[2];
        assert_eq!(flat.chart, "./charts/flat");
        assert_eq!(flat.name.as_deref(), Some("backend"));
    }

    #[test]
    fn test_parse_json_configuration() {
        let json = r#"{"name": "a", "namespace": "b", "charts": [{"./c": {"values": {"x": [1, 2]}}}]}"#;
        let config = ChartsConfiguration::from_slice(json.as_bytes(), None).unwrap();

        assert_eq!(config.charts[0].chart, "./c");
        assert_eq!(config.charts[0].values.0["x"], json!([1, 2]));
    }

    #[test]
    fn test_partial_templates_path_is_attached() {
        let config = ChartsConfiguration::from_slice(
            b"charts: []",
            Some(PathBuf::from("partials")),
        )
        .unwrap();

        assert_eq!(config.partial_templates_path, Some(PathBuf::from("partials")));
        assert!(config.name.is_empty());
    }

    #[test]
    fn test_missing_charts_is_parse_error() {
        let err = ChartsConfiguration::from_slice(b"name: a\nnamespace: b\n", None).unwrap_err();
        assert!(err.message.contains("charts"));
    }

    #[test]
    fn test_charts_of_wrong_shape() {
        assert!(ChartsConfiguration::from_slice(b"charts: foo", None).is_err());
        assert!(ChartsConfiguration::from_slice(b"charts: [foo]", None).is_err());

        let err = ChartsConfiguration::from_slice(b"charts:\n  - a: {}\n    b: {}\n", None)
            .unwrap_err();
        assert!(err.message.contains("charts[0]"));
    }

    #[test]
    fn test_malformed_document() {
        assert!(ChartsConfiguration::from_slice(b"charts: [", None).is_err());
        assert!(ChartsConfiguration::from_slice(b"", None).is_err());
        assert!(ChartsConfiguration::from_slice(&[0xff, 0xfe], None).is_err());
    }

    #[test]
    fn test_unknown_option_type_is_parse_error() {
        let err = ChartsConfiguration::from_slice(b"charts:\n  - ./a:\n      name: [x]\n", None)
            .unwrap_err();
        assert!(err.message.contains("charts[0] (./a)"));
    }

    #[test]
    fn test_apply_overrides() {
        let mut config = ChartsConfiguration::from_slice(CONFIG.as_bytes(), None).unwrap();

        config.apply_overrides(Some(""), Some("prod"));
        assert_eq!(config.name, "bundle");
        assert_eq!(config.namespace, "prod");

        config.apply_overrides(Some("renamed"), None);
        assert_eq!(config.name, "renamed");
        assert_eq!(config.namespace, "prod");
    }
}
