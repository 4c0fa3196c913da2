//! Charts configuration validation
//!
//! Validation runs after caller overrides are applied and before anything is
//! rendered. Every rule is checked; all violations are reported together.

use crate::config::ChartsConfiguration;
use crate::error::{ValidationError, Violation};
use crate::version;

/// Document API version understood by this crate
pub const SUPPORTED_API_VERSION: &str = "v1";

/// Checks a configuration before rendering
#[derive(Debug, Clone, Default)]
pub struct Validator {
    allow_empty: bool,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept a configuration without any chart (renders to nothing)
    pub fn allow_empty(mut self, allow: bool) -> Self {
        self.allow_empty = allow;
        self
    }

    pub fn validate(&self, config: &ChartsConfiguration) -> Result<(), ValidationError> {
        let mut violations = Vec::new();

        if let Some(api_version) = &config.api_version
            && api_version != SUPPORTED_API_VERSION
        {
            violations.push(Violation::new(
                "apiVersion",
                format!("unsupported version '{api_version}', expected '{SUPPORTED_API_VERSION}'"),
            ));
        }

        if config.charts.is_empty() && !self.allow_empty {
            violations.push(Violation::new("charts", "at least one chart must be configured"));
        }

        check_global(
            &mut violations,
            "name",
            "release name",
            &config.name,
            config.charts.iter().map(|c| c.name.as_deref()),
        );
        check_global(
            &mut violations,
            "namespace",
            "namespace",
            &config.namespace,
            config.charts.iter().map(|c| c.namespace.as_deref()),
        );

        for (index, entry) in config.charts.iter().enumerate() {
            if entry.chart.trim().is_empty() {
                violations.push(Violation::new(
                    format!("charts[{index}].chart"),
                    "chart reference is empty",
                ));
            }

            if let Some(constraint) = &entry.version
                && let Err(e) = version::parse_constraint(constraint)
            {
                violations.push(Violation::new(
                    format!("charts[{index}].version"),
                    format!("invalid version constraint '{constraint}': {e}"),
                ));
            }
        }

        if let Some(path) = &config.partial_templates_path {
            let raw = path.as_os_str();
            if raw.is_empty() {
                violations.push(Violation::new("partialTemplatesPath", "path is empty"));
            } else if raw.as_encoded_bytes().contains(&0) {
                violations.push(Violation::new(
                    "partialTemplatesPath",
                    "path contains a NUL byte",
                ));
            }
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { violations })
        }
    }
}

impl ChartsConfiguration {
    /// Validate with the default rules (at least one chart required)
    pub fn validate(&self) -> Result<(), ValidationError> {
        Validator::new().validate(self)
    }
}

/// An empty global value is fine only if every chart overrides it
fn check_global<'a>(
    violations: &mut Vec<Violation>,
    field: &str,
    label: &str,
    global: &str,
    overrides: impl Iterator<Item = Option<&'a str>>,
) {
    if !global.trim().is_empty() {
        return;
    }

    let missing: Vec<String> = overrides
        .enumerate()
        .filter(|(_, value)| value.is_none_or(|v| v.trim().is_empty()))
        .map(|(index, _)| format!("charts[{index}]"))
        .collect();

    if !missing.is_empty() {
        violations.push(Violation::new(
            field,
            format!(
                "global {label} is empty and not set by {}",
                missing.join(", ")
            ),
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChartEntry;
    use std::path::PathBuf;

    fn config(name: &str, namespace: &str, charts: Vec<ChartEntry>) -> ChartsConfiguration {
        ChartsConfiguration {
            name: name.to_string(),
            namespace: namespace.to_string(),
            charts,
            ..Default::default()
        }
    }

    fn locations(err: &ValidationError) -> Vec<&str> {
        err.violations.iter().map(|v| v.location.as_str()).collect()
    }

    #[test]
    fn test_valid_configuration() {
        let cfg = config("bundle", "apps", vec![ChartEntry::new("./web")]);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_accumulates_all_violations() {
        let cfg = config(
            "",
            "apps",
            vec![ChartEntry::new("./web"), ChartEntry::new(""), ChartEntry::new("./db")],
        );

        let err = cfg.validate().unwrap_err();
        assert_eq!(locations(&err), vec!["name", "charts[1].chart"]);
        assert!(err.violations[0].message.contains("charts[0], charts[1], charts[2]"));
    }

    #[test]
    fn test_per_chart_overrides_satisfy_empty_globals() {
        let mut web = ChartEntry::new("./web");
        web.name = Some("web".to_string());
        web.namespace = Some("front".to_string());
        let mut db = ChartEntry::new("./db");
        db.name = Some("db".to_string());
        db.namespace = Some("data".to_string());

        assert!(config("", "", vec![web.clone(), db]).validate().is_ok());

        let err = config("", "", vec![web, ChartEntry::new("./cache")])
            .validate()
            .unwrap_err();
        assert_eq!(locations(&err), vec!["name", "namespace"]);
        assert!(err.violations[1].message.ends_with("charts[1]"));
    }

    #[test]
    fn test_empty_override_does_not_count() {
        let mut web = ChartEntry::new("./web");
        web.name = Some(" ".to_string());

        let err = config("", "apps", vec![web]).validate().unwrap_err();
        assert_eq!(locations(&err), vec!["name"]);
    }

    #[test]
    fn test_empty_chart_list() {
        let cfg = config("bundle", "apps", vec![]);

        let err = cfg.validate().unwrap_err();
        assert_eq!(locations(&err), vec!["charts"]);

        assert!(Validator::new().allow_empty(true).validate(&cfg).is_ok());
    }

    #[test]
    fn test_api_version_and_constraint() {
        let mut web = ChartEntry::new("stable/web");
        web.version = Some("~> banana".to_string());
        let mut cfg = config("bundle", "apps", vec![web]);
        cfg.api_version = Some("v2".to_string());

        let err = cfg.validate().unwrap_err();
        assert_eq!(locations(&err), vec!["apiVersion", "charts[0].version"]);
    }

    #[test]
    fn test_out_of_range_constraint_is_a_violation() {
        let mut web = ChartEntry::new("stable/web");
        web.version = Some("~> 1.18446744073709551615".to_string());

        let err = config("bundle", "apps", vec![web]).validate().unwrap_err();
        assert_eq!(locations(&err), vec!["charts[0].version"]);
    }

    #[test]
    fn test_partial_templates_path() {
        let mut cfg = config("bundle", "apps", vec![ChartEntry::new("./web")]);

        cfg.partial_templates_path = Some(PathBuf::from("does/not/exist/yet"));
        assert!(cfg.validate().is_ok());

        cfg.partial_templates_path = Some(PathBuf::new());
        let err = cfg.validate().unwrap_err();
        assert_eq!(locations(&err), vec!["partialTemplatesPath"]);
    }
}
