//! Core error types
//!
//! Each pipeline stage has its own error: [`ParseError`], [`ValidationError`],
//! [`RenderError`] and [`EncodingError`]. [`PipelineError`] unifies them for
//! callers that drive the whole pipeline.

use std::fmt;
use std::time::Duration;

use miette::Diagnostic;
use thiserror::Error;

/// Boxed error returned by external collaborators (the chart renderer)
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised while loading charts and values from disk
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Chart not found: {path}")]
    ChartNotFound { path: String },

    #[error("Invalid Chart.yaml: {message}")]
    InvalidChart { message: String },

    #[error("Failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid version: {0}")]
    InvalidVersion(#[from] semver::Error),

    #[error("Chart {chart} version {version} does not satisfy constraint '{constraint}'")]
    VersionMismatch {
        chart: String,
        version: String,
        constraint: String,
    },
}

pub type Result<T> = std::result::Result<T, CoreError>;

/// The charts configuration document is malformed
#[derive(Error, Debug, Diagnostic)]
#[error("charts config parsing error: {message}")]
#[diagnostic(code(kubecrt::parse))]
pub struct ParseError {
    pub message: String,
}

impl ParseError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<serde_yaml::Error> for ParseError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::new(err.to_string())
    }
}

/// A single validation failure, located within the document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Where the problem is (`name`, `charts[2].version`, ...)
    pub location: String,

    /// What is wrong
    pub message: String,
}

impl Violation {
    pub fn new(location: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.location, self.message)
    }
}

/// The configuration is well-formed but incomplete or inconsistent
///
/// Carries every violation found, not only the first one.
#[derive(Error, Debug, Diagnostic)]
#[error("charts validation error: {}", format_violations(.violations))]
#[diagnostic(
    code(kubecrt::validation),
    help("fix the listed fields in the charts configuration, or pass --name/--namespace")
)]
pub struct ValidationError {
    pub violations: Vec<Violation>,
}

fn format_violations(violations: &[Violation]) -> String {
    let mut out = format!("{} problem(s) found", violations.len());
    for violation in violations {
        out.push_str("\n  - ");
        out.push_str(&violation.to_string());
    }
    out
}

/// The templating engine failed for one chart
#[derive(Error, Debug, Diagnostic)]
#[error("chart parsing error: chart {position} ({chart}) failed to render")]
#[diagnostic(code(kubecrt::render))]
pub struct RenderError {
    /// One-based position of the chart in the configuration
    pub position: usize,

    /// Chart reference as written in the configuration
    pub chart: String,

    #[source]
    pub cause: BoxError,
}

/// A render call did not finish within the configured timeout
#[derive(Error, Debug)]
#[error("render timed out after {}s", .0.as_secs_f64())]
pub struct RenderTimeout(pub Duration);

/// A manifest segment could not be converted to JSON
#[derive(Error, Debug, Diagnostic)]
#[error("error converting chart to JSON format: segment {segment}: {reason}")]
#[diagnostic(code(kubecrt::encoding))]
pub struct EncodingError {
    /// Zero-based index of the segment between `---` separators
    pub segment: usize,

    pub reason: String,
}

/// Any failure of the render pipeline
#[derive(Error, Debug, Diagnostic)]
pub enum PipelineError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Encoding(#[from] EncodingError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_lists_every_violation() {
        let err = ValidationError {
            violations: vec![
                Violation::new("name", "release name is empty"),
                Violation::new("charts[1].chart", "chart reference is empty"),
            ],
        };

        let msg = err.to_string();
        assert!(msg.contains("2 problem(s) found"));
        assert!(msg.contains("name: release name is empty"));
        assert!(msg.contains("charts[1].chart: chart reference is empty"));
    }

    #[test]
    fn test_render_error_keeps_cause() {
        let err = RenderError {
            position: 3,
            chart: "stable/nginx".to_string(),
            cause: Box::new(RenderTimeout(Duration::from_secs(5))),
        };

        assert!(err.to_string().contains("chart 3 (stable/nginx)"));
        let source = std::error::Error::source(&err).expect("cause is kept as source");
        assert_eq!(source.to_string(), "render timed out after 5s");
    }
}
