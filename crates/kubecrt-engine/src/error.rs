//! Engine error types

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

use kubecrt_core::CoreError;
use kubecrt_repo::RepoError;

/// Main engine error type
#[derive(Error, Debug, Diagnostic)]
pub enum EngineError {
    /// Repositories or the chart cache could not be set up
    #[error("chart engine initialisation failed")]
    #[diagnostic(code(kubecrt::engine::init))]
    Init(#[source] RepoError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Template(#[from] TemplateError),

    #[error("{0}")]
    Chart(#[from] CoreError),

    #[error("{0}")]
    Repository(#[from] RepoError),

    #[error("chart reference '{reference}' names unknown repository '{repo}'")]
    #[diagnostic(
        code(kubecrt::engine::unknown_repository),
        help("register it with --repo {repo}=<url>, or use a ./relative path for local charts")
    )]
    UnknownRepository { reference: String, repo: String },

    #[error("invalid chart reference '{reference}': expected a path or <repo>/<chart>")]
    InvalidReference { reference: String },

    #[error("render task failed: {0}")]
    Task(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;

/// Error kind for categorizing template errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum TemplateErrorKind {
    UndefinedVariable,
    UnknownFilter,
    UnknownFunction,
    SyntaxError,
    TemplateNotFound,
    InvalidOperation,
    Other,
}

impl From<minijinja::ErrorKind> for TemplateErrorKind {
    fn from(kind: minijinja::ErrorKind) -> Self {
        match kind {
            minijinja::ErrorKind::UndefinedError => Self::UndefinedVariable,
            minijinja::ErrorKind::UnknownFilter => Self::UnknownFilter,
            minijinja::ErrorKind::UnknownFunction => Self::UnknownFunction,
            minijinja::ErrorKind::SyntaxError => Self::SyntaxError,
            minijinja::ErrorKind::TemplateNotFound => Self::TemplateNotFound,
            minijinja::ErrorKind::InvalidOperation => Self::InvalidOperation,
            _ => Self::Other,
        }
    }
}

/// Template-specific error with source information
#[derive(Error, Debug, Diagnostic, Clone)]
#[error("{template}: {message}")]
#[diagnostic(code(kubecrt::template::render))]
pub struct TemplateError {
    /// Template name, relative to its templates directory
    pub template: String,

    pub message: String,

    pub kind: TemplateErrorKind,

    #[source_code]
    pub src: NamedSource<String>,

    #[label("error occurred here")]
    pub span: Option<SourceSpan>,

    #[help]
    pub suggestion: Option<String>,
}

impl TemplateError {
    /// Create a template error from a MiniJinja error
    ///
    /// `source` is the template text the error points into.
    pub fn from_minijinja(err: &minijinja::Error, template: &str, source: &str) -> Self {
        let kind = TemplateErrorKind::from(err.kind());
        let template = err.name().unwrap_or(template).to_string();
        let message = match err.detail() {
            Some(detail) => format!("{}: {}", kind_label(kind), detail),
            None => err.to_string(),
        };

        Self {
            span: err.line().and_then(|line| line_span(source, line)),
            suggestion: suggestion(kind, err),
            src: NamedSource::new(&template, source.to_string()),
            template,
            message,
            kind,
        }
    }

    pub fn kind(&self) -> TemplateErrorKind {
        self.kind
    }
}

fn kind_label(kind: TemplateErrorKind) -> &'static str {
    match kind {
        TemplateErrorKind::UndefinedVariable => "undefined variable",
        TemplateErrorKind::UnknownFilter => "unknown filter",
        TemplateErrorKind::UnknownFunction => "unknown function",
        TemplateErrorKind::SyntaxError => "syntax error",
        TemplateErrorKind::TemplateNotFound => "template not found",
        TemplateErrorKind::InvalidOperation => "invalid operation",
        TemplateErrorKind::Other => "render error",
    }
}

fn suggestion(kind: TemplateErrorKind, err: &minijinja::Error) -> Option<String> {
    let detail = format!("{err:#}");
    match kind {
        TemplateErrorKind::UndefinedVariable if detail.contains("value.") => Some(
            "Did you mean `values`? Chart values are available as `values` (plural).".to_string(),
        ),
        TemplateErrorKind::UndefinedVariable => Some(
            "Check the chart's values.yaml or the values set in the charts configuration, \
             or guard the expression with `is defined`"
                .to_string(),
        ),
        TemplateErrorKind::UnknownFilter => Some(format!(
            "Available filters: {}",
            crate::engine::FILTERS.join(", ")
        )),
        TemplateErrorKind::UnknownFunction => Some(format!(
            "Available functions: {}",
            crate::engine::FUNCTIONS.join(", ")
        )),
        TemplateErrorKind::TemplateNotFound => Some(
            "Included templates are looked up in the chart's templates/ and in the partial \
             templates directory"
                .to_string(),
        ),
        _ => None,
    }
}

/// Span covering line `line_num` (1-based) of `source`
fn line_span(source: &str, line_num: usize) -> Option<SourceSpan> {
    let mut offset = 0;

    for (current, line) in source.lines().enumerate() {
        if current + 1 == line_num {
            return Some(SourceSpan::new(offset.into(), line.len()));
        }
        offset += line.len() + 1;
    }

    None
}
