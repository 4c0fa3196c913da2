//! kubecrt Engine - Jinja2 chart rendering for Kubernetes
//!
//! This crate provides the templating side of kubecrt:
//! - a MiniJinja environment with Helm-style filters (toyaml, b64encode, etc.)
//! - shared partial templates available to every chart
//! - `ChartEngine`, which locates charts (local or from repositories) and
//!   renders them for the core pipeline
//! - template errors with source spans for miette

pub mod engine;
pub mod error;
pub mod filters;
pub mod functions;
pub mod partials;
pub mod renderer;

pub use engine::{Engine, FILTERS, FUNCTIONS};
pub use error::{EngineError, TemplateError, TemplateErrorKind};
pub use partials::Partials;
pub use renderer::{ChartEngine, EngineOptions};
