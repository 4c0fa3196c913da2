//! kubecrt Core - charts configuration and render pipeline
//!
//! This crate provides the pieces between a charts configuration document
//! and a single manifest stream:
//! - `ChartsConfiguration`: the parsed document (charts, global name/namespace)
//! - `Validator`: checks a configuration, reporting every violation at once
//! - `resolve`: effective name, namespace and values for one chart
//! - `render_charts`: drives a `ChartRenderer` over the charts, in order
//! - `ManifestStream`: merging and JSON re-encoding of rendered output
//! - `LoadedChart`, `Values`, `TemplateContext`: chart-side types used by engines

pub mod chart;
pub mod config;
pub mod context;
pub mod error;
pub mod manifest;
pub mod pipeline;
pub mod render;
pub mod resolve;
pub mod validate;
pub mod values;
pub mod version;

pub use chart::{ChartMetadata, LoadedChart};
pub use config::{ChartEntry, ChartsConfiguration};
pub use context::{Capabilities, ChartInfo, KubeVersion, ReleaseInfo, TemplateContext};
pub use error::{
    BoxError, CoreError, EncodingError, ParseError, PipelineError, RenderError, RenderTimeout,
    ValidationError, Violation,
};
pub use manifest::ManifestStream;
pub use pipeline::{OutputFormat, PipelineOptions};
pub use render::{ChartRenderer, RenderOptions, render_charts};
pub use resolve::{ResolvedParameters, resolve};
pub use validate::Validator;
pub use values::Values;
