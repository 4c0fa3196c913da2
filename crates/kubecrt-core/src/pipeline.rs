//! The whole render pipeline: validate, render, merge, encode

use tracing::debug;

use crate::config::ChartsConfiguration;
use crate::error::PipelineError;
use crate::manifest::ManifestStream;
use crate::render::{ChartRenderer, RenderOptions, render_charts};
use crate::validate::Validator;

/// Output encoding of the merged stream
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// `---` separated YAML documents, as rendered
    #[default]
    Yaml,

    /// One compact JSON document per YAML document, newline separated
    Json,
}

#[derive(Debug, Clone, Default)]
pub struct PipelineOptions {
    pub validator: Validator,
    pub render: RenderOptions,
    pub format: OutputFormat,
}

/// Validate `config`, render each chart and merge the results
///
/// Overrides must already be applied to `config`. Either the complete output
/// is returned or an error; partial output never escapes.
pub async fn run<R>(
    config: &ChartsConfiguration,
    renderer: &R,
    options: &PipelineOptions,
) -> Result<String, PipelineError>
where
    R: ChartRenderer + ?Sized,
{
    options.validator.validate(config)?;

    let streams = render_charts(config, renderer, &options.render).await?;
    let merged = ManifestStream::merge(streams);
    debug!(bytes = merged.as_str().len(), "merged {} chart(s)", config.charts.len());

    match options.format {
        OutputFormat::Yaml => Ok(merged.into_string()),
        OutputFormat::Json => Ok(merged.to_json()?),
    }
}
