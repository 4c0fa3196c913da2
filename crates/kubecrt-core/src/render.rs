//! Render orchestration
//!
//! Charts are rendered through a [`ChartRenderer`] in configuration order.
//! Up to `concurrency` calls may be in flight, but results are always
//! consumed in order and the first failing chart stops the run.

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::time::Duration;
use tracing::debug;

use crate::config::{ChartEntry, ChartsConfiguration};
use crate::error::{BoxError, RenderError, RenderTimeout};
use crate::manifest::ManifestStream;
use crate::resolve::{ResolvedParameters, resolve};

/// The templating engine, seen from the pipeline
#[async_trait]
pub trait ChartRenderer: Send + Sync {
    /// Render one chart into a manifest stream
    async fn render(
        &self,
        entry: &ChartEntry,
        params: &ResolvedParameters<'_>,
    ) -> Result<ManifestStream, BoxError>;
}

/// How render calls are scheduled
#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// Maximum render calls in flight; 1 renders strictly one after another
    pub concurrency: usize,

    /// Per-chart limit; exceeding it fails that chart
    pub timeout: Option<Duration>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            concurrency: 1,
            timeout: None,
        }
    }
}

/// Render every chart of `config`, returning one stream per chart in
/// configuration order
///
/// Nothing is returned unless every chart renders.
pub async fn render_charts<R>(
    config: &ChartsConfiguration,
    renderer: &R,
    options: &RenderOptions,
) -> Result<Vec<ManifestStream>, RenderError>
where
    R: ChartRenderer + ?Sized,
{
    let total = config.charts.len();

    let mut renders = stream::iter(config.charts.iter().enumerate())
        .map(|(index, entry)| async move {
            let params = resolve(config, entry);
            debug!(
                chart = %entry.chart,
                name = params.name,
                namespace = params.namespace,
                "rendering chart {}/{}",
                index + 1,
                total
            );

            let rendered = match options.timeout {
                Some(limit) => tokio::time::timeout(limit, renderer.render(entry, &params))
                    .await
                    .unwrap_or_else(|_| Err(Box::new(RenderTimeout(limit)) as BoxError)),
                None => renderer.render(entry, &params).await,
            };

            rendered.map_err(|cause| RenderError {
                position: index + 1,
                chart: entry.chart.clone(),
                cause,
            })
        })
        .buffered(options.concurrency.max(1));

    let mut streams = Vec::with_capacity(total);
    while let Some(rendered) = renders.next().await {
        // Dropping `renders` on error cancels calls still in flight.
        streams.push(rendered?);
    }

    Ok(streams)
}
