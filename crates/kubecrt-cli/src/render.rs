//! Read the charts configuration, run the pipeline, write the manifests

use miette::{IntoDiagnostic, Result, WrapErr, miette};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use kubecrt_core::pipeline::{self, OutputFormat, PipelineOptions};
use kubecrt_core::{ChartsConfiguration, RenderOptions};
use kubecrt_engine::{ChartEngine, EngineOptions};

/// Everything a render run needs, taken from the command line
pub struct RenderArgs {
    pub config: String,
    pub output: Option<PathBuf>,
    pub json: bool,
    pub name: Option<String>,
    pub namespace: Option<String>,
    pub partials_dir: Option<PathBuf>,
    pub repos: String,
    pub concurrency: usize,
    pub timeout: Option<Duration>,
    pub cache_dir: Option<PathBuf>,
}

pub async fn run(args: RenderArgs) -> Result<()> {
    let bytes = read_config(&args.config)?;

    let mut config = ChartsConfiguration::from_slice(&bytes, args.partials_dir.clone())?;
    config.apply_overrides(args.name.as_deref(), args.namespace.as_deref());
    debug!(charts = config.charts.len(), "loaded charts configuration");

    let cache_dir = match args.cache_dir {
        Some(dir) => dir,
        None => default_cache_dir()?,
    };
    let engine = ChartEngine::init(EngineOptions::new(cache_dir).with_repositories(args.repos))
        .await?;

    let options = PipelineOptions {
        render: RenderOptions {
            concurrency: args.concurrency,
            timeout: args.timeout,
        },
        format: if args.json {
            OutputFormat::Json
        } else {
            OutputFormat::Yaml
        },
        ..Default::default()
    };

    let output = pipeline::run(&config, &engine, &options).await?;

    write_output(args.output.as_deref(), &output)
}

fn read_config(source: &str) -> Result<Vec<u8>> {
    if source == "-" {
        let mut bytes = Vec::new();
        std::io::stdin()
            .read_to_end(&mut bytes)
            .into_diagnostic()
            .wrap_err("Failed to read charts configuration from stdin")?;
        return Ok(bytes);
    }

    std::fs::read(source)
        .into_diagnostic()
        .wrap_err_with(|| format!("Failed to read charts configuration: {source}"))
}

fn default_cache_dir() -> Result<PathBuf> {
    dirs::cache_dir()
        .map(|dir| dir.join("kubecrt"))
        .ok_or_else(|| miette!(help = "pass --cache-dir", "Could not determine a cache directory"))
}

fn write_output(path: Option<&Path>, output: &str) -> Result<()> {
    match path {
        Some(path) => std::fs::write(path, output)
            .into_diagnostic()
            .wrap_err_with(|| format!("Failed to write output file: {}", path.display())),
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout
                .write_all(output.as_bytes())
                .and_then(|()| stdout.flush())
                .into_diagnostic()
                .wrap_err("Failed to write to stdout")
        }
    }
}
