//! `ChartEngine`: the engine as seen by the render pipeline

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tracing::debug;

use kubecrt_core::version::parse_constraint;
use kubecrt_core::{
    BoxError, ChartEntry, ChartRenderer, LoadedChart, ManifestStream, ReleaseInfo,
    ResolvedParameters, TemplateContext, Values,
};
use kubecrt_repo::{ChartRepositories, RepositoryRegistry};

use crate::engine::Engine;
use crate::error::{EngineError, Result};
use crate::partials::Partials;

/// Settings for [`ChartEngine::init`]
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Repositories as a `name=url,name=url` list
    pub repositories: String,

    /// Where downloaded charts are unpacked
    pub cache_dir: PathBuf,
}

impl EngineOptions {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            repositories: String::new(),
            cache_dir: cache_dir.into(),
        }
    }

    pub fn with_repositories(mut self, list: impl Into<String>) -> Self {
        self.repositories = list.into();
        self
    }
}

/// Renders charts from local directories or registered repositories
pub struct ChartEngine {
    engine: Engine,
    repositories: ChartRepositories,
    partials: Mutex<HashMap<PathBuf, Arc<Partials>>>,
}

impl ChartEngine {
    /// Register repositories, load their indexes and prepare the cache
    ///
    /// Runs once, before any chart is rendered.
    pub async fn init(options: EngineOptions) -> Result<Self> {
        let registry = RepositoryRegistry::parse(&options.repositories).map_err(EngineError::Init)?;
        let repositories = ChartRepositories::open(&registry, &options.cache_dir)
            .await
            .map_err(EngineError::Init)?;

        debug!(
            repositories = registry.len(),
            cache = %options.cache_dir.display(),
            "chart engine ready"
        );

        Ok(Self {
            engine: Engine,
            repositories,
            partials: Mutex::new(HashMap::new()),
        })
    }

    /// Directory of the chart `entry` refers to, fetching it when needed
    pub async fn locate(&self, entry: &ChartEntry) -> Result<PathBuf> {
        let reference = entry.chart.as_str();

        if is_local(reference) {
            return Ok(PathBuf::from(reference));
        }

        let (repo, chart) = reference
            .split_once('/')
            .filter(|(r, c)| !r.is_empty() && !c.is_empty() && !c.contains('/'))
            .ok_or_else(|| EngineError::InvalidReference {
                reference: reference.to_string(),
            })?;

        if !self.repositories.contains(repo) {
            return Err(EngineError::UnknownRepository {
                reference: reference.to_string(),
                repo: repo.to_string(),
            });
        }

        let constraint = entry
            .version
            .as_deref()
            .map(parse_constraint)
            .transpose()
            .map_err(kubecrt_core::CoreError::from)?;

        Ok(self
            .repositories
            .fetch_chart(repo, chart, constraint.as_ref())
            .await?)
    }

    /// Partials of `dir`, loaded on first use
    fn partials(&self, dir: Option<&Path>) -> Result<Arc<Partials>> {
        let Some(dir) = dir else {
            return Ok(Arc::default());
        };

        let mut cache = self.partials.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(partials) = cache.get(dir) {
            return Ok(Arc::clone(partials));
        }

        let partials = Arc::new(Partials::load(dir)?);
        cache.insert(dir.to_path_buf(), Arc::clone(&partials));
        Ok(partials)
    }
}

/// Local references are paths: `./x`, `../x`, `/x`, or an existing directory
fn is_local(reference: &str) -> bool {
    reference.starts_with('.') || reference.starts_with('/') || Path::new(reference).is_dir()
}

/// Owned inputs of a single chart render
struct RenderJob {
    engine: Engine,
    chart_dir: PathBuf,
    version: Option<String>,
    name: String,
    namespace: String,
    values: Values,
    partials: Arc<Partials>,
}

impl RenderJob {
    fn run(self) -> Result<ManifestStream> {
        let chart = LoadedChart::load(&self.chart_dir)?;
        if let Some(constraint) = &self.version {
            chart.check_version(constraint)?;
        }

        let mut values = if chart.values_path.is_file() {
            Values::from_file(&chart.values_path)?
        } else {
            Values::new()
        };
        values.merge(&self.values);

        let context = TemplateContext::new(
            values,
            ReleaseInfo::new(&self.name, &self.namespace),
            &chart.metadata,
        );

        self.engine.render_chart(&chart, &context, &self.partials)
    }
}

#[async_trait]
impl ChartRenderer for ChartEngine {
    async fn render(
        &self,
        entry: &ChartEntry,
        params: &ResolvedParameters<'_>,
    ) -> std::result::Result<ManifestStream, BoxError> {
        let chart_dir = self.locate(entry).await?;
        debug!(chart = %entry.chart, dir = %chart_dir.display(), "rendering chart");

        let job = RenderJob {
            engine: self.engine.clone(),
            chart_dir,
            version: entry.version.clone(),
            name: params.name.to_string(),
            namespace: params.namespace.to_string(),
            values: params.values.clone(),
            partials: self.partials(params.partial_templates)?,
        };

        let stream = tokio::task::spawn_blocking(move || job.run())
            .await
            .map_err(|e| EngineError::Task(e.to_string()))??;
        Ok(stream)
    }
}
