//! Chart definition and loading

use serde::{Deserialize, Serialize};
use semver::Version;
use std::path::{Path, PathBuf};

use crate::error::{CoreError, Result};
use crate::version;

/// Contents of a chart's `Chart.yaml`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartMetadata {
    /// Chart API version (`v1` or `v2`)
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Chart name (required)
    pub name: String,

    /// Chart version (required, SemVer)
    pub version: Version,

    #[serde(default)]
    pub description: Option<String>,

    /// Version of the packaged application
    #[serde(default)]
    pub app_version: Option<String>,
}

fn default_api_version() -> String {
    "v2".to_string()
}

/// Chart loaded from a directory, with resolved paths
#[derive(Debug, Clone)]
pub struct LoadedChart {
    pub metadata: ChartMetadata,

    /// Root directory of the chart
    pub root: PathBuf,

    pub templates_dir: PathBuf,

    /// `crds/` directory, when the chart ships one
    pub crds_dir: Option<PathBuf>,

    /// Default values file (may not exist)
    pub values_path: PathBuf,
}

impl LoadedChart {
    /// Load a chart from a directory
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let root = path.as_ref().to_path_buf();

        if !root.is_dir() {
            return Err(CoreError::ChartNotFound {
                path: root.display().to_string(),
            });
        }

        let chart_file = root.join("Chart.yaml");
        if !chart_file.exists() {
            return Err(CoreError::InvalidChart {
                message: format!("Chart.yaml not found in {}", root.display()),
            });
        }

        let content = std::fs::read_to_string(&chart_file)?;
        let metadata: ChartMetadata = serde_yaml::from_str(&content)?;

        if !matches!(metadata.api_version.as_str(), "v1" | "v2") {
            return Err(CoreError::InvalidChart {
                message: format!(
                    "Unsupported API version: {}. Expected: v1 or v2",
                    metadata.api_version
                ),
            });
        }
        if metadata.name.trim().is_empty() {
            return Err(CoreError::InvalidChart {
                message: format!("{}: name is empty", chart_file.display()),
            });
        }

        let crds_dir = Some(root.join("crds")).filter(|dir| dir.is_dir());

        Ok(Self {
            metadata,
            templates_dir: root.join("templates"),
            values_path: root.join("values.yaml"),
            crds_dir,
            root,
        })
    }

    /// Fail unless the chart version satisfies `constraint`
    pub fn check_version(&self, constraint: &str) -> Result<()> {
        let req = version::parse_constraint(constraint)?;
        if req.matches(&self.metadata.version) {
            Ok(())
        } else {
            Err(CoreError::VersionMismatch {
                chart: self.metadata.name.clone(),
                version: self.metadata.version.to_string(),
                constraint: constraint.to_string(),
            })
        }
    }

    /// Template files, sorted by path
    pub fn template_files(&self) -> Result<Vec<PathBuf>> {
        collect_files(
            &self.templates_dir,
            &["yaml", "yml", "j2", "jinja2", "tpl", "txt", "json"],
        )
    }

    /// Plain (untemplated) CRD manifests from `crds/`, sorted by path
    pub fn crd_files(&self) -> Result<Vec<PathBuf>> {
        match &self.crds_dir {
            Some(dir) => collect_files(dir, &["yaml", "yml", "json"]),
            None => Ok(Vec::new()),
        }
    }
}

fn collect_files(dir: &Path, extensions: &[&str]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    if !dir.exists() {
        return Ok(files);
    }

    for entry in walkdir::WalkDir::new(dir) {
        let entry = entry.map_err(|e| CoreError::Io(e.into()))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let matches = path
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .is_some_and(|ext| extensions.contains(&ext.as_str()));
        if matches {
            files.push(path.to_path_buf());
        }
    }

    files.sort();
    Ok(files)
}
