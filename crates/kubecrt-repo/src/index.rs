//! Repository index types
//!
//! Helm-compatible `index.yaml`: chart versions grouped by chart name.

use semver::{Version, VersionReq};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;

use crate::error::{RepoError, Result};

/// Repository index (Helm-compatible)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryIndex {
    #[serde(default)]
    pub api_version: Option<String>,

    /// Chart versions by chart name
    #[serde(default)]
    pub entries: HashMap<String, Vec<ChartVersion>>,
}

/// One published version of a chart
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartVersion {
    pub name: String,

    pub version: String,

    #[serde(default)]
    pub app_version: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    /// Archive locations, absolute or relative to the repository URL
    #[serde(default)]
    pub urls: Vec<String>,

    /// SHA256 digest of the archive
    #[serde(default)]
    pub digest: Option<String>,
}

impl ChartVersion {
    /// First download URL
    pub fn download_url(&self) -> Option<&str> {
        self.urls.first().map(String::as_str)
    }

    fn semver(&self) -> Option<Version> {
        Version::parse(self.version.trim_start_matches('v')).ok()
    }
}

impl RepositoryIndex {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        serde_yaml::from_slice(bytes).map_err(|e| RepoError::IndexParseError {
            message: e.to_string(),
        })
    }

    /// All versions of a chart
    pub fn get(&self, name: &str) -> Option<&[ChartVersion]> {
        self.entries.get(name).map(Vec::as_slice)
    }

    /// Highest version of `name` allowed by `constraint` (any version when
    /// there is no constraint)
    ///
    /// Versions that are not valid semver are only picked when there is no
    /// constraint and no valid version.
    pub fn find_best_match(
        &self,
        repo: &str,
        name: &str,
        constraint: Option<&VersionReq>,
    ) -> Result<&ChartVersion> {
        let versions = self.get(name).ok_or_else(|| RepoError::ChartNotFound {
            name: name.to_string(),
            repo: repo.to_string(),
        })?;

        let best = match constraint {
            Some(req) => versions
                .iter()
                .filter(|v| v.semver().is_some_and(|sv| req.matches(&sv)))
                .max_by(|a, b| compare_versions(a, b)),
            None => versions.iter().max_by(|a, b| compare_versions(a, b)),
        };

        best.ok_or_else(|| RepoError::UnsatisfiableConstraint {
            name: name.to_string(),
            constraint: constraint.map(ToString::to_string).unwrap_or_else(|| "*".to_string()),
            available: versions
                .iter()
                .map(|v| v.version.as_str())
                .collect::<Vec<_>>()
                .join(", "),
        })
    }
}

fn compare_versions(a: &ChartVersion, b: &ChartVersion) -> Ordering {
    match (a.semver(), b.semver()) {
        (Some(va), Some(vb)) => va.cmp(&vb),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => a.version.cmp(&b.version),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kubecrt_core::version::parse_constraint;

    const INDEX: &str = r#"
apiVersion: v1
entries:
  nginx:
    - name: nginx
      version: 1.2.0
      urls: [nginx-1.2.0.tgz]
      digest: abc
    - name: nginx
      version: 1.10.1
      urls: [https://cdn.example.com/nginx-1.10.1.tgz]
    - name: nginx
      version: 1.2.7
      urls: [nginx-1.2.7.tgz]
    - name: nginx
      version: nightly
      urls: [nginx-nightly.tgz]
"#;

    fn index() -> RepositoryIndex {
        RepositoryIndex::from_bytes(INDEX.as_bytes()).unwrap()
    }

    #[test]
    fn test_parse_index() {
        let index = index();
        assert_eq!(index.api_version.as_deref(), Some("v1"));
        let nginx = index.get("nginx").unwrap();
        assert_eq!(nginx.len(), 4);
        assert_eq!(nginx[0].download_url(), Some("nginx-1.2.0.tgz"));
        assert_eq!(nginx[0].digest.as_deref(), Some("abc"));
    }

    #[test]
    fn test_best_match_without_constraint() {
        let index = index();
        let best = index.find_best_match("stable", "nginx", None).unwrap();
        assert_eq!(best.version, "1.10.1");
    }

    #[test]
    fn test_best_match_with_constraint() {
        let index = index();
        let req = parse_constraint("~> 1.2.0").unwrap();
        let best = index.find_best_match("stable", "nginx", Some(&req)).unwrap();
        assert_eq!(best.version, "1.2.7");
    }

    #[test]
    fn test_minor_constraint_stays_on_minor() {
        let index = index();
        let req = parse_constraint("~> 1.2").unwrap();
        let best = index.find_best_match("stable", "nginx", Some(&req)).unwrap();
        assert_eq!(best.version, "1.2.7");
    }

    #[test]
    fn test_unsatisfiable_constraint() {
        let index = index();
        let req = parse_constraint("~> 2.0").unwrap();
        let err = index.find_best_match("stable", "nginx", Some(&req)).unwrap_err();
        match err {
            RepoError::UnsatisfiableConstraint { available, .. } => {
                assert!(available.contains("1.10.1"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unknown_chart() {
        let err = index().find_best_match("stable", "redis", None).unwrap_err();
        assert!(matches!(err, RepoError::ChartNotFound { .. }));
    }

    #[test]
    fn test_invalid_index() {
        assert!(RepositoryIndex::from_bytes(b"entries: [").is_err());
    }
}
