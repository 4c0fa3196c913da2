//! Repository registry
//!
//! Repositories are registered for a single run from a `name=url,name=url`
//! list; nothing is persisted.

use std::path::PathBuf;

use url::Url;

use crate::error::{RepoError, Result};

/// A named chart repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repository {
    /// Name used in chart references (`<name>/<chart>`)
    pub name: String,

    pub url: String,

    pub repo_type: RepositoryType,
}

impl Repository {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let url = url.into();
        let repo_type = RepositoryType::detect(&url)?;

        Ok(Self {
            name,
            url,
            repo_type,
        })
    }

    /// Location of `index.yaml` for HTTP repositories
    pub fn index_url(&self) -> String {
        format!("{}/index.yaml", self.url.trim_end_matches('/'))
    }

    /// Directory of a file repository
    pub fn local_path(&self) -> Option<PathBuf> {
        match self.repo_type {
            RepositoryType::File => Some(PathBuf::from(
                self.url.strip_prefix("file://").unwrap_or(&self.url),
            )),
            RepositoryType::Http => None,
        }
    }
}

/// Repository transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepositoryType {
    /// Helm-style HTTP repository serving `index.yaml`
    Http,

    /// Local directory, with or without `index.yaml`
    File,
}

impl RepositoryType {
    /// Detect the repository type from its URL
    ///
    /// Absolute paths are file repositories; anything else must be a valid
    /// `http`, `https` or `file` URL.
    pub fn detect(url: &str) -> Result<Self> {
        if url.starts_with('/') {
            return Ok(RepositoryType::File);
        }

        let invalid = |reason: String| RepoError::InvalidRepositoryUrl {
            url: url.to_string(),
            reason,
        };
        let parsed = Url::parse(url).map_err(|e| invalid(e.to_string()))?;

        match parsed.scheme() {
            "file" => Ok(RepositoryType::File),
            "http" | "https" => Ok(RepositoryType::Http),
            other => Err(invalid(format!(
                "unsupported scheme `{other}`, expected http, https, file or an absolute path"
            ))),
        }
    }
}

/// Repositories known for this run
#[derive(Debug, Clone, Default)]
pub struct RepositoryRegistry {
    repositories: Vec<Repository>,
}

impl RepositoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a comma separated `name=url` list
    ///
    /// Whitespace around names and URLs is trimmed and empty items are
    /// skipped.
    pub fn parse(list: &str) -> Result<Self> {
        let mut registry = Self::new();

        for item in list.split(',').map(str::trim).filter(|i| !i.is_empty()) {
            let (name, url) = item
                .split_once('=')
                .map(|(n, u)| (n.trim(), u.trim()))
                .filter(|(n, _)| !n.is_empty())
                .ok_or_else(|| RepoError::InvalidRepositoryEntry {
                    entry: item.to_string(),
                })?;

            registry.add(Repository::new(name, url)?)?;
        }

        Ok(registry)
    }

    pub fn add(&mut self, repo: Repository) -> Result<()> {
        if self.get(&repo.name).is_some() {
            return Err(RepoError::RepositoryAlreadyExists { name: repo.name });
        }
        self.repositories.push(repo);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Repository> {
        self.repositories.iter().find(|r| r.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Repository> {
        self.repositories.iter()
    }

    pub fn len(&self) -> usize {
        self.repositories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.repositories.is_empty()
    }
}
