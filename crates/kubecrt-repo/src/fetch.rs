//! Chart fetching from registered repositories
//!
//! Indexes are loaded once when the repositories are opened. Downloaded
//! archives are verified, unpacked into the cache directory and reused by
//! later runs.

use std::path::{Path, PathBuf};
use std::time::Duration;

use semver::VersionReq;
use tracing::{debug, info};
use url::Url;

use crate::archive::{chart_root, extract_chart, verify_digest};
use crate::error::{RepoError, Result};
use crate::index::{ChartVersion, RepositoryIndex};
use crate::registry::{Repository, RepositoryRegistry, RepositoryType};

const USER_AGENT: &str = concat!("kubecrt/", env!("CARGO_PKG_VERSION"));

struct OpenRepository {
    repo: Repository,

    /// `None` for file repositories without an `index.yaml`
    index: Option<RepositoryIndex>,
}

/// Registered repositories with their indexes loaded
pub struct ChartRepositories {
    client: reqwest::Client,
    cache_dir: PathBuf,
    repos: Vec<OpenRepository>,
}

impl ChartRepositories {
    /// Create the cache directory and load every repository index
    pub async fn open(
        registry: &RepositoryRegistry,
        cache_dir: impl Into<PathBuf>,
    ) -> Result<Self> {
        let cache_dir = cache_dir.into();
        tokio::fs::create_dir_all(&cache_dir).await?;

        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| RepoError::NetworkError {
                message: e.to_string(),
            })?;

        let mut repos = Vec::with_capacity(registry.len());
        for repo in registry.iter() {
            let index = match repo.repo_type {
                RepositoryType::Http => Some(fetch_index(&client, repo).await?),
                RepositoryType::File => read_local_index(repo).await?,
            };
            repos.push(OpenRepository {
                repo: repo.clone(),
                index,
            });
        }

        Ok(Self {
            client,
            cache_dir,
            repos,
        })
    }

    pub fn contains(&self, repo: &str) -> bool {
        self.find(repo).is_some()
    }

    fn find(&self, name: &str) -> Option<&OpenRepository> {
        self.repos.iter().find(|r| r.repo.name == name)
    }

    /// Directory of `chart` from `repo`, at the highest version allowed by
    /// `constraint`
    pub async fn fetch_chart(
        &self,
        repo: &str,
        chart: &str,
        constraint: Option<&VersionReq>,
    ) -> Result<PathBuf> {
        let open = self.find(repo).ok_or_else(|| RepoError::RepositoryNotFound {
            name: repo.to_string(),
        })?;

        let Some(index) = &open.index else {
            // Unindexed file repository: charts are plain directories.
            let dir = open
                .repo
                .local_path()
                .map(|p| p.join(chart))
                .filter(|p| p.is_dir())
                .ok_or_else(|| RepoError::ChartNotFound {
                    name: chart.to_string(),
                    repo: repo.to_string(),
                })?;
            return Ok(dir);
        };

        let version = index.find_best_match(repo, chart, constraint)?;
        let dest = self.cache_dir.join(repo).join(chart).join(&version.version);

        if dest.is_dir() {
            debug!(chart, version = %version.version, "using cached chart");
            return chart_root(&dest);
        }

        let data = self.download(&open.repo, version).await?;
        if let Some(expected) = &version.digest {
            verify_digest(&version.name, &data, expected)?;
        }

        self.unpack(&data, &dest)?;
        info!(chart, version = %version.version, repo, "fetched chart");
        chart_root(&dest)
    }

    async fn download(&self, repo: &Repository, version: &ChartVersion) -> Result<Vec<u8>> {
        let location = version
            .download_url()
            .ok_or_else(|| RepoError::ChartNotFound {
                name: version.name.clone(),
                repo: repo.name.clone(),
            })?;

        if let Ok(url) = Url::parse(location) {
            return self.get_bytes(url).await;
        }

        match repo.repo_type {
            RepositoryType::Http => {
                let base = Url::parse(&format!("{}/", repo.url.trim_end_matches('/')))?;
                self.get_bytes(base.join(location)?).await
            }
            RepositoryType::File => {
                let path = repo.local_path().unwrap_or_default().join(location);
                Ok(tokio::fs::read(path).await?)
            }
        }
    }

    async fn get_bytes(&self, url: Url) -> Result<Vec<u8>> {
        if url.scheme() == "file" {
            let path = url.to_file_path().map_err(|()| RepoError::InvalidRepositoryUrl {
                url: url.to_string(),
                reason: "not a local path".to_string(),
            })?;
            return Ok(tokio::fs::read(path).await?);
        }

        debug!(%url, "downloading chart archive");
        let response = self.client.get(url).send().await?.error_for_status()?;
        Ok(response.bytes().await?.to_vec())
    }

    /// Unpack next to `dest`, then move into place
    fn unpack(&self, data: &[u8], dest: &Path) -> Result<()> {
        let parent = dest.parent().unwrap_or(self.cache_dir.as_path());
        std::fs::create_dir_all(parent)?;
        let tmp = tempfile::Builder::new()
            .prefix(".extract-")
            .tempdir_in(parent)?;
        extract_chart(data, tmp.path())?;

        if let Err(e) = std::fs::rename(tmp.path(), dest) {
            // A concurrent fetch of the same chart got there first.
            if !dest.is_dir() {
                return Err(e.into());
            }
        }
        Ok(())
    }
}

async fn fetch_index(client: &reqwest::Client, repo: &Repository) -> Result<RepositoryIndex> {
    let url = repo.index_url();
    debug!(repo = %repo.name, %url, "loading repository index");

    let response = client.get(&url).send().await?;
    let status = response.status();
    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(RepoError::IndexNotFound { url });
    }
    if !status.is_success() {
        return Err(RepoError::HttpError {
            status: status.as_u16(),
            url,
        });
    }

    RepositoryIndex::from_bytes(&response.bytes().await?)
}

async fn read_local_index(repo: &Repository) -> Result<Option<RepositoryIndex>> {
    let Some(dir) = repo.local_path() else {
        return Ok(None);
    };
    if !dir.is_dir() {
        return Err(RepoError::InvalidRepositoryUrl {
            url: repo.url.clone(),
            reason: "directory does not exist".to_string(),
        });
    }

    let index_path = dir.join("index.yaml");
    if !index_path.is_file() {
        debug!(repo = %repo.name, "no index.yaml, serving chart directories");
        return Ok(None);
    }

    let bytes = tokio::fs::read(&index_path).await?;
    RepositoryIndex::from_bytes(&bytes).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::compute_digest;
    use crate::archive::tests::make_archive;
    use kubecrt_core::version::parse_constraint;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn web_archive(version: &str) -> Vec<u8> {
        make_archive(&[
            ("web/Chart.yaml", format!("apiVersion: v2\nname: web\nversion: {version}\n").as_str()),
            ("web/templates/svc.yaml", "kind: Service\n"),
        ])
    }

    /// Indexed file repository holding `chart` 1.0.0
    fn indexed_file_repo(dir: &Path, chart: &str) {
        let archive = make_archive(&[
            (
                format!("{chart}/Chart.yaml").as_str(),
                format!("name: {chart}\nversion: 1.0.0\n").as_str(),
            ),
            (format!("{chart}/templates/cm.yaml").as_str(), "kind: ConfigMap\n"),
        ]);
        std::fs::create_dir_all(dir).unwrap();
        std::fs::write(dir.join(format!("{chart}-1.0.0.tgz")), &archive).unwrap();
        std::fs::write(
            dir.join("index.yaml"),
            format!(
                "entries:\n  {chart}:\n    - name: {chart}\n      version: 1.0.0\n      urls: [{chart}-1.0.0.tgz]\n      digest: {}\n",
                compute_digest(&archive)
            ),
        )
        .unwrap();
    }

    fn index_yaml(digest: &str) -> String {
        format!(
            r#"apiVersion: v1
entries:
  web:
    - name: web
      version: 1.0.0
      urls: [charts/web-1.0.0.tgz]
      digest: "{digest}"
    - name: web
      version: 1.1.0
      urls: [charts/web-1.1.0.tgz]
"#
        )
    }

    async fn http_repo(server: &MockServer, digest: &str) {
        Mock::given(method("GET"))
            .and(path("/index.yaml"))
            .respond_with(ResponseTemplate::new(200).set_body_string(index_yaml(digest)))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/charts/web-1.0.0.tgz"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(web_archive("1.0.0")))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/charts/web-1.1.0.tgz"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(web_archive("1.1.0")))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_fetch_from_http_repository() {
        let server = MockServer::start().await;
        http_repo(&server, &compute_digest(&web_archive("1.0.0"))).await;
        let cache = TempDir::new().unwrap();

        let registry = RepositoryRegistry::parse(&format!("stable={}", server.uri())).unwrap();
        let repos = ChartRepositories::open(&registry, cache.path()).await.unwrap();

        let latest = repos.fetch_chart("stable", "web", None).await.unwrap();
        assert_eq!(latest, cache.path().join("stable/web/1.1.0/web"));
        assert!(latest.join("templates/svc.yaml").is_file());

        let req = parse_constraint("~> 1.0.0").unwrap();
        let pinned = repos.fetch_chart("stable", "web", Some(&req)).await.unwrap();
        assert_eq!(pinned, cache.path().join("stable/web/1.0.0/web"));
    }

    #[tokio::test]
    async fn test_cached_chart_is_reused() {
        let server = MockServer::start().await;
        http_repo(&server, "").await;
        let cache = TempDir::new().unwrap();

        let registry = RepositoryRegistry::parse(&format!("stable={}", server.uri())).unwrap();
        let repos = ChartRepositories::open(&registry, cache.path()).await.unwrap();

        let first = repos.fetch_chart("stable", "web", None).await.unwrap();
        let second = repos.fetch_chart("stable", "web", None).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_digest_mismatch() {
        let server = MockServer::start().await;
        http_repo(&server, "sha256:0000").await;
        let cache = TempDir::new().unwrap();

        let registry = RepositoryRegistry::parse(&format!("stable={}", server.uri())).unwrap();
        let repos = ChartRepositories::open(&registry, cache.path()).await.unwrap();

        let req = parse_constraint("=1.0.0").unwrap();
        let err = repos.fetch_chart("stable", "web", Some(&req)).await.unwrap_err();
        assert!(matches!(err, RepoError::IntegrityCheckFailed { .. }));
        assert!(!cache.path().join("stable/web/1.0.0").exists());
    }

    #[tokio::test]
    async fn test_missing_index() {
        let server = MockServer::start().await;
        let cache = TempDir::new().unwrap();

        let registry = RepositoryRegistry::parse(&format!("stable={}", server.uri())).unwrap();
        let err = ChartRepositories::open(&registry, cache.path()).await.err().unwrap();
        assert!(matches!(err, RepoError::IndexNotFound { .. }));
    }

    #[tokio::test]
    async fn test_unindexed_file_repository() {
        let charts = TempDir::new().unwrap();
        std::fs::create_dir_all(charts.path().join("web")).unwrap();
        let cache = TempDir::new().unwrap();

        let registry =
            RepositoryRegistry::parse(&format!("local={}", charts.path().display())).unwrap();
        let repos = ChartRepositories::open(&registry, cache.path()).await.unwrap();

        assert_eq!(
            repos.fetch_chart("local", "web", None).await.unwrap(),
            charts.path().join("web")
        );
        assert!(matches!(
            repos.fetch_chart("local", "db", None).await.unwrap_err(),
            RepoError::ChartNotFound { .. }
        ));
    }

    #[tokio::test]
    async fn test_indexed_file_repository() {
        let charts = TempDir::new().unwrap();
        indexed_file_repo(charts.path(), "web");
        let cache = TempDir::new().unwrap();

        let list = format!("local=file://{}", charts.path().display());
        let registry = RepositoryRegistry::parse(&list).unwrap();
        let repos = ChartRepositories::open(&registry, cache.path()).await.unwrap();

        let dir = repos.fetch_chart("local", "web", None).await.unwrap();
        assert_eq!(dir, cache.path().join("local/web/1.0.0/web"));
        assert!(dir.join("Chart.yaml").is_file());
    }

    #[tokio::test]
    async fn test_cache_entries_do_not_collide() {
        let charts = TempDir::new().unwrap();
        indexed_file_repo(&charts.path().join("one"), "c");
        indexed_file_repo(&charts.path().join("two"), "b-c");
        let cache = TempDir::new().unwrap();

        let list = format!(
            "a-b={},a={}",
            charts.path().join("one").display(),
            charts.path().join("two").display()
        );
        let registry = RepositoryRegistry::parse(&list).unwrap();
        let repos = ChartRepositories::open(&registry, cache.path()).await.unwrap();

        let first = repos.fetch_chart("a-b", "c", None).await.unwrap();
        let second = repos.fetch_chart("a", "b-c", None).await.unwrap();

        assert_ne!(first, second);
        assert!(first.join("Chart.yaml").is_file());
        assert!(second.join("Chart.yaml").is_file());
        let chart = std::fs::read_to_string(second.join("Chart.yaml")).unwrap();
        assert!(chart.contains("name: b-c"));
    }

    #[tokio::test]
    async fn test_unknown_repository() {
        let cache = TempDir::new().unwrap();
        let registry = RepositoryRegistry::parse("").unwrap();
        let repos = ChartRepositories::open(&registry, cache.path()).await.unwrap();

        assert!(!repos.contains("stable"));
        assert!(matches!(
            repos.fetch_chart("stable", "web", None).await.unwrap_err(),
            RepoError::RepositoryNotFound { .. }
        ));
    }
}
