//! kubecrt Repository Support
//!
//! Charts referenced as `<repo>/<chart>` are looked up in repositories
//! registered for the run:
//!
//! - **HTTP repositories**: Helm-style repos serving `index.yaml`
//! - **File repositories**: local directories, indexed or holding plain
//!   chart directories
//!
//! Archives are verified against the index digest when one is published
//! and unpacked into a cache directory shared between runs.
//!
//! ## Example
//!
//! ```rust,no_run
//! use kubecrt_repo::{ChartRepositories, RepositoryRegistry};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = RepositoryRegistry::parse("stable=https://charts.example.com")?;
//! let repos = ChartRepositories::open(&registry, "/tmp/kubecrt").await?;
//!
//! let chart_dir = repos.fetch_chart("stable", "nginx", None).await?;
//! # Ok(())
//! # }
//! ```

pub mod archive;
pub mod error;
pub mod fetch;
pub mod index;
pub mod registry;

pub use error::{RepoError, Result};
pub use fetch::ChartRepositories;
pub use index::{ChartVersion, RepositoryIndex};
pub use registry::{Repository, RepositoryRegistry, RepositoryType};
