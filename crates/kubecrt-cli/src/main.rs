//! kubecrt CLI - render a charts configuration into one manifest stream

use clap::Parser;
use miette::Result;
use std::path::PathBuf;

mod render;

#[derive(Parser)]
#[command(name = "kubecrt")]
#[command(version)]
#[command(
    about = "Convert a charts configuration into a single stream of Kubernetes resources",
    long_about = None
)]
struct Cli {
    /// Charts configuration file, or - to read it from stdin
    #[arg(value_name = "CHARTS_CONFIG")]
    config: String,

    /// Write the manifests to a file instead of stdout
    #[arg(short, long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Emit one JSON document per manifest, newline separated
    #[arg(short, long)]
    json: bool,

    /// Override the global namespace
    #[arg(short, long, env = "KUBECRT_NAMESPACE")]
    namespace: Option<String>,

    /// Override the global release name
    #[arg(short = 'a', long, env = "KUBECRT_NAME")]
    name: Option<String>,

    /// Directory of partial templates shared by all charts
    #[arg(short, long, value_name = "DIR")]
    partials_dir: Option<PathBuf>,

    /// Chart repositories to register, as name=url,name=url
    #[arg(short, long = "repo", value_name = "LIST")]
    repos: Option<String>,

    /// Number of charts rendered in parallel
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u16).range(1..))]
    concurrency: u16,

    /// Per-chart render timeout
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Chart cache directory
    #[arg(long, value_name = "DIR")]
    cache_dir: Option<PathBuf>,

    /// Enable debug output on stderr
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    miette::set_panic_hook();

    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("KUBECRT_LOG").unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new(if cli.debug { "debug" } else { "warn" })
            }),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();

    render::run(render::RenderArgs {
        config: cli.config,
        output: cli.output,
        json: cli.json,
        name: cli.name,
        namespace: cli.namespace,
        partials_dir: cli.partials_dir,
        repos: cli.repos.unwrap_or_default(),
        concurrency: usize::from(cli.concurrency),
        timeout: cli.timeout.map(std::time::Duration::from_secs),
        cache_dir: cli.cache_dir,
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_flags() {
        let cli = Cli::try_parse_from([
            "kubecrt", "-j", "-n", "prod", "-a", "shop", "-p", "partials", "-r",
            "stable=https://x", "--concurrency", "4", "--timeout", "30", "charts.yaml",
        ])
        .unwrap();

        assert!(cli.json);
        assert_eq!(cli.namespace.as_deref(), Some("prod"));
        assert_eq!(cli.name.as_deref(), Some("shop"));
        assert_eq!(cli.partials_dir, Some(PathBuf::from("partials")));
        assert_eq!(cli.repos.as_deref(), Some("stable=https://x"));
        assert_eq!(cli.concurrency, 4);
        assert_eq!(cli.timeout, Some(30));
        assert_eq!(cli.config, "charts.yaml");
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        assert!(Cli::try_parse_from(["kubecrt", "--concurrency", "0", "c.yaml"]).is_err());
    }
}
