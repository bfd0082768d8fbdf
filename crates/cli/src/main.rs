//! `uvfetch`: fetch the latest uv release into the local tool cache.

mod cli;
mod logging;

use clap::Parser;
use cli::Cli;
use logging::{TracingConfig, init_tracing};
use miette::IntoDiagnostic;
use tracing::info;
use uvfetch_core::TOOL_NAME;
use uvfetch_fetch::{FetchedRelease, Fetcher};

#[tokio::main]
async fn main() -> miette::Result<()> {
    run_main().await
}

async fn run_main() -> miette::Result<()> {
    let cli = Cli::parse();

    init_tracing(TracingConfig {
        format: cli.log_format,
        level: cli.log_level.into(),
        filter: cli.log_filter.clone(),
    })?;

    let release = fetch(&cli).await?;
    print_release(&release, cli.json)
}

/// Resolve the release, from the cache when `--reuse-cached` hits.
async fn fetch(cli: &Cli) -> uvfetch_core::Result<FetchedRelease> {
    let request = cli.request()?;
    let fetcher = Fetcher::new(cli.options())?;

    if let Some(version) = &cli.reuse_cached {
        let key = request.key;
        if let Some(cache_dir) = fetcher.cache().lookup(TOOL_NAME, version, key.architecture) {
            info!(%key, %version, cache_dir = %cache_dir.display(), "Using cached {TOOL_NAME}");
            return Ok(FetchedRelease {
                executable: cache_dir.join(key.platform.executable_name(TOOL_NAME)),
                cache_dir,
                version: version.clone(),
                key,
            });
        }
        info!(%key, %version, "No cached {TOOL_NAME}, fetching latest");
    }

    fetcher.fetch_latest(&request).await
}

#[allow(clippy::print_stdout)]
fn print_release(release: &FetchedRelease, json: bool) -> miette::Result<()> {
    if json {
        let rendered = serde_json::to_string_pretty(release).into_diagnostic()?;
        println!("{rendered}");
    } else {
        println!("uv-version={}", release.version);
        println!("uv-path={}", release.executable.display());
        println!("cache-dir={}", release.cache_dir.display());
    }
    Ok(())
}
