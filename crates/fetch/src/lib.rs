//! Fetch the latest uv release for a target, verify it and cache it.
//!
//! The pipeline runs strictly in order, and the first failing stage aborts
//! the rest:
//! 1. build the release URL from architecture and platform
//! 2. download the archive into the working directory
//! 3. extract it (zip on Windows, tar.gz elsewhere)
//! 4. run the extracted `uv --version` to learn the version
//! 5. validate the archive checksum, if one was supplied
//! 6. publish the executable's directory into the [`ToolCache`]
//!
//! # Example
//!
//! ```ignore
//! use uvfetch_core::{ArtifactKey, FetchOptions, FetchRequest};
//! use uvfetch_fetch::Fetcher;
//!
//! let fetcher = Fetcher::new(FetchOptions::default())?;
//! let request = FetchRequest::new(ArtifactKey::current()?);
//! let fetched = fetcher.fetch_latest(&request).await?;
//! println!("uv {} in {}", fetched.version, fetched.cache_dir.display());
//! ```

mod checksum;
mod download;
mod extract;
mod version;

pub use checksum::{sha256_file, validate_checksum};
pub use download::{download_archive, release_url};
pub use extract::{ExtractedTool, extract_archive, locate_executable};
pub use version::{VERSION_FLAG, parse_version_output, probe_version};

use reqwest::Client;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{error, info};
use uvfetch_cache::ToolCache;
use uvfetch_core::{ArtifactKey, Error, FetchOptions, FetchRequest, Result, Stage, TOOL_NAME};

/// Outcome of a successful fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchedRelease {
    /// Cache entry holding the executable
    pub cache_dir: PathBuf,
    /// Version reported by the tool
    pub version: String,
    /// Path to the cached executable
    pub executable: PathBuf,
    /// Target the release was fetched for
    #[serde(flatten)]
    pub key: ArtifactKey,
}

/// Runs the fetch pipeline with a shared HTTP client and cache.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    options: FetchOptions,
    cache: ToolCache,
}

impl Fetcher {
    /// Create a fetcher with a default HTTP client.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Download`] if the HTTP client cannot be built.
    pub fn new(options: FetchOptions) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("uvfetch/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                Error::download(
                    options.release_base_url(),
                    format!("failed to create HTTP client: {e}"),
                )
            })?;
        Ok(Self::with_client(client, options))
    }

    /// Create a fetcher with a caller-configured HTTP client.
    ///
    /// Timeouts and proxies belong on the client; the pipeline never retries.
    #[must_use]
    pub fn with_client(client: Client, options: FetchOptions) -> Self {
        let cache = ToolCache::new(options.cache_dir());
        Self {
            client,
            options,
            cache,
        }
    }

    /// The cache this fetcher publishes into.
    #[must_use]
    pub fn cache(&self) -> &ToolCache {
        &self.cache
    }

    /// Download URL for `key`.
    #[must_use]
    pub fn release_url(&self, key: &ArtifactKey) -> String {
        release_url(&self.options.release_base_url(), key)
    }

    /// Fetch the latest release for `request.key` and publish it to the cache.
    ///
    /// # Errors
    ///
    /// Returns the error of the first failing stage; see [`Error::stage`].
    pub async fn fetch_latest(&self, request: &FetchRequest) -> Result<FetchedRelease> {
        let result = self.run_pipeline(request).await;
        if let Err(e) = &result {
            error!(stage = %e.stage(), key = %request.key, error = %e, "Fetch failed");
        }
        result
    }

    async fn run_pipeline(&self, request: &FetchRequest) -> Result<FetchedRelease> {
        let key = request.key;
        let work_dir = self.options.work_dir();
        let url = self.release_url(&key);
        info!(%url, "Downloading {TOOL_NAME}");

        let archive = download_archive(
            &self.client,
            &url,
            &work_dir.join(key.asset_file_name(TOOL_NAME)),
            request.token.as_ref(),
        )
        .await?;

        let format = key.platform.archive_format();
        let executable_name = key.platform.executable_name(TOOL_NAME);
        let extract_dest = work_dir.join(key.artifact_name(TOOL_NAME));
        let extracted = {
            let archive = archive.clone();
            let name = executable_name.clone();
            let dest = extract_dest.clone();
            run_blocking(Stage::Extract, &extract_dest, move || {
                let dir = extract_archive(&archive, format, &dest)?;
                locate_executable(&dir, &name)
            })
            .await?
        };

        let version = probe_version(&extracted.executable, self.options.verbose).await?;
        info!(%key, %version, "Found {TOOL_NAME} {version}");

        validate_checksum(request.checksum.as_deref(), &archive, &key, &version).await?;

        let cache_dir = {
            let cache = self.cache.clone();
            let source = extracted.dir.clone();
            let version = version.clone();
            run_blocking(Stage::Cache, self.cache.root(), move || {
                cache.store(&source, TOOL_NAME, &version, key.architecture)
            })
            .await?
        };

        info!(%key, %version, cache_dir = %cache_dir.display(), "Cached {TOOL_NAME}");
        Ok(FetchedRelease {
            executable: cache_dir.join(&executable_name),
            cache_dir,
            version,
            key,
        })
    }
}

/// Fetch the latest release with a one-off [`Fetcher`].
///
/// # Errors
///
/// Returns the error of the first failing stage.
pub async fn fetch_latest(request: &FetchRequest, options: &FetchOptions) -> Result<FetchedRelease> {
    Fetcher::new(options.clone())?.fetch_latest(request).await
}

/// Run filesystem-bound work off the async executor.
async fn run_blocking<T, F>(stage: Stage, path: &Path, f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| Error::io(stage, std::io::Error::other(e), path, "spawn_blocking"))?
}
