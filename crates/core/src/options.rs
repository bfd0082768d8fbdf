//! Caller-supplied configuration for a fetch.

use secrecy::SecretString;
use std::path::PathBuf;

use crate::platform::ArtifactKey;
use crate::{OWNER, REPO};

/// What to fetch: the target and optional verification/auth inputs.
///
/// The token is held as a [`SecretString`] so `Debug` output redacts it.
#[derive(Debug)]
pub struct FetchRequest {
    /// Target architecture and platform
    pub key: ArtifactKey,
    /// Expected SHA-256 of the release archive, hex encoded
    pub checksum: Option<String>,
    /// Bearer token for the download
    pub token: Option<SecretString>,
}

impl FetchRequest {
    /// Create a request for the given target with no checksum and no token.
    #[must_use]
    pub fn new(key: ArtifactKey) -> Self {
        Self {
            key,
            checksum: None,
            token: None,
        }
    }

    /// Set the expected checksum. Blank values are treated as absent.
    #[must_use]
    pub fn with_checksum(mut self, checksum: Option<String>) -> Self {
        self.checksum = checksum.filter(|c| !c.trim().is_empty());
        self
    }

    /// Set the authentication token. Blank values are treated as absent.
    #[must_use]
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token
            .filter(|t| !t.trim().is_empty())
            .map(SecretString::from);
        self
    }
}

/// Options for fetch operations.
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    /// Custom cache directory.
    pub cache_dir: Option<PathBuf>,
    /// Custom working directory for downloads and extraction.
    pub work_dir: Option<PathBuf>,
    /// Custom release base URL (`https://<host>/<owner>/<repo>`).
    pub release_base_url: Option<String>,
    /// Show the fetched tool's `--version` output at info level.
    pub verbose: bool,
}

impl FetchOptions {
    /// Create new options with default locations.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the cache directory.
    #[must_use]
    pub fn with_cache_dir(mut self, path: PathBuf) -> Self {
        self.cache_dir = Some(path);
        self
    }

    /// Set the working directory.
    #[must_use]
    pub fn with_work_dir(mut self, path: PathBuf) -> Self {
        self.work_dir = Some(path);
        self
    }

    /// Set the release base URL.
    #[must_use]
    pub fn with_release_base_url(mut self, url: impl Into<String>) -> Self {
        self.release_base_url = Some(url.into());
        self
    }

    /// Set verbose subprocess output.
    #[must_use]
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Get the cache directory, defaulting to ~/.cache/uvfetch/tools.
    #[must_use]
    pub fn cache_dir(&self) -> PathBuf {
        self.cache_dir.clone().unwrap_or_else(default_cache_dir)
    }

    /// Get the working directory, defaulting to `<cwd>/uv`.
    #[must_use]
    pub fn work_dir(&self) -> PathBuf {
        self.work_dir.clone().unwrap_or_else(default_work_dir)
    }

    /// Get the release base URL without a trailing slash.
    #[must_use]
    pub fn release_base_url(&self) -> String {
        self.release_base_url.as_deref().map_or_else(
            || format!("https://github.com/{OWNER}/{REPO}"),
            |url| url.trim_end_matches('/').to_string(),
        )
    }
}

/// Get the default cache directory for fetched tools.
#[must_use]
pub fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from(".cache"))
        .join("uvfetch")
        .join("tools")
}

/// Get the default working directory for downloads.
#[must_use]
pub fn default_work_dir() -> PathBuf {
    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(crate::TOOL_NAME)
}
