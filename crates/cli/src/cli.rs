use crate::logging::{LogLevel, TracingFormat};
use clap::Parser;
use std::path::PathBuf;
use uvfetch_core::{
    Architecture, ArtifactKey, Error, FetchOptions, FetchRequest, Platform, Result,
};

/// Not `Debug`: carries the GitHub token.
#[derive(Parser)]
#[command(
    name = "uvfetch",
    about = "Fetch the latest uv release, verify it and cache it",
    version
)]
pub struct Cli {
    #[arg(
        short = 'l',
        long,
        global = true,
        help = "Set logging level",
        default_value = "warn",
        value_enum
    )]
    pub log_level: LogLevel,

    #[arg(
        long,
        global = true,
        help = "Log output format",
        default_value = "compact",
        value_enum
    )]
    pub log_format: TracingFormat,

    #[arg(
        long,
        global = true,
        value_name = "DIRECTIVES",
        help = "Tracing filter directives; overrides RUST_LOG and --log-level"
    )]
    pub log_filter: Option<String>,

    #[arg(long, help = "Target platform triple suffix (default: host)")]
    pub platform: Option<Platform>,

    #[arg(long = "arch", help = "Target architecture (default: host)")]
    pub architecture: Option<Architecture>,

    #[arg(
        long,
        env = "UVFETCH_CHECKSUM",
        help = "Expected SHA-256 of the release archive"
    )]
    pub checksum: Option<String>,

    #[arg(
        long,
        env = "GITHUB_TOKEN",
        hide_env_values = true,
        help = "Token sent as a bearer credential with the download"
    )]
    pub github_token: Option<String>,

    #[arg(long, env = "UVFETCH_CACHE_DIR", help = "Tool cache root")]
    pub cache_dir: Option<PathBuf>,

    #[arg(
        long,
        env = "UVFETCH_WORK_DIR",
        help = "Directory for the downloaded archive and extraction"
    )]
    pub work_dir: Option<PathBuf>,

    #[arg(
        long,
        env = "UVFETCH_RELEASE_BASE_URL",
        help = "Release base URL (https://<host>/<owner>/<repo>)"
    )]
    pub release_base_url: Option<String>,

    #[arg(
        long,
        value_name = "VERSION",
        help = "Use the cached VERSION if present instead of downloading"
    )]
    pub reuse_cached: Option<String>,

    #[arg(short, long, help = "Show the output of `uv --version`")]
    pub verbose: bool,

    #[arg(long, help = "Print the result as JSON")]
    pub json: bool,
}

impl Cli {
    /// Target key from `--arch`/`--platform`, filling gaps from the host.
    pub fn key(&self) -> Result<ArtifactKey> {
        let architecture = match self.architecture {
            Some(arch) => arch,
            None => Architecture::current().ok_or_else(|| {
                Error::unsupported_platform(format!(
                    "host architecture '{}'",
                    std::env::consts::ARCH
                ))
            })?,
        };
        let platform = match self.platform {
            Some(platform) => platform,
            None => Platform::current().ok_or_else(|| {
                Error::unsupported_platform(format!("host OS '{}'", std::env::consts::OS))
            })?,
        };
        ArtifactKey::new(architecture, platform)
    }

    pub fn request(&self) -> Result<FetchRequest> {
        Ok(FetchRequest::new(self.key()?)
            .with_checksum(self.checksum.clone())
            .with_token(self.github_token.clone()))
    }

    pub fn options(&self) -> FetchOptions {
        let mut options = FetchOptions::new().with_verbose(self.verbose);
        if let Some(dir) = &self.cache_dir {
            options = options.with_cache_dir(dir.clone());
        }
        if let Some(dir) = &self.work_dir {
            options = options.with_work_dir(dir.clone());
        }
        if let Some(url) = &self.release_base_url {
            options = options.with_release_base_url(url.clone());
        }
        options
    }
}
