//! Error types for the fetch pipeline

// Rust 1.92 compiler bug: false positives for thiserror/miette derive macro fields
// https://github.com/rust-lang/rust/issues/147648
#![allow(unused_assignments)]

use miette::Diagnostic;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::platform::{Architecture, Platform};

/// Pipeline stage an error originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Mapping platform/architecture to a release asset
    Resolve,
    /// Fetching the release archive
    Download,
    /// Unpacking the archive and locating the executable
    Extract,
    /// Running the executable to discover its version
    ProbeVersion,
    /// Comparing the archive digest against the expected checksum
    ValidateChecksum,
    /// Publishing into the tool cache
    Cache,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Resolve => "resolve",
            Self::Download => "download",
            Self::Extract => "extract",
            Self::ProbeVersion => "probe-version",
            Self::ValidateChecksum => "validate-checksum",
            Self::Cache => "cache",
        };
        f.write_str(name)
    }
}

/// Errors produced while fetching, verifying and caching a release.
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// Platform, architecture, or their combination has no published asset
    #[error("Unsupported target: {message}")]
    #[diagnostic(
        code(uvfetch::unsupported_platform),
        help("Supported platforms: unknown-linux-gnu, unknown-linux-musl, unknown-linux-gnueabihf, unknown-linux-musleabihf, apple-darwin, pc-windows-msvc")
    )]
    UnsupportedPlatform {
        /// What was rejected and why
        message: String,
    },

    /// Network failure or non-success HTTP status
    #[error("Failed to download {url}: {message}")]
    #[diagnostic(
        code(uvfetch::download),
        help("Check network access; pass a GitHub token if you are being rate limited")
    )]
    Download {
        /// Requested URL
        url: String,
        /// Failure description
        message: String,
    },

    /// Archive is unreadable, empty, or lacks the executable
    #[error("Failed to extract {}: {message}", archive.display())]
    #[diagnostic(code(uvfetch::extract))]
    Extract {
        /// Archive being extracted
        archive: PathBuf,
        /// Failure description
        message: String,
    },

    /// Executable could not be run or exited unsuccessfully
    #[error("Failed to run {} --version: {message}", executable.display())]
    #[diagnostic(code(uvfetch::version_probe))]
    VersionProbe {
        /// Executable that was invoked
        executable: PathBuf,
        /// Failure description
        message: String,
    },

    /// `--version` output did not contain a version token
    #[error("Could not parse version from output {output:?}")]
    #[diagnostic(
        code(uvfetch::version_parse),
        help("Expected output shaped like `uv 0.3.1 (be17d132a 2024-08-21)`")
    )]
    VersionParse {
        /// Captured standard output
        output: String,
    },

    /// Archive digest differs from the expected checksum
    #[error(
        "Checksum mismatch for {architecture}-{platform} version {version}: expected {expected}, got {actual}"
    )]
    #[diagnostic(
        code(uvfetch::checksum_mismatch),
        help("The downloaded archive does not match the supplied checksum; verify the checksum belongs to this release and target")
    )]
    ChecksumMismatch {
        /// Checksum supplied by the caller
        expected: String,
        /// Digest computed from the archive
        actual: String,
        /// Architecture of the artifact
        architecture: Architecture,
        /// Platform of the artifact
        platform: Platform,
        /// Version reported by the extracted tool
        version: String,
    },

    /// Writing or publishing a cache entry failed
    #[error("Cache {operation} failed: {}", path.display())]
    #[diagnostic(
        code(uvfetch::cache),
        help("Check permissions and free space in the cache directory")
    )]
    Cache {
        /// Operation that failed (e.g. "copy", "publish")
        operation: String,
        /// Path involved
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// I/O failure in the working area
    #[error("I/O {operation} failed during {stage}: {}", path.display())]
    #[diagnostic(code(uvfetch::io))]
    Io {
        /// Stage that touched the working area
        stage: Stage,
        /// Operation that failed
        operation: String,
        /// Path involved
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    /// Create an unsupported platform error
    #[must_use]
    pub fn unsupported_platform(message: impl Into<String>) -> Self {
        Self::UnsupportedPlatform {
            message: message.into(),
        }
    }

    /// Create a download error
    #[must_use]
    pub fn download(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Download {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Create an extraction error
    #[must_use]
    pub fn extract(archive: impl AsRef<Path>, message: impl Into<String>) -> Self {
        Self::Extract {
            archive: archive.as_ref().to_path_buf(),
            message: message.into(),
        }
    }

    /// Create a version probe error
    #[must_use]
    pub fn version_probe(executable: impl AsRef<Path>, message: impl Into<String>) -> Self {
        Self::VersionProbe {
            executable: executable.as_ref().to_path_buf(),
            message: message.into(),
        }
    }

    /// Create a version parse error
    #[must_use]
    pub fn version_parse(output: impl Into<String>) -> Self {
        Self::VersionParse {
            output: output.into(),
        }
    }

    /// Create a checksum mismatch error
    #[must_use]
    pub fn checksum_mismatch(
        expected: impl Into<String>,
        actual: impl Into<String>,
        architecture: Architecture,
        platform: Platform,
        version: impl Into<String>,
    ) -> Self {
        Self::ChecksumMismatch {
            expected: expected.into(),
            actual: actual.into(),
            architecture,
            platform,
            version: version.into(),
        }
    }

    /// Create a cache error with path context
    #[must_use]
    pub fn cache(
        source: std::io::Error,
        path: impl AsRef<Path>,
        operation: impl Into<String>,
    ) -> Self {
        Self::Cache {
            operation: operation.into(),
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Create a working-area I/O error with path context
    #[must_use]
    pub fn io(
        stage: Stage,
        source: std::io::Error,
        path: impl AsRef<Path>,
        operation: impl Into<String>,
    ) -> Self {
        Self::Io {
            stage,
            operation: operation.into(),
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Pipeline stage this error belongs to.
    #[must_use]
    pub fn stage(&self) -> Stage {
        match self {
            Self::UnsupportedPlatform { .. } => Stage::Resolve,
            Self::Download { .. } => Stage::Download,
            Self::Io { stage, .. } => *stage,
            Self::Extract { .. } => Stage::Extract,
            Self::VersionProbe { .. } | Self::VersionParse { .. } => Stage::ProbeVersion,
            Self::ChecksumMismatch { .. } => Stage::ValidateChecksum,
            Self::Cache { .. } => Stage::Cache,
        }
    }
}

/// Result type for the fetch pipeline
pub type Result<T> = std::result::Result<T, Error>;
