//! Core types shared by the uvfetch crates.
//!
//! - [`Platform`], [`Architecture`] and [`ArtifactKey`] identify a release asset
//! - [`ArchiveFormat`] is derived from the platform and fixes the asset suffix
//! - [`Error`] and [`Stage`] describe where a fetch failed
//! - [`FetchOptions`] and [`FetchRequest`] carry caller configuration

mod error;
mod options;
mod platform;

pub use error::{Error, Result, Stage};
pub use options::{FetchOptions, FetchRequest, default_cache_dir, default_work_dir};
pub use platform::{ArchiveFormat, Architecture, ArtifactKey, Platform};

/// Name of the tool being fetched. Used for asset names, the executable
/// name and the cache key.
pub const TOOL_NAME: &str = "uv";

/// GitHub owner publishing the releases.
pub const OWNER: &str = "astral-sh";

/// GitHub repository publishing the releases.
pub const REPO: &str = "uv";
