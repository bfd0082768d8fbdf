//! Version and architecture keyed cache for fetched tools.
//!
//! Entries are published with stage-then-rename so a reader never observes a
//! partially written entry:
//! - content is copied into a staging directory next to the entry
//! - a completion marker is written into the staged tree
//! - the staged tree is renamed onto the entry path
//!
//! [`ToolCache::lookup`] only reports entries carrying the marker.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};
use uvfetch_core::{Architecture, Error, Result, default_cache_dir};
use walkdir::WalkDir;

/// Marker file written into an entry once all content is in place.
pub const COMPLETE_MARKER: &str = ".complete";

/// Rename attempts before a contended publish gives up.
const PUBLISH_ATTEMPTS: usize = 8;

/// Local cache of extracted tools.
///
/// Default location: `~/.cache/uvfetch/tools/`
///
/// Structure:
/// ```text
/// ~/.cache/uvfetch/tools/
/// └── uv/
///     └── 0.4.0/
///         ├── x86_64/
///         │   ├── .complete
///         │   └── uv
///         └── aarch64/
/// ```
#[derive(Debug, Clone)]
pub struct ToolCache {
    root: PathBuf,
}

impl Default for ToolCache {
    fn default() -> Self {
        Self::new(default_cache_dir())
    }
}

impl ToolCache {
    /// Create a cache at the specified root directory.
    #[must_use]
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Get the cache root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Deterministic directory for an entry, whether or not it exists.
    #[must_use]
    pub fn entry_dir(&self, tool: &str, version: &str, arch: Architecture) -> PathBuf {
        self.version_dir(tool, version).join(arch.as_str())
    }

    fn version_dir(&self, tool: &str, version: &str) -> PathBuf {
        self.root.join(tool).join(version)
    }

    /// Get a cached entry if it was completely published.
    ///
    /// A `tool` or `version` that is not a single plain path component is
    /// never found.
    #[must_use]
    pub fn lookup(&self, tool: &str, version: &str, arch: Architecture) -> Option<PathBuf> {
        if let Err(e) = check_key(tool, version) {
            debug!(tool, version, error = %e, "Rejected cache key");
            return None;
        }
        let dir = self.entry_dir(tool, version, arch);
        if is_complete(&dir) {
            trace!(tool, version, %arch, ?dir, "Cache hit");
            Some(dir)
        } else {
            trace!(tool, version, %arch, "Cache miss");
            None
        }
    }

    /// Store a file or directory tree under (tool, version, arch).
    ///
    /// A directory source has its contents copied into the entry; a file
    /// source is copied into the entry under its own file name. Storing the
    /// same key again replaces the previous entry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cache`] if `tool` or `version` is not a single plain
    /// path component, the source cannot be read, or the entry cannot be
    /// written or published.
    pub fn store(
        &self,
        source: &Path,
        tool: &str,
        version: &str,
        arch: Architecture,
    ) -> Result<PathBuf> {
        check_key(tool, version).map_err(|e| Error::cache(e, &self.root, "validate"))?;

        let parent = self.version_dir(tool, version);
        let dest = parent.join(arch.as_str());

        fs::create_dir_all(&parent).map_err(|e| Error::cache(e, &parent, "create"))?;

        // Removed on drop, including when the caller is cancelled mid-copy
        let staging = tempfile::Builder::new()
            .prefix(".staging-")
            .tempdir_in(&parent)
            .map_err(|e| Error::cache(e, &parent, "stage"))?;

        copy_into(source, staging.path())?;

        let marker = staging.path().join(COMPLETE_MARKER);
        fs::write(&marker, b"").map_err(|e| Error::cache(e, &marker, "mark"))?;

        publish(staging.path(), &dest, &parent)?;

        debug!(tool, version, %arch, ?dest, "Stored entry in cache");
        Ok(dest)
    }
}

/// Entries must stay directly below the cache root.
fn check_key(tool: &str, version: &str) -> io::Result<()> {
    for (field, value) in [("tool", tool), ("version", version)] {
        let plain = !value.is_empty()
            && value != "."
            && value != ".."
            && !value.contains(['/', '\\']);
        if !plain {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid cache {field} {value:?}"),
            ));
        }
    }
    Ok(())
}

fn is_complete(dir: &Path) -> bool {
    dir.join(COMPLETE_MARKER).is_file()
}

/// Rename a staged tree onto `dest`, retiring any previous entry first.
///
/// Concurrent writers for the same key race on the final rename; a loser
/// accepts the winner's entry once it is complete.
fn publish(staged: &Path, dest: &Path, parent: &Path) -> Result<()> {
    let trash = tempfile::Builder::new()
        .prefix(".trash-")
        .tempdir_in(parent)
        .map_err(|e| Error::cache(e, parent, "stage"))?;

    let mut attempt = 0;
    loop {
        match fs::rename(dest, trash.path().join(format!("previous-{attempt}"))) {
            Ok(()) => trace!(?dest, "Retired previous cache entry"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(Error::cache(e, dest, "retire")),
        }

        match fs::rename(staged, dest) {
            Ok(()) => return Ok(()),
            Err(e) if is_complete(dest) => {
                debug!(?dest, error = %e, "Entry published concurrently, keeping it");
                return Ok(());
            }
            Err(_) if attempt + 1 < PUBLISH_ATTEMPTS => attempt += 1,
            Err(e) => return Err(Error::cache(e, dest, "publish")),
        }
    }
}

/// Copy a file or the contents of a directory into `dest_dir`.
fn copy_into(source: &Path, dest_dir: &Path) -> Result<()> {
    let meta = fs::metadata(source).map_err(|e| Error::cache(e, source, "read"))?;

    if meta.is_file() {
        let name = source.file_name().ok_or_else(|| {
            Error::cache(
                io::Error::new(io::ErrorKind::InvalidInput, "source has no file name"),
                source,
                "read",
            )
        })?;
        let target = dest_dir.join(name);
        fs::copy(source, &target).map_err(|e| Error::cache(e, &target, "copy"))?;
        return Ok(());
    }

    for entry in WalkDir::new(source).min_depth(1).follow_links(false) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(source).to_path_buf();
            Error::cache(io::Error::other(e), path, "walk")
        })?;
        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(|e| Error::cache(io::Error::other(e), entry.path(), "walk"))?;
        let target = dest_dir.join(relative);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            fs::create_dir_all(&target).map_err(|e| Error::cache(e, &target, "create"))?;
        } else if file_type.is_symlink() {
            copy_symlink(entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target).map_err(|e| Error::cache(e, &target, "copy"))?;
        }
    }

    Ok(())
}

#[cfg(unix)]
fn copy_symlink(link: &Path, target: &Path) -> Result<()> {
    let points_to = fs::read_link(link).map_err(|e| Error::cache(e, link, "read_link"))?;
    std::os::unix::fs::symlink(&points_to, target).map_err(|e| Error::cache(e, target, "symlink"))
}

#[cfg(not(unix))]
fn copy_symlink(link: &Path, target: &Path) -> Result<()> {
    fs::copy(link, target)
        .map(|_| ())
        .map_err(|e| Error::cache(e, target, "copy"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn source_tree(temp: &TempDir, content: &[u8]) -> PathBuf {
        let src = temp.path().join("src");
        fs::create_dir_all(src.join("share")).unwrap();
        fs::write(src.join("uv"), content).unwrap();
        fs::write(src.join("share").join("README"), b"docs").unwrap();
        src
    }

    #[test]
    fn test_entry_dir_layout() {
        let cache = ToolCache::new(PathBuf::from("/tmp/cache"));
        assert_eq!(
            cache.entry_dir("uv", "0.4.0", Architecture::X86_64),
            PathBuf::from("/tmp/cache/uv/0.4.0/x86_64")
        );
    }

    #[test]
    fn test_store_and_lookup() -> Result<()> {
        let temp = TempDir::new().unwrap();
        let cache = ToolCache::new(temp.path().join("cache"));
        let src = source_tree(&temp, b"binary");

        let stored = cache.store(&src, "uv", "0.4.0", Architecture::X86_64)?;

        assert_eq!(stored, cache.entry_dir("uv", "0.4.0", Architecture::X86_64));
        assert_eq!(
            cache.lookup("uv", "0.4.0", Architecture::X86_64),
            Some(stored.clone())
        );
        assert_eq!(fs::read(stored.join("uv")).unwrap(), b"binary");
        assert_eq!(fs::read(stored.join("share/README")).unwrap(), b"docs");
        Ok(())
    }

    #[test]
    fn test_store_single_file() -> Result<()> {
        let temp = TempDir::new().unwrap();
        let cache = ToolCache::new(temp.path().join("cache"));
        let file = temp.path().join("uv-x86_64-unknown-linux-gnu.tar.gz");
        fs::write(&file, b"archive").unwrap();

        let stored = cache.store(&file, "uv", "0.4.0", Architecture::X86_64)?;
        assert_eq!(
            fs::read(stored.join("uv-x86_64-unknown-linux-gnu.tar.gz")).unwrap(),
            b"archive"
        );
        Ok(())
    }

    #[test]
    fn test_store_twice_is_idempotent() -> Result<()> {
        let temp = TempDir::new().unwrap();
        let cache = ToolCache::new(temp.path().join("cache"));
        let src = source_tree(&temp, b"binary");

        let first = cache.store(&src, "uv", "0.4.0", Architecture::Aarch64)?;
        assert!(cache.lookup("uv", "0.4.0", Architecture::Aarch64).is_some());
        let second = cache.store(&src, "uv", "0.4.0", Architecture::Aarch64)?;

        assert_eq!(first, second);
        let found = cache.lookup("uv", "0.4.0", Architecture::Aarch64).unwrap();
        assert_eq!(fs::read(found.join("uv")).unwrap(), b"binary");
        assert_eq!(fs::read(found.join("share/README")).unwrap(), b"docs");
        Ok(())
    }

    #[test]
    fn test_last_write_wins() -> Result<()> {
        let temp = TempDir::new().unwrap();
        let cache = ToolCache::new(temp.path().join("cache"));

        let old = temp.path().join("old");
        fs::create_dir_all(&old).unwrap();
        fs::write(old.join("uv"), b"old").unwrap();
        fs::write(old.join("stale"), b"stale").unwrap();
        cache.store(&old, "uv", "0.4.0", Architecture::X86_64)?;

        let new = temp.path().join("new");
        fs::create_dir_all(&new).unwrap();
        fs::write(new.join("uv"), b"new").unwrap();
        let dir = cache.store(&new, "uv", "0.4.0", Architecture::X86_64)?;

        assert_eq!(fs::read(dir.join("uv")).unwrap(), b"new");
        assert!(!dir.join("stale").exists());
        Ok(())
    }

    #[test]
    fn test_no_staging_leftovers() -> Result<()> {
        let temp = TempDir::new().unwrap();
        let cache = ToolCache::new(temp.path().join("cache"));
        let src = source_tree(&temp, b"binary");

        cache.store(&src, "uv", "0.4.0", Architecture::X86_64)?;
        cache.store(&src, "uv", "0.4.0", Architecture::X86_64)?;

        let names: Vec<String> = fs::read_dir(temp.path().join("cache/uv/0.4.0"))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["x86_64".to_string()]);
        Ok(())
    }

    #[test]
    fn test_lookup_ignores_incomplete_entry() {
        let temp = TempDir::new().unwrap();
        let cache = ToolCache::new(temp.path().to_path_buf());
        let dir = cache.entry_dir("uv", "0.4.0", Architecture::X86_64);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("uv"), b"partial").unwrap();

        assert!(cache.lookup("uv", "0.4.0", Architecture::X86_64).is_none());
    }

    #[test]
    fn test_store_rejects_path_like_keys() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("cache");
        let cache = ToolCache::new(root.clone());
        let src = source_tree(&temp, b"binary");

        for version in ["../x", "../../escaped", "a/b", "a\\b", "..", ".", ""] {
            let err = cache
                .store(&src, "uv", version, Architecture::X86_64)
                .unwrap_err();
            assert!(matches!(err, Error::Cache { .. }), "{version:?}");
        }
        let err = cache
            .store(&src, "../uv", "0.4.0", Architecture::X86_64)
            .unwrap_err();
        assert!(matches!(err, Error::Cache { .. }));

        assert!(!temp.path().join("x").exists());
        assert!(!temp.path().join("escaped").exists());
        assert!(!root.exists());
    }

    #[test]
    fn test_store_keeps_directory_outside_root() {
        let temp = TempDir::new().unwrap();
        let cache = ToolCache::new(temp.path().join("cache"));
        let src = source_tree(&temp, b"binary");
        let outside = temp.path().join("escaped").join("x86_64");
        fs::create_dir_all(&outside).unwrap();
        fs::write(outside.join("keep"), b"mine").unwrap();

        assert!(
            cache
                .store(&src, "uv", "../../escaped", Architecture::X86_64)
                .is_err()
        );
        assert_eq!(fs::read(outside.join("keep")).unwrap(), b"mine");
    }

    #[test]
    fn test_lookup_rejects_path_like_keys() {
        let temp = TempDir::new().unwrap();
        let cache = ToolCache::new(temp.path().join("cache"));
        let outside = temp.path().join("x").join("x86_64");
        fs::create_dir_all(&outside).unwrap();
        fs::write(outside.join(COMPLETE_MARKER), b"").unwrap();

        assert!(cache.lookup("uv", "../../x", Architecture::X86_64).is_none());
        assert!(cache.lookup("uv", "a/b", Architecture::X86_64).is_none());
    }

    #[test]
    fn test_lookup_missing() {
        let temp = TempDir::new().unwrap();
        let cache = ToolCache::new(temp.path().to_path_buf());
        assert!(cache.lookup("uv", "9.9.9", Architecture::S390x).is_none());
    }

    #[test]
    fn test_store_missing_source() {
        let temp = TempDir::new().unwrap();
        let cache = ToolCache::new(temp.path().join("cache"));
        let err = cache
            .store(&temp.path().join("nope"), "uv", "0.4.0", Architecture::X86_64)
            .unwrap_err();
        assert!(matches!(err, Error::Cache { .. }));
        assert!(cache.lookup("uv", "0.4.0", Architecture::X86_64).is_none());
    }

    #[test]
    fn test_concurrent_writers_different_keys() {
        let temp = TempDir::new().unwrap();
        let cache = ToolCache::new(temp.path().join("cache"));
        let src = source_tree(&temp, b"binary");

        std::thread::scope(|s| {
            for arch in [Architecture::X86_64, Architecture::Aarch64, Architecture::I686] {
                let cache = &cache;
                let src = &src;
                s.spawn(move || cache.store(src, "uv", "0.4.0", arch).unwrap());
            }
        });

        for arch in [Architecture::X86_64, Architecture::Aarch64, Architecture::I686] {
            let dir = cache.lookup("uv", "0.4.0", arch).unwrap();
            assert_eq!(fs::read(dir.join("uv")).unwrap(), b"binary");
        }
    }

    #[test]
    fn test_concurrent_writers_same_key() {
        let temp = TempDir::new().unwrap();
        let cache = ToolCache::new(temp.path().join("cache"));
        let src = source_tree(&temp, b"binary");

        std::thread::scope(|s| {
            for _ in 0..4 {
                let cache = &cache;
                let src = &src;
                s.spawn(move || cache.store(src, "uv", "0.4.0", Architecture::X86_64).unwrap());
            }
        });

        let dir = cache.lookup("uv", "0.4.0", Architecture::X86_64).unwrap();
        assert_eq!(fs::read(dir.join("uv")).unwrap(), b"binary");
        assert_eq!(fs::read(dir.join("share/README")).unwrap(), b"docs");
    }

    #[test]
    fn test_cache_default() {
        let cache = ToolCache::default();
        assert!(cache.root().to_string_lossy().contains("uvfetch"));
    }
}
