//! Archive extraction and executable discovery.
//!
//! Archives are unpacked into a staging directory next to the destination
//! and renamed into place, so the destination never holds a partial tree.

use flate2::read::GzDecoder;
use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use tar::Archive;
use tracing::{debug, trace, warn};
use uvfetch_core::{ArchiveFormat, Error, Result, Stage};

/// An extracted executable and the directory holding it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedTool {
    /// Directory containing the executable
    pub dir: PathBuf,
    /// Full path to the executable
    pub executable: PathBuf,
}

/// Extract `archive` into `dest`, replacing anything already there.
///
/// # Errors
///
/// Returns [`Error::Extract`] if the archive is missing, empty, corrupt or
/// has no entries, and [`Error::Io`] if the working area cannot be written.
pub fn extract_archive(archive: &Path, format: ArchiveFormat, dest: &Path) -> Result<PathBuf> {
    let meta = fs::metadata(archive)
        .map_err(|e| Error::extract(archive, format!("cannot open archive: {e}")))?;
    if meta.len() == 0 {
        return Err(Error::extract(archive, "archive is empty"));
    }

    let parent = dest.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent).map_err(|e| Error::io(Stage::Extract, e, parent, "create"))?;

    let staging = tempfile::Builder::new()
        .prefix(".extract-")
        .tempdir_in(parent)
        .map_err(|e| Error::io(Stage::Extract, e, parent, "stage"))?;

    debug!(?archive, ?format, ?dest, "Extracting archive");

    let entries = match format {
        ArchiveFormat::Zip => unpack_zip(archive, staging.path())?,
        ArchiveFormat::TarGz => unpack_tar_gz(archive, staging.path())?,
    };
    if entries == 0 {
        return Err(Error::extract(archive, "archive contains no entries"));
    }

    if dest.exists() {
        fs::remove_dir_all(dest).map_err(|e| Error::io(Stage::Extract, e, dest, "remove"))?;
    }
    fs::rename(staging.path(), dest).map_err(|e| Error::io(Stage::Extract, e, dest, "rename"))?;

    debug!(?dest, entries, "Extracted archive");
    Ok(dest.to_path_buf())
}

fn unpack_tar_gz(archive: &Path, dest: &Path) -> Result<usize> {
    let file = File::open(archive)
        .map_err(|e| Error::extract(archive, format!("cannot open archive: {e}")))?;
    let mut tar = Archive::new(GzDecoder::new(BufReader::new(file)));
    tar.set_preserve_permissions(true);

    let mut count = 0;
    for entry in tar
        .entries()
        .map_err(|e| Error::extract(archive, format!("failed to read tar: {e}")))?
    {
        let mut entry =
            entry.map_err(|e| Error::extract(archive, format!("failed to read tar entry: {e}")))?;
        // `unpack_in` refuses paths escaping `dest` and reports false
        let unpacked = entry
            .unpack_in(dest)
            .map_err(|e| Error::extract(archive, format!("failed to unpack entry: {e}")))?;
        if unpacked {
            count += 1;
        } else {
            warn!(?archive, "Skipped tar entry outside extraction directory");
        }
    }
    Ok(count)
}

fn unpack_zip(archive_path: &Path, dest: &Path) -> Result<usize> {
    let file = File::open(archive_path)
        .map_err(|e| Error::extract(archive_path, format!("cannot open archive: {e}")))?;
    let mut archive = zip::ZipArchive::new(BufReader::new(file))
        .map_err(|e| Error::extract(archive_path, format!("failed to open zip: {e}")))?;

    let mut count = 0;
    for i in 0..archive.len() {
        let mut file = archive.by_index(i).map_err(|e| {
            Error::extract(archive_path, format!("failed to read zip entry: {e}"))
        })?;

        let Some(relative) = file.enclosed_name() else {
            warn!(name = file.name(), "Skipped zip entry outside extraction directory");
            continue;
        };
        if file.unix_mode().is_some_and(is_symlink_mode) {
            warn!(name = file.name(), "Skipped zip symlink entry");
            continue;
        }
        let outpath = dest.join(relative);

        if file.is_dir() {
            fs::create_dir_all(&outpath)
                .map_err(|e| Error::io(Stage::Extract, e, &outpath, "create"))?;
        } else {
            if let Some(p) = outpath.parent() {
                fs::create_dir_all(p).map_err(|e| Error::io(Stage::Extract, e, p, "create"))?;
            }
            let mut out = File::create(&outpath)
                .map_err(|e| Error::io(Stage::Extract, e, &outpath, "create"))?;
            io::copy(&mut file, &mut out).map_err(|e| {
                Error::extract(archive_path, format!("failed to unpack {}: {e}", file.name()))
            })?;

            #[cfg(unix)]
            if let Some(mode) = file.unix_mode() {
                use std::os::unix::fs::PermissionsExt;
                fs::set_permissions(&outpath, fs::Permissions::from_mode(mode))
                    .map_err(|e| Error::io(Stage::Extract, e, &outpath, "chmod"))?;
            }
        }
        count += 1;
    }
    Ok(count)
}

/// File-type bits of a Unix mode denote a symbolic link.
fn is_symlink_mode(mode: u32) -> bool {
    const S_IFMT: u32 = 0o170_000;
    const S_IFLNK: u32 = 0o120_000;
    mode & S_IFMT == S_IFLNK
}

/// Find `name` at the root of `dir` or one level below a wrapper directory.
///
/// # Errors
///
/// Returns [`Error::Extract`] if the executable is missing or, on Unix,
/// lacks an executable permission bit.
pub fn locate_executable(dir: &Path, name: &str) -> Result<ExtractedTool> {
    let root_candidate = dir.join(name);
    if root_candidate.is_file() {
        return checked(dir.to_path_buf(), root_candidate);
    }

    let mut subdirs: Vec<PathBuf> = fs::read_dir(dir)
        .map_err(|e| Error::extract(dir, format!("cannot read extracted files: {e}")))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_dir())
        .collect();
    subdirs.sort();

    for subdir in subdirs {
        let candidate = subdir.join(name);
        trace!(?candidate, "Looking for executable");
        if candidate.is_file() {
            return checked(subdir, candidate);
        }
    }

    Err(Error::extract(
        dir,
        format!("executable '{name}' not found in extracted archive"),
    ))
}

fn checked(dir: PathBuf, executable: PathBuf) -> Result<ExtractedTool> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = fs::metadata(&executable)
            .map_err(|e| Error::extract(&dir, format!("cannot stat executable: {e}")))?
            .permissions()
            .mode();
        if mode & 0o111 == 0 {
            return Err(Error::extract(
                &dir,
                format!("{} is not executable", executable.display()),
            ));
        }
    }

    debug!(?executable, "Located executable");
    Ok(ExtractedTool { dir, executable })
}
