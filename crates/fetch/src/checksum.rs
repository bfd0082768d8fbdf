//! SHA-256 verification of downloaded archives.

use sha2::{Digest, Sha256};
use std::path::Path;
use tokio::io::AsyncReadExt;
use tracing::{debug, info, warn};
use uvfetch_core::{ArtifactKey, Error, Result, Stage};

/// Length of a hex-encoded SHA-256 digest.
const SHA256_HEX_LEN: usize = 64;

/// Validate `file` against an optional expected SHA-256.
///
/// Succeeds without reading the file when `expected` is `None`. Otherwise
/// the whole file is hashed and compared case-insensitively.
///
/// # Errors
///
/// Returns [`Error::ChecksumMismatch`] naming the artifact when the digests
/// differ, or [`Error::Io`] if the file cannot be read.
pub async fn validate_checksum(
    expected: Option<&str>,
    file: &Path,
    key: &ArtifactKey,
    version: &str,
) -> Result<()> {
    let Some(expected) = expected else {
        debug!(%key, version, "No checksum supplied, skipping verification");
        return Ok(());
    };

    let expected = expected.trim().to_ascii_lowercase();
    if expected.len() != SHA256_HEX_LEN || !expected.chars().all(|c| c.is_ascii_hexdigit()) {
        warn!(%expected, "Expected checksum is not a SHA-256 hex digest");
    }

    let actual = sha256_file(file).await?;
    if actual != expected {
        return Err(Error::checksum_mismatch(
            expected,
            actual,
            key.architecture,
            key.platform,
            version,
        ));
    }

    info!(%key, version, sha256 = %actual, "Checksum verified");
    Ok(())
}

/// Compute the SHA-256 of a file as lowercase hex.
///
/// # Errors
///
/// Returns [`Error::Io`] if the file cannot be opened or read.
pub async fn sha256_file(path: &Path) -> Result<String> {
    let mut file = tokio::fs::File::open(path)
        .await
        .map_err(|e| Error::io(Stage::ValidateChecksum, e, path, "open"))?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; 64 * 1024];

    loop {
        let n = file
            .read(&mut buffer)
            .await
            .map_err(|e| Error::io(Stage::ValidateChecksum, e, path, "read"))?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(hex::encode(hasher.finalize()))
}
