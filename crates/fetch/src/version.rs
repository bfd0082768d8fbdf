//! Version discovery by running the extracted tool.
//!
//! The tool reports itself as `uv 0.3.1 (be17d132a 2024-08-21)`; the version
//! is the second whitespace-delimited token of the first stdout line. This
//! depends on the tool's output format and is not a general version parser.

use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};
use uvfetch_core::{Error, Result};

/// Argument that makes the tool print its version.
pub const VERSION_FLAG: &str = "--version";

/// Run `<executable> --version` and parse the reported version.
///
/// With `verbose` the subprocess output is logged at info level, otherwise
/// at debug level. Only stdout is parsed.
///
/// # Errors
///
/// Returns [`Error::VersionProbe`] if the executable cannot be spawned or
/// exits unsuccessfully, and [`Error::VersionParse`] if stdout has no
/// version token.
pub async fn probe_version(executable: &Path, verbose: bool) -> Result<String> {
    debug!(?executable, "Probing version");

    let output = Command::new(executable)
        .arg(VERSION_FLAG)
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| Error::version_probe(executable, e.to_string()))?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);

    if verbose {
        info!(stdout = %stdout.trim_end(), stderr = %stderr.trim_end(), "{} {VERSION_FLAG}", executable.display());
    } else {
        debug!(stdout = %stdout.trim_end(), stderr = %stderr.trim_end(), "{} {VERSION_FLAG}", executable.display());
    }

    if !output.status.success() {
        return Err(Error::version_probe(
            executable,
            format!("exited with {}: {}", output.status, stderr.trim()),
        ));
    }

    parse_version_output(&stdout)
}

/// Extract the version from `--version` output.
///
/// # Errors
///
/// Returns [`Error::VersionParse`] when the first line has fewer than two
/// whitespace-delimited tokens.
pub fn parse_version_output(stdout: &str) -> Result<String> {
    stdout
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .map(str::to_string)
        .ok_or_else(|| Error::version_parse(stdout))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_release_output() {
        assert_eq!(
            parse_version_output("uv 0.3.1 (be17d132a 2024-08-21)\n").unwrap(),
            "0.3.1"
        );
    }

    #[test]
    fn test_parse_without_build_metadata() {
        assert_eq!(parse_version_output("uv 0.4.0").unwrap(), "0.4.0");
        assert_eq!(parse_version_output("uv\t0.4.0\r\n").unwrap(), "0.4.0");
    }

    #[test]
    fn test_parse_only_first_line() {
        assert_eq!(
            parse_version_output("uv 0.4.0 (abc123 2024-09-01)\nextra 9.9.9\n").unwrap(),
            "0.4.0"
        );
        assert!(parse_version_output("uv\n0.4.0\n").is_err());
    }

    #[test]
    fn test_parse_empty_output() {
        let err = parse_version_output("").unwrap_err();
        assert!(matches!(err, Error::VersionParse { .. }));
    }

    #[test]
    fn test_parse_single_token() {
        let err = parse_version_output("uv\n").unwrap_err();
        assert!(matches!(err, Error::VersionParse { ref output } if output == "uv\n"));
    }

    #[tokio::test]
    async fn test_probe_missing_executable() {
        let temp = tempfile::TempDir::new().unwrap();
        let err = probe_version(&temp.path().join("uv"), false)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::VersionProbe { .. }));
    }

    #[cfg(unix)]
    mod unix {
        use super::super::*;
        use std::os::unix::fs::PermissionsExt;
        use std::path::PathBuf;
        use tempfile::TempDir;

        fn script(temp: &TempDir, body: &str) -> PathBuf {
            let path = temp.path().join("uv");
            std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            path
        }

        #[tokio::test]
        async fn test_probe_parses_stdout() {
            let temp = TempDir::new().unwrap();
            let exe = script(&temp, r#"echo "uv 0.4.0 (abc123 2024-09-01)""#);
            assert_eq!(probe_version(&exe, false).await.unwrap(), "0.4.0");
            assert_eq!(probe_version(&exe, true).await.unwrap(), "0.4.0");
        }

        #[tokio::test]
        async fn test_probe_ignores_stderr() {
            let temp = TempDir::new().unwrap();
            let exe = script(&temp, r#"echo "warning: noisy" >&2; echo "uv 0.5.1""#);
            assert_eq!(probe_version(&exe, false).await.unwrap(), "0.5.1");
        }

        #[tokio::test]
        async fn test_probe_passes_version_flag() {
            let temp = TempDir::new().unwrap();
            let exe = script(&temp, r#"echo "uv $1""#);
            assert_eq!(probe_version(&exe, false).await.unwrap(), "--version");
        }

        #[tokio::test]
        async fn test_probe_nonzero_exit() {
            let temp = TempDir::new().unwrap();
            let exe = script(&temp, r#"echo "boom" >&2; exit 3"#);
            let err = probe_version(&exe, false).await.unwrap_err();
            assert!(matches!(err, Error::VersionProbe { .. }));
            assert!(err.to_string().contains("boom"));
        }

        #[tokio::test]
        async fn test_probe_empty_stdout() {
            let temp = TempDir::new().unwrap();
            let exe = script(&temp, "true");
            let err = probe_version(&exe, false).await.unwrap_err();
            assert!(matches!(err, Error::VersionParse { .. }));
        }
    }
}
