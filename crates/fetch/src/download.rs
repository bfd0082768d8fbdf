//! Release asset download.

use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::debug;
use uvfetch_core::{ArtifactKey, Error, Result, Stage, TOOL_NAME};

/// URL of the latest release asset for `key` under `release_base_url`.
///
/// `https://github.com/astral-sh/uv` yields
/// `https://github.com/astral-sh/uv/releases/latest/download/uv-x86_64-unknown-linux-gnu.tar.gz`.
#[must_use]
pub fn release_url(release_base_url: &str, key: &ArtifactKey) -> String {
    format!(
        "{}/releases/latest/download/{}",
        release_base_url.trim_end_matches('/'),
        key.asset_file_name(TOOL_NAME)
    )
}

/// Download `url` to `dest`.
///
/// The body is streamed into `<dest>.part` and renamed onto `dest` once
/// complete, so `dest` only ever holds a whole response body.
///
/// # Errors
///
/// Returns [`Error::Download`] on network failure or a non-success status,
/// and [`Error::Io`] if the working area cannot be written.
pub async fn download_archive(
    client: &Client,
    url: &str,
    dest: &Path,
    token: Option<&SecretString>,
) -> Result<PathBuf> {
    debug!(%url, ?dest, authenticated = token.is_some(), "Downloading release asset");

    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| Error::io(Stage::Download, e, parent, "create"))?;
    }

    let mut request = client.get(url);
    if let Some(token) = token {
        request = request.bearer_auth(token.expose_secret());
    }

    let mut response = request
        .send()
        .await
        .map_err(|e| Error::download(url, e.to_string()))?;

    if !response.status().is_success() {
        return Err(Error::download(url, format!("HTTP {}", response.status())));
    }

    let partial = partial_path(dest);
    let mut file = tokio::fs::File::create(&partial)
        .await
        .map_err(|e| Error::io(Stage::Download, e, &partial, "create"))?;

    let mut written: u64 = 0;
    let streamed: Result<()> = async {
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| Error::download(url, format!("failed to read body: {e}")))?
        {
            file.write_all(&chunk)
                .await
                .map_err(|e| Error::io(Stage::Download, e, &partial, "write"))?;
            written += chunk.len() as u64;
        }
        file.flush()
            .await
            .map_err(|e| Error::io(Stage::Download, e, &partial, "flush"))
    }
    .await;
    drop(file);

    if let Err(e) = streamed {
        tokio::fs::remove_file(&partial).await.ok();
        return Err(e);
    }

    tokio::fs::rename(&partial, dest)
        .await
        .map_err(|e| Error::io(Stage::Download, e, dest, "rename"))?;

    debug!(%url, ?dest, bytes = written, "Downloaded release asset");
    Ok(dest.to_path_buf())
}

fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest
        .file_name()
        .map_or_else(|| OsString::from("download"), ToOwned::to_owned);
    name.push(".part");
    dest.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use uvfetch_core::{Architecture, Platform};
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn linux_key() -> ArtifactKey {
        ArtifactKey::new(Architecture::X86_64, Platform::UnknownLinuxGnu).unwrap()
    }

    #[test]
    fn test_release_url() {
        assert_eq!(
            release_url("https://github.com/astral-sh/uv", &linux_key()),
            "https://github.com/astral-sh/uv/releases/latest/download/uv-x86_64-unknown-linux-gnu.tar.gz"
        );

        let windows = ArtifactKey::new(Architecture::X86_64, Platform::PcWindowsMsvc).unwrap();
        assert_eq!(
            release_url("https://github.com/astral-sh/uv/", &windows),
            "https://github.com/astral-sh/uv/releases/latest/download/uv-x86_64-pc-windows-msvc.zip"
        );
    }

    #[test]
    fn test_partial_path() {
        assert_eq!(
            partial_path(Path::new("/w/uv-x86_64-unknown-linux-gnu.tar.gz")),
            PathBuf::from("/w/uv-x86_64-unknown-linux-gnu.tar.gz.part")
        );
    }

    #[tokio::test]
    async fn test_download_writes_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/asset.tar.gz"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"archive bytes".to_vec()))
            .mount(&server)
            .await;

        let temp = tempfile::TempDir::new().unwrap();
        let dest = temp.path().join("work").join("asset.tar.gz");
        let url = format!("{}/asset.tar.gz", server.uri());

        let written = download_archive(&Client::new(), &url, &dest, None)
            .await
            .unwrap();

        assert_eq!(written, dest);
        assert_eq!(std::fs::read(&dest).unwrap(), b"archive bytes");
        assert!(!partial_path(&dest).exists());
    }

    #[tokio::test]
    async fn test_download_sends_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/asset.zip"))
            .and(header("authorization", "Bearer s3cret"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"zip".to_vec()))
            .mount(&server)
            .await;

        let temp = tempfile::TempDir::new().unwrap();
        let dest = temp.path().join("asset.zip");
        let url = format!("{}/asset.zip", server.uri());
        let token = SecretString::from("s3cret".to_string());

        download_archive(&Client::new(), &url, &dest, Some(&token))
            .await
            .unwrap();
        assert_eq!(std::fs::read(&dest).unwrap(), b"zip");
    }

    #[tokio::test]
    async fn test_download_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let temp = tempfile::TempDir::new().unwrap();
        let dest = temp.path().join("asset.tar.gz");
        let url = format!("{}/missing.tar.gz", server.uri());

        let err = download_archive(&Client::new(), &url, &dest, None)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Download { .. }));
        assert!(err.to_string().contains("404"));
        assert!(!dest.exists());
        assert!(!partial_path(&dest).exists());
    }

    #[tokio::test]
    async fn test_download_connection_refused() {
        // Port 9 (discard) on localhost is not expected to accept HTTP
        let temp = tempfile::TempDir::new().unwrap();
        let dest = temp.path().join("asset.tar.gz");

        let err = download_archive(&Client::new(), "http://127.0.0.1:9/asset", &dest, None)
            .await
            .unwrap_err();
        assert_eq!(err.stage(), Stage::Download);
        assert!(!dest.exists());
    }
}
