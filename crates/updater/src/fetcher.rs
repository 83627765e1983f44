use crate::error::{Result, UpdaterError};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, RequestBuilder, Url};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::{NamedTempFile, PathPersistError};
use tokio::io::AsyncWriteExt;
use tokio::task;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);
const DEFAULT_USER_AGENT: &str = concat!("pms-updater/", env!("CARGO_PKG_VERSION"));

/// Abstraction over fetching remote content.
#[async_trait]
pub trait HttpFetcher: Send + Sync {
    /// Fetch the body at `url`, sending the given extra headers.
    async fn fetch_bytes(&self, url: &Url, headers: &[(&str, &str)]) -> Result<Bytes>;

    /// Download the body at `url` into `target`, replacing it atomically.
    /// Returns the number of bytes written.
    async fn download_to(&self, url: &Url, headers: &[(&str, &str)], target: &Path) -> Result<u64> {
        let bytes = self.fetch_bytes(url, headers).await?;
        let written = bytes.len() as u64;
        let target = target.to_path_buf();

        // Perform blocking filesystem work in a dedicated thread.
        task::spawn_blocking(move || write_atomically(&bytes, &target))
            .await
            .map_err(join_error)??;
        Ok(written)
    }
}

/// Builder for [`HttpClient`].
#[derive(Default)]
pub struct HttpClientBuilder {
    timeout: Option<Duration>,
    user_agent: Option<String>,
    client: Option<Client>,
}

impl HttpClientBuilder {
    /// Overall timeout for a single request, including the body.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Provide a custom reqwest client instance; timeout and user agent are
    /// then ignored.
    pub fn client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Build the client.
    pub fn build(self) -> Result<HttpClient> {
        let client = match self.client {
            Some(client) => client,
            None => Client::builder()
                .timeout(self.timeout.unwrap_or(DEFAULT_TIMEOUT))
                .user_agent(
                    self.user_agent
                        .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
                )
                .build()?,
        };

        Ok(HttpClient { client })
    }
}

/// reqwest-backed fetcher.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Create a new builder.
    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::default()
    }

    fn get(&self, url: &Url, headers: &[(&str, &str)]) -> RequestBuilder {
        headers
            .iter()
            .fold(self.client.get(url.clone()), |request, (name, value)| {
                request.header(*name, *value)
            })
    }
}

#[async_trait]
impl HttpFetcher for HttpClient {
    async fn fetch_bytes(&self, url: &Url, headers: &[(&str, &str)]) -> Result<Bytes> {
        let response = self.get(url, headers).send().await?.error_for_status()?;
        Ok(response.bytes().await?)
    }

    /// Streams the body chunk by chunk into a temp file next to `target`.
    async fn download_to(&self, url: &Url, headers: &[(&str, &str)], target: &Path) -> Result<u64> {
        let mut response = self.get(url, headers).send().await?.error_for_status()?;

        let parent = parent_dir(target)?;
        tokio::fs::create_dir_all(&parent).await?;
        let temp = task::spawn_blocking(move || NamedTempFile::new_in(parent))
            .await
            .map_err(join_error)??;

        let mut file = tokio::fs::File::from_std(temp.as_file().try_clone()?);
        let mut written = 0u64;
        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        file.sync_all().await?;
        drop(file);

        let target = target.to_path_buf();
        task::spawn_blocking(move || {
            temp.into_temp_path()
                .persist(&target)
                .map_err(map_persist_error)
        })
        .await
        .map_err(join_error)??;
        Ok(written)
    }
}

/// Write `bytes` to `target` through a temp file in the same folder.
fn write_atomically(bytes: &[u8], target: &Path) -> Result<()> {
    let parent = parent_dir(target)?;
    if !parent.exists() {
        fs::create_dir_all(&parent)?;
    }

    let mut temp = NamedTempFile::new_in(&parent)?;
    temp.write_all(bytes)?;
    temp.flush()?;
    temp.as_file().sync_all()?;

    temp.into_temp_path()
        .persist(target)
        .map_err(map_persist_error)?;
    Ok(())
}

fn parent_dir(target: &Path) -> Result<PathBuf> {
    target
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .ok_or_else(|| UpdaterError::Other("staging path must have a parent directory".into()))
}

fn map_persist_error(err: PathPersistError) -> UpdaterError {
    UpdaterError::Io(err.error)
}

fn join_error(err: task::JoinError) -> UpdaterError {
    UpdaterError::Other(format!("task join error: {err}"))
}

/// Parse a URL, mapping failures into an updater error.
pub(crate) fn parse_url(raw: &str) -> Result<Url> {
    Url::parse(raw).map_err(|err| UpdaterError::Other(format!("invalid URL {raw:?}: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn fetches_body_with_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/downloads/5.json"))
            .and(header("X-Plex-Token", "secret"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
            .mount(&server)
            .await;

        let client = HttpClient::builder().build().unwrap();
        let url = parse_url(&format!("{}/api/downloads/5.json", server.uri())).unwrap();
        let body = client
            .fetch_bytes(&url, &[("X-Plex-Token", "secret")])
            .await
            .unwrap();
        assert_eq!(&body[..], b"{}");
    }

    #[tokio::test]
    async fn error_status_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = HttpClient::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap();
        let url = parse_url(&format!("{}/missing", server.uri())).unwrap();
        let err = client.fetch_bytes(&url, &[]).await.unwrap_err();
        assert!(matches!(err, UpdaterError::Fetch(_)));
    }

    #[tokio::test]
    async fn downloads_stream_into_target() {
        let server = MockServer::start().await;
        let body = vec![7u8; 64 * 1024];
        Mock::given(method("GET"))
            .and(path("/files/PlexMediaServer-1.2.3.5-x86.exe"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body.clone()))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("Updates").join("PlexMediaServer-1.2.3.5-x86.exe");
        let client = HttpClient::builder().build().unwrap();
        let url = parse_url(&format!(
            "{}/files/PlexMediaServer-1.2.3.5-x86.exe",
            server.uri()
        ))
        .unwrap();

        let written = client.download_to(&url, &[], &target).await.unwrap();
        assert_eq!(written, body.len() as u64);
        assert_eq!(fs::read(&target).unwrap(), body);
        assert_eq!(fs::read_dir(target.parent().unwrap()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn failed_downloads_leave_nothing_behind() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("package.exe");
        let client = HttpClient::builder().build().unwrap();
        let url = parse_url(&format!("{}/missing", server.uri())).unwrap();

        let err = client.download_to(&url, &[], &target).await.unwrap_err();
        assert!(matches!(err, UpdaterError::Fetch(_)));
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn atomic_writes_replace_existing_files() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("nested").join("package.deb");
        write_atomically(b"old", &target).unwrap();
        write_atomically(b"new", &target).unwrap();
        assert_eq!(fs::read(&target).unwrap(), b"new");
    }

    #[test]
    fn invalid_urls_are_rejected() {
        assert!(parse_url("not a url").is_err());
    }
}
