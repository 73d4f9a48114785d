use std::fs;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::blocking::Client;
use tracing::debug;

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Fetches a named resource (registry payload, migration index, signature).
///
/// One request per call. Retrying is up to the implementation.
pub trait ResourceFetcher {
    fn fetch(&self, resource: &str) -> Result<Vec<u8>>;

    /// Human-readable location, for diagnostics.
    fn describe(&self, resource: &str) -> String;
}

impl<F: ResourceFetcher + ?Sized> ResourceFetcher for Box<F> {
    fn fetch(&self, resource: &str) -> Result<Vec<u8>> {
        (**self).fetch(resource)
    }

    fn describe(&self, resource: &str) -> String {
        (**self).describe(resource)
    }
}

/// Resources are files below a root directory.
#[derive(Debug, Clone)]
pub struct FilesystemFetcher {
    root: PathBuf,
}

impl FilesystemFetcher {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resource_path(&self, resource: &str) -> Result<PathBuf> {
        let relative = Path::new(resource);
        if relative.as_os_str().is_empty()
            || relative
                .components()
                .any(|component| !matches!(component, Component::Normal(_)))
        {
            anyhow::bail!("resource '{resource}' must be a relative path inside the registry root");
        }
        Ok(self.root.join(relative))
    }
}

impl ResourceFetcher for FilesystemFetcher {
    fn fetch(&self, resource: &str) -> Result<Vec<u8>> {
        let path = self.resource_path(resource)?;
        debug!(path = %path.display(), "reading registry resource");
        fs::read(&path).with_context(|| format!("failed reading resource: {}", path.display()))
    }

    fn describe(&self, resource: &str) -> String {
        self.root.join(resource).display().to_string()
    }
}

/// Resources are URLs below a base URL.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    base_url: String,
    client: Client,
}

impl HttpFetcher {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .context("failed to create HTTP client")?;
        Ok(Self {
            base_url: base_url.into(),
            client,
        })
    }

    pub fn resource_url(&self, resource: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            resource.trim_start_matches('/')
        )
    }
}

impl ResourceFetcher for HttpFetcher {
    fn fetch(&self, resource: &str) -> Result<Vec<u8>> {
        let url = self.resource_url(resource);
        debug!(%url, "fetching registry resource");
        let response = self
            .client
            .get(&url)
            .send()
            .with_context(|| format!("failed to fetch {url}"))?;
        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("HTTP {status} from {url}");
        }
        let body = response
            .bytes()
            .with_context(|| format!("failed reading response body from {url}"))?;
        Ok(body.to_vec())
    }

    fn describe(&self, resource: &str) -> String {
        self.resource_url(resource)
    }
}
