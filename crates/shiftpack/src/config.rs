use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use shiftpack_core::{Error, Result};
use shiftpack_registry::{
    FilesystemFetcher, HttpFetcher, RegistryClient, ResourceFetcher, DEFAULT_CATALOG_RESOURCE,
    DEFAULT_MIGRATIONS_RESOURCE,
};
use shiftpack_resolver::{DependencyResolver, DEFAULT_MAX_DEPTH};
use shiftpack_security::TrustedKey;
use tracing::debug;

const DEFAULT_STATE_PATH: &str = "state/shiftpack.toml";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistryKind {
    #[default]
    Filesystem,
    Http,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegistryConfig {
    #[serde(default)]
    pub kind: RegistryKind,
    /// Directory for `filesystem`, base URL for `http`.
    pub location: String,
    #[serde(default = "default_catalog_resource")]
    pub catalog: String,
    #[serde(default = "default_migrations_resource")]
    pub migrations: String,
    #[serde(default)]
    pub trusted_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StateConfig {
    #[serde(default = "default_state_path")]
    pub path: PathBuf,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            path: default_state_path(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResolverConfig {
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ShiftpackConfig {
    pub registry: RegistryConfig,
    #[serde(default)]
    pub state: StateConfig,
    #[serde(default)]
    pub resolver: ResolverConfig,
}

impl ShiftpackConfig {
    pub fn from_toml_str(input: &str) -> Result<Self> {
        let config: Self = toml::from_str(input)
            .map_err(|err| Error::Config(format!("failed to parse shiftpack config: {err}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads a config file. A relative state path is resolved against the
    /// directory holding the file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|err| {
            Error::Config(format!("failed to read config {}: {err}", path.display()))
        })?;
        let mut config = Self::from_toml_str(&content)?;
        if config.state.path.is_relative() {
            if let Some(parent) = path.parent() {
                config.state.path = parent.join(&config.state.path);
            }
        }
        debug!(config = %path.display(), state = %config.state.path.display(), "loaded config");
        Ok(config)
    }

    pub fn state_path(&self) -> &Path {
        &self.state.path
    }

    pub fn resolver(&self) -> DependencyResolver {
        DependencyResolver::with_max_depth(self.resolver.max_depth)
    }

    pub fn registry_client(&self) -> Result<RegistryClient> {
        let fetcher: Box<dyn ResourceFetcher> = match self.registry.kind {
            RegistryKind::Filesystem => Box::new(FilesystemFetcher::new(&self.registry.location)),
            RegistryKind::Http => Box::new(
                HttpFetcher::new(self.registry.location.clone())
                    .map_err(|err| Error::external("create registry HTTP client", err))?,
            ),
        };
        let mut client = RegistryClient::new(fetcher)
            .with_catalog_resource(self.registry.catalog.clone())
            .with_migrations_resource(self.registry.migrations.clone());
        if let Some(key) = self.trusted_key()? {
            client = client.with_trusted_key(key);
        }
        Ok(client)
    }

    pub fn trusted_key(&self) -> Result<Option<TrustedKey>> {
        self.registry
            .trusted_key
            .as_deref()
            .map(|hex| {
                TrustedKey::from_hex(hex)
                    .map_err(|err| Error::Config(format!("invalid registry.trusted_key: {err:#}")))
            })
            .transpose()
    }

    fn validate(&self) -> Result<()> {
        if self.registry.location.trim().is_empty() {
            return Err(Error::Config("registry.location must not be empty".to_string()));
        }
        for (field, value) in [
            ("registry.catalog", &self.registry.catalog),
            ("registry.migrations", &self.registry.migrations),
        ] {
            if value.trim().is_empty() {
                return Err(Error::Config(format!("{field} must not be empty")));
            }
        }
        if self.state.path.as_os_str().is_empty() {
            return Err(Error::Config("state.path must not be empty".to_string()));
        }
        if self.resolver.max_depth == 0 {
            return Err(Error::Config(
                "resolver.max_depth must be greater than zero".to_string(),
            ));
        }
        self.trusted_key()?;
        Ok(())
    }
}

fn default_catalog_resource() -> String {
    DEFAULT_CATALOG_RESOURCE.to_string()
}

fn default_migrations_resource() -> String {
    DEFAULT_MIGRATIONS_RESOURCE.to_string()
}

fn default_state_path() -> PathBuf {
    PathBuf::from(DEFAULT_STATE_PATH)
}

fn default_max_depth() -> usize {
    DEFAULT_MAX_DEPTH
}
