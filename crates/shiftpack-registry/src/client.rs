use shiftpack_core::{load_registry, Error, MigrationIndex, Registry, Result};
use shiftpack_security::{payload_fingerprint, TrustedKey};
use tracing::{debug, info};

use crate::{parse_migration_index, parse_registry_payload, ResourceFetcher};

pub const DEFAULT_CATALOG_RESOURCE: &str = "registry.json";
pub const DEFAULT_MIGRATIONS_RESOURCE: &str = "migrations.json";

/// A validated registry together with the fingerprint of the payload it was
/// loaded from.
#[derive(Debug, Clone)]
pub struct RegistrySnapshot {
    pub registry: Registry,
    pub snapshot_id: String,
}

/// Loads the registry payload and migration index through a fetcher.
///
/// When a trusted key is configured, every payload must come with a
/// `<resource>.sig` sidecar holding a hex Ed25519 signature.
pub struct RegistryClient {
    fetcher: Box<dyn ResourceFetcher>,
    catalog_resource: String,
    migrations_resource: String,
    trusted_key: Option<TrustedKey>,
}

impl RegistryClient {
    pub fn new(fetcher: Box<dyn ResourceFetcher>) -> Self {
        Self {
            fetcher,
            catalog_resource: DEFAULT_CATALOG_RESOURCE.to_string(),
            migrations_resource: DEFAULT_MIGRATIONS_RESOURCE.to_string(),
            trusted_key: None,
        }
    }

    pub fn with_catalog_resource(mut self, resource: impl Into<String>) -> Self {
        self.catalog_resource = resource.into();
        self
    }

    pub fn with_migrations_resource(mut self, resource: impl Into<String>) -> Self {
        self.migrations_resource = resource.into();
        self
    }

    pub fn with_trusted_key(mut self, key: TrustedKey) -> Self {
        self.trusted_key = Some(key);
        self
    }

    pub fn trusted_key(&self) -> Option<&TrustedKey> {
        self.trusted_key.as_ref()
    }

    /// Fetches, verifies, parses and validates the whole registry. Any
    /// invalid release rejects the load.
    pub fn fetch_registry(&self) -> Result<RegistrySnapshot> {
        let payload = self.fetch_verified(&self.catalog_resource)?;
        let snapshot_id = payload_fingerprint(&payload);
        let registry = load_registry(parse_registry_payload(&payload)?)?;
        info!(
            releases = registry.catalogs().len(),
            snapshot = %snapshot_id,
            "loaded registry"
        );
        Ok(RegistrySnapshot {
            registry,
            snapshot_id,
        })
    }

    pub fn fetch_migration_index(&self) -> Result<MigrationIndex> {
        let payload = self.fetch_verified(&self.migrations_resource)?;
        let index = parse_migration_index(&payload)?;
        debug!(entries = index.len(), "loaded migration index");
        Ok(index)
    }

    fn fetch_verified(&self, resource: &str) -> Result<Vec<u8>> {
        let payload = self.fetcher.fetch(resource).map_err(|err| {
            Error::external(format!("fetch {}", self.fetcher.describe(resource)), err)
        })?;

        let Some(key) = &self.trusted_key else {
            return Ok(payload);
        };

        let signature_resource = format!("{resource}.sig");
        let signature = self
            .fetcher
            .fetch(&signature_resource)
            .map_err(|err| Error::Signature {
                resource: resource.to_string(),
                message: format!("missing signature for key {}: {err:#}", key.key_id()),
            })?;
        let signature_hex = String::from_utf8(signature).map_err(|_| Error::Signature {
            resource: resource.to_string(),
            message: "signature sidecar is not valid UTF-8".to_string(),
        })?;

        let valid = key
            .verify(&payload, &signature_hex)
            .map_err(|err| Error::Signature {
                resource: resource.to_string(),
                message: format!("{err:#}"),
            })?;
        if !valid {
            return Err(Error::Signature {
                resource: resource.to_string(),
                message: format!("signature does not match key {}", key.key_id()),
            });
        }

        debug!(resource, key = key.key_id(), "verified payload signature");
        Ok(payload)
    }
}
