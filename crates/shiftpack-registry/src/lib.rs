mod client;
mod fetch;
mod payload;

pub use client::{
    RegistryClient, RegistrySnapshot, DEFAULT_CATALOG_RESOURCE, DEFAULT_MIGRATIONS_RESOURCE,
};
pub use fetch::{FilesystemFetcher, HttpFetcher, ResourceFetcher};
pub use payload::{parse_migration_index, parse_registry_payload};
