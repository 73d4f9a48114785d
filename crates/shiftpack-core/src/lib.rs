mod catalog;
mod error;
mod migration;
mod platform;
mod registry;

pub use catalog::{PackageDefinition, RawReleaseCatalog, ReleaseCatalog, Visibility};
pub use error::{Error, Result};
pub use migration::{
    MigrationIndex, MigrationIndexEntry, MigrationKey, ReleasePrefix, RoutineLocator,
};
pub use platform::PlatformVersion;
pub use registry::{load_registry, Registry};
