//! Release-aware package management for a project: install and uninstall
//! packages from a release catalog, and move the project between releases.

mod config;
mod session;

pub use config::{RegistryConfig, RegistryKind, ResolverConfig, ShiftpackConfig, StateConfig};
pub use session::{EnvironmentProbe, ProjectSession};

pub use shiftpack_core::{Error, PackageDefinition, Registry, ReleaseCatalog, Result};
pub use shiftpack_installer::{InstallRecord, InstallState, ProjectManifest};
pub use shiftpack_migrate::{
    MigrationExecutor, MigrationHandlers, MigrationRequest, MigrationState, SwitchOutcome,
};
