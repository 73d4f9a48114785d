use shiftpack_core::{Error, PackageDefinition, ReleaseCatalog, Result};
use shiftpack_resolver::DependencyResolver;
use tracing::{debug, info};

use crate::InstallState;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallChange {
    pub state: InstallState,
    /// Packages that were not installed before, dependency-first, target last.
    pub to_apply: Vec<PackageDefinition>,
}

/// Plans a direct install of `target` and its dependency closure.
///
/// Every closure member records `target` as a dependent; `target` itself is
/// marked as directly installed. Installing something that is already
/// directly installed changes nothing.
pub fn install_package(
    resolver: &mut DependencyResolver,
    catalog: &ReleaseCatalog,
    state: &InstallState,
    target: &str,
) -> Result<InstallChange> {
    let definition = catalog
        .package(target)
        .ok_or_else(|| Error::UnknownPackage {
            release: catalog.release_id().to_string(),
            package: target.to_string(),
        })?;
    if !definition.is_visible() {
        return Err(Error::NotInstallable(target.to_string()));
    }

    if state
        .record(target)
        .is_some_and(|record| record.directly_installed)
    {
        debug!(package = target, "already directly installed");
        return Ok(InstallChange {
            state: state.clone(),
            to_apply: Vec::new(),
        });
    }

    let dependencies = resolver.closure_of(catalog, target)?;
    let mut next = state.clone();
    for dependency in &dependencies {
        next.upsert(dependency)
            .installed_as_dependency_of
            .insert(target.to_string());
    }
    next.upsert(target).directly_installed = true;

    let mut to_apply = Vec::new();
    for id in dependencies.iter().map(String::as_str).chain([target]) {
        if state.is_installed(id) {
            continue;
        }
        let package = catalog.package(id).ok_or_else(|| Error::UnknownPackage {
            release: catalog.release_id().to_string(),
            package: id.to_string(),
        })?;
        to_apply.push(package.clone());
    }

    info!(
        package = target,
        release = catalog.release_id(),
        dependencies = dependencies.len(),
        new_packages = to_apply.len(),
        "planned install"
    );
    Ok(InstallChange {
        state: next,
        to_apply,
    })
}
