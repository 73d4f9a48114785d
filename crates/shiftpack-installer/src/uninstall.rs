use std::collections::{BTreeSet, VecDeque};

use shiftpack_core::{Error, ReleaseCatalog, Result};
use shiftpack_resolver::{removal_order, DependencyResolver};
use tracing::{debug, info};

use crate::InstallState;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UninstallChange {
    pub state: InstallState,
    /// Every package that left the project, dependents before dependencies.
    pub to_remove: Vec<String>,
}

/// The installed packages that still need `package`, sorted.
pub fn blocking_dependents(state: &InstallState, package: &str) -> Vec<String> {
    state
        .record(package)
        .map(|record| record.installed_as_dependency_of.iter().cloned().collect())
        .unwrap_or_default()
}

/// Plans removal of `target` and every dependency nothing else still needs.
///
/// Fails with [`Error::PackageInUse`] while any installed package depends on
/// `target`. Dependencies are released one reference at a time: a dependency
/// leaves the project only when its dependent set becomes empty and it was not
/// installed directly, and its own closure is then released in turn.
pub fn uninstall_package(
    resolver: &mut DependencyResolver,
    catalog: &ReleaseCatalog,
    state: &InstallState,
    target: &str,
) -> Result<UninstallChange> {
    let record = state
        .record(target)
        .ok_or_else(|| Error::NotInstalled(target.to_string()))?;
    if !record.installed_as_dependency_of.is_empty() {
        return Err(Error::PackageInUse {
            package: target.to_string(),
            dependents: blocking_dependents(state, target),
        });
    }

    let mut next = state.clone();
    next.remove(target);
    let mut removed = BTreeSet::from([target.to_string()]);
    let mut pending = VecDeque::from([target.to_string()]);

    while let Some(released) = pending.pop_front() {
        if !catalog.contains(&released) {
            continue;
        }
        for dependency in resolver.closure_of(catalog, &released)? {
            let Some(record) = next.record_mut(&dependency) else {
                continue;
            };
            record.installed_as_dependency_of.remove(&released);
            if record.is_unreferenced() {
                debug!(
                    package = %dependency,
                    released_by = %released,
                    "dependency no longer needed"
                );
                next.remove(&dependency);
                removed.insert(dependency.clone());
                pending.push_back(dependency);
            }
        }
    }

    let to_remove = removal_order(resolver, catalog, &removed)?;
    info!(
        package = target,
        release = catalog.release_id(),
        removed = to_remove.len(),
        "planned uninstall"
    );
    Ok(UninstallChange {
        state: next,
        to_remove,
    })
}
