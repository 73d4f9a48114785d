use shiftpack_core::{Error, ReleaseCatalog, Result};
use shiftpack_resolver::DependencyResolver;
use tracing::warn;

use crate::{
    install_package, uninstall_package, InstallChange, InstallStateStore, KeyValueStore,
    ProjectManifest, UninstallChange,
};

/// Installs `target`, applies the new packages to the manifest, then commits
/// the state. A manifest failure leaves the stored state untouched.
pub fn install_with_manifest<S, M>(
    store: &mut InstallStateStore<S>,
    manifest: &mut M,
    resolver: &mut DependencyResolver,
    catalog: &ReleaseCatalog,
    target: &str,
) -> Result<InstallChange>
where
    S: KeyValueStore,
    M: ProjectManifest + ?Sized,
{
    let change = install_package(resolver, catalog, store.get(), target)?;
    if change.to_apply.is_empty() {
        store.apply(change.state.clone())?;
        return Ok(change);
    }

    manifest
        .apply_packages(&change.to_apply)
        .map_err(|err| Error::external(format!("apply packages for '{target}'"), err))?;

    if let Err(err) = store.apply(change.state.clone()) {
        let applied: Vec<String> = change
            .to_apply
            .iter()
            .rev()
            .map(|package| package.id.clone())
            .collect();
        if let Err(undo_err) = manifest.remove_packages(&applied) {
            warn!(
                package = target,
                error = ?undo_err,
                "failed rolling back manifest after state commit failure"
            );
        }
        return Err(err);
    }
    Ok(change)
}

/// Uninstalls `target`, removes released packages from the manifest, then
/// commits the state. A manifest failure leaves the stored state untouched.
pub fn uninstall_with_manifest<S, M>(
    store: &mut InstallStateStore<S>,
    manifest: &mut M,
    resolver: &mut DependencyResolver,
    catalog: &ReleaseCatalog,
    target: &str,
) -> Result<UninstallChange>
where
    S: KeyValueStore,
    M: ProjectManifest + ?Sized,
{
    let change = uninstall_package(resolver, catalog, store.get(), target)?;
    manifest
        .remove_packages(&change.to_remove)
        .map_err(|err| Error::external(format!("remove packages for '{target}'"), err))?;

    if let Err(err) = store.apply(change.state.clone()) {
        let restored: Vec<_> = change
            .to_remove
            .iter()
            .rev()
            .filter_map(|id| catalog.package(id).cloned())
            .collect();
        if let Err(undo_err) = manifest.apply_packages(&restored) {
            warn!(
                package = target,
                error = ?undo_err,
                "failed rolling back manifest after state commit failure"
            );
        }
        return Err(err);
    }
    Ok(change)
}
