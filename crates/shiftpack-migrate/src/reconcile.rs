use std::collections::BTreeSet;

use shiftpack_core::{PackageDefinition, ReleaseCatalog, Result};
use shiftpack_installer::{install_package, InstallState};
use shiftpack_resolver::{dependency_order, removal_order, DependencyResolver};
use tracing::{debug, warn};

/// The install state rebuilt under a target release and the package
/// changes that get the project there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    pub state: InstallState,
    pub removals: Vec<String>,
    pub applies: Vec<PackageDefinition>,
    pub dropped_roots: Vec<String>,
}

/// Re-installs every direct root of `state` against `target` and diffs the
/// result with what is installed now.
///
/// A package is removed when the target no longer needs it or its version
/// string differs between the two releases. It is applied when it is new or
/// its version changed. Roots that are missing or hidden in `target` are
/// dropped.
pub fn plan_reconciliation(
    resolver: &mut DependencyResolver,
    source: &ReleaseCatalog,
    target: &ReleaseCatalog,
    state: &InstallState,
) -> Result<Reconciliation> {
    let mut rebuilt = InstallState::new();
    let mut dropped_roots = Vec::new();
    for root in state.direct_installs() {
        if !target.package(root).is_some_and(PackageDefinition::is_visible) {
            warn!(
                package = root,
                release = target.release_id(),
                "direct install has no installable counterpart in target release"
            );
            dropped_roots.push(root.to_string());
            continue;
        }
        rebuilt = install_package(resolver, target, &rebuilt, root)?.state;
    }

    let version_changed = |package: &str| {
        let before = source.package(package).map(|definition| &definition.version);
        let after = target.package(package).map(|definition| &definition.version);
        before != after
    };

    let removed: BTreeSet<String> = state
        .installed_packages()
        .into_iter()
        .filter(|package| !rebuilt.is_installed(package) || version_changed(*package))
        .map(str::to_string)
        .collect();
    let added: BTreeSet<String> = rebuilt
        .installed_packages()
        .into_iter()
        .filter(|package| !state.is_installed(package) || version_changed(*package))
        .map(str::to_string)
        .collect();

    let removals = removal_order(resolver, source, &removed)?;
    let applies = dependency_order(resolver, target, &added)?
        .iter()
        .filter_map(|package| target.package(package).cloned())
        .collect();

    debug!(
        from = source.release_id(),
        to = target.release_id(),
        removals = removed.len(),
        applies = added.len(),
        dropped = dropped_roots.len(),
        "planned release reconciliation"
    );

    Ok(Reconciliation {
        state: rebuilt,
        removals,
        applies,
        dropped_roots,
    })
}
