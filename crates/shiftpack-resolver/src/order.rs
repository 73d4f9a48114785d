use std::collections::{BTreeMap, BTreeSet};

use shiftpack_core::{Error, ReleaseCatalog, Result};

use crate::DependencyResolver;

/// Orders `packages` so that every package comes after everything it depends
/// on, directly or through packages outside the set. Ties are broken by id.
pub fn dependency_order(
    resolver: &mut DependencyResolver,
    catalog: &ReleaseCatalog,
    packages: &BTreeSet<String>,
) -> Result<Vec<String>> {
    let edges = closure_edges(resolver, catalog, packages)?;
    kahn_order(catalog, packages, &edges, Direction::DependenciesFirst)
}

/// Orders `packages` so that dependents are removed before the packages they
/// depend on. Ties are broken by id.
pub fn removal_order(
    resolver: &mut DependencyResolver,
    catalog: &ReleaseCatalog,
    packages: &BTreeSet<String>,
) -> Result<Vec<String>> {
    let edges = closure_edges(resolver, catalog, packages)?;
    kahn_order(catalog, packages, &edges, Direction::DependentsFirst)
}

#[derive(Clone, Copy)]
enum Direction {
    DependenciesFirst,
    DependentsFirst,
}

/// `package -> members of the set in its closure`. Packages unknown to the
/// catalog have no edges.
fn closure_edges(
    resolver: &mut DependencyResolver,
    catalog: &ReleaseCatalog,
    packages: &BTreeSet<String>,
) -> Result<BTreeMap<String, BTreeSet<String>>> {
    let mut edges = BTreeMap::new();
    for package in packages {
        let deps = if catalog.contains(package) {
            resolver
                .closure_of(catalog, package)?
                .into_iter()
                .filter(|dep| packages.contains(dep))
                .collect()
        } else {
            BTreeSet::new()
        };
        edges.insert(package.clone(), deps);
    }
    Ok(edges)
}

fn kahn_order(
    catalog: &ReleaseCatalog,
    packages: &BTreeSet<String>,
    edges: &BTreeMap<String, BTreeSet<String>>,
    direction: Direction,
) -> Result<Vec<String>> {
    let mut blockers: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    let mut unblocks: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    for package in packages {
        blockers.entry(package.as_str()).or_default();
        unblocks.entry(package.as_str()).or_default();
    }

    for (package, deps) in edges {
        for dep in deps {
            let (before, after) = match direction {
                Direction::DependenciesFirst => (dep.as_str(), package.as_str()),
                Direction::DependentsFirst => (package.as_str(), dep.as_str()),
            };
            blockers.entry(after).or_default().insert(before);
            unblocks.entry(before).or_default().insert(after);
        }
    }

    let mut in_degree: BTreeMap<&str, usize> = blockers
        .iter()
        .map(|(package, set)| (*package, set.len()))
        .collect();
    let mut ready: BTreeSet<&str> = in_degree
        .iter()
        .filter_map(|(package, degree)| (*degree == 0).then_some(*package))
        .collect();
    let mut ordered = Vec::with_capacity(packages.len());

    while let Some(next) = ready.pop_first() {
        ordered.push(next.to_string());
        if let Some(children) = unblocks.get(next) {
            for child in children {
                if let Some(degree) = in_degree.get_mut(child) {
                    *degree = degree.saturating_sub(1);
                    if *degree == 0 {
                        ready.insert(*child);
                    }
                }
            }
        }
    }

    if ordered.len() != packages.len() {
        let cycle = packages
            .iter()
            .filter(|package| !ordered.contains(package))
            .cloned()
            .collect();
        return Err(Error::CyclicDependency {
            release: catalog.release_id().to_string(),
            cycle,
        });
    }

    Ok(ordered)
}
