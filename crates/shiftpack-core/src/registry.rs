use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::catalog::{RawReleaseCatalog, ReleaseCatalog};
use crate::error::{Error, Result};
use crate::platform::PlatformVersion;

/// All known releases, ascending by recency. The last entry is the latest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Registry {
    releases: Vec<ReleaseCatalog>,
    positions: HashMap<String, usize>,
}

impl Registry {
    pub fn get(&self, release_id: &str) -> Result<&ReleaseCatalog> {
        self.positions
            .get(release_id)
            .map(|index| &self.releases[*index])
            .ok_or_else(|| Error::not_found("release", release_id))
    }

    pub fn contains(&self, release_id: &str) -> bool {
        self.positions.contains_key(release_id)
    }

    pub fn releases(&self) -> Vec<&str> {
        self.releases
            .iter()
            .map(ReleaseCatalog::release_id)
            .collect()
    }

    pub fn catalogs(&self) -> &[ReleaseCatalog] {
        &self.releases
    }

    pub fn latest(&self) -> Option<&ReleaseCatalog> {
        self.releases.last()
    }

    pub fn is_empty(&self) -> bool {
        self.releases.is_empty()
    }

    /// Releases whose required platform version the given platform meets,
    /// in registry order.
    pub fn compatible_releases(&self, platform: &PlatformVersion) -> Vec<&str> {
        self.releases
            .iter()
            .filter(|catalog| catalog.supports_platform(platform))
            .map(ReleaseCatalog::release_id)
            .collect()
    }
}

/// Validates every catalog and builds the registry. Any invalid catalog
/// rejects the whole load.
pub fn load_registry(raw_catalogs: Vec<RawReleaseCatalog>) -> Result<Registry> {
    let mut releases = Vec::with_capacity(raw_catalogs.len());
    let mut positions = HashMap::with_capacity(raw_catalogs.len());

    for raw in raw_catalogs {
        validate_catalog(&raw)?;
        if positions
            .insert(raw.release_id.clone(), releases.len())
            .is_some()
        {
            return Err(Error::DuplicateRelease(raw.release_id));
        }
        debug!(
            release = %raw.release_id,
            packages = raw.packages.len(),
            "loaded release catalog"
        );
        releases.push(ReleaseCatalog::from_validated(raw));
    }

    Ok(Registry {
        releases,
        positions,
    })
}

fn validate_catalog(raw: &RawReleaseCatalog) -> Result<()> {
    let mut known = HashSet::with_capacity(raw.packages.len());
    for package in &raw.packages {
        if !known.insert(package.id.as_str()) {
            return Err(Error::DuplicatePackage {
                release: raw.release_id.clone(),
                package: package.id.clone(),
            });
        }
    }

    for (package, dependencies) in &raw.dependencies {
        for id in std::iter::once(package).chain(dependencies) {
            if !known.contains(id.as_str()) {
                return Err(Error::UnknownPackage {
                    release: raw.release_id.clone(),
                    package: id.clone(),
                });
            }
        }
    }

    if let Some(cycle) = find_cycle(raw) {
        return Err(Error::CyclicDependency {
            release: raw.release_id.clone(),
            cycle,
        });
    }

    Ok(())
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Done,
}

/// Returns the first cycle found as a closed path, e.g. `[a, b, a]`.
///
/// Depth-first with an explicit stack so long dependency chains cannot
/// exhaust the thread stack.
fn find_cycle(raw: &RawReleaseCatalog) -> Option<Vec<String>> {
    let mut marks: HashMap<&str, Mark> = HashMap::new();

    for package in &raw.packages {
        let root = package.id.as_str();
        if marks.contains_key(root) {
            continue;
        }
        marks.insert(root, Mark::Visiting);
        // Each frame is a package on the current path and the index of its
        // next unvisited dependency.
        let mut path: Vec<(&str, usize)> = vec![(root, 0)];

        while let Some(frame) = path.last_mut() {
            let (id, next) = *frame;
            frame.1 += 1;
            let dependencies = raw.dependencies.get(id).map(Vec::as_slice).unwrap_or_default();
            let Some(dependency) = dependencies.get(next).map(String::as_str) else {
                marks.insert(id, Mark::Done);
                path.pop();
                continue;
            };

            match marks.get(dependency) {
                Some(Mark::Done) => {}
                Some(Mark::Visiting) => {
                    let start = path
                        .iter()
                        .position(|(entry, _)| *entry == dependency)
                        .unwrap_or(0);
                    let mut cycle: Vec<String> = path[start..]
                        .iter()
                        .map(|(entry, _)| entry.to_string())
                        .collect();
                    cycle.push(dependency.to_string());
                    return Some(cycle);
                }
                None => {
                    marks.insert(dependency, Mark::Visiting);
                    path.push((dependency, 0));
                }
            }
        }
    }
    None
}
