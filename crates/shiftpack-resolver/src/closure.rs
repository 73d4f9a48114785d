use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use shiftpack_core::{Error, ReleaseCatalog, Result};
use tracing::trace;

/// Lower bound of the depth guard. The guard always admits paths as long as
/// the catalog's package count, so only a dependency cycle can trip it.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// For each package, the packages whose closure contains it.
pub type ReverseIndex = BTreeMap<String, BTreeSet<String>>;

/// Computes transitive closures over release catalogs, memoized per
/// `(release, package)`.
///
/// The cache is keyed by release id, so a resolver must not outlive the
/// registry it was used with. Build a fresh one after reloading.
#[derive(Debug, Clone)]
pub struct DependencyResolver {
    max_depth: usize,
    closures: HashMap<String, HashMap<String, Vec<String>>>,
    reverse: HashMap<String, ReverseIndex>,
}

impl Default for DependencyResolver {
    fn default() -> Self {
        Self::with_max_depth(DEFAULT_MAX_DEPTH)
    }
}

impl DependencyResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_depth(max_depth: usize) -> Self {
        Self {
            max_depth,
            closures: HashMap::new(),
            reverse: HashMap::new(),
        }
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Every package `package` depends on, dependency-first.
    ///
    /// For each direct dependency in declared order its own closure comes
    /// first, then the direct dependency list itself is appended. Later
    /// duplicates are dropped.
    pub fn closure_of(&mut self, catalog: &ReleaseCatalog, package: &str) -> Result<Vec<String>> {
        if !catalog.contains(package) {
            return Err(Error::UnknownPackage {
                release: catalog.release_id().to_string(),
                package: package.to_string(),
            });
        }
        self.resolve(catalog, package)
    }

    pub fn reverse_index(&mut self, catalog: &ReleaseCatalog) -> Result<ReverseIndex> {
        if let Some(index) = self.reverse.get(catalog.release_id()) {
            return Ok(index.clone());
        }

        let mut index: ReverseIndex = catalog
            .packages()
            .iter()
            .map(|package| (package.id.clone(), BTreeSet::new()))
            .collect();
        for package in catalog.packages() {
            for dependency in self.closure_of(catalog, &package.id)? {
                index
                    .entry(dependency)
                    .or_default()
                    .insert(package.id.clone());
            }
        }

        self.reverse
            .insert(catalog.release_id().to_string(), index.clone());
        Ok(index)
    }

    pub fn clear(&mut self) {
        self.closures.clear();
        self.reverse.clear();
    }

    fn cached(&self, catalog: &ReleaseCatalog, package: &str) -> Option<&Vec<String>> {
        self.closures
            .get(catalog.release_id())
            .and_then(|closures| closures.get(package))
    }

    /// Depth-first over an explicit stack. A package is resolved once every
    /// direct dependency has a cached closure, so the guard below sees the
    /// length of the current path and not the cache's history.
    fn resolve(&mut self, catalog: &ReleaseCatalog, package: &str) -> Result<Vec<String>> {
        if let Some(closure) = self.cached(catalog, package) {
            return Ok(closure.clone());
        }

        let limit = self.max_depth.max(catalog.packages().len());
        let mut path: Vec<(&str, usize)> = vec![(package, 0)];
        while let Some(frame) = path.last_mut() {
            let (id, next) = *frame;
            frame.1 += 1;
            let direct = catalog.dependencies_of(id);

            if let Some(dependency) = direct.get(next) {
                if self.cached(catalog, dependency).is_some() {
                    continue;
                }
                if path.len() >= limit {
                    return Err(Error::ResolutionDepthExceeded {
                        release: catalog.release_id().to_string(),
                        package: dependency.clone(),
                        limit,
                    });
                }
                path.push((dependency.as_str(), 0));
                continue;
            }

            let closure = self.assemble(catalog, direct);
            trace!(
                release = catalog.release_id(),
                package = id,
                size = closure.len(),
                "resolved closure"
            );
            self.closures
                .entry(catalog.release_id().to_string())
                .or_default()
                .insert(id.to_string(), closure);
            path.pop();
        }

        Ok(self.cached(catalog, package).cloned().unwrap_or_default())
    }

    /// Joins the cached closures of `direct`, then `direct` itself, keeping
    /// the first occurrence of each package.
    fn assemble(&self, catalog: &ReleaseCatalog, direct: &[String]) -> Vec<String> {
        let mut closure = Vec::new();
        let mut seen = HashSet::new();
        let nested = direct
            .iter()
            .filter_map(|dependency| self.cached(catalog, dependency))
            .flatten();
        for entry in nested.chain(direct) {
            if seen.insert(entry.as_str()) {
                closure.push(entry.clone());
            }
        }
        closure
    }
}
