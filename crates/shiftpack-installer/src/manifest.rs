use std::collections::BTreeMap;

use anyhow::Result;
use shiftpack_core::PackageDefinition;

/// The project's package manifest. These are the only side effects the
/// install engine triggers.
pub trait ProjectManifest {
    /// Adds or updates packages, in the given (dependency-first) order.
    fn apply_packages(&mut self, packages: &[PackageDefinition]) -> Result<()>;

    /// Removes packages, in the given (dependents-first) order.
    fn remove_packages(&mut self, packages: &[String]) -> Result<()>;
}

impl<M: ProjectManifest + ?Sized> ProjectManifest for &mut M {
    fn apply_packages(&mut self, packages: &[PackageDefinition]) -> Result<()> {
        (**self).apply_packages(packages)
    }

    fn remove_packages(&mut self, packages: &[String]) -> Result<()> {
        (**self).remove_packages(packages)
    }
}

/// A manifest modeled as a package id to version map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionMapManifest {
    entries: BTreeMap<String, String>,
}

impl VersionMapManifest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn version_of(&self, package: &str) -> Option<&str> {
        self.entries.get(package).map(String::as_str)
    }

    pub fn entries(&self) -> &BTreeMap<String, String> {
        &self.entries
    }
}

impl ProjectManifest for VersionMapManifest {
    fn apply_packages(&mut self, packages: &[PackageDefinition]) -> Result<()> {
        for package in packages {
            self.entries
                .insert(package.id.clone(), package.version.clone());
        }
        Ok(())
    }

    fn remove_packages(&mut self, packages: &[String]) -> Result<()> {
        for package in packages {
            self.entries.remove(package);
        }
        Ok(())
    }
}
