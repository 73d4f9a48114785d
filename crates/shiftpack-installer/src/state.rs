use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallRecord {
    pub package: String,
    #[serde(default)]
    pub directly_installed: bool,
    /// Direct installs whose closure pulled this package in.
    #[serde(default)]
    pub installed_as_dependency_of: BTreeSet<String>,
}

impl InstallRecord {
    pub(crate) fn new(package: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            directly_installed: false,
            installed_as_dependency_of: BTreeSet::new(),
        }
    }

    /// Neither requested by the user nor needed by anything installed.
    pub(crate) fn is_unreferenced(&self) -> bool {
        !self.directly_installed && self.installed_as_dependency_of.is_empty()
    }
}

/// What is installed in the project, and against which release.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallState {
    records: BTreeMap<String, InstallRecord>,
    current_release: Option<String>,
}

impl InstallState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_release(&self) -> Option<&str> {
        self.current_release.as_deref()
    }

    pub fn with_current_release(mut self, release_id: impl Into<String>) -> Self {
        self.current_release = Some(release_id.into());
        self
    }

    pub fn record(&self, package: &str) -> Option<&InstallRecord> {
        self.records.get(package)
    }

    pub fn is_installed(&self, package: &str) -> bool {
        self.records.contains_key(package)
    }

    pub fn records(&self) -> impl Iterator<Item = &InstallRecord> {
        self.records.values()
    }

    pub fn installed_packages(&self) -> Vec<&str> {
        self.records.keys().map(String::as_str).collect()
    }

    pub fn direct_installs(&self) -> Vec<&str> {
        self.records
            .values()
            .filter(|record| record.directly_installed)
            .map(|record| record.package.as_str())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub(crate) fn from_parts(
        records: BTreeMap<String, InstallRecord>,
        current_release: Option<String>,
    ) -> Self {
        Self {
            records,
            current_release,
        }
    }

    pub(crate) fn record_mut(&mut self, package: &str) -> Option<&mut InstallRecord> {
        self.records.get_mut(package)
    }

    pub(crate) fn upsert(&mut self, package: &str) -> &mut InstallRecord {
        self.records
            .entry(package.to_string())
            .or_insert_with(|| InstallRecord::new(package))
    }

    pub(crate) fn remove(&mut self, package: &str) -> Option<InstallRecord> {
        self.records.remove(package)
    }
}
