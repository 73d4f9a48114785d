use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::platform::PlatformVersion;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Visible,
    Hidden,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageDefinition {
    pub id: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub description: String,
    pub version: String,
    #[serde(alias = "url", alias = "path")]
    pub source: String,
    #[serde(default)]
    pub visibility: Visibility,
}

impl PackageDefinition {
    pub fn is_visible(&self) -> bool {
        self.visibility == Visibility::Visible
    }
}

/// A release as it appears in the registry payload, before validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawReleaseCatalog {
    pub release_id: String,
    #[serde(default)]
    pub required_platform_version: String,
    #[serde(default)]
    pub packages: Vec<PackageDefinition>,
    #[serde(default)]
    pub dependencies: BTreeMap<String, Vec<String>>,
}

/// Validated, read-only snapshot of one release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseCatalog {
    release_id: String,
    required_platform_version: String,
    packages: Vec<PackageDefinition>,
    positions: HashMap<String, usize>,
    dependencies: BTreeMap<String, Vec<String>>,
}

impl ReleaseCatalog {
    /// Builds a catalog without graph validation. Callers go through
    /// [`crate::load_registry`], which checks ids and cycles first.
    pub(crate) fn from_validated(raw: RawReleaseCatalog) -> Self {
        let positions = raw
            .packages
            .iter()
            .enumerate()
            .map(|(index, package)| (package.id.clone(), index))
            .collect();
        Self {
            release_id: raw.release_id,
            required_platform_version: raw.required_platform_version,
            packages: raw.packages,
            positions,
            dependencies: raw.dependencies,
        }
    }

    pub fn release_id(&self) -> &str {
        &self.release_id
    }

    pub fn required_platform_version(&self) -> &str {
        &self.required_platform_version
    }

    pub fn packages(&self) -> &[PackageDefinition] {
        &self.packages
    }

    pub fn package(&self, id: &str) -> Option<&PackageDefinition> {
        self.positions.get(id).map(|index| &self.packages[*index])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.positions.contains_key(id)
    }

    /// Direct dependencies in declared order.
    pub fn dependencies_of(&self, id: &str) -> &[String] {
        self.dependencies
            .get(id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn installable_packages(&self) -> impl Iterator<Item = &PackageDefinition> {
        self.packages.iter().filter(|package| package.is_visible())
    }

    /// True when `platform` is at least the release's required platform
    /// version. Releases without a parseable requirement accept any platform.
    pub fn supports_platform(&self, platform: &PlatformVersion) -> bool {
        match PlatformVersion::parse(&self.required_platform_version) {
            Some(required) => platform >= &required,
            None => true,
        }
    }
}
