use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// The `major.minor` part of a release id used to look up migrations.
///
/// `2025.3.1` and `2025.3` both map to `2025.3`. Ids whose first two
/// dot-separated segments are not both numeric (`develop`, `2025`) are kept
/// whole as a single-segment prefix.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReleasePrefix(String);

impl ReleasePrefix {
    pub fn of(release_id: &str) -> Self {
        let trimmed = release_id.trim();
        let mut segments = trimmed.splitn(3, '.');
        let major = segments.next().unwrap_or_default();
        let minor = segments.next().map(leading_digits).unwrap_or_default();

        if is_numeric(major) && !minor.is_empty() {
            Self(format!("{major}.{minor}"))
        } else {
            Self(trimmed.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReleasePrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn is_numeric(value: &str) -> bool {
    !value.is_empty() && value.chars().all(|ch| ch.is_ascii_digit())
}

/// `3-beta` as a minor segment keeps `3`; a minor segment that does not start
/// with a digit yields nothing.
fn leading_digits(segment: &str) -> &str {
    let end = segment
        .find(|ch: char| !ch.is_ascii_digit())
        .unwrap_or(segment.len());
    &segment[..end]
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MigrationKey {
    pub from: ReleasePrefix,
    pub to: ReleasePrefix,
}

impl MigrationKey {
    pub fn for_releases(from_release: &str, to_release: &str) -> Self {
        Self {
            from: ReleasePrefix::of(from_release),
            to: ReleasePrefix::of(to_release),
        }
    }
}

impl fmt::Display for MigrationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.from, self.to)
    }
}

/// Opaque reference to a migration routine, resolved by the executor.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoutineLocator(String);

impl RoutineLocator {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoutineLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One entry of the migration index payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationIndexEntry {
    pub from: String,
    pub to: String,
    pub routine: RoutineLocator,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationIndex {
    routines: BTreeMap<MigrationKey, RoutineLocator>,
}

impl MigrationIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entry prefixes are normalized, so `2025.3.0` registers as `2025.3`.
    /// A later entry for the same key replaces the earlier one.
    pub fn from_entries(entries: impl IntoIterator<Item = MigrationIndexEntry>) -> Self {
        let mut index = Self::new();
        for entry in entries {
            index.insert(&entry.from, &entry.to, entry.routine);
        }
        index
    }

    pub fn insert(&mut self, from: &str, to: &str, routine: RoutineLocator) {
        self.routines
            .insert(MigrationKey::for_releases(from, to), routine);
    }

    pub fn lookup(&self, key: &MigrationKey) -> Option<&RoutineLocator> {
        self.routines.get(key)
    }

    pub fn len(&self) -> usize {
        self.routines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routines.is_empty()
    }
}
