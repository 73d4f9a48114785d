use std::fmt;

use shiftpack_core::{PackageDefinition, RoutineLocator};
use shiftpack_installer::InstallState;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MigrationState {
    #[default]
    Idle,
    Resolving,
    MigrationPending,
    Reconciling,
    Complete,
    Failed,
}

impl MigrationState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Resolving => "resolving",
            Self::MigrationPending => "migration-pending",
            Self::Reconciling => "reconciling",
            Self::Complete => "complete",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Failed)
    }
}

impl fmt::Display for MigrationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a release switch did, or will do, to the project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationPlan {
    pub from: String,
    pub to: String,
    pub routine: Option<RoutineLocator>,
    /// Reverse dependency order, as defined by the source release.
    pub removals: Vec<String>,
    /// Dependency-first, target-release definitions.
    pub applies: Vec<PackageDefinition>,
    /// Direct installs with no visible counterpart in the target release.
    pub dropped_roots: Vec<String>,
}

impl MigrationPlan {
    pub(crate) fn unchanged(release_id: &str) -> Self {
        Self {
            from: release_id.to_string(),
            to: release_id.to_string(),
            routine: None,
            removals: Vec::new(),
            applies: Vec::new(),
            dropped_roots: Vec::new(),
        }
    }

    pub fn requires_migration(&self) -> bool {
        self.routine.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwitchOutcome {
    pub plan: MigrationPlan,
    /// Install state under the target release, `current_release` set.
    pub state: InstallState,
    pub transitions: Vec<MigrationState>,
}
