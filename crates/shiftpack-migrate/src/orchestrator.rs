use shiftpack_core::{Error, MigrationIndex, MigrationKey, Registry, Result};
use shiftpack_installer::{InstallState, ProjectManifest};
use shiftpack_resolver::DependencyResolver;
use tracing::{debug, info, warn};

use crate::{
    plan_reconciliation, MigrationExecutor, MigrationPlan, MigrationRequest, MigrationState,
    Reconciliation, SwitchOutcome,
};

/// Drives a project from one release to another.
///
/// The orchestrator never mutates the caller's install state: the state for
/// the target release is returned in [`SwitchOutcome`] and the caller commits
/// it.
#[derive(Debug, Default)]
pub struct MigrationOrchestrator {
    resolver: DependencyResolver,
    state: MigrationState,
    transitions: Vec<MigrationState>,
}

impl MigrationOrchestrator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_resolver(resolver: DependencyResolver) -> Self {
        Self {
            resolver,
            ..Self::default()
        }
    }

    pub fn state(&self) -> MigrationState {
        self.state
    }

    /// States visited by the last switch, starting at `Idle`.
    pub fn transitions(&self) -> &[MigrationState] {
        &self.transitions
    }

    #[allow(clippy::too_many_arguments)]
    pub fn switch_release<E, M>(
        &mut self,
        registry: &Registry,
        state: &InstallState,
        from: &str,
        to: &str,
        index: &MigrationIndex,
        executor: &mut E,
        manifest: &mut M,
    ) -> Result<SwitchOutcome>
    where
        E: MigrationExecutor + ?Sized,
        M: ProjectManifest + ?Sized,
    {
        self.state = MigrationState::Idle;
        self.transitions = vec![MigrationState::Idle];

        self.transition(MigrationState::Resolving);
        let result = if from == to {
            registry
                .get(to)
                .map(|_| (MigrationPlan::unchanged(to), state.clone()))
        } else {
            self.run_switch(registry, state, from, to, index, executor, manifest)
                .map(|(plan, next)| (plan, next.with_current_release(to)))
        };
        match result {
            Ok((plan, next)) => {
                self.transition(MigrationState::Complete);
                info!(
                    from,
                    to,
                    removed = plan.removals.len(),
                    applied = plan.applies.len(),
                    migrated = plan.requires_migration(),
                    "switched release"
                );
                Ok(SwitchOutcome {
                    plan,
                    state: next,
                    transitions: self.transitions.clone(),
                })
            }
            Err(err) => {
                self.transition(MigrationState::Failed);
                warn!(from, to, error = %err, "release switch failed");
                Err(err)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn run_switch<E, M>(
        &mut self,
        registry: &Registry,
        state: &InstallState,
        from: &str,
        to: &str,
        index: &MigrationIndex,
        executor: &mut E,
        manifest: &mut M,
    ) -> Result<(MigrationPlan, InstallState)>
    where
        E: MigrationExecutor + ?Sized,
        M: ProjectManifest + ?Sized,
    {
        let source = registry.get(from)?;
        let target = registry.get(to)?;
        let Reconciliation {
            state: next,
            removals,
            applies,
            dropped_roots,
        } = plan_reconciliation(&mut self.resolver, source, target, state)?;

        let key = MigrationKey::for_releases(from, to);
        let routine = index.lookup(&key).cloned();
        let plan = MigrationPlan {
            from: from.to_string(),
            to: to.to_string(),
            routine,
            removals,
            applies,
            dropped_roots,
        };

        if let Some(routine) = &plan.routine {
            self.transition(MigrationState::MigrationPending);
            let request = MigrationRequest {
                from: from.to_string(),
                to: to.to_string(),
                key,
                routine: routine.clone(),
            };
            executor
                .execute(&request)
                .map_err(|err| Error::external(format!("migration routine '{routine}'"), err))?;
        } else {
            debug!(%key, "no migration routine registered");
        }

        self.transition(MigrationState::Reconciling);
        if !plan.removals.is_empty() {
            manifest.remove_packages(&plan.removals).map_err(|err| {
                Error::external(format!("remove packages for release '{to}'"), err)
            })?;
        }
        if !plan.applies.is_empty() {
            if let Err(err) = manifest.apply_packages(&plan.applies) {
                let restored: Vec<_> = plan
                    .removals
                    .iter()
                    .rev()
                    .filter_map(|package| source.package(package).cloned())
                    .collect();
                if !restored.is_empty() {
                    if let Err(undo_err) = manifest.apply_packages(&restored) {
                        warn!(
                            release = from,
                            error = ?undo_err,
                            "failed restoring source release packages"
                        );
                    }
                }
                return Err(Error::external(
                    format!("apply packages for release '{to}'"),
                    err,
                ));
            }
        }

        Ok((plan, next))
    }

    fn transition(&mut self, next: MigrationState) {
        debug!(from = %self.state, to = %next, "migration state transition");
        self.state = next;
        self.transitions.push(next);
    }
}
