use std::collections::BTreeMap;

use anyhow::{anyhow, Result};
use shiftpack_core::{MigrationKey, RoutineLocator};

/// The single request a release switch sends when a routine is registered
/// for its prefix pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationRequest {
    pub from: String,
    pub to: String,
    pub key: MigrationKey,
    pub routine: RoutineLocator,
}

pub trait MigrationExecutor {
    fn execute(&mut self, request: &MigrationRequest) -> Result<()>;
}

impl<E: MigrationExecutor + ?Sized> MigrationExecutor for &mut E {
    fn execute(&mut self, request: &MigrationRequest) -> Result<()> {
        (**self).execute(request)
    }
}

/// One typed migration routine.
pub trait MigrationStep {
    fn run(&mut self, request: &MigrationRequest) -> Result<()>;
}

impl<F> MigrationStep for F
where
    F: FnMut(&MigrationRequest) -> Result<()>,
{
    fn run(&mut self, request: &MigrationRequest) -> Result<()> {
        self(request)
    }
}

/// Routines registered up front, looked up by locator.
#[derive(Default)]
pub struct MigrationHandlers {
    steps: BTreeMap<RoutineLocator, Box<dyn MigrationStep>>,
}

impl MigrationHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `step` for `routine`, replacing any previous handler.
    pub fn register(
        &mut self,
        routine: impl Into<String>,
        step: impl MigrationStep + 'static,
    ) -> &mut Self {
        self.steps
            .insert(RoutineLocator::new(routine), Box::new(step));
        self
    }

    pub fn with_step(
        mut self,
        routine: impl Into<String>,
        step: impl MigrationStep + 'static,
    ) -> Self {
        self.register(routine, step);
        self
    }

    pub fn contains(&self, routine: &RoutineLocator) -> bool {
        self.steps.contains_key(routine)
    }

    pub fn routines(&self) -> Vec<&RoutineLocator> {
        self.steps.keys().collect()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl MigrationExecutor for MigrationHandlers {
    fn execute(&mut self, request: &MigrationRequest) -> Result<()> {
        let step = self.steps.get_mut(&request.routine).ok_or_else(|| {
            anyhow!(
                "no migration handler registered for routine '{}'",
                request.routine
            )
        })?;
        step.run(request)
    }
}
