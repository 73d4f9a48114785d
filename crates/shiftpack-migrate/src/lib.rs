mod executor;
mod orchestrator;
mod reconcile;
mod types;

pub use executor::{MigrationExecutor, MigrationHandlers, MigrationRequest, MigrationStep};
pub use orchestrator::MigrationOrchestrator;
pub use reconcile::{plan_reconciliation, Reconciliation};
pub use types::{MigrationPlan, MigrationState, SwitchOutcome};
