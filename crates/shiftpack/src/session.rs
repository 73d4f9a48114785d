use shiftpack_core::{
    Error, MigrationIndex, PackageDefinition, PlatformVersion, Registry, ReleaseCatalog, Result,
};
use shiftpack_installer::{
    blocking_dependents, install_with_manifest, uninstall_with_manifest, FileKeyValueStore,
    InstallChange, InstallRecord, InstallState, InstallStateStore, KeyValueStore,
    ProjectManifest, UninstallChange,
};
use shiftpack_migrate::{MigrationExecutor, MigrationOrchestrator, SwitchOutcome};
use shiftpack_resolver::DependencyResolver;
use tracing::{info, warn};

use crate::ShiftpackConfig;

/// Source of the environment's platform version, e.g. `2022.3.20f1`.
pub trait EnvironmentProbe {
    fn platform_version(&self) -> anyhow::Result<String>;
}

/// One project bound to a registry snapshot, a persisted install state and
/// its package manifest.
pub struct ProjectSession<S, M> {
    registry: Registry,
    snapshot_id: Option<String>,
    migrations: MigrationIndex,
    store: InstallStateStore<S>,
    manifest: M,
    resolver: DependencyResolver,
    orchestrator: MigrationOrchestrator,
}

impl<M: ProjectManifest> ProjectSession<FileKeyValueStore, M> {
    /// Fetches the registry and migration index, then loads the install
    /// state file named by `config`.
    pub fn open(config: &ShiftpackConfig, manifest: M) -> Result<Self> {
        let client = config.registry_client()?;
        let snapshot = client.fetch_registry()?;
        let migrations = client.fetch_migration_index()?;
        let store = InstallStateStore::open(FileKeyValueStore::new(config.state_path()))?;

        let mut session = Self::new(snapshot.registry, migrations, store, manifest)
            .with_resolver_depth(config.resolver.max_depth);
        session.snapshot_id = Some(snapshot.snapshot_id);
        info!(
            snapshot = session.snapshot_id.as_deref().unwrap_or_default(),
            current_release = session.current_release().unwrap_or("<none>"),
            "opened project session"
        );
        Ok(session)
    }
}

impl<S: KeyValueStore, M: ProjectManifest> ProjectSession<S, M> {
    pub fn new(
        registry: Registry,
        migrations: MigrationIndex,
        store: InstallStateStore<S>,
        manifest: M,
    ) -> Self {
        Self {
            registry,
            snapshot_id: None,
            migrations,
            store,
            manifest,
            resolver: DependencyResolver::new(),
            orchestrator: MigrationOrchestrator::new(),
        }
    }

    pub fn with_resolver_depth(mut self, max_depth: usize) -> Self {
        self.resolver = DependencyResolver::with_max_depth(max_depth);
        self.orchestrator =
            MigrationOrchestrator::with_resolver(DependencyResolver::with_max_depth(max_depth));
        self
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn snapshot_id(&self) -> Option<&str> {
        self.snapshot_id.as_deref()
    }

    pub fn state(&self) -> &InstallState {
        self.store.get()
    }

    pub fn manifest(&self) -> &M {
        &self.manifest
    }

    pub fn store(&self) -> &InstallStateStore<S> {
        &self.store
    }

    pub fn current_release(&self) -> Option<&str> {
        self.store.get().current_release()
    }

    pub fn current_catalog(&self) -> Result<&ReleaseCatalog> {
        current_catalog(&self.registry, self.store.get())
    }

    /// Selects the first release for a project that has none yet.
    pub fn setup(&mut self, release_id: &str) -> Result<()> {
        self.registry.get(release_id)?;
        if let Some(current) = self.store.get().current_release() {
            return Err(Error::State(format!(
                "project already uses release '{current}'; switch releases instead"
            )));
        }
        let next = self.store.get().clone().with_current_release(release_id);
        self.store.apply(next)?;
        info!(release = release_id, "selected release");
        Ok(())
    }

    pub fn install(&mut self, package: &str) -> Result<InstallChange> {
        let catalog = current_catalog(&self.registry, self.store.get())?;
        install_with_manifest(
            &mut self.store,
            &mut self.manifest,
            &mut self.resolver,
            catalog,
            package,
        )
    }

    pub fn uninstall(&mut self, package: &str) -> Result<UninstallChange> {
        let catalog = current_catalog(&self.registry, self.store.get())?;
        uninstall_with_manifest(
            &mut self.store,
            &mut self.manifest,
            &mut self.resolver,
            catalog,
            package,
        )
    }

    /// Moves the project to `to`, running the registered migration routine
    /// if the release pair needs one, and commits the reconciled state.
    pub fn switch_release<E>(&mut self, to: &str, executor: &mut E) -> Result<SwitchOutcome>
    where
        E: MigrationExecutor + ?Sized,
    {
        let from = self
            .current_release()
            .map(str::to_string)
            .ok_or_else(|| Error::State("no release selected; run setup first".to_string()))?;
        let outcome = self.orchestrator.switch_release(
            &self.registry,
            self.store.get(),
            &from,
            to,
            &self.migrations,
            executor,
            &mut self.manifest,
        )?;

        let committed = self.store.apply(outcome.state.clone()).map(|_| ());
        if let Err(err) = committed {
            self.restore_manifest(&from, &outcome);
            return Err(err);
        }
        Ok(outcome)
    }

    pub fn installed(&self) -> Vec<&InstallRecord> {
        self.store.get().records().collect()
    }

    /// Visible packages of the current release.
    pub fn installable(&self) -> Result<Vec<&PackageDefinition>> {
        Ok(self.current_catalog()?.installable_packages().collect())
    }

    pub fn blocking_dependents(&self, package: &str) -> Vec<String> {
        blocking_dependents(self.store.get(), package)
    }

    /// Releases whose platform requirement the probed environment meets.
    pub fn compatible_releases(&self, probe: &dyn EnvironmentProbe) -> Result<Vec<&str>> {
        let raw = probe
            .platform_version()
            .map_err(|err| Error::external("read platform version", err))?;
        let platform = PlatformVersion::parse(&raw).ok_or_else(|| Error::InvalidPayload {
            kind: "platform version",
            message: format!("'{raw}' does not start with a numeric version"),
        })?;
        Ok(self.registry.compatible_releases(&platform))
    }

    fn restore_manifest(&mut self, from: &str, outcome: &SwitchOutcome) {
        let applied: Vec<String> = outcome
            .plan
            .applies
            .iter()
            .rev()
            .map(|package| package.id.clone())
            .collect();
        let restored: Vec<PackageDefinition> = match self.registry.get(from) {
            Ok(source) => outcome
                .plan
                .removals
                .iter()
                .rev()
                .filter_map(|package| source.package(package).cloned())
                .collect(),
            Err(_) => Vec::new(),
        };
        let undo = self
            .manifest
            .remove_packages(&applied)
            .and_then(|()| self.manifest.apply_packages(&restored));
        if let Err(undo_err) = undo {
            warn!(
                release = from,
                error = ?undo_err,
                "failed restoring manifest after state commit failure"
            );
        }
    }
}

fn current_catalog<'a>(
    registry: &'a Registry,
    state: &InstallState,
) -> Result<&'a ReleaseCatalog> {
    let release = state
        .current_release()
        .ok_or_else(|| Error::State("no release selected; run setup first".to_string()))?;
    registry.get(release)
}
