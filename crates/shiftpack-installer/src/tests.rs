use super::*;
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::anyhow;
use shiftpack_core::{
    load_registry, Error, PackageDefinition, RawReleaseCatalog, ReleaseCatalog, Visibility,
};
use shiftpack_resolver::DependencyResolver;

fn definition(id: &str, visibility: Visibility) -> PackageDefinition {
    PackageDefinition {
        id: id.to_string(),
        display_name: id.to_string(),
        description: format!("{id} package"),
        version: "1.0.0".to_string(),
        source: format!("https://example.test/{id}.tgz"),
        visibility,
    }
}

fn catalog(packages: &[(&str, Visibility)], edges: &[(&str, &[&str])]) -> ReleaseCatalog {
    let raw = RawReleaseCatalog {
        release_id: "2025.3.1".to_string(),
        required_platform_version: String::new(),
        packages: packages
            .iter()
            .map(|(id, visibility)| definition(id, *visibility))
            .collect(),
        dependencies: edges
            .iter()
            .map(|(id, deps)| {
                (
                    id.to_string(),
                    deps.iter().map(|dep| dep.to_string()).collect(),
                )
            })
            .collect::<BTreeMap<_, _>>(),
    };
    load_registry(vec![raw])
        .expect("registry must load")
        .get("2025.3.1")
        .expect("release exists")
        .clone()
}

fn a_depends_on_b() -> ReleaseCatalog {
    catalog(
        &[("a", Visibility::Visible), ("b", Visibility::Visible)],
        &[("a", &["b"])],
    )
}

fn hidden_shared() -> ReleaseCatalog {
    catalog(
        &[
            ("x", Visibility::Visible),
            ("y", Visibility::Visible),
            ("h", Visibility::Hidden),
        ],
        &[("x", &["h"]), ("y", &["h"])],
    )
}

fn ids(packages: &[PackageDefinition]) -> Vec<&str> {
    packages.iter().map(|package| package.id.as_str()).collect()
}

fn install(
    resolver: &mut DependencyResolver,
    catalog: &ReleaseCatalog,
    state: &InstallState,
    target: &str,
) -> InstallState {
    install_package(resolver, catalog, state, target)
        .expect("install must succeed")
        .state
}

fn uninstall(
    resolver: &mut DependencyResolver,
    catalog: &ReleaseCatalog,
    state: &InstallState,
    target: &str,
) -> InstallState {
    uninstall_package(resolver, catalog, state, target)
        .expect("uninstall must succeed")
        .state
}

/// Every member of a dependent set must itself be installed.
fn assert_dependents_installed(state: &InstallState) {
    for record in state.records() {
        for dependent in &record.installed_as_dependency_of {
            assert!(
                state.is_installed(dependent),
                "'{}' lists missing dependent '{}'",
                record.package,
                dependent
            );
        }
    }
}

#[test]
fn install_applies_dependencies_first() {
    let catalog = a_depends_on_b();
    let mut resolver = DependencyResolver::new();

    let change = install_package(&mut resolver, &catalog, &InstallState::new(), "a")
        .expect("install must succeed");

    assert_eq!(ids(&change.to_apply), vec!["b", "a"]);
    let a = change.state.record("a").expect("a installed");
    assert!(a.directly_installed);
    assert!(a.installed_as_dependency_of.is_empty());
    let b = change.state.record("b").expect("b installed");
    assert!(!b.directly_installed);
    assert_eq!(
        b.installed_as_dependency_of.iter().collect::<Vec<_>>(),
        vec!["a"]
    );
}

#[test]
fn uninstalling_a_needed_dependency_is_blocked() {
    let catalog = a_depends_on_b();
    let mut resolver = DependencyResolver::new();
    let state = install(&mut resolver, &catalog, &InstallState::new(), "a");

    let err = uninstall_package(&mut resolver, &catalog, &state, "b")
        .expect_err("b is still needed by a");
    assert_eq!(
        err,
        Error::PackageInUse {
            package: "b".to_string(),
            dependents: vec!["a".to_string()],
        }
    );
    assert_eq!(blocking_dependents(&state, "b"), vec!["a"]);
}

#[test]
fn uninstall_cascades_to_unneeded_dependencies() {
    let catalog = a_depends_on_b();
    let mut resolver = DependencyResolver::new();
    let state = install(&mut resolver, &catalog, &InstallState::new(), "a");

    let change =
        uninstall_package(&mut resolver, &catalog, &state, "a").expect("uninstall must succeed");
    assert_eq!(change.to_remove, vec!["a", "b"]);
    assert!(change.state.is_empty());
}

#[test]
fn hidden_dependency_survives_until_last_dependent_leaves() {
    let catalog = hidden_shared();
    let mut resolver = DependencyResolver::new();

    let state = install(&mut resolver, &catalog, &InstallState::new(), "x");
    let change = install_package(&mut resolver, &catalog, &state, "y").expect("install y");
    assert_eq!(ids(&change.to_apply), vec!["y"]);
    let state = change.state;

    let change = uninstall_package(&mut resolver, &catalog, &state, "x").expect("uninstall x");
    assert_eq!(change.to_remove, vec!["x"]);
    let h = change.state.record("h").expect("h must remain");
    assert_eq!(
        h.installed_as_dependency_of.iter().collect::<Vec<_>>(),
        vec!["y"]
    );

    let change =
        uninstall_package(&mut resolver, &catalog, &change.state, "y").expect("uninstall y");
    assert_eq!(change.to_remove, vec!["y", "h"]);
    assert!(change.state.is_empty());
}

#[test]
fn hidden_packages_cannot_be_installed_directly() {
    let catalog = hidden_shared();
    let mut resolver = DependencyResolver::new();

    let err = install_package(&mut resolver, &catalog, &InstallState::new(), "h")
        .expect_err("hidden package must be rejected");
    assert_eq!(err, Error::NotInstallable("h".to_string()));

    let err = install_package(&mut resolver, &catalog, &InstallState::new(), "nope")
        .expect_err("unknown package must be rejected");
    assert!(matches!(err, Error::UnknownPackage { package, .. } if package == "nope"));
}

#[test]
fn installing_twice_is_a_no_op() {
    let catalog = a_depends_on_b();
    let mut resolver = DependencyResolver::new();
    let state = install(&mut resolver, &catalog, &InstallState::new(), "a");

    let change = install_package(&mut resolver, &catalog, &state, "a").expect("reinstall");
    assert!(change.to_apply.is_empty());
    assert_eq!(change.state, state);
}

#[test]
fn install_then_uninstall_restores_prior_state() {
    let catalog = catalog(
        &[
            ("app", Visibility::Visible),
            ("lib", Visibility::Visible),
            ("zlib", Visibility::Hidden),
            ("tool", Visibility::Visible),
        ],
        &[("app", &["lib"]), ("lib", &["zlib"]), ("tool", &["zlib"])],
    );
    let mut resolver = DependencyResolver::new();
    let before = install(&mut resolver, &catalog, &InstallState::new(), "tool")
        .with_current_release("2025.3.1");

    let installed = install(&mut resolver, &catalog, &before, "app");
    assert_dependents_installed(&installed);
    let change =
        uninstall_package(&mut resolver, &catalog, &installed, "app").expect("uninstall app");

    assert_eq!(change.to_remove, vec!["app", "lib"]);
    assert_eq!(change.state, before);
}

#[test]
fn direct_install_of_a_dependency_keeps_it_after_dependents_leave() {
    let catalog = a_depends_on_b();
    let mut resolver = DependencyResolver::new();
    let state = install(&mut resolver, &catalog, &InstallState::new(), "a");

    let change = install_package(&mut resolver, &catalog, &state, "b").expect("install b");
    assert!(change.to_apply.is_empty(), "b is already in the project");
    assert!(change.state.record("b").expect("b").directly_installed);

    let err = uninstall_package(&mut resolver, &catalog, &change.state, "b")
        .expect_err("a still needs b");
    assert!(matches!(err, Error::PackageInUse { .. }));

    let change =
        uninstall_package(&mut resolver, &catalog, &change.state, "a").expect("uninstall a");
    assert_eq!(change.to_remove, vec!["a"]);
    let b = change.state.record("b").expect("b stays as a direct install");
    assert!(b.directly_installed);
    assert!(b.installed_as_dependency_of.is_empty());
}

#[test]
fn direct_install_stays_pinned_by_a_later_dependent() {
    let catalog = a_depends_on_b();
    let mut resolver = DependencyResolver::new();
    let state = install(&mut resolver, &catalog, &InstallState::new(), "b");
    let state = install(&mut resolver, &catalog, &state, "a");
    let b = state.record("b").expect("b installed");
    assert!(b.directly_installed);
    assert_eq!(
        b.installed_as_dependency_of.iter().collect::<Vec<_>>(),
        vec!["a"]
    );

    let err = uninstall_package(&mut resolver, &catalog, &state, "b")
        .expect_err("a still needs b");
    assert_eq!(
        err,
        Error::PackageInUse {
            package: "b".to_string(),
            dependents: vec!["a".to_string()],
        }
    );

    let change = uninstall_package(&mut resolver, &catalog, &state, "a").expect("uninstall a");
    assert_eq!(change.to_remove, vec!["a"]);
    let b = change.state.record("b").expect("b stays as a direct install");
    assert!(b.directly_installed);
    assert!(b.installed_as_dependency_of.is_empty());
    assert_dependents_installed(&change.state);
}

#[test]
fn uninstall_of_missing_package_fails() {
    let catalog = a_depends_on_b();
    let mut resolver = DependencyResolver::new();
    let err = uninstall_package(&mut resolver, &catalog, &InstallState::new(), "a")
        .expect_err("nothing installed");
    assert_eq!(err, Error::NotInstalled("a".to_string()));
}

#[test]
fn package_in_use_iff_another_installed_closure_contains_it() {
    let catalog = catalog(
        &[
            ("app", Visibility::Visible),
            ("lib", Visibility::Visible),
            ("zlib", Visibility::Visible),
            ("tool", Visibility::Visible),
        ],
        &[("app", &["lib"]), ("lib", &["zlib"])],
    );
    let mut resolver = DependencyResolver::new();
    let mut state = InstallState::new();
    for target in ["app", "zlib", "tool"] {
        state = install(&mut resolver, &catalog, &state, target);
    }
    assert_dependents_installed(&state);

    for package in state.installed_packages() {
        let needed_elsewhere = state
            .installed_packages()
            .into_iter()
            .filter(|other| *other != package)
            .any(|other| {
                resolver
                    .closure_of(&catalog, other)
                    .expect("closure")
                    .iter()
                    .any(|dep| dep == package)
            });
        let result = uninstall_package(&mut resolver, &catalog, &state, package);
        assert_eq!(
            matches!(result, Err(Error::PackageInUse { .. })),
            needed_elsewhere,
            "unexpected uninstall outcome for '{package}'"
        );
    }
}

#[test]
fn reference_counts_hold_across_mixed_sequences() {
    let catalog = catalog(
        &[
            ("editor", Visibility::Visible),
            ("physics", Visibility::Visible),
            ("math", Visibility::Hidden),
            ("render", Visibility::Visible),
            ("shaders", Visibility::Hidden),
        ],
        &[
            ("editor", &["physics", "render"]),
            ("physics", &["math"]),
            ("render", &["shaders", "math"]),
        ],
    );
    let mut resolver = DependencyResolver::new();
    let mut state = InstallState::new();

    state = install(&mut resolver, &catalog, &state, "physics");
    assert_dependents_installed(&state);
    state = install(&mut resolver, &catalog, &state, "editor");
    assert_dependents_installed(&state);
    state = install(&mut resolver, &catalog, &state, "render");
    assert_dependents_installed(&state);

    let change = uninstall_package(&mut resolver, &catalog, &state, "editor").expect("editor");
    assert!(change.to_remove == vec!["editor"]);
    state = change.state;
    assert_dependents_installed(&state);

    state = uninstall(&mut resolver, &catalog, &state, "physics");
    assert_dependents_installed(&state);
    assert!(state.is_installed("math"), "render still needs math");

    let change = uninstall_package(&mut resolver, &catalog, &state, "render").expect("render");
    let removed: HashSet<&str> = change.to_remove.iter().map(String::as_str).collect();
    assert_eq!(removed, HashSet::from(["render", "shaders", "math"]));
    assert_eq!(change.to_remove[0], "render");
    assert!(change.state.is_empty());
}

#[test]
fn memory_store_round_trips_state() {
    let catalog = hidden_shared();
    let mut resolver = DependencyResolver::new();
    let state = install(&mut resolver, &catalog, &InstallState::new(), "x")
        .with_current_release("2025.3.1");

    let mut store = InstallStateStore::open(MemoryKeyValueStore::new()).expect("open");
    assert!(store.get().is_empty());
    assert_eq!(store.get().current_release(), None);

    store.apply(state.clone()).expect("apply");
    let reopened = InstallStateStore::open(store.into_backend()).expect("reopen");
    assert_eq!(reopened.get(), &state);
}

#[test]
fn encode_decode_is_lossless() {
    let catalog = hidden_shared();
    let mut resolver = DependencyResolver::new();
    let mut state = InstallState::new();
    for target in ["x", "y"] {
        state = install(&mut resolver, &catalog, &state, target);
    }

    let encoded = encode_install_state(&state).expect("encode");
    let decoded = decode_install_state(Some(&encoded), None).expect("decode");
    assert_eq!(decoded, state);

    let released = state.clone().with_current_release("2025.4.0");
    let encoded = encode_install_state(&released).expect("encode");
    let decoded = decode_install_state(Some(&encoded), Some("2025.4.0")).expect("decode");
    assert_eq!(decoded, released);
}

#[test]
fn decode_rejects_corrupt_payloads() {
    let err = decode_install_state(Some("{not json"), None).expect_err("corrupt json");
    assert!(matches!(err, Error::State(_)));

    let duplicated = r#"{"version":1,"records":[{"package":"a"},{"package":"a"}]}"#;
    let err = decode_install_state(Some(duplicated), None).expect_err("duplicate record");
    assert!(err.to_string().contains("duplicate install record for 'a'"));

    let future = r#"{"version":9,"records":[]}"#;
    let err = decode_install_state(Some(future), None).expect_err("future version");
    assert!(err.to_string().contains("unsupported install state version 9"));
}

#[test]
fn file_store_round_trips_state() {
    let root = test_state_root();
    let path = root.join("state").join("shiftpack.toml");
    let catalog = a_depends_on_b();
    let mut resolver = DependencyResolver::new();
    let state = install(&mut resolver, &catalog, &InstallState::new(), "a")
        .with_current_release("2025.3.1");

    let mut store = InstallStateStore::open(FileKeyValueStore::new(&path)).expect("open");
    store.apply(state.clone()).expect("apply");
    assert!(path.exists());

    let reopened = InstallStateStore::open(FileKeyValueStore::new(&path)).expect("reopen");
    assert_eq!(reopened.get(), &state);

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn file_store_rejects_entries_outside_the_entries_table() {
    let root = test_state_root();
    fs::create_dir_all(&root).expect("create root");
    let path = root.join("stray.toml");
    fs::write(&path, "\"shiftpack.current-release\" = \"2025.2.0\"\n").expect("write");

    let mut backend = FileKeyValueStore::new(&path);
    let err = backend
        .get(CURRENT_RELEASE_KEY)
        .expect_err("top-level keys are not state entries");
    assert!(format!("{err:#}").contains("failed parsing state file"));
    assert!(backend.set("custom", "value").is_err());
    assert_eq!(
        fs::read_to_string(&path).expect("read"),
        "\"shiftpack.current-release\" = \"2025.2.0\"\n"
    );

    let _ = fs::remove_dir_all(&root);
}

#[derive(Default)]
struct FailingManifest {
    fail_apply: bool,
    fail_remove: bool,
    applied: Vec<String>,
    removed: Vec<String>,
}

impl ProjectManifest for FailingManifest {
    fn apply_packages(&mut self, packages: &[PackageDefinition]) -> anyhow::Result<()> {
        if self.fail_apply {
            return Err(anyhow!("manifest is read-only"));
        }
        self.applied
            .extend(packages.iter().map(|package| package.id.clone()));
        Ok(())
    }

    fn remove_packages(&mut self, packages: &[String]) -> anyhow::Result<()> {
        if self.fail_remove {
            return Err(anyhow!("manifest is read-only"));
        }
        self.removed.extend(packages.iter().cloned());
        Ok(())
    }
}

#[derive(Default)]
struct RejectingStore {
    inner: MemoryKeyValueStore,
    reject_writes: bool,
}

impl KeyValueStore for RejectingStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        self.inner.get(key)
    }

    fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        if self.reject_writes {
            return Err(anyhow!("disk full"));
        }
        self.inner.set(key, value)
    }

    fn remove(&mut self, key: &str) -> anyhow::Result<()> {
        self.inner.remove(key)
    }
}

#[test]
fn install_with_manifest_commits_on_success() {
    let catalog = a_depends_on_b();
    let mut resolver = DependencyResolver::new();
    let mut store = InstallStateStore::open(MemoryKeyValueStore::new()).expect("open");
    let mut manifest = VersionMapManifest::new();

    let change = install_with_manifest(&mut store, &mut manifest, &mut resolver, &catalog, "a")
        .expect("install");
    assert_eq!(ids(&change.to_apply), vec!["b", "a"]);
    assert_eq!(store.get(), &change.state);
    assert_eq!(manifest.version_of("b"), Some("1.0.0"));

    let change = uninstall_with_manifest(&mut store, &mut manifest, &mut resolver, &catalog, "a")
        .expect("uninstall");
    assert_eq!(change.to_remove, vec!["a", "b"]);
    assert!(store.get().is_empty());
    assert!(manifest.entries().is_empty());
}

#[test]
fn manifest_failure_leaves_state_unchanged() {
    let catalog = a_depends_on_b();
    let mut resolver = DependencyResolver::new();
    let mut store = InstallStateStore::open(MemoryKeyValueStore::new()).expect("open");
    let mut manifest = FailingManifest {
        fail_apply: true,
        ..FailingManifest::default()
    };

    let err = install_with_manifest(&mut store, &mut manifest, &mut resolver, &catalog, "a")
        .expect_err("manifest failure must surface");
    assert!(matches!(&err, Error::ExternalIo { message, .. } if message == "manifest is read-only"));
    assert!(store.get().is_empty());
    assert!(store.backend().entries().is_empty());

    manifest.fail_apply = false;
    install_with_manifest(&mut store, &mut manifest, &mut resolver, &catalog, "a")
        .expect("install");
    let before = store.get().clone();

    manifest.fail_remove = true;
    uninstall_with_manifest(&mut store, &mut manifest, &mut resolver, &catalog, "a")
        .expect_err("remove failure must surface");
    assert_eq!(store.get(), &before);
}

#[test]
fn state_commit_failure_rolls_back_manifest() {
    let catalog = a_depends_on_b();
    let mut resolver = DependencyResolver::new();
    let mut store = InstallStateStore::open(RejectingStore {
        reject_writes: true,
        ..RejectingStore::default()
    })
    .expect("open");
    let mut manifest = FailingManifest::default();

    let err = install_with_manifest(&mut store, &mut manifest, &mut resolver, &catalog, "a")
        .expect_err("commit failure must surface");
    assert!(matches!(err, Error::ExternalIo { .. }));
    assert!(store.get().is_empty());
    assert_eq!(manifest.applied, vec!["b", "a"]);
    assert_eq!(manifest.removed, vec!["a", "b"]);
}

static TEST_STATE_ROOT_COUNTER: AtomicU64 = AtomicU64::new(0);

fn test_state_root() -> PathBuf {
    let mut path = std::env::temp_dir();
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system time")
        .as_nanos();
    let counter = TEST_STATE_ROOT_COUNTER.fetch_add(1, Ordering::SeqCst);
    path.push(format!(
        "shiftpack-installer-tests-{}-{}-{}",
        std::process::id(),
        nanos,
        counter
    ));
    path
}
