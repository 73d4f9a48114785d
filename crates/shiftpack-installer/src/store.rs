use std::collections::BTreeMap;

use anyhow::Result as AnyResult;
use serde::{Deserialize, Serialize};
use shiftpack_core::{Error, Result};
use tracing::debug;

use crate::{InstallRecord, InstallState};

pub const INSTALL_STATE_KEY: &str = "shiftpack.install-state";
pub const CURRENT_RELEASE_KEY: &str = "shiftpack.current-release";

/// String-keyed persistence medium for the install state.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> AnyResult<Option<String>>;
    fn set(&mut self, key: &str, value: &str) -> AnyResult<()>;
    fn remove(&mut self, key: &str) -> AnyResult<()>;

    /// Writes several keys at once; `None` removes the key. Backends that can
    /// commit in one step should override this.
    fn write_batch(&mut self, entries: &[(&str, Option<&str>)]) -> AnyResult<()> {
        for (key, value) in entries {
            match value {
                Some(value) => self.set(key, value)?,
                None => self.remove(key)?,
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryKeyValueStore {
    entries: BTreeMap<String, String>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &BTreeMap<String, String> {
        &self.entries
    }
}

impl KeyValueStore for MemoryKeyValueStore {
    fn get(&self, key: &str) -> AnyResult<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> AnyResult<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> AnyResult<()> {
        self.entries.remove(key);
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct InstallStateDocument {
    version: u32,
    #[serde(default)]
    records: Vec<InstallRecord>,
}

fn document_version() -> u32 {
    1
}

pub fn encode_install_state(state: &InstallState) -> Result<String> {
    let document = InstallStateDocument {
        version: document_version(),
        records: state.records().cloned().collect(),
    };
    serde_json::to_string(&document)
        .map_err(|err| Error::State(format!("failed serializing install state: {err}")))
}

pub fn decode_install_state(
    encoded: Option<&str>,
    current_release: Option<&str>,
) -> Result<InstallState> {
    let mut records = BTreeMap::new();
    if let Some(encoded) = encoded.filter(|raw| !raw.trim().is_empty()) {
        let document: InstallStateDocument = serde_json::from_str(encoded)
            .map_err(|err| Error::State(format!("failed parsing install state: {err}")))?;
        if document.version > document_version() {
            return Err(Error::State(format!(
                "unsupported install state version {}",
                document.version
            )));
        }
        for record in document.records {
            let package = record.package.clone();
            if records.insert(package.clone(), record).is_some() {
                return Err(Error::State(format!(
                    "duplicate install record for '{package}'"
                )));
            }
        }
    }

    let current_release = current_release
        .map(str::trim)
        .filter(|release| !release.is_empty())
        .map(ToOwned::to_owned);
    Ok(InstallState::from_parts(records, current_release))
}

/// Holds the live install state and its persisted copy. `apply` is the only
/// way to change it.
#[derive(Debug)]
pub struct InstallStateStore<S> {
    backend: S,
    current: InstallState,
}

impl<S: KeyValueStore> InstallStateStore<S> {
    /// Opens the store and loads whatever the backend holds.
    pub fn open(backend: S) -> Result<Self> {
        let mut store = Self {
            backend,
            current: InstallState::default(),
        };
        store.load()?;
        Ok(store)
    }

    pub fn get(&self) -> &InstallState {
        &self.current
    }

    /// Persists `next` and then makes it current. If persisting fails the
    /// current state is left untouched.
    pub fn apply(&mut self, next: InstallState) -> Result<&InstallState> {
        Self::persist(&mut self.backend, &next)?;
        self.current = next;
        Ok(&self.current)
    }

    pub fn load(&mut self) -> Result<&InstallState> {
        let encoded = self
            .backend
            .get(INSTALL_STATE_KEY)
            .map_err(|err| Error::external("read install state", err))?;
        let release = self
            .backend
            .get(CURRENT_RELEASE_KEY)
            .map_err(|err| Error::external("read current release", err))?;
        self.current = decode_install_state(encoded.as_deref(), release.as_deref())?;
        debug!(
            packages = self.current.len(),
            release = ?self.current.current_release(),
            "loaded install state"
        );
        Ok(&self.current)
    }

    pub fn save(&mut self) -> Result<()> {
        Self::persist(&mut self.backend, &self.current)
    }

    pub fn backend(&self) -> &S {
        &self.backend
    }

    pub fn into_backend(self) -> S {
        self.backend
    }

    fn persist(backend: &mut S, state: &InstallState) -> Result<()> {
        let encoded = encode_install_state(state)?;
        backend
            .write_batch(&[
                (INSTALL_STATE_KEY, Some(encoded.as_str())),
                (CURRENT_RELEASE_KEY, state.current_release()),
            ])
            .map_err(|err| Error::external("persist install state", err))
    }
}
